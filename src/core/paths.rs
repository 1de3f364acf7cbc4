use crate::error::{Error, Result};
use std::env;
use std::path::PathBuf;

/// Base hookline config directory (~/.config/hookline/ on all platforms)
pub fn hookline() -> Result<PathBuf> {
    #[cfg(windows)]
    {
        let appdata = env::var("APPDATA").map_err(|_| {
            Error::internal_unexpected(
                "APPDATA environment variable not set on Windows".to_string(),
            )
        })?;
        Ok(PathBuf::from(appdata).join("hookline"))
    }

    #[cfg(not(windows))]
    {
        let home = env::var("HOME").map_err(|_| {
            Error::internal_unexpected(
                "HOME environment variable not set on Unix-like system".to_string(),
            )
        })?;
        Ok(PathBuf::from(home).join(".config").join("hookline"))
    }
}

/// Global hookline.json config file path
pub fn hookline_json() -> Result<PathBuf> {
    Ok(hookline()?.join("hookline.json"))
}

/// Directory for SSH multiplexing control sockets
pub fn control_sockets() -> Result<PathBuf> {
    Ok(hookline()?.join("sockets"))
}
