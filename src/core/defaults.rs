use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::paths;

/// Root configuration structure for hookline.json
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct HooklineConfig {
    #[serde(default)]
    pub defaults: Defaults,
}

/// All configurable defaults that can be overridden via hookline.json
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Defaults {
    #[serde(default = "default_ssh")]
    pub ssh: SshConfig,

    /// Shell used to run local operations (`<shell> -c <command>`).
    #[serde(default = "default_shell")]
    pub shell: String,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            ssh: default_ssh(),
            shell: default_shell(),
        }
    }
}

/// Configuration for remote execution over ssh
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SshConfig {
    #[serde(default = "default_ssh_port")]
    pub port: u16,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identity_file: Option<String>,

    #[serde(default = "default_connect_timeout")]
    pub connect_timeout: u32,

    #[serde(default = "default_server_alive_interval")]
    pub server_alive_interval: u32,

    /// Attempts per command when the connection itself fails.
    #[serde(default = "default_retries")]
    pub retries: u32,

    /// Share one connection per (user, host) through OpenSSH ControlMaster.
    #[serde(default)]
    pub multiplex: bool,

    #[serde(default = "default_control_persist")]
    pub control_persist: u32,
}

// =============================================================================
// Default value functions
// =============================================================================

fn default_ssh() -> SshConfig {
    SshConfig {
        port: default_ssh_port(),
        identity_file: None,
        connect_timeout: default_connect_timeout(),
        server_alive_interval: default_server_alive_interval(),
        retries: default_retries(),
        multiplex: false,
        control_persist: default_control_persist(),
    }
}

fn default_shell() -> String {
    "sh".to_string()
}

fn default_ssh_port() -> u16 {
    22
}

fn default_connect_timeout() -> u32 {
    10
}

fn default_server_alive_interval() -> u32 {
    15
}

fn default_retries() -> u32 {
    3
}

fn default_control_persist() -> u32 {
    60
}

// =============================================================================

/// Load defaults, merging file config with built-in defaults.
/// If hookline.json is missing or invalid, silently returns built-in defaults.
pub fn load_defaults() -> Defaults {
    load_config().defaults
}

/// Load the full hookline.json config, falling back to defaults on any error.
pub fn load_config() -> HooklineConfig {
    let Ok(path) = paths::hookline_json() else {
        return HooklineConfig::default();
    };
    if !path.exists() {
        return HooklineConfig::default();
    }
    match load_config_from(&path) {
        Ok(config) => config,
        Err(err) => {
            log_status!("config", "Ignoring {}: {}", path.display(), err.details);
            HooklineConfig::default()
        }
    }
}

/// Parse a hookline.json file.
pub fn load_config_from(path: &Path) -> crate::Result<HooklineConfig> {
    let content = fs::read_to_string(path).map_err(|e| {
        crate::Error::internal_io(e.to_string(), Some(format!("read {}", path.display())))
    })?;

    serde_json::from_str(&content)
        .map_err(|e| crate::Error::config_invalid_json(path.display().to_string(), e))
}

/// Get the path to hookline.json (for display purposes)
pub fn config_path() -> crate::Result<String> {
    Ok(paths::hookline_json()?.display().to_string())
}

/// Check if hookline.json file exists
pub fn config_exists() -> bool {
    paths::hookline_json()
        .map(|p| p.exists())
        .unwrap_or(false)
}
