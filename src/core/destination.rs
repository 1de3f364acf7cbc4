//! Where an operation runs: the local machine or a remote host, plus a
//! working path.

use crate::error::{Error, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::sync::OnceLock;

pub const DEFAULT_PATH: &str = ".";

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Host {
    Local,
    Remote(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum User {
    /// Whoever runs hookline locally, or the ssh default remotely.
    Current,
    Named(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "DestinationSpec", into = "String")]
pub struct Destination {
    pub host: Host,
    pub user: User,
    pub path: String,
}

impl Destination {
    pub fn local(path: impl Into<String>) -> Self {
        Self {
            host: Host::Local,
            user: User::Current,
            path: non_empty_path(path.into()),
        }
    }

    pub fn remote(user: User, host: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            host: Host::Remote(host.into()),
            user,
            path: non_empty_path(path.into()),
        }
    }

    pub fn is_local(&self) -> bool {
        self.host == Host::Local
    }

    /// Same host and user, different working path.
    pub fn with_path(&self, path: impl Into<String>) -> Self {
        Self {
            host: self.host.clone(),
            user: self.user.clone(),
            path: non_empty_path(path.into()),
        }
    }

    /// `[user@]host` as handed to ssh. `None` for local destinations.
    pub fn ssh_target(&self) -> Option<String> {
        match (&self.host, &self.user) {
            (Host::Local, _) => None,
            (Host::Remote(host), User::Current) => Some(host.clone()),
            (Host::Remote(host), User::Named(user)) => Some(format!("{}@{}", user, host)),
        }
    }

    /// Parse `local`, a bare path, `host:path`, `user@host:path` or `user@host`.
    pub fn parse(input: &str) -> Result<Self> {
        let input = input.trim();
        if input.is_empty() {
            return Err(invalid(input, "Destination is empty"));
        }
        if input == "local" {
            return Ok(Self::local(DEFAULT_PATH));
        }
        if let Some(path) = input.strip_prefix("local:") {
            return Ok(Self::local(path));
        }

        if !input.contains('@') && !looks_like_host_path(input) {
            return Ok(Self::local(input));
        }

        let caps = remote_pattern()
            .captures(input)
            .ok_or_else(|| invalid(input, "Expected [user@]host:path"))?;

        let host = caps.name("host").map(|m| m.as_str()).unwrap_or_default();
        if host.is_empty() {
            return Err(invalid(input, "Host is empty"));
        }

        let user = match caps.name("user") {
            Some(m) if m.as_str().is_empty() => {
                return Err(invalid(input, "User before '@' is empty"));
            }
            Some(m) => User::Named(m.as_str().to_string()),
            None => User::Current,
        };

        let path = caps.name("path").map(|m| m.as_str()).unwrap_or_default();
        Ok(Self::remote(user, host, path))
    }

    /// Absolute local working directory with `~` expanded.
    pub fn expanded_path(&self) -> Result<PathBuf> {
        let expanded = shellexpand::tilde(&self.path).to_string();
        let path = PathBuf::from(expanded);
        if path.is_absolute() {
            return Ok(path);
        }
        let cwd = std::env::current_dir().map_err(|e| {
            Error::internal_io(e.to_string(), Some("resolve current directory".to_string()))
        })?;
        Ok(cwd.join(path))
    }
}

impl fmt::Display for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.ssh_target() {
            None => write!(f, "{}", self.path),
            Some(target) => write!(f, "{}:{}", target, self.path),
        }
    }
}

impl From<Destination> for String {
    fn from(destination: Destination) -> Self {
        destination.to_string()
    }
}

impl std::str::FromStr for Destination {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

/// Deployment files may spell a destination as a string or as fields.
#[derive(Deserialize)]
#[serde(untagged)]
enum DestinationSpec {
    Text(String),
    Fields {
        #[serde(default)]
        host: Option<String>,
        #[serde(default)]
        user: Option<String>,
        #[serde(default)]
        path: Option<String>,
    },
}

impl TryFrom<DestinationSpec> for Destination {
    type Error = Error;

    fn try_from(spec: DestinationSpec) -> Result<Self> {
        match spec {
            DestinationSpec::Text(text) => Self::parse(&text),
            DestinationSpec::Fields { host, user, path } => {
                let path = path.unwrap_or_else(|| DEFAULT_PATH.to_string());
                let user = match user {
                    Some(u) if !u.is_empty() => User::Named(u),
                    _ => User::Current,
                };
                match host.as_deref() {
                    None | Some("") | Some("local") => Ok(Self::local(path)),
                    Some(h) => Ok(Self::remote(user, h, path)),
                }
            }
        }
    }
}

fn remote_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^(?:(?P<user>[^@:/\s]*)@)?(?P<host>[^@:/\s]*)(?::(?P<path>.*))?$")
            .expect("destination pattern is valid")
    })
}

fn looks_like_host_path(input: &str) -> bool {
    match input.split_once(':') {
        Some((host, _)) => !host.is_empty() && !host.contains('/'),
        None => false,
    }
}

fn non_empty_path(path: String) -> String {
    if path.trim().is_empty() {
        DEFAULT_PATH.to_string()
    } else {
        path
    }
}

fn invalid(input: &str, problem: &str) -> Error {
    Error::validation_invalid_argument("destination", problem, Some(input.to_string()), None)
}
