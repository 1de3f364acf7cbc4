//! Maps the roles a hook runs in (`local`, `build`, `publish`) to concrete
//! destinations.

use crate::deployment::Deployment;
use crate::destination::Destination;
use crate::error::{Error, Result};
use serde::Serialize;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Local,
    Build,
    Publish,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Local => "local",
            Role::Build => "build",
            Role::Publish => "publish",
        }
    }
}

impl FromStr for Role {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "local" => Ok(Role::Local),
            "build" => Ok(Role::Build),
            "publish" => Ok(Role::Publish),
            other => Err(Error::validation_invalid_argument(
                "role",
                format!("Unknown role '{}'", other),
                Some(other.to_string()),
                Some(vec!["local".into(), "build".into(), "publish".into()]),
            )),
        }
    }
}

pub trait DestinationResolver {
    fn resolve(&self, role: Role, deployment: &Deployment) -> Destination;
}

/// `local` is the invoking directory; `build` and `publish` come from the
/// deployment.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultResolver;

impl DestinationResolver for DefaultResolver {
    fn resolve(&self, role: Role, deployment: &Deployment) -> Destination {
        match role {
            Role::Local => Destination::local("."),
            Role::Build => deployment.build_at.clone(),
            Role::Publish => deployment.publish_to.clone(),
        }
    }
}

/// Resolve an `at` value: a role name, or else a destination string.
pub fn resolve_at(
    at: &str,
    resolver: &dyn DestinationResolver,
    deployment: &Deployment,
) -> Result<Destination> {
    match Role::from_str(at.trim()) {
        Ok(role) => Ok(resolver.resolve(role, deployment)),
        Err(_) => Destination::parse(at),
    }
}
