//! Deployment metadata plus the ordered hooks that make up its pipeline.

use crate::destination::Destination;
use crate::hook::Hook;
use serde::Serialize;

pub const DEFAULT_ENV: &str = "prod";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Deployment {
    pub name: String,
    pub vsn: String,
    pub env: String,
    pub build_at: Destination,
    pub publish_to: Destination,
    hooks: Vec<Hook>,
}

impl Deployment {
    /// Builds and publishes in the invoking directory for the `prod` env.
    pub fn new(name: impl Into<String>, vsn: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            vsn: vsn.into(),
            env: DEFAULT_ENV.to_string(),
            build_at: Destination::local("."),
            publish_to: Destination::local("."),
            hooks: Vec::new(),
        }
    }

    pub fn env(mut self, env: impl Into<String>) -> Self {
        self.env = env.into();
        self
    }

    pub fn build_at(mut self, destination: Destination) -> Self {
        self.build_at = destination;
        self
    }

    pub fn publish_to(mut self, destination: Destination) -> Self {
        self.publish_to = destination;
        self
    }

    /// Hooks in execution order.
    pub fn hooks(&self) -> &[Hook] {
        &self.hooks
    }

    pub fn into_hooks(self) -> Vec<Hook> {
        self.hooks
    }

    /// Hooks only ever grow at the end.
    pub(crate) fn append(&mut self, hook: Hook) {
        self.hooks.push(hook);
    }
}
