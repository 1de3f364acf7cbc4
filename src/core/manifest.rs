//! Deployment files: JSON or TOML descriptions of a deployment and its hooks.
//!
//! ```json
//! {
//!   "name": "web",
//!   "vsn": "1.4.0",
//!   "build_at": "ci@build.example.com:/opt/web",
//!   "publish_to": "app@web.example.com:/srv/web",
//!   "producers": { "fetch": "rsync" },
//!   "hooks": [
//!     { "native": "fetch" },
//!     { "native": "build", "options": { "cmd_env": { "LANG": "C" } } },
//!     { "command": "bin/web stop", "at": "publish", "ignore_failure": true }
//!   ]
//! }
//! ```

use crate::deployment::{Deployment, DEFAULT_ENV};
use crate::destination::Destination;
use crate::error::{Error, Result};
use crate::native::{HookKind, ProducerConfig};
use crate::options::HookOptions;
use crate::pipeline::PipelineBuilder;
use crate::utils::io;
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFormat {
    Json,
    Toml,
}

impl FileFormat {
    /// TOML for `*.toml` paths (with or without a leading `@`), JSON otherwise.
    pub fn for_spec(spec: &str) -> Self {
        let path = spec.trim().trim_start_matches('@');
        if path.to_ascii_lowercase().ends_with(".toml") {
            FileFormat::Toml
        } else {
            FileFormat::Json
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DeploymentFile {
    pub name: String,
    pub vsn: String,
    #[serde(default)]
    pub env: Option<String>,
    #[serde(default)]
    pub build_at: Option<Destination>,
    /// Defaults to `build_at`.
    #[serde(default)]
    pub publish_to: Option<Destination>,
    /// Native tag to producer name, e.g. `{"fetch": "rsync"}`.
    #[serde(default)]
    pub producers: BTreeMap<String, String>,
    #[serde(default)]
    pub hooks: Vec<HookEntry>,
}

/// One entry of `hooks`: either `native` or `command`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct HookEntry {
    #[serde(default)]
    pub native: Option<String>,
    #[serde(default)]
    pub command: Option<String>,
    /// Role or destination for `command` hooks. Defaults to `local`.
    #[serde(default)]
    pub at: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub rollback: Vec<String>,
    #[serde(default)]
    pub ensure: Vec<String>,
    #[serde(default)]
    pub run_ensure: Option<bool>,
    #[serde(default)]
    pub ignore_failure: Option<bool>,
    #[serde(default)]
    pub options: HookOptions,
}

impl HookEntry {
    fn options(&self) -> HookOptions {
        let mut options = self.options.clone();
        if self.run_ensure.is_some() {
            options.run_ensure = self.run_ensure;
        }
        if self.ignore_failure.is_some() {
            options.ignore_failure = self.ignore_failure;
        }
        if let Some(name) = &self.name {
            options.extra.insert("name".to_string(), Value::String(name.clone()));
        }
        if !self.rollback.is_empty() {
            options.extra.insert("rollback".to_string(), self.rollback.clone().into());
        }
        if !self.ensure.is_empty() {
            options.extra.insert("ensure".to_string(), self.ensure.clone().into());
        }
        options
    }

    fn apply(self, builder: PipelineBuilder) -> Result<PipelineBuilder> {
        let options = self.options();
        match (self.native, self.command) {
            (Some(tag), None) => {
                if self.at.is_some() || !self.rollback.is_empty() || !self.ensure.is_empty() {
                    return Err(Error::validation_invalid_argument(
                        "hooks",
                        format!("Native hook '{}' takes no at, rollback or ensure", tag),
                        Some(tag),
                        None,
                    ));
                }
                let kind: HookKind = tag.parse()?;
                builder.native(kind, options)
            }
            (None, Some(command)) => {
                let at = self.at.unwrap_or_else(|| "local".to_string());
                builder.command(command, at, options)
            }
            (Some(_), Some(_)) => Err(Error::validation_invalid_argument(
                "hooks",
                "A hook sets either native or command, not both",
                None,
                None,
            )),
            (None, None) => Err(Error::validation_missing_argument(vec![
                "native".to_string(),
                "command".to_string(),
            ])),
        }
    }
}

impl DeploymentFile {
    pub fn parse(content: &str, format: FileFormat) -> Result<Self> {
        match format {
            FileFormat::Json => serde_json::from_str(content)
                .map_err(|e| Error::validation_invalid_json(e, Some("parse deployment file".to_string()))),
            FileFormat::Toml => toml::from_str(content).map_err(|e| {
                Error::validation_invalid_argument(
                    "spec",
                    format!("Invalid TOML deployment file: {}", e),
                    None,
                    None,
                )
            }),
        }
    }

    /// Read from a path, `@path`, `-` or inline JSON.
    pub fn load(spec: &str) -> Result<Self> {
        let content = io::read_spec_to_string(spec)?;
        Self::parse(&content, FileFormat::for_spec(spec))
    }

    /// Build the deployment, forming every hook. Nothing executes.
    pub fn into_deployment(self) -> Result<Deployment> {
        let mut missing = Vec::new();
        if self.name.trim().is_empty() {
            missing.push("name".to_string());
        }
        if self.vsn.trim().is_empty() {
            missing.push("vsn".to_string());
        }
        if !missing.is_empty() {
            return Err(Error::validation_missing_argument(missing));
        }

        let build_at = self.build_at.unwrap_or_else(|| Destination::local("."));
        let publish_to = self.publish_to.unwrap_or_else(|| build_at.clone());
        let deployment = Deployment::new(self.name, self.vsn)
            .env(self.env.unwrap_or_else(|| DEFAULT_ENV.to_string()))
            .build_at(build_at)
            .publish_to(publish_to);

        let producers = ProducerConfig::from_names(&self.producers)?;
        let mut builder = PipelineBuilder::new(deployment).producers(producers);
        for (index, entry) in self.hooks.into_iter().enumerate() {
            builder = entry
                .apply(builder)
                .map_err(|e| e.with_hint(format!("Check hooks[{}] in the deployment file", index)))?;
        }

        Ok(builder.build())
    }
}

/// Load a deployment file and build its deployment.
pub fn load(spec: &str) -> Result<Deployment> {
    DeploymentFile::load(spec)?.into_deployment()
}
