//! Command producers: the pieces that turn a deployment and its options into
//! the operations of one hook.
//!
//! Native producers are picked per hook kind through [`ProducerConfig`], which
//! the pipeline builder receives explicitly. Callers can supply their own
//! producer, including a plain closure.

mod fetch;
mod mix;
mod release;

pub use fetch::{GitFetch, RsyncFetch};
pub use mix::{MixBuild, MixInit};
pub use release::ReleasePublish;

use crate::deployment::Deployment;
use crate::destination::Destination;
use crate::error::{Error, Result};
use crate::operation::Operation;
use crate::options::HookOptions;
use crate::resolver::{DestinationResolver, Role};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HookKind {
    Fetch,
    Init,
    Build,
    Publish,
    Custom,
}

impl HookKind {
    pub const NATIVE: [HookKind; 4] = [
        HookKind::Fetch,
        HookKind::Init,
        HookKind::Build,
        HookKind::Publish,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            HookKind::Fetch => "fetch",
            HookKind::Init => "init",
            HookKind::Build => "build",
            HookKind::Publish => "publish",
            HookKind::Custom => "custom",
        }
    }

    pub fn is_native(&self) -> bool {
        *self != HookKind::Custom
    }
}

impl fmt::Display for HookKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HookKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "fetch" => Ok(HookKind::Fetch),
            "init" => Ok(HookKind::Init),
            "build" => Ok(HookKind::Build),
            "publish" => Ok(HookKind::Publish),
            "custom" => Ok(HookKind::Custom),
            other => Err(unknown_kind(other)),
        }
    }
}

fn unknown_kind(tag: &str) -> Error {
    Error::validation_invalid_argument(
        "native",
        format!("Unknown native hook '{}'", tag),
        Some(tag.to_string()),
        Some(HookKind::NATIVE.iter().map(|k| k.to_string()).collect()),
    )
}

/// Operations for each phase of one hook.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HookOperations {
    pub main: Vec<Operation>,
    pub rollback: Vec<Operation>,
    pub ensure: Vec<Operation>,
}

impl HookOperations {
    pub fn main(main: Vec<Operation>) -> Self {
        Self {
            main,
            ..Self::default()
        }
    }
}

/// What a producer sees: the deployment, options already merged over its
/// defaults, and the resolver for its destinations.
pub struct ProduceContext<'a> {
    pub deployment: &'a Deployment,
    pub options: &'a HookOptions,
    pub resolver: &'a dyn DestinationResolver,
}

impl ProduceContext<'_> {
    pub fn destination(&self, role: Role) -> Destination {
        self.resolver.resolve(role, self.deployment)
    }

    /// Operation at `destination` carrying the hook's `cmd_env`.
    pub fn operation(&self, cmd: impl Into<String>, destination: Destination) -> Operation {
        Operation::command(cmd, destination).with_envs(self.options.cmd_env.clone())
    }
}

pub trait CommandProducer {
    fn name(&self) -> &str;

    /// Component defaults; caller options are layered over these.
    fn defaults(&self, _deployment: &Deployment) -> HookOptions {
        HookOptions::default()
    }

    fn produce(&self, ctx: &ProduceContext<'_>) -> Result<HookOperations>;
}

impl<F> CommandProducer for F
where
    F: Fn(&ProduceContext<'_>) -> Result<HookOperations>,
{
    fn name(&self) -> &str {
        "custom"
    }

    fn produce(&self, ctx: &ProduceContext<'_>) -> Result<HookOperations> {
        self(ctx)
    }
}

/// Look up a built-in producer by kind and name.
pub fn named(kind: HookKind, name: &str) -> Result<Box<dyn CommandProducer>> {
    let producer: Option<Box<dyn CommandProducer>> = match (kind, name.trim()) {
        (HookKind::Fetch, "git") => Some(Box::new(GitFetch)),
        (HookKind::Fetch, "rsync") => Some(Box::new(RsyncFetch)),
        (HookKind::Init, "mix") => Some(Box::new(MixInit)),
        (HookKind::Build, "mix") => Some(Box::new(MixBuild)),
        (HookKind::Publish, "release") => Some(Box::new(ReleasePublish)),
        _ => None,
    };

    producer.ok_or_else(|| {
        Error::validation_invalid_argument(
            format!("producers.{}", kind),
            format!("No '{}' producer for {} hooks", name, kind),
            Some(name.to_string()),
            Some(available(kind).iter().map(|s| s.to_string()).collect()),
        )
    })
}

/// Built-in producer names for a kind.
pub fn available(kind: HookKind) -> &'static [&'static str] {
    match kind {
        HookKind::Fetch => &["git", "rsync"],
        HookKind::Init | HookKind::Build => &["mix"],
        HookKind::Publish => &["release"],
        HookKind::Custom => &[],
    }
}

/// Which producer serves each native hook kind.
pub struct ProducerConfig {
    fetch: Box<dyn CommandProducer>,
    init: Box<dyn CommandProducer>,
    build: Box<dyn CommandProducer>,
    publish: Box<dyn CommandProducer>,
}

impl Default for ProducerConfig {
    fn default() -> Self {
        Self {
            fetch: Box::new(GitFetch),
            init: Box::new(MixInit),
            build: Box::new(MixBuild),
            publish: Box::new(ReleasePublish),
        }
    }
}

impl fmt::Debug for ProducerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProducerConfig")
            .field("fetch", &self.fetch.name())
            .field("init", &self.init.name())
            .field("build", &self.build.name())
            .field("publish", &self.publish.name())
            .finish()
    }
}

impl ProducerConfig {
    /// Defaults overridden by `{kind: producer_name}` entries.
    pub fn from_names(names: &BTreeMap<String, String>) -> Result<Self> {
        let mut config = Self::default();
        for (tag, name) in names {
            let kind: HookKind = tag.parse()?;
            config = config.with(kind, named(kind, name)?)?;
        }
        Ok(config)
    }

    pub fn with(mut self, kind: HookKind, producer: Box<dyn CommandProducer>) -> Result<Self> {
        *self.slot_mut(kind)? = producer;
        Ok(self)
    }

    pub fn get(&self, kind: HookKind) -> Result<&dyn CommandProducer> {
        match kind {
            HookKind::Fetch => Ok(self.fetch.as_ref()),
            HookKind::Init => Ok(self.init.as_ref()),
            HookKind::Build => Ok(self.build.as_ref()),
            HookKind::Publish => Ok(self.publish.as_ref()),
            HookKind::Custom => Err(unknown_kind(kind.as_str())),
        }
    }

    fn slot_mut(&mut self, kind: HookKind) -> Result<&mut Box<dyn CommandProducer>> {
        match kind {
            HookKind::Fetch => Ok(&mut self.fetch),
            HookKind::Init => Ok(&mut self.init),
            HookKind::Build => Ok(&mut self.build),
            HookKind::Publish => Ok(&mut self.publish),
            HookKind::Custom => Err(unknown_kind(kind.as_str())),
        }
    }
}

/// `KEY=VALUE` env shared by the mix producers.
pub(crate) fn mix_env(deployment: &Deployment) -> HookOptions {
    HookOptions::new().env("MIX_ENV", deployment.env.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::DefaultResolver;

    #[test]
    fn kinds_parse_and_reject_unknown_tags() {
        assert_eq!("fetch".parse::<HookKind>().unwrap(), HookKind::Fetch);
        assert_eq!("publish".parse::<HookKind>().unwrap(), HookKind::Publish);
        let err = "deploy".parse::<HookKind>().unwrap_err();
        assert!(err.code.is_construction());
    }

    #[test]
    fn default_config_names() {
        let config = ProducerConfig::default();
        assert_eq!(config.get(HookKind::Fetch).unwrap().name(), "git");
        assert_eq!(config.get(HookKind::Build).unwrap().name(), "mix");
        assert_eq!(config.get(HookKind::Publish).unwrap().name(), "release");
        assert!(config.get(HookKind::Custom).is_err());
    }

    #[test]
    fn from_names_overrides_selected_kinds() {
        let mut names = BTreeMap::new();
        names.insert("fetch".to_string(), "rsync".to_string());
        let config = ProducerConfig::from_names(&names).unwrap();
        assert_eq!(config.get(HookKind::Fetch).unwrap().name(), "rsync");
        assert_eq!(config.get(HookKind::Init).unwrap().name(), "mix");
    }

    #[test]
    fn from_names_rejects_unknown_producer_and_tag() {
        let mut names = BTreeMap::new();
        names.insert("fetch".to_string(), "svn".to_string());
        let err = ProducerConfig::from_names(&names).unwrap_err();
        assert_eq!(err.details["tried"], serde_json::json!(["git", "rsync"]));

        let mut names = BTreeMap::new();
        names.insert("deploy".to_string(), "git".to_string());
        assert!(ProducerConfig::from_names(&names).is_err());
    }

    #[test]
    fn producer_of_wrong_kind_is_rejected() {
        assert!(named(HookKind::Publish, "git").is_err());
        assert!(named(HookKind::Custom, "git").is_err());
    }

    fn announce(ctx: &ProduceContext<'_>) -> Result<HookOperations> {
        Ok(HookOperations::main(vec![ctx.operation(
            format!("echo {}", ctx.deployment.vsn),
            ctx.destination(Role::Local),
        )]))
    }

    #[test]
    fn functions_are_producers() {
        let deployment = Deployment::new("web", "2.0.0");
        let options = HookOptions::new().env("A", "1");
        let ctx = ProduceContext {
            deployment: &deployment,
            options: &options,
            resolver: &DefaultResolver,
        };

        let ops = announce.produce(&ctx).unwrap();
        assert_eq!(announce.name(), "custom");
        assert_eq!(ops.main[0].render(), "A=1 echo 2.0.0");
    }
}
