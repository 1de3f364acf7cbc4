use crate::deployment::Deployment;
use crate::error::{Error, Result};
use crate::hook::Hook;
use crate::native::{CommandProducer, HookKind, HookOperations, ProduceContext, ProducerConfig};
use crate::options::HookOptions;
use crate::resolver::{self, DefaultResolver, DestinationResolver};

/// Appends hooks to a deployment in call order.
///
/// Every producer runs here, so bad tags, unknown producers and invalid
/// options surface before anything executes.
pub struct PipelineBuilder {
    deployment: Deployment,
    producers: ProducerConfig,
    resolver: Box<dyn DestinationResolver>,
}

impl PipelineBuilder {
    pub fn new(deployment: Deployment) -> Self {
        Self {
            deployment,
            producers: ProducerConfig::default(),
            resolver: Box::new(DefaultResolver),
        }
    }

    pub fn producers(mut self, producers: ProducerConfig) -> Self {
        self.producers = producers;
        self
    }

    pub fn resolver(mut self, resolver: impl DestinationResolver + 'static) -> Self {
        self.resolver = Box::new(resolver);
        self
    }

    /// Hook from the producer configured for `kind`, named `<kind>:<producer>`.
    pub fn native(mut self, kind: HookKind, options: HookOptions) -> Result<Self> {
        let producer = self.producers.get(kind)?;
        let hook = self.form_hook(format!("{}:{}", kind, producer.name()), producer, &options)?;
        self.deployment.append(hook);
        Ok(self)
    }

    /// Like [`native`](Self::native) with the kind given as its tag string.
    pub fn native_tag(self, tag: &str, options: HookOptions) -> Result<Self> {
        let kind: HookKind = tag.parse()?;
        self.native(kind, options)
    }

    pub fn with_producer(mut self, producer: &dyn CommandProducer, options: HookOptions) -> Result<Self> {
        let hook = self.form_hook(producer.name().to_string(), producer, &options)?;
        self.deployment.append(hook);
        Ok(self)
    }

    /// Literal command run at `at`, a role (`local`, `build`, `publish`) or a
    /// destination string.
    ///
    /// Options `rollback` and `ensure` take commands for those phases at the
    /// same destination; `name` overrides the hook name.
    pub fn command(self, cmd: impl Into<String>, at: impl Into<String>, options: HookOptions) -> Result<Self> {
        let literal = LiteralCommand {
            cmd: cmd.into(),
            at: at.into(),
        };
        self.with_producer(&literal, options)
    }

    /// Append an already-formed hook.
    pub fn hook(mut self, hook: Hook) -> Self {
        self.deployment.append(hook);
        self
    }

    pub fn build(self) -> Deployment {
        self.deployment
    }

    fn form_hook(
        &self,
        default_name: String,
        producer: &dyn CommandProducer,
        caller: &HookOptions,
    ) -> Result<Hook> {
        let options = HookOptions::merge(&producer.defaults(&self.deployment), caller);
        let ctx = ProduceContext {
            deployment: &self.deployment,
            options: &options,
            resolver: self.resolver.as_ref(),
        };
        let ops = producer.produce(&ctx)?;
        let name = options.str("name")?.unwrap_or(default_name);

        Ok(Hook::new(name)
            .with_main(ops.main)
            .with_rollback(ops.rollback)
            .with_ensure(ops.ensure)
            .run_ensure(options.run_ensure_or_default())
            .ignore_failure(options.ignore_failure_or_default()))
    }
}

struct LiteralCommand {
    cmd: String,
    at: String,
}

impl CommandProducer for LiteralCommand {
    fn name(&self) -> &str {
        "command"
    }

    fn produce(&self, ctx: &ProduceContext<'_>) -> Result<HookOperations> {
        if self.cmd.trim().is_empty() {
            return Err(Error::validation_missing_argument(vec!["command".to_string()]));
        }
        let destination = resolver::resolve_at(&self.at, ctx.resolver, ctx.deployment)?;

        let phase = |key: &str| -> Result<Vec<_>> {
            Ok(ctx
                .options
                .str_list(key)?
                .unwrap_or_default()
                .into_iter()
                .map(|cmd| ctx.operation(cmd, destination.clone()))
                .collect())
        };

        Ok(HookOperations {
            main: vec![ctx.operation(self.cmd.clone(), destination.clone())],
            rollback: phase("rollback")?,
            ensure: phase("ensure")?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::destination::Destination;
    use crate::native::RsyncFetch;
    use crate::resolver::Role;

    fn deployment() -> Deployment {
        Deployment::new("web", "1.0.0")
            .build_at(Destination::parse("ci@build:/opt/web").unwrap())
            .publish_to(Destination::parse("app@web:/srv/web").unwrap())
    }

    fn names(deployment: &Deployment) -> Vec<&str> {
        deployment.hooks().iter().map(|h| h.name.as_str()).collect()
    }

    #[test]
    fn hooks_append_in_call_order() {
        let d = PipelineBuilder::new(deployment())
            .native(HookKind::Fetch, HookOptions::new().set("src", "git@x:web.git"))
            .unwrap()
            .native_tag("init", HookOptions::new())
            .unwrap()
            .command("echo done", "local", HookOptions::new())
            .unwrap()
            .native(HookKind::Build, HookOptions::new())
            .unwrap()
            .native(HookKind::Publish, HookOptions::new())
            .unwrap()
            .build();

        assert_eq!(
            names(&d),
            vec!["fetch:git", "init:mix", "command", "build:mix", "publish:release"]
        );
    }

    #[test]
    fn invalid_options_fail_before_anything_runs() {
        let err = PipelineBuilder::new(deployment())
            .native(HookKind::Fetch, HookOptions::new())
            .err()
            .unwrap();
        assert!(err.code.is_construction());
    }

    #[test]
    fn custom_tag_is_not_native() {
        assert!(PipelineBuilder::new(deployment())
            .native_tag("custom", HookOptions::new())
            .is_err());
        assert!(PipelineBuilder::new(deployment())
            .native_tag("deploy", HookOptions::new())
            .is_err());
    }

    #[test]
    fn flags_flow_from_options() {
        let d = PipelineBuilder::new(deployment())
            .command(
                "mix test",
                "build",
                HookOptions::new().ignore_failure(true).run_ensure(false),
            )
            .unwrap()
            .build();

        let hook = &d.hooks()[0];
        assert!(hook.ignore_failure);
        assert!(!hook.run_ensure);
        assert_eq!(hook.main[0].destination.to_string(), "ci@build:/opt/web");
    }

    #[test]
    fn command_hook_takes_name_and_recovery_phases() {
        let d = PipelineBuilder::new(deployment())
            .command(
                "systemctl restart web",
                "publish",
                HookOptions::new()
                    .set("name", "restart")
                    .set("rollback", vec!["systemctl start web-previous"])
                    .set("ensure", "rm -f /tmp/web.lock")
                    .env("LANG", "C"),
            )
            .unwrap()
            .build();

        let hook = &d.hooks()[0];
        assert_eq!(hook.name, "restart");
        assert_eq!(hook.rollback[0].render(), "LANG=C systemctl start web-previous");
        assert_eq!(hook.ensure[0].cmd, "rm -f /tmp/web.lock");
        assert_eq!(hook.ensure[0].destination.to_string(), "app@web:/srv/web");
    }

    #[test]
    fn empty_command_is_rejected() {
        let err = PipelineBuilder::new(deployment())
            .command("  ", "local", HookOptions::new())
            .err()
            .unwrap();
        assert_eq!(err.code.as_str(), "validation.missing_argument");
    }

    #[test]
    fn producer_config_switches_fetch() {
        let producers = ProducerConfig::default()
            .with(HookKind::Fetch, Box::new(RsyncFetch))
            .unwrap();
        let d = PipelineBuilder::new(deployment())
            .producers(producers)
            .native(HookKind::Fetch, HookOptions::new())
            .unwrap()
            .build();

        assert_eq!(names(&d), vec!["fetch:rsync"]);
        assert!(d.hooks()[0].main[0].destination.is_local());
    }

    struct Staging;

    impl DestinationResolver for Staging {
        fn resolve(&self, role: Role, deployment: &Deployment) -> Destination {
            match role {
                Role::Publish => Destination::parse("app@staging:/srv/web").unwrap_or_else(|_| deployment.publish_to.clone()),
                other => DefaultResolver.resolve(other, deployment),
            }
        }
    }

    #[test]
    fn resolver_decides_role_destinations() {
        let d = PipelineBuilder::new(deployment())
            .resolver(Staging)
            .command("ls", "publish", HookOptions::new())
            .unwrap()
            .build();
        assert_eq!(d.hooks()[0].main[0].destination.to_string(), "app@staging:/srv/web");
    }

    fn smoke(ctx: &ProduceContext<'_>) -> Result<HookOperations> {
        Ok(HookOperations::main(vec![ctx.operation(
            "curl -fsS localhost:4000/health",
            ctx.destination(Role::Publish),
        )]))
    }

    #[test]
    fn caller_producer_gets_custom_name() {
        let d = PipelineBuilder::new(deployment())
            .with_producer(&smoke, HookOptions::new())
            .unwrap()
            .build();
        assert_eq!(names(&d), vec!["custom"]);
        assert_eq!(d.hooks()[0].main.len(), 1);
    }
}
