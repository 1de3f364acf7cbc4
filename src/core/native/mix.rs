//! Mix release producers for Elixir applications.

use super::{mix_env, CommandProducer, HookOperations, ProduceContext};
use crate::deployment::Deployment;
use crate::error::Result;
use crate::options::HookOptions;
use crate::resolver::Role;
use crate::utils::shell;
use crate::utils::template::{self, TemplateVars};

/// Prepare release configuration at the build destination.
#[derive(Debug, Clone, Copy, Default)]
pub struct MixInit;

impl CommandProducer for MixInit {
    fn name(&self) -> &str {
        "mix"
    }

    fn defaults(&self, deployment: &Deployment) -> HookOptions {
        mix_env(deployment)
    }

    fn produce(&self, ctx: &ProduceContext<'_>) -> Result<HookOperations> {
        let build = ctx.destination(Role::Build);
        Ok(HookOperations::main(vec![
            ctx.operation("mix deps.get", build.clone()),
            ctx.operation("mix release.init", build),
        ]))
    }
}

/// Compile and assemble a release at the build destination. A failed build
/// removes the partial release directory.
#[derive(Debug, Clone, Copy, Default)]
pub struct MixBuild;

impl CommandProducer for MixBuild {
    fn name(&self) -> &str {
        "mix"
    }

    fn defaults(&self, deployment: &Deployment) -> HookOptions {
        mix_env(deployment)
    }

    fn produce(&self, ctx: &ProduceContext<'_>) -> Result<HookOperations> {
        let build = ctx.destination(Role::Build);
        let deployment = ctx.deployment;

        let rel_dir = template::render(
            "_build/{{env}}/rel/{{name}}",
            &[
                (TemplateVars::ENV, deployment.env.as_str()),
                (TemplateVars::NAME, deployment.name.as_str()),
            ],
        );

        Ok(HookOperations {
            main: vec![
                ctx.operation("mix deps.get", build.clone()),
                ctx.operation("mix compile", build.clone()),
                ctx.operation("mix release --overwrite", build.clone()),
            ],
            rollback: vec![ctx.operation(format!("rm -rf {}", shell::quote_arg(&rel_dir)), build)],
            ensure: Vec::new(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::DefaultResolver;

    fn produce(producer: &dyn CommandProducer, deployment: &Deployment, caller: HookOptions) -> HookOperations {
        let options = HookOptions::merge(&producer.defaults(deployment), &caller);
        producer
            .produce(&ProduceContext {
                deployment,
                options: &options,
                resolver: &DefaultResolver,
            })
            .unwrap()
    }

    #[test]
    fn init_sets_mix_env_from_deployment() {
        let deployment = Deployment::new("web", "1.0.0").env("staging");
        let ops = produce(&MixInit, &deployment, HookOptions::new());

        assert_eq!(ops.main.len(), 2);
        assert_eq!(ops.main[0].render(), "MIX_ENV=staging mix deps.get");
        assert_eq!(ops.main[1].render(), "MIX_ENV=staging mix release.init");
    }

    #[test]
    fn build_rolls_back_release_dir() {
        let deployment = Deployment::new("web", "1.0.0");
        let ops = produce(&MixBuild, &deployment, HookOptions::new());

        let cmds: Vec<&str> = ops.main.iter().map(|op| op.cmd.as_str()).collect();
        assert_eq!(cmds, vec!["mix deps.get", "mix compile", "mix release --overwrite"]);
        assert_eq!(ops.rollback.len(), 1);
        assert_eq!(ops.rollback[0].cmd, "rm -rf _build/prod/rel/web");
    }

    #[test]
    fn caller_env_overrides_mix_env() {
        let deployment = Deployment::new("web", "1.0.0");
        let ops = produce(
            &MixBuild,
            &deployment,
            HookOptions::new().env("MIX_ENV", "bench").env("PORT", "4000"),
        );
        assert_eq!(ops.main[1].render(), "MIX_ENV=bench PORT=4000 mix compile");
    }
}
