//! Fetch producers: get the source onto the build destination.

use super::{CommandProducer, HookOperations, ProduceContext};
use crate::error::Result;
use crate::options::HookOptions;
use crate::deployment::Deployment;
use crate::resolver::Role;
use crate::utils::shell;
use crate::utils::template::{self, TemplateVars};

const GIT_STEPS: &[&str] = &[
    // a plain command, so an env prefix still applies
    "sh -c '[ -d .git ] || git clone \"$0\" .' {{src}}",
    "git fetch --all",
    "git checkout {{branch}}",
    "git reset --hard origin/{{branch}}",
    "git clean -fd",
];

/// Clone or update a git checkout at the build destination.
///
/// Options: `src` (required), `branch` (default `main`).
#[derive(Debug, Clone, Copy, Default)]
pub struct GitFetch;

impl CommandProducer for GitFetch {
    fn name(&self) -> &str {
        "git"
    }

    fn defaults(&self, _deployment: &Deployment) -> HookOptions {
        HookOptions::new().set("branch", "main")
    }

    fn produce(&self, ctx: &ProduceContext<'_>) -> Result<HookOperations> {
        let src = shell::quote_arg(&ctx.options.required_str("src", self.name())?);
        let branch = shell::quote_arg(&ctx.options.str_or("branch", "main")?);
        let build = ctx.destination(Role::Build);

        let vars = [
            (TemplateVars::SRC, src.as_str()),
            (TemplateVars::BRANCH, branch.as_str()),
        ];
        let main = GIT_STEPS
            .iter()
            .map(|step| ctx.operation(template::render(step, &vars), build.clone()))
            .collect();

        Ok(HookOperations::main(main))
    }
}

const DEFAULT_EXCLUDES: &[&str] = &["_build", "deps", ".git"];

/// Copy a local source tree to the build destination with rsync, run from
/// the invoking machine.
///
/// Options: `src` (default `.`), `exclude` (default `_build`, `deps`, `.git`).
#[derive(Debug, Clone, Copy, Default)]
pub struct RsyncFetch;

impl CommandProducer for RsyncFetch {
    fn name(&self) -> &str {
        "rsync"
    }

    fn produce(&self, ctx: &ProduceContext<'_>) -> Result<HookOperations> {
        let src = ctx.options.str_or("src", ".")?;
        let excludes = ctx
            .options
            .str_list("exclude")?
            .unwrap_or_else(|| DEFAULT_EXCLUDES.iter().map(|s| s.to_string()).collect());
        let build = ctx.destination(Role::Build);
        let local = ctx.destination(Role::Local);

        let mut args = vec!["rsync".to_string(), "-krav".to_string()];
        if !build.is_local() {
            args.push("-e".to_string());
            args.push("ssh".to_string());
        }
        for exclude in &excludes {
            args.push(shell::quote_arg(&format!("--exclude={}", exclude)));
        }
        args.push(shell::quote_arg(&format!("{}/", src.trim_end_matches('/'))));

        let mut main = Vec::new();
        let target = if build.is_local() {
            let path = build.expanded_path()?.display().to_string();
            main.push(ctx.operation(format!("mkdir -p {}", shell::quote_path(&path)), local.clone()));
            format!("{}/", path.trim_end_matches('/'))
        } else {
            format!("{}/", build.to_string().trim_end_matches('/'))
        };
        args.push(shell::quote_arg(&target));

        main.push(ctx.operation(args.join(" "), local));
        Ok(HookOperations::main(main))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::destination::Destination;
    use crate::resolver::DefaultResolver;

    fn run(producer: &dyn CommandProducer, deployment: &Deployment, caller: HookOptions) -> Result<HookOperations> {
        let options = HookOptions::merge(&producer.defaults(deployment), &caller);
        producer.produce(&ProduceContext {
            deployment,
            options: &options,
            resolver: &DefaultResolver,
        })
    }

    fn remote_deployment() -> Deployment {
        Deployment::new("web", "1.0.0")
            .build_at(Destination::parse("ci@build.example.com:/opt/web").unwrap())
    }

    #[test]
    fn git_requires_src() {
        let err = run(&GitFetch, &remote_deployment(), HookOptions::new()).unwrap_err();
        assert_eq!(err.code.as_str(), "config.missing_key");
    }

    #[test]
    fn git_runs_at_build_with_default_branch() {
        let ops = run(
            &GitFetch,
            &remote_deployment(),
            HookOptions::new().set("src", "git@github.com:acme/web.git"),
        )
        .unwrap();

        let cmds: Vec<&str> = ops.main.iter().map(|op| op.cmd.as_str()).collect();
        assert_eq!(
            cmds,
            vec![
                "sh -c '[ -d .git ] || git clone \"$0\" .' git@github.com:acme/web.git",
                "git fetch --all",
                "git checkout main",
                "git reset --hard origin/main",
                "git clean -fd",
            ]
        );
        assert!(ops.main.iter().all(|op| op.destination.to_string() == "ci@build.example.com:/opt/web"));
        assert!(ops.rollback.is_empty());
    }

    #[test]
    fn git_branch_and_env_come_from_caller() {
        let ops = run(
            &GitFetch,
            &remote_deployment(),
            HookOptions::new()
                .set("src", "https://example.com/web.git")
                .set("branch", "release/1.0")
                .env("GIT_SSH_COMMAND", "ssh"),
        )
        .unwrap();

        assert_eq!(ops.main[2].cmd, "git checkout release/1.0");
        assert_eq!(ops.main[2].render(), "GIT_SSH_COMMAND=ssh git checkout release/1.0");
        assert_eq!(
            ops.main[0].render(),
            "GIT_SSH_COMMAND=ssh sh -c '[ -d .git ] || git clone \"$0\" .' https://example.com/web.git"
        );
    }

    #[test]
    fn rsync_pushes_to_remote_build() {
        let ops = run(&RsyncFetch, &remote_deployment(), HookOptions::new()).unwrap();

        assert_eq!(ops.main.len(), 1);
        let op = &ops.main[0];
        assert!(op.destination.is_local());
        assert_eq!(
            op.cmd,
            "rsync -krav -e ssh --exclude=_build --exclude=deps --exclude=.git ./ ci@build.example.com:/opt/web/"
        );
    }

    #[test]
    fn rsync_to_local_build_creates_target_first() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("build");
        let deployment = Deployment::new("web", "1.0.0")
            .build_at(Destination::local(target.display().to_string()));

        let ops = run(
            &RsyncFetch,
            &deployment,
            HookOptions::new().set("src", "/src/web/").set("exclude", "node_modules"),
        )
        .unwrap();

        assert_eq!(ops.main.len(), 2);
        assert!(ops.main[0].cmd.starts_with("mkdir -p "));
        assert!(ops.main[1].cmd.starts_with("rsync -krav --exclude=node_modules /src/web/ "));
        assert!(!ops.main[1].cmd.contains("-e ssh"));
    }
}
