//! Publish a built release tarball from the build destination to the publish
//! destination and unpack it there.

use super::{CommandProducer, HookOperations, ProduceContext};
use crate::deployment::Deployment;
use crate::error::Result;
use crate::options::HookOptions;
use crate::resolver::Role;
use crate::utils::shell;
use crate::utils::template::{self, TemplateVars};

const DEFAULT_TARBALL: &str = "_build/{{env}}/rel/{{name}}/releases/{{vsn}}/{{name}}.tar.gz";

/// Options: `tarball` (path relative to the build destination, default
/// `_build/<env>/rel/<name>/releases/<vsn>/<name>.tar.gz`).
///
/// The uploaded tarball is removed from the publish destination in `ensure`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReleasePublish;

impl CommandProducer for ReleasePublish {
    fn name(&self) -> &str {
        "release"
    }

    fn defaults(&self, deployment: &Deployment) -> HookOptions {
        HookOptions::new().set(
            "tarball",
            template::render(
                DEFAULT_TARBALL,
                &[
                    (TemplateVars::ENV, deployment.env.as_str()),
                    (TemplateVars::NAME, deployment.name.as_str()),
                    (TemplateVars::VSN, deployment.vsn.as_str()),
                ],
            ),
        )
    }

    fn produce(&self, ctx: &ProduceContext<'_>) -> Result<HookOperations> {
        let tarball = ctx.options.required_str("tarball", self.name())?;
        let file_name = tarball.rsplit('/').next().unwrap_or(tarball.as_str()).to_string();

        let build = ctx.destination(Role::Build);
        let publish = ctx.destination(Role::Publish);

        // build and publish share a filesystem, so the copy stays on that machine
        let same_machine = build.host == publish.host && build.user == publish.user;

        let mut main = Vec::new();

        if !publish.is_local() && !same_machine {
            // a remote shell cannot cd into a directory that does not exist yet
            main.push(ctx.operation(
                format!("mkdir -p {}", shell::quote_path(&publish.path)),
                publish.with_path("~"),
            ));
        }

        let copy = match (build.is_local(), publish.is_local()) {
            _ if same_machine => {
                let target = if publish.is_local() {
                    publish.expanded_path()?.display().to_string()
                } else {
                    home_relative(&publish.path)
                };
                ctx.operation(
                    format!(
                        "mkdir -p {target} && cp {} {target}/",
                        shell::quote_arg(&tarball),
                        target = shell::quote_path(&target)
                    ),
                    build.clone(),
                )
            }
            (false, true) => ctx.operation(
                format!(
                    "scp {}:{} .",
                    build.ssh_target().unwrap_or_default(),
                    shell::quote_arg(&join(&build.path, &tarball))
                ),
                publish.clone(),
            ),
            _ => ctx.operation(
                format!(
                    "scp {} {}",
                    shell::quote_arg(&tarball),
                    shell::quote_arg(&format!("{}/", publish.to_string().trim_end_matches('/')))
                ),
                build.clone(),
            ),
        };
        main.push(copy);

        let quoted = shell::quote_arg(&file_name);
        main.push(ctx.operation(
            template::render("tar xzf {{tarball}}", &[(TemplateVars::TARBALL, quoted.as_str())]),
            publish.clone(),
        ));

        let ensure = vec![ctx.operation(format!("rm -f {}", quoted), publish)];

        Ok(HookOperations {
            main,
            rollback: Vec::new(),
            ensure,
        })
    }
}

/// A remote path as seen from another working directory on the same host.
fn home_relative(path: &str) -> String {
    if path.starts_with('/') || path.starts_with('~') {
        path.to_string()
    } else if path == "." {
        "~".to_string()
    } else {
        format!("~/{}", path)
    }
}

fn join(base: &str, rel: &str) -> String {
    if rel.starts_with('/') || base == "." {
        rel.to_string()
    } else {
        format!("{}/{}", base.trim_end_matches('/'), rel)
    }
}
