use clap::Args;
use serde::Serialize;

use hookline::manifest;
use hookline::pipeline::{self, PipelinePlan};

use super::CmdResult;

#[derive(Args)]
pub struct PlanArgs {
    /// Deployment file (path, @path, - for stdin, or inline JSON)
    pub spec: String,
}

#[derive(Serialize)]
pub struct PlanOutput {
    pub command: String,
    pub plan: PipelinePlan,
}

pub fn run(args: PlanArgs, _global: &crate::commands::GlobalArgs) -> CmdResult<PlanOutput> {
    let deployment = manifest::load(&args.spec)?;
    Ok((
        PlanOutput {
            command: "plan".to_string(),
            plan: pipeline::plan(&deployment),
        },
        0,
    ))
}
