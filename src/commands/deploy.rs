use clap::Args;
use serde::Serialize;

use hookline::pipeline::{self, PipelinePlan, PipelineRun};
use hookline::{manifest, ErrorCode, SystemTransport};

use super::CmdResult;

#[derive(Args)]
pub struct DeployArgs {
    /// Deployment file (path, @path, - for stdin, or inline JSON)
    pub spec: String,

    /// Preview the hooks that would run without executing them
    #[arg(long)]
    pub dry_run: bool,
}

#[derive(Serialize)]
pub struct DeployOutput {
    pub command: String,
    pub dry_run: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plan: Option<PipelinePlan>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub run: Option<PipelineRun>,
}

pub fn run(args: DeployArgs, _global: &crate::commands::GlobalArgs) -> CmdResult<DeployOutput> {
    let deployment = manifest::load(&args.spec)?;

    if args.dry_run {
        return Ok((
            DeployOutput {
                command: "deploy".to_string(),
                dry_run: true,
                plan: Some(pipeline::plan(&deployment)),
                run: None,
            },
            0,
        ));
    }

    let transport = SystemTransport::from_config();
    let run = pipeline::execute(&deployment, &transport);
    // an aborted run still reports, but exits like its pipeline.aborted error
    let exit_code = if run.succeeded() {
        0
    } else {
        crate::output::exit_code_for_error(ErrorCode::PipelineAborted)
    };

    Ok((
        DeployOutput {
            command: "deploy".to_string(),
            dry_run: false,
            plan: None,
            run: Some(run),
        },
        exit_code,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::GlobalArgs;
    use hookline::pipeline::RunStatus;

    fn spec(dir: &std::path::Path, command: &str) -> String {
        serde_json::json!({
            "name": "web",
            "vsn": "1.0.0",
            "build_at": format!("local:{}", dir.display()),
            "hooks": [{ "command": command, "at": "build" }],
        })
        .to_string()
    }

    fn deploy(spec: String) -> (DeployOutput, i32) {
        run(
            DeployArgs {
                spec,
                dry_run: false,
            },
            &GlobalArgs {},
        )
        .unwrap()
    }

    #[test]
    fn aborted_run_exits_with_pipeline_code() {
        let dir = tempfile::tempdir().unwrap();

        let (output, exit_code) = deploy(spec(dir.path(), "exit 3"));

        assert_eq!(exit_code, 20);
        let run = output.run.unwrap();
        assert_eq!(run.status, RunStatus::Aborted);
        assert_eq!(run.failure.unwrap().exit_code, Some(3));
    }

    #[test]
    fn successful_run_exits_zero() {
        let dir = tempfile::tempdir().unwrap();

        let (output, exit_code) = deploy(spec(dir.path(), "true"));

        assert_eq!(exit_code, 0);
        assert!(output.run.unwrap().succeeded());
    }
}
