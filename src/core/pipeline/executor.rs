use crate::deployment::Deployment;
use crate::error::{Error, PipelineAbortedDetails, Result};
use crate::hook::{HookReport, HookStatus};
use crate::transport::Transport;
use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Success,
    Aborted,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSummary {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub ignored: usize,
    pub not_run: usize,
}

impl RunSummary {
    fn from_reports(reports: &[HookReport]) -> Self {
        let mut summary = RunSummary {
            total: reports.len(),
            ..Self::default()
        };
        for report in reports {
            match report.status {
                HookStatus::Succeeded => summary.succeeded += 1,
                HookStatus::Failed => summary.failed += 1,
                HookStatus::FailureIgnored => summary.ignored += 1,
                HookStatus::NotRun => summary.not_run += 1,
            }
        }
        summary
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineRun {
    pub id: String,
    pub deployment: String,
    pub vsn: String,
    pub env: String,
    pub status: RunStatus,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub hooks: Vec<HookReport>,
    pub summary: RunSummary,
    /// The hook and command that aborted the run.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<PipelineAbortedDetails>,
}

impl PipelineRun {
    pub fn succeeded(&self) -> bool {
        self.status == RunStatus::Success
    }

    pub fn into_result(self) -> Result<PipelineRun> {
        match self.failure {
            Some(details) => Err(Error::pipeline_aborted(details)),
            None => Ok(self),
        }
    }
}

/// Run every hook of `deployment` in order.
///
/// A `Failed` hook aborts the run; the hooks after it are reported as not run
/// and never touch the transport. Ignored failures let the run continue.
pub fn execute(deployment: &Deployment, transport: &dyn Transport) -> PipelineRun {
    let id = uuid::Uuid::new_v4().to_string();
    let started_at = Utc::now();
    let hooks = deployment.hooks();

    log_status!(
        "deploy",
        "{} {} ({}): {} hooks",
        deployment.name,
        deployment.vsn,
        deployment.env,
        hooks.len()
    );

    let mut reports = Vec::with_capacity(hooks.len());
    let mut failure = None;

    for (index, hook) in hooks.iter().enumerate() {
        if failure.is_some() {
            reports.push(HookReport::not_run(hook));
            continue;
        }

        let report = hook.run(transport);
        if !report.proceeds() {
            failure = Some(aborted_details(deployment, index, &report));
            log_status!("deploy", "Aborted at hook {} ({})", index, report.name);
        }
        reports.push(report);
    }

    let status = if failure.is_some() {
        RunStatus::Aborted
    } else {
        RunStatus::Success
    };

    PipelineRun {
        id,
        deployment: deployment.name.clone(),
        vsn: deployment.vsn.clone(),
        env: deployment.env.clone(),
        status,
        started_at,
        finished_at: Utc::now(),
        summary: RunSummary::from_reports(&reports),
        hooks: reports,
        failure,
    }
}

fn aborted_details(deployment: &Deployment, index: usize, report: &HookReport) -> PipelineAbortedDetails {
    let failed = report.failure.as_ref();
    PipelineAbortedDetails {
        deployment: deployment.name.clone(),
        hook: report.name.clone(),
        hook_index: index,
        command: failed.map(|op| op.command.clone()).unwrap_or_default(),
        destination: failed.map(|op| op.destination.clone()).unwrap_or_default(),
        exit_code: failed.and_then(|op| op.exit_code),
        output: failed.map(|op| op.output()).unwrap_or_default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::destination::Destination;
    use crate::hook::Hook;
    use crate::operation::Operation;
    use crate::transport::CommandOutput;
    use std::cell::RefCell;
    use std::path::Path;

    #[derive(Default)]
    struct Recorder {
        ran: RefCell<Vec<String>>,
    }

    impl Transport for Recorder {
        fn run_local(
            &self,
            command: &str,
            _envs: &[(String, String)],
            _dir: &Path,
        ) -> Result<CommandOutput> {
            self.run_remote(&Destination::local("."), command)
        }

        fn run_remote(&self, _destination: &Destination, command: &str) -> Result<CommandOutput> {
            self.ran.borrow_mut().push(command.trim().to_string());
            let success = !command.contains("fail");
            Ok(CommandOutput {
                stdout: String::new(),
                stderr: if success { String::new() } else { "boom\n".to_string() },
                success,
                exit_code: if success { 0 } else { 3 },
            })
        }
    }

    fn hook(name: &str, cmd: &str) -> Hook {
        let dest = Destination::local(std::env::temp_dir().display().to_string());
        Hook::new(name).with_main(vec![Operation::command(cmd, dest)])
    }

    fn deployment(hooks: Vec<Hook>) -> Deployment {
        let mut d = Deployment::new("web", "1.0.0");
        for h in hooks {
            d.append(h);
        }
        d
    }

    #[test]
    fn all_hooks_run_in_order() {
        let d = deployment(vec![hook("a", "one"), hook("b", "two"), hook("c", "three")]);
        let t = Recorder::default();

        let run = execute(&d, &t);

        assert!(run.succeeded());
        assert_eq!(*t.ran.borrow(), vec!["one", "two", "three"]);
        assert_eq!(run.summary.succeeded, 3);
        assert!(run.failure.is_none());
        assert!(run.finished_at >= run.started_at);
    }

    #[test]
    fn failed_hook_aborts_and_later_hooks_never_run() {
        let d = deployment(vec![hook("a", "one"), hook("b", "fail two"), hook("c", "three")]);
        let t = Recorder::default();

        let run = execute(&d, &t);

        assert_eq!(run.status, RunStatus::Aborted);
        assert_eq!(t.ran.borrow().len(), 2);
        assert_eq!(run.hooks[2].status, HookStatus::NotRun);
        assert_eq!(
            run.summary,
            RunSummary {
                total: 3,
                succeeded: 1,
                failed: 1,
                ignored: 0,
                not_run: 1,
            }
        );

        let failure = run.failure.clone().unwrap();
        assert_eq!(failure.hook, "b");
        assert_eq!(failure.hook_index, 1);
        assert_eq!(failure.command, " fail two");
        assert_eq!(failure.exit_code, Some(3));
        assert_eq!(failure.output, "boom\n");

        let err = run.into_result().unwrap_err();
        assert_eq!(err.code.as_str(), "pipeline.aborted");
    }

    #[test]
    fn ignored_failure_continues() {
        let d = deployment(vec![
            hook("a", "fail one").ignore_failure(true),
            hook("b", "two"),
        ]);
        let t = Recorder::default();

        let run = execute(&d, &t);

        assert!(run.succeeded());
        assert_eq!(run.hooks[0].status, HookStatus::FailureIgnored);
        assert!(run.hooks[0].failure.is_some());
        assert_eq!(run.summary.ignored, 1);
        assert_eq!(*t.ran.borrow(), vec!["fail one", "two"]);
        assert!(run.into_result().is_ok());
    }

    #[test]
    fn empty_deployment_succeeds() {
        let run = execute(&Deployment::new("web", "1.0.0"), &Recorder::default());
        assert!(run.succeeded());
        assert_eq!(run.summary.total, 0);
    }
}
