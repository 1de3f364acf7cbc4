//! Hooks: ordered operations split into `main`, `rollback` and `ensure`
//! phases, and the phase sequencing that runs them.
//!
//! - `main` runs in order and stops at the first failure.
//! - `rollback` runs only when `main` failed; every operation is attempted.
//! - `ensure` runs when `run_ensure` is set, whatever `main` did; every
//!   operation is attempted.
//!
//! Failures inside `rollback` and `ensure` are recorded and never escape the
//! hook. `ignore_failure` turns a failed `main` into `FailureIgnored`, which the
//! pipeline treats as success while the report keeps the failure.

use crate::error::Error;
use crate::operation::Operation;
use crate::transport::{CommandOutput, Transport};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Hook {
    pub name: String,
    pub main: Vec<Operation>,
    pub rollback: Vec<Operation>,
    pub ensure: Vec<Operation>,
    pub run_ensure: bool,
    pub ignore_failure: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Main,
    Rollback,
    Ensure,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Main => "main",
            Phase::Rollback => "rollback",
            Phase::Ensure => "ensure",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HookStatus {
    Succeeded,
    Failed,
    /// `main` failed but the hook has `ignore_failure` set.
    FailureIgnored,
    /// Not reached because an earlier hook aborted the pipeline.
    NotRun,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ReportedError {
    pub code: String,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct OperationReport {
    pub command: String,
    pub destination: String,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub stdout: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub stderr: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ReportedError>,
}

impl OperationReport {
    fn from_result(op: &Operation, result: Result<CommandOutput, Error>) -> Self {
        let command = op.render();
        let destination = op.destination.to_string();

        match result {
            Ok(output) => Self {
                command,
                destination,
                success: true,
                exit_code: Some(output.exit_code),
                stdout: output.stdout,
                stderr: output.stderr,
                error: None,
            },
            Err(err) => {
                let (exit_code, stdout, stderr) = match err.operation_details() {
                    Some(d) => (Some(d.exit_code), d.stdout, d.stderr),
                    None => match err.ssh_connect_details() {
                        Some(d) => (Some(d.exit_code), String::new(), d.stderr),
                        None => (None, String::new(), String::new()),
                    },
                };
                Self {
                    command,
                    destination,
                    success: false,
                    exit_code,
                    stdout,
                    stderr,
                    error: Some(ReportedError {
                        code: err.code.as_str().to_string(),
                        message: err.message,
                    }),
                }
            }
        }
    }

    /// Captured stdout and stderr, or the transport error when nothing ran.
    pub fn output(&self) -> String {
        let mut text = String::new();
        text.push_str(&self.stdout);
        text.push_str(&self.stderr);
        if text.is_empty() {
            if let Some(error) = &self.error {
                text.push_str(&error.message);
            }
        }
        text
    }
}

#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PhaseReport {
    pub operations: Vec<OperationReport>,
    /// Operations never attempted because an earlier one failed (`main` only).
    #[serde(skip_serializing_if = "is_zero")]
    pub skipped: usize,
}

fn is_zero(n: &usize) -> bool {
    *n == 0
}

impl PhaseReport {
    pub fn succeeded(&self) -> bool {
        self.skipped == 0 && self.operations.iter().all(|op| op.success)
    }

    pub fn failures(&self) -> impl Iterator<Item = &OperationReport> {
        self.operations.iter().filter(|op| !op.success)
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct HookReport {
    pub name: String,
    pub status: HookStatus,
    pub main: PhaseReport,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rollback: Option<PhaseReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ensure: Option<PhaseReport>,
    /// The `main` operation that failed, kept even when the failure is ignored.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<OperationReport>,
}

impl HookReport {
    pub fn not_run(hook: &Hook) -> Self {
        Self {
            name: hook.name.clone(),
            status: HookStatus::NotRun,
            main: PhaseReport {
                operations: Vec::new(),
                skipped: hook.main.len(),
            },
            rollback: None,
            ensure: None,
            failure: None,
        }
    }

    /// Whether the pipeline may go on to the next hook.
    pub fn proceeds(&self) -> bool {
        matches!(self.status, HookStatus::Succeeded | HookStatus::FailureIgnored)
    }
}

impl Hook {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            main: Vec::new(),
            rollback: Vec::new(),
            ensure: Vec::new(),
            run_ensure: true,
            ignore_failure: false,
        }
    }

    pub fn with_main(mut self, ops: Vec<Operation>) -> Self {
        self.main = ops;
        self
    }

    pub fn with_rollback(mut self, ops: Vec<Operation>) -> Self {
        self.rollback = ops;
        self
    }

    pub fn with_ensure(mut self, ops: Vec<Operation>) -> Self {
        self.ensure = ops;
        self
    }

    pub fn run_ensure(mut self, run_ensure: bool) -> Self {
        self.run_ensure = run_ensure;
        self
    }

    pub fn ignore_failure(mut self, ignore_failure: bool) -> Self {
        self.ignore_failure = ignore_failure;
        self
    }

    pub fn operations(&self) -> impl Iterator<Item = (Phase, &Operation)> {
        self.main
            .iter()
            .map(|op| (Phase::Main, op))
            .chain(self.rollback.iter().map(|op| (Phase::Rollback, op)))
            .chain(self.ensure.iter().map(|op| (Phase::Ensure, op)))
    }

    /// Run the hook's phases and report the outcome.
    pub fn run(&self, transport: &dyn Transport) -> HookReport {
        let main = self.run_main(transport);
        let failure = main.failures().next().cloned();

        let rollback = failure
            .as_ref()
            .map(|_| self.run_best_effort(Phase::Rollback, &self.rollback, transport));

        let ensure = self
            .run_ensure
            .then(|| self.run_best_effort(Phase::Ensure, &self.ensure, transport));

        let status = match (&failure, self.ignore_failure) {
            (None, _) => HookStatus::Succeeded,
            (Some(_), true) => HookStatus::FailureIgnored,
            (Some(_), false) => HookStatus::Failed,
        };

        if let Some(failed) = &failure {
            let verb = if self.ignore_failure { "ignored" } else { "failed" };
            log_status!(
                "hook",
                "{} {}: `{}` on {}",
                self.name,
                verb,
                failed.command.trim(),
                failed.destination
            );
        }

        HookReport {
            name: self.name.clone(),
            status,
            main,
            rollback,
            ensure,
            failure,
        }
    }

    fn run_main(&self, transport: &dyn Transport) -> PhaseReport {
        let mut report = PhaseReport::default();

        for (idx, op) in self.main.iter().enumerate() {
            let result = self.run_operation(Phase::Main, op, transport);
            let failed = !result.success;
            report.operations.push(result);

            if failed {
                report.skipped = self.main.len() - idx - 1;
                break;
            }
        }

        report
    }

    fn run_best_effort(
        &self,
        phase: Phase,
        ops: &[Operation],
        transport: &dyn Transport,
    ) -> PhaseReport {
        let mut report = PhaseReport::default();

        for op in ops {
            report.operations.push(self.run_operation(phase, op, transport));
        }

        report
    }

    fn run_operation(
        &self,
        phase: Phase,
        op: &Operation,
        transport: &dyn Transport,
    ) -> OperationReport {
        log_status!(
            "hook",
            "{} [{}] {} `{}`",
            self.name,
            phase.as_str(),
            op.destination,
            op.cmd
        );
        OperationReport::from_result(op, op.execute(transport))
    }
}
