//! A single shell command bound to a destination and its environment.

use crate::destination::Destination;
use crate::error::{Error, OperationFailedDetails, Result};
use crate::transport::{CommandOutput, Transport};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Operation {
    /// Shell command; each line is prefixed with the env assignments.
    pub cmd: String,
    /// Assignments in the order they prefix the command.
    pub cmd_envs: Vec<(String, String)>,
    pub destination: Destination,
}

impl Operation {
    /// No-op command at `destination`.
    pub fn new(destination: Destination) -> Self {
        Self {
            cmd: String::new(),
            cmd_envs: Vec::new(),
            destination,
        }
    }

    pub fn command(cmd: impl Into<String>, destination: Destination) -> Self {
        Self {
            cmd: cmd.into(),
            ..Self::new(destination)
        }
    }

    pub fn with_envs(mut self, cmd_envs: Vec<(String, String)>) -> Self {
        self.cmd_envs = cmd_envs;
        self
    }

    /// `NAME1=VAL1 NAME2=VAL2 <line>` for every line, rejoined with `"\n "`.
    pub fn render(&self) -> String {
        let envs = self
            .cmd_envs
            .iter()
            .map(|(name, value)| format!("{}={}", name, value))
            .collect::<Vec<_>>()
            .join(" ");

        self.cmd
            .split('\n')
            .map(|line| format!("{} {}", envs, line))
            .collect::<Vec<_>>()
            .join("\n ")
    }

    /// Run the rendered command on its destination.
    ///
    /// Local destinations get their directory created first. A non-zero exit
    /// status becomes an `operation.failed` error carrying the captured output.
    pub fn execute(&self, transport: &dyn Transport) -> Result<CommandOutput> {
        let rendered = self.render();

        let output = if self.destination.is_local() {
            let dir = self.destination.expanded_path()?;
            std::fs::create_dir_all(&dir).map_err(|e| {
                Error::internal_io(e.to_string(), Some(format!("create {}", dir.display())))
            })?;
            transport.run_local(&rendered, &self.cmd_envs, &dir)?
        } else {
            transport.run_remote(&self.destination, &rendered)?
        };

        if !output.success {
            return Err(Error::operation_failed(OperationFailedDetails {
                command: rendered,
                destination: self.destination.to_string(),
                exit_code: output.exit_code,
                stdout: output.stdout,
                stderr: output.stderr,
            }));
        }

        Ok(output)
    }
}
