//! Execution strategies for rendered operations: a locally spawned shell or a
//! remote shell over ssh.

use crate::defaults::{self, Defaults};
use crate::destination::Destination;
use crate::error::{Error, Result, SshConnectFailedDetails};
use crate::ssh::{is_connection_error, SshClient};
use crate::utils::shell;
use serde::Serialize;
use std::cell::RefCell;
use std::collections::HashMap;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;
use std::process::{Command, Stdio};

#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    pub success: bool,
    pub exit_code: i32,
}

/// Where operations actually run. `Operation::execute` picks the method by
/// destination host.
pub trait Transport {
    /// Run `command` through a local shell with `dir` as working directory.
    fn run_local(
        &self,
        command: &str,
        envs: &[(String, String)],
        dir: &Path,
    ) -> Result<CommandOutput>;

    /// Run `command` in a remote shell on `destination`, under its path.
    fn run_remote(&self, destination: &Destination, command: &str) -> Result<CommandOutput>;
}

/// Real processes and real ssh sessions, one client per `[user@]host`.
pub struct SystemTransport {
    defaults: Defaults,
    sessions: RefCell<HashMap<String, SshClient>>,
}

impl SystemTransport {
    pub fn new(defaults: Defaults) -> Self {
        Self {
            defaults,
            sessions: RefCell::new(HashMap::new()),
        }
    }

    /// Transport configured from hookline.json (or built-in defaults).
    pub fn from_config() -> Self {
        Self::new(defaults::load_defaults())
    }

    fn session(&self, destination: &Destination) -> Result<SshClient> {
        let key = destination.ssh_target().unwrap_or_default();
        if let Some(client) = self.sessions.borrow().get(&key) {
            return Ok(client.clone());
        }

        let client = SshClient::for_destination(destination, &self.defaults.ssh)?;
        self.sessions.borrow_mut().insert(key, client.clone());
        Ok(client)
    }

    /// Number of distinct remote endpoints contacted so far.
    pub fn session_count(&self) -> usize {
        self.sessions.borrow().len()
    }
}

impl Default for SystemTransport {
    fn default() -> Self {
        Self::new(Defaults::default())
    }
}

impl Transport for SystemTransport {
    fn run_local(
        &self,
        command: &str,
        envs: &[(String, String)],
        dir: &Path,
    ) -> Result<CommandOutput> {
        let mut cmd = Command::new(&self.defaults.shell);
        cmd.args(["-c", command]);
        cmd.current_dir(dir);
        cmd.envs(envs.iter().map(|(k, v)| (k.as_str(), v.as_str())));
        run_streaming(cmd, "local")
    }

    fn run_remote(&self, destination: &Destination, command: &str) -> Result<CommandOutput> {
        let client = self.session(destination)?;
        let script = remote_script(&destination.path, command);
        let output = client.execute(&script)?;

        if !output.success && is_connection_error(&output) {
            return Err(Error::ssh_connect_failed(SshConnectFailedDetails {
                destination: destination.to_string(),
                command: command.to_string(),
                exit_code: output.exit_code,
                stderr: output.stderr,
            }));
        }

        Ok(output)
    }
}

/// Remote commands run from the destination path; a missing path fails the command.
pub fn remote_script(path: &str, command: &str) -> String {
    format!("cd {} || exit 1\n{}", shell::quote_path(path), command)
}

/// Spawn `cmd`, echoing stdout and stderr lines to the status log as they
/// arrive while capturing both.
pub fn run_streaming(mut cmd: Command, label: &str) -> Result<CommandOutput> {
    cmd.stdin(Stdio::null());
    cmd.stdout(Stdio::piped());
    cmd.stderr(Stdio::piped());

    let mut child = cmd.spawn().map_err(|e| {
        Error::internal_io(
            format!("Failed to spawn {:?}: {}", cmd.get_program(), e),
            Some(format!("{} exec", label)),
        )
    })?;

    let stdout = child.stdout.take();
    let stderr = child.stderr.take();

    let (stdout, stderr) = std::thread::scope(|scope| {
        let out = scope.spawn(|| capture_lines(stdout));
        let err = scope.spawn(|| capture_lines(stderr));
        (
            out.join().unwrap_or_default(),
            err.join().unwrap_or_default(),
        )
    });

    let status = child.wait().map_err(|e| {
        Error::internal_io(e.to_string(), Some(format!("{} wait", label)))
    })?;

    Ok(CommandOutput {
        stdout,
        stderr,
        success: status.success(),
        exit_code: status.code().unwrap_or(-1),
    })
}

fn capture_lines<R: Read>(stream: Option<R>) -> String {
    let Some(stream) = stream else {
        return String::new();
    };

    let mut reader = BufReader::new(stream);
    let mut captured = String::new();
    let mut buf = Vec::new();

    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf) {
            Ok(0) | Err(_) => break,
            Ok(_) => {
                let line = String::from_utf8_lossy(&buf);
                log_status!("run", "{}", line.trim_end_matches(['\n', '\r']));
                captured.push_str(&line);
            }
        }
    }

    captured
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn run_local_captures_stdout_and_exit_code() {
        let dir = tempdir().unwrap();
        let transport = SystemTransport::default();

        let out = transport.run_local("echo hello", &[], dir.path()).unwrap();
        assert!(out.success);
        assert_eq!(out.exit_code, 0);
        assert_eq!(out.stdout.trim(), "hello");
    }

    #[test]
    fn run_local_captures_stderr_separately() {
        let dir = tempdir().unwrap();
        let transport = SystemTransport::default();

        let out = transport
            .run_local("echo out; echo err 1>&2; exit 3", &[], dir.path())
            .unwrap();
        assert!(!out.success);
        assert_eq!(out.exit_code, 3);
        assert_eq!(out.stdout.trim(), "out");
        assert_eq!(out.stderr.trim(), "err");
    }

    #[test]
    fn run_local_uses_working_dir_and_env() {
        let dir = tempdir().unwrap();
        let transport = SystemTransport::default();
        let envs = vec![("GREETING".to_string(), "fus-ro-dah".to_string())];

        let out = transport
            .run_local("echo $GREETING > shout.txt && pwd", &envs, dir.path())
            .unwrap();
        assert!(out.success);

        let written = std::fs::read_to_string(dir.path().join("shout.txt")).unwrap();
        assert_eq!(written.trim(), "fus-ro-dah");
    }

    #[test]
    fn missing_shell_is_io_error() {
        let dir = tempdir().unwrap();
        let mut defaults = Defaults::default();
        defaults.shell = "/nonexistent/shell".to_string();
        let transport = SystemTransport::new(defaults);

        let err = transport.run_local("true", &[], dir.path()).unwrap_err();
        assert_eq!(err.code.as_str(), "internal.io_error");
    }

    #[test]
    fn remote_script_changes_into_quoted_path() {
        assert_eq!(
            remote_script("/srv/my app", "NAME=x ls"),
            "cd '/srv/my app' || exit 1\nNAME=x ls"
        );
    }

    #[test]
    fn sessions_are_reused_per_endpoint() {
        let transport = SystemTransport::default();
        let a = Destination::parse("deploy@example.com:/srv/a").unwrap();
        let b = Destination::parse("deploy@example.com:/srv/b").unwrap();
        let c = Destination::parse("other@example.com:/srv/a").unwrap();

        transport.session(&a).unwrap();
        transport.session(&b).unwrap();
        assert_eq!(transport.session_count(), 1);

        transport.session(&c).unwrap();
        assert_eq!(transport.session_count(), 2);
    }
}
