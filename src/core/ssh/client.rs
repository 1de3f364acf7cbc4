use crate::defaults::SshConfig;
use crate::destination::Destination;
use crate::error::{Error, Result};
use crate::paths;
use crate::transport::{run_streaming, CommandOutput};
use std::process::Command;

/// One ssh endpoint (`[user@]host`) with the options every command to it uses.
#[derive(Debug, Clone)]
pub struct SshClient {
    pub target: String,
    pub port: u16,
    pub identity_file: Option<String>,
    pub connect_timeout: u32,
    pub server_alive_interval: u32,
    pub retries: u32,
    /// ControlPath for connection sharing; `None` opens a fresh connection per command.
    pub control_path: Option<String>,
    pub control_persist: u32,
}

impl SshClient {
    pub fn for_destination(destination: &Destination, config: &SshConfig) -> Result<Self> {
        let target = destination.ssh_target().ok_or_else(|| {
            Error::internal_unexpected(format!(
                "ssh requested for local destination {}",
                destination
            ))
        })?;

        let identity_file = match &config.identity_file {
            Some(path) if !path.is_empty() => {
                let expanded = shellexpand::tilde(path).to_string();
                if !std::path::Path::new(&expanded).exists() {
                    return Err(Error::ssh_identity_file_not_found(
                        destination.to_string(),
                        expanded,
                    ));
                }
                Some(expanded)
            }
            _ => None,
        };

        let control_path = if config.multiplex {
            let dir = paths::control_sockets()?;
            std::fs::create_dir_all(&dir).map_err(|e| {
                Error::internal_io(e.to_string(), Some(format!("create {}", dir.display())))
            })?;
            Some(dir.join("%C").display().to_string())
        } else {
            None
        };

        Ok(Self {
            target,
            port: config.port,
            identity_file,
            connect_timeout: config.connect_timeout,
            server_alive_interval: config.server_alive_interval,
            retries: config.retries.max(1),
            control_path,
            control_persist: config.control_persist,
        })
    }

    pub fn build_ssh_args(&self, command: &str) -> Vec<String> {
        let mut args = Vec::new();

        if let Some(identity_file) = &self.identity_file {
            args.push("-i".to_string());
            args.push(identity_file.clone());
        }

        if self.port != 22 {
            args.push("-p".to_string());
            args.push(self.port.to_string());
        }

        // Non-interactive: never prompt, fail fast on stalled connections.
        args.extend([
            "-o".to_string(),
            "BatchMode=yes".to_string(),
            "-o".to_string(),
            format!("ConnectTimeout={}", self.connect_timeout),
            "-o".to_string(),
            format!("ServerAliveInterval={}", self.server_alive_interval),
            "-o".to_string(),
            "ServerAliveCountMax=3".to_string(),
        ]);

        if let Some(control_path) = &self.control_path {
            args.extend([
                "-o".to_string(),
                "ControlMaster=auto".to_string(),
                "-o".to_string(),
                format!("ControlPath={}", control_path),
                "-o".to_string(),
                format!("ControlPersist={}", self.control_persist),
            ]);
        }

        args.push(self.target.clone());
        args.push(command.to_string());

        args
    }

    /// Run a command on the remote host, retrying only when the connection
    /// itself failed.
    pub fn execute(&self, command: &str) -> Result<CommandOutput> {
        let backoff_secs = [0, 2, 5];
        let mut attempt = 0;

        loop {
            let mut cmd = Command::new("ssh");
            cmd.args(self.build_ssh_args(command));
            let output = run_streaming(cmd, "ssh")?;

            attempt += 1;
            if output.success || attempt >= self.retries || !is_connection_error(&output) {
                return Ok(output);
            }

            let delay = backoff_secs.get(attempt as usize).copied().unwrap_or(5);
            log_status!(
                "ssh",
                "Connection to {} failed (attempt {}/{}), retrying in {}s...",
                self.target,
                attempt,
                self.retries,
                delay
            );
            std::thread::sleep(std::time::Duration::from_secs(delay));
        }
    }
}

/// Whether an ssh failure came from the connection rather than the remote command.
pub fn is_connection_error(output: &CommandOutput) -> bool {
    // ssh reserves 255 for its own errors, but a remote command may exit 255 too.
    if output.exit_code != 255 {
        return false;
    }

    let stderr = output.stderr.to_lowercase();
    let connection_patterns = [
        "ssh:",
        "connection refused",
        "connection reset",
        "connection timed out",
        "no route to host",
        "network is unreachable",
        "temporary failure in name resolution",
        "could not resolve hostname",
        "broken pipe",
        "ssh_exchange_identification",
        "connection closed by remote host",
        "permission denied (",
        "host key verification failed",
    ];

    connection_patterns.iter().any(|p| stderr.contains(p))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::defaults::Defaults;
    use crate::destination::User;

    fn client(config: &SshConfig) -> SshClient {
        let dest = Destination::remote(
            User::Named("deploy".to_string()),
            "example.com",
            "/srv/app",
        );
        SshClient::for_destination(&dest, config).unwrap()
    }

    fn output(exit_code: i32, stderr: &str) -> CommandOutput {
        CommandOutput {
            stdout: String::new(),
            stderr: stderr.to_string(),
            success: exit_code == 0,
            exit_code,
        }
    }

    #[test]
    fn args_end_with_target_and_command() {
        let args = client(&Defaults::default().ssh).build_ssh_args("uptime");
        let n = args.len();
        assert_eq!(args[n - 2], "deploy@example.com");
        assert_eq!(args[n - 1], "uptime");
        assert!(args.contains(&"BatchMode=yes".to_string()));
        assert!(!args.contains(&"-p".to_string()));
        assert!(!args.iter().any(|a| a.starts_with("ControlPath=")));
    }

    #[test]
    fn non_default_port_is_passed() {
        let mut config = Defaults::default().ssh;
        config.port = 2222;
        let args = client(&config).build_ssh_args("true");
        let idx = args.iter().position(|a| a == "-p").unwrap();
        assert_eq!(args[idx + 1], "2222");
    }

    #[test]
    fn missing_identity_file_is_rejected() {
        let mut config = Defaults::default().ssh;
        config.identity_file = Some("/nonexistent/id_ed25519".to_string());
        let dest = Destination::parse("deploy@example.com:/srv").unwrap();
        let err = SshClient::for_destination(&dest, &config).unwrap_err();
        assert_eq!(err.code.as_str(), "ssh.identity_file_not_found");
    }

    #[test]
    fn local_destination_has_no_ssh_client() {
        let err =
            SshClient::for_destination(&Destination::local("."), &Defaults::default().ssh)
                .unwrap_err();
        assert_eq!(err.code.as_str(), "internal.unexpected");
    }

    #[test]
    fn connection_errors_need_exit_255_and_ssh_message() {
        assert!(is_connection_error(&output(
            255,
            "ssh: connect to host example.com port 22: Connection refused"
        )));
        assert!(is_connection_error(&output(
            255,
            "deploy@example.com: Permission denied (publickey)."
        )));
        assert!(!is_connection_error(&output(255, "custom script failure")));
        assert!(!is_connection_error(&output(1, "ssh: whatever")));
    }
}
