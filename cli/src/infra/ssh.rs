//! OpenSSH transport implementing `RemoteConnector` and `RemoteShell`.
//!
//! `connect` starts a multiplexing master (`ssh -M -f -N`) whose control
//! socket lives in a private temp directory; every `execute` is a short
//! `ssh -S <socket>` client riding on that master. The master's own
//! diagnostics go to a log file next to the socket so a background master
//! never holds our pipes open.

use std::path::{Path, PathBuf};
use std::time::Duration;

use tempfile::TempDir;

use crate::application::ports::{CommandRunner, RemoteConnector, RemoteShell, RunnerError};
use crate::domain::classify::{classify_ssh_failure, is_transport_failure};
use crate::domain::remote::command_label;
use crate::domain::{CommandResult, ProvisionConfig, RemoteError};
use crate::infra::command_runner::TokioCommandRunner;

/// Exit status of `sh` when `exec` cannot find the program.
const EXIT_NOT_FOUND: i32 = 127;
const DISCONNECT_TIMEOUT: Duration = Duration::from_secs(10);
/// Extra time the local runner allows on top of ssh's own ConnectTimeout.
const CONNECT_GRACE: Duration = Duration::from_secs(5);

/// Where and as whom to connect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SshTarget {
    pub host: String,
    pub user: String,
    pub port: u16,
    pub identity_file: PathBuf,
    pub connect_timeout: Duration,
}

impl SshTarget {
    #[must_use]
    pub fn from_config(config: &ProvisionConfig) -> Self {
        Self {
            host: config.host.clone(),
            user: config.user.clone(),
            port: config.ssh_port,
            identity_file: config.identity_file.clone(),
            connect_timeout: config.connect_timeout(),
        }
    }

    fn common_options(&self) -> Vec<String> {
        [
            "BatchMode=yes".to_string(),
            "StrictHostKeyChecking=accept-new".to_string(),
            format!("ConnectTimeout={}", self.connect_timeout.as_secs()),
            "ServerAliveInterval=15".to_string(),
            "ServerAliveCountMax=3".to_string(),
            "IdentitiesOnly=yes".to_string(),
        ]
        .into_iter()
        .flat_map(|o| ["-o".to_string(), o])
        .chain([
            "-i".to_string(),
            self.identity_file.display().to_string(),
            "-p".to_string(),
            self.port.to_string(),
            "-l".to_string(),
            self.user.clone(),
        ])
        .collect()
    }
}

/// Opens [`SshSession`]s to one target.
#[derive(Debug, Clone)]
pub struct SshConnector<R = TokioCommandRunner> {
    target: SshTarget,
    runner: R,
    program: String,
}

impl SshConnector<TokioCommandRunner> {
    #[must_use]
    pub fn new(target: SshTarget) -> Self {
        Self::with_runner(target, TokioCommandRunner::new(), "ssh")
    }
}

impl<R: CommandRunner + Clone> SshConnector<R> {
    /// Connector with an explicit runner and ssh program (used in tests).
    pub fn with_runner(target: SshTarget, runner: R, program: &str) -> Self {
        Self {
            target,
            runner,
            program: program.to_string(),
        }
    }

    fn auth_error(&self, reason: String) -> RemoteError {
        RemoteError::Auth {
            host: self.target.host.clone(),
            user: self.target.user.clone(),
            reason,
        }
    }

    fn connection_error(&self, reason: String) -> RemoteError {
        RemoteError::Connection {
            host: self.target.host.clone(),
            reason,
        }
    }
}

impl<R: CommandRunner + Clone> RemoteConnector for SshConnector<R> {
    type Session = SshSession<R>;

    fn host(&self) -> &str {
        &self.target.host
    }

    async fn connect(&self) -> Result<SshSession<R>, RemoteError> {
        let identity = &self.target.identity_file;
        if let Err(e) = std::fs::File::open(identity) {
            return Err(self.auth_error(format!(
                "identity file {} is not readable: {e}",
                identity.display()
            )));
        }

        let socket_dir = tempfile::Builder::new()
            .prefix("outpost-ssh-")
            .tempdir()
            .map_err(|e| RemoteError::ClientUnavailable {
                reason: format!("cannot create control socket directory: {e}"),
            })?;
        let socket = socket_dir.path().join("cm");
        let log = socket_dir.path().join("master.log");

        let mut args: Vec<String> = vec![
            "-c".to_string(),
            "exec \"$@\" </dev/null >/dev/null 2>&1".to_string(),
            "outpost-ssh".to_string(),
            self.program.clone(),
            "-M".to_string(),
            "-S".to_string(),
            socket.display().to_string(),
            "-f".to_string(),
            "-N".to_string(),
            "-E".to_string(),
            log.display().to_string(),
            "-o".to_string(),
            "ControlPersist=60".to_string(),
        ];
        args.extend(self.target.common_options());
        args.push(self.target.host.clone());
        let argv: Vec<&str> = args.iter().map(String::as_str).collect();

        tracing::debug!(host = %self.target.host, user = %self.target.user, "opening ssh master");
        let output = match self
            .runner
            .run_with_timeout("sh", &argv, self.target.connect_timeout + CONNECT_GRACE)
            .await
        {
            Ok(output) => output,
            Err(RunnerError::Spawn { source, .. }) => {
                return Err(RemoteError::ClientUnavailable {
                    reason: format!("cannot run sh: {source}"),
                });
            }
            Err(RunnerError::Timeout { timeout, .. }) => {
                return Err(self.connection_error(format!(
                    "no answer within {}s",
                    timeout.as_secs()
                )));
            }
            Err(e @ RunnerError::Wait { .. }) => return Err(self.connection_error(e.to_string())),
        };

        if output.status.success() {
            return Ok(SshSession {
                host: self.target.host.clone(),
                socket,
                runner: self.runner.clone(),
                program: self.program.clone(),
                _socket_dir: socket_dir,
            });
        }
        if output.status.code() == Some(EXIT_NOT_FOUND) {
            return Err(RemoteError::ClientUnavailable {
                reason: format!("'{}' was not found on PATH", self.program),
            });
        }
        let diagnostics = read_log(&log);
        Err(classify_ssh_failure(
            &self.target.host,
            &self.target.user,
            &diagnostics,
        ))
    }

    async fn disconnect(&self, session: SshSession<R>) {
        let socket = session.socket.display().to_string();
        let args = ["-S", socket.as_str(), "-O", "exit", session.host.as_str()];
        if let Err(e) = session
            .runner
            .run_with_timeout(&session.program, &args, DISCONNECT_TIMEOUT)
            .await
        {
            tracing::debug!(host = %session.host, error = %e, "ssh master exit failed");
        }
    }
}

/// The master's log, minus the known-hosts notices ssh prints on first contact.
fn read_log(path: &Path) -> String {
    std::fs::read_to_string(path)
        .unwrap_or_default()
        .lines()
        .filter(|l| !l.starts_with("Warning: Permanently added"))
        .collect::<Vec<_>>()
        .join("\n")
}

/// One authenticated master connection. Dropping it removes the socket
/// directory; the master itself exits after `ControlPersist` idles out.
#[derive(Debug)]
pub struct SshSession<R = TokioCommandRunner> {
    host: String,
    socket: PathBuf,
    runner: R,
    program: String,
    _socket_dir: TempDir,
}

impl<R: CommandRunner> SshSession<R> {
    fn client_args<'a>(&'a self, socket: &'a str, command: &'a str) -> [&'a str; 7] {
        ["-S", socket, "-o", "BatchMode=yes", self.host.as_str(), "--", command]
    }

    fn to_result(&self, command: &str, output: &std::process::Output) -> Result<CommandResult, RemoteError> {
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
        // Killed by a signal: no exit code, treat as a dropped channel.
        let Some(code) = output.status.code() else {
            return Err(RemoteError::Connection {
                host: self.host.clone(),
                reason: format!("ssh client for '{}' was terminated", command_label(command)),
            });
        };
        if is_transport_failure(code, &stderr) {
            return Err(RemoteError::Connection {
                host: self.host.clone(),
                reason: stderr.trim().to_string(),
            });
        }
        Ok(CommandResult::new(
            String::from_utf8_lossy(&output.stdout),
            stderr,
            code,
        ))
    }

    fn runner_error(&self, command: &str, error: RunnerError) -> RemoteError {
        match error {
            RunnerError::Timeout { timeout, .. } => RemoteError::Timeout {
                host: self.host.clone(),
                command: command_label(command),
                timeout,
            },
            RunnerError::Spawn { source, .. } if source.kind() == std::io::ErrorKind::NotFound => {
                RemoteError::ClientUnavailable {
                    reason: format!("'{}' was not found on PATH", self.program),
                }
            }
            other => RemoteError::Connection {
                host: self.host.clone(),
                reason: other.to_string(),
            },
        }
    }
}

impl<R: CommandRunner> RemoteShell for SshSession<R> {
    fn host(&self) -> &str {
        &self.host
    }

    async fn execute(&self, command: &str, timeout: Duration) -> Result<CommandResult, RemoteError> {
        let socket = self.socket.display().to_string();
        tracing::debug!(host = %self.host, command = %command_label(command), "remote exec");
        let output = self
            .runner
            .run_with_timeout(&self.program, &self.client_args(&socket, command), timeout)
            .await
            .map_err(|e| self.runner_error(command, e))?;
        self.to_result(command, &output)
    }

    async fn execute_with_input(
        &self,
        command: &str,
        input: &[u8],
        timeout: Duration,
    ) -> Result<CommandResult, RemoteError> {
        let socket = self.socket.display().to_string();
        tracing::debug!(host = %self.host, command = %command_label(command), bytes = input.len(), "remote exec with input");
        let output = self
            .runner
            .run_with_stdin(&self.program, &self.client_args(&socket, command), input, timeout)
            .await
            .map_err(|e| self.runner_error(command, e))?;
        self.to_result(command, &output)
    }
}
