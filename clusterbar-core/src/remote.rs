use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use crate::error::TransportError;

/// Runs one shell command line on the cluster and returns its standard output
///
/// Implementations enforce their own timeout and report every failure, including a non-zero
/// exit status, as a single `TransportError`.
#[async_trait]
pub trait RemoteExecutor: Send + Sync {
    async fn execute(&self, command: &str) -> Result<String, TransportError>;
}

/// Where and as whom the ssh client should connect
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SshTarget {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub identity_file: Option<PathBuf>,
}

/// Executes commands through the system `ssh` client
///
/// Authentication is left to the client (agent or identity file); `BatchMode` makes it fail
/// instead of prompting.
#[derive(Debug, Clone)]
pub struct SshExecutor {
    target: SshTarget,
    timeout: Duration,
}

impl SshExecutor {
    pub fn new(target: SshTarget, timeout: Duration) -> Self {
        Self { target, timeout }
    }

    fn build_command(&self, command: &str) -> Command {
        let mut ssh = Command::new("ssh");
        ssh.arg("-o")
            .arg("BatchMode=yes")
            .arg("-p")
            .arg(self.target.port.to_string());
        if let Some(identity) = &self.target.identity_file {
            ssh.arg("-i").arg(identity);
        }
        ssh.arg(format!("{}@{}", self.target.user, self.target.host))
            .arg("--")
            .arg(command);
        ssh
    }
}

#[async_trait]
impl RemoteExecutor for SshExecutor {
    async fn execute(&self, command: &str) -> Result<String, TransportError> {
        debug!(host = %self.target.host, command, "running remote command");
        run_captured(self.build_command(command), command, self.timeout).await
    }
}

/// Executes commands with `sh -c` on this machine, for use directly on a login node
#[derive(Debug, Clone)]
pub struct LocalExecutor {
    timeout: Duration,
}

impl LocalExecutor {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

#[async_trait]
impl RemoteExecutor for LocalExecutor {
    async fn execute(&self, command: &str) -> Result<String, TransportError> {
        debug!(command, "running local command");
        let mut sh = Command::new("sh");
        sh.arg("-c").arg(command);
        run_captured(sh, command, self.timeout).await
    }
}

async fn run_captured(
    mut child: Command,
    command: &str,
    timeout: Duration,
) -> Result<String, TransportError> {
    // dropping the future on timeout or shutdown kills the child
    child
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let output = match tokio::time::timeout(timeout, child.output()).await {
        Ok(result) => result.map_err(|source| TransportError::Spawn {
            command: command.to_string(),
            source,
        })?,
        Err(_) => {
            return Err(TransportError::Timeout {
                command: command.to_string(),
                after: timeout,
            });
        }
    };

    if !output.status.success() {
        return Err(TransportError::ExitStatus {
            status: output.status.code(),
            command: command.to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }

    String::from_utf8(output.stdout).map_err(|_| TransportError::NonUtf8 {
        command: command.to_string(),
    })
}
