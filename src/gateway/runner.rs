//! Timeout-bounded subprocess execution
//!
//! On timeout only the direct child is killed and reaped. Processes it
//! started in the background are not part of a killed group and may outlive
//! the call.

use crate::gateway::{GatewayError, GatewayResult, ShellConfig};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tokio::time::{timeout, Duration, Instant};
use tracing::{debug, error, info, warn};

/// Outcome of a command that ran to completion
///
/// A non-zero `exit_code` is a soft failure reported as data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionResult {
    /// Process exit code; `1` when the process ended without one (e.g. killed by a signal)
    pub exit_code: i32,
    /// Captured standard output
    pub stdout: String,
    /// Captured standard error
    pub stderr: String,
}

impl ExecutionResult {
    /// Whether the command exited with status zero
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Drain a pipe into a growing buffer until EOF
async fn capture<R>(stream: Option<R>) -> Vec<u8>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    let mut buffer = Vec::new();
    let Some(mut stream) = stream else {
        return buffer;
    };

    let mut chunk = [0u8; 8192];
    loop {
        match stream.read(&mut chunk).await {
            Ok(0) => break,
            Ok(n) => buffer.extend_from_slice(&chunk[..n]),
            Err(e) => {
                debug!("Output pipe closed with error: {}", e);
                break;
            }
        }
    }
    buffer
}

/// Runs composed command lines through a shell inside the repository root
#[derive(Debug, Clone)]
pub struct ProcessRunner {
    root: PathBuf,
    shell: ShellConfig,
}

impl ProcessRunner {
    /// Create a runner whose commands start in `root`
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            shell: ShellConfig::default(),
        }
    }

    /// Use a different shell
    pub fn with_shell(mut self, shell: ShellConfig) -> Self {
        self.shell = shell;
        self
    }

    /// Run `command_line`, killing it if it outlives `limit`
    ///
    /// `env` extends the ambient environment. Exactly one outcome is produced:
    /// the process has exited and its output is returned, or it was killed
    /// and [`GatewayError::Timeout`] is returned.
    pub async fn run(
        &self,
        command_line: &str,
        env: &HashMap<String, String>,
        limit: Duration,
    ) -> GatewayResult<ExecutionResult> {
        info!(command = %command_line, timeout_ms = limit.as_millis() as u64, "Running command");
        let started = Instant::now();

        let mut cmd = Command::new(&self.shell.command);
        cmd.args(&self.shell.args)
            .arg(command_line)
            .current_dir(&self.root)
            .envs(env)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = cmd.spawn().map_err(|source| {
            error!("Failed to spawn command '{}': {}", command_line, source);
            GatewayError::Spawn {
                command: command_line.to_string(),
                source,
            }
        })?;

        let stdout_task = tokio::spawn(capture(child.stdout.take()));
        let stderr_task = tokio::spawn(capture(child.stderr.take()));
        let stdout_abort = stdout_task.abort_handle();
        let stderr_abort = stderr_task.abort_handle();

        // Output is part of completion: a process that exits but leaves its
        // pipes open is still bounded by the limit.
        let completion = async {
            let status = child.wait().await?;
            let stdout = stdout_task.await.unwrap_or_default();
            let stderr = stderr_task.await.unwrap_or_default();
            Ok::<_, std::io::Error>((status, stdout, stderr))
        };

        let outcome = timeout(limit, completion).await;

        match outcome {
            Ok(Ok((status, stdout, stderr))) => {
                let result = ExecutionResult {
                    exit_code: status.code().unwrap_or(1),
                    stdout: String::from_utf8_lossy(&stdout).into_owned(),
                    stderr: String::from_utf8_lossy(&stderr).into_owned(),
                };
                debug!(
                    exit_code = result.exit_code,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Command exited"
                );
                Ok(result)
            }
            Ok(Err(e)) => {
                error!("Command execution error: {}", e);
                stdout_abort.abort();
                stderr_abort.abort();
                let _ = child.kill().await;
                Err(GatewayError::IoError(e))
            }
            Err(_) => {
                stdout_abort.abort();
                stderr_abort.abort();
                if let Err(e) = child.kill().await {
                    // Already exited between the deadline and the kill
                    debug!("Kill after timeout failed: {}", e);
                }
                warn!(
                    command = %command_line,
                    timeout_ms = limit.as_millis() as u64,
                    "Command timed out and was killed"
                );
                Err(GatewayError::timeout(command_line, limit))
            }
        }
    }
}
