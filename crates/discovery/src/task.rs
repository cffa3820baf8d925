//! Bounded external process
//!
//! Spawns a program, collects its stdout, forwards stderr lines to tracing and
//! kills the child once the wall-clock budget runs out.

use paperscout_common::{AppError, Result};
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::process::Command;
use tracing::{debug, info, warn};

/// Lines of stderr kept for the failure message
const STDERR_TAIL: usize = 20;

/// A command with a hard timeout
#[derive(Debug, Clone)]
pub struct ExternalTask {
    program: String,
    args: Vec<String>,
    timeout: Duration,
}

impl ExternalTask {
    pub fn new(program: impl Into<String>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            timeout,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    fn failed(&self, message: impl Into<String>) -> AppError {
        AppError::SubprocessFailed {
            program: self.program.clone(),
            message: message.into(),
        }
    }

    /// Run to completion and return stdout.
    ///
    /// Non-zero exit is `SubprocessFailed`; running past the budget kills the
    /// child and returns `SubprocessTimeout`.
    pub async fn run(&self) -> Result<Vec<u8>> {
        let start = Instant::now();
        info!(program = %self.program, args = ?self.args, timeout_secs = self.timeout.as_secs(), "Starting external task");

        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| self.failed(format!("failed to spawn: {}", e)))?;

        let mut stdout = child.stdout.take().ok_or_else(|| self.failed("stdout not captured"))?;
        let stderr = child.stderr.take().ok_or_else(|| self.failed("stderr not captured"))?;

        let mut stdout_task = tokio::spawn(async move {
            let mut buf = Vec::new();
            stdout.read_to_end(&mut buf).await.map(|_| buf)
        });

        let program = self.program.clone();
        let mut stderr_task = tokio::spawn(async move {
            let mut lines = BufReader::new(stderr).lines();
            let mut tail: Vec<String> = Vec::new();
            while let Ok(Some(line)) = lines.next_line().await {
                debug!(program = %program, "{}", line);
                if tail.len() == STDERR_TAIL {
                    tail.remove(0);
                }
                tail.push(line);
            }
            tail.join("\n")
        });

        // One deadline covers the exit and both pipe drains; a backgrounded
        // grandchild can hold the pipes open after the child exits.
        let finished = tokio::time::timeout(self.timeout, async {
            let status = child.wait().await;
            let stderr_tail = (&mut stderr_task).await.unwrap_or_default();
            let output = (&mut stdout_task).await;
            (status, stderr_tail, output)
        })
        .await;

        let (status, stderr_tail, output) = match finished {
            Ok(parts) => parts,
            Err(_) => {
                warn!(program = %self.program, timeout_secs = self.timeout.as_secs(), "External task timed out, killing");
                if let Err(e) = child.kill().await {
                    warn!(program = %self.program, error = %e, "Failed to kill external task");
                }
                stdout_task.abort();
                stderr_task.abort();
                return Err(AppError::SubprocessTimeout {
                    program: self.program.clone(),
                    timeout_secs: self.timeout.as_secs(),
                });
            }
        };

        let status = status.map_err(|e| self.failed(format!("failed to wait: {}", e)))?;

        if !status.success() {
            let message = match status.code() {
                Some(code) => format!("exited with code {}", code),
                None => "terminated by signal".to_string(),
            };
            let message = if stderr_tail.is_empty() {
                message
            } else {
                format!("{}: {}", message, stderr_tail)
            };
            return Err(self.failed(message));
        }

        let output = output
            .map_err(|e| self.failed(format!("stdout reader failed: {}", e)))?
            .map_err(|e| self.failed(format!("failed to read stdout: {}", e)))?;

        info!(
            program = %self.program,
            bytes = output.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "External task finished"
        );
        Ok(output)
    }
}
