//! Process Execution
//!
//! Runs a command plan's argument vector as a child process. There is no
//! shell: `argv[0]` is executed directly and every other word is passed
//! through verbatim.
//!
//! Each child has its own watchdog. On timeout or cancellation it receives
//! SIGTERM, then SIGKILL once the grace period runs out.

use async_trait::async_trait;
use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;
use serde::{Deserialize, Serialize};
use std::process::{ExitStatus, Stdio};
use std::time::{Duration, Instant};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::builder::CommandPlan;

/// Maximum captured bytes per stream (1MB)
pub const DEFAULT_MAX_OUTPUT_BYTES: usize = 1024 * 1024;

/// Time between SIGTERM and SIGKILL
pub const DEFAULT_KILL_GRACE_SECS: u64 = 5;

const READ_CHUNK: usize = 8192;

/// How an execution ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionOutcome {
    /// The process exited on its own (any exit code)
    Exited,
    /// Killed by the watchdog
    TimedOut,
    /// Killed on request
    Cancelled,
}

impl ExecutionOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExecutionOutcome::Exited => "exited",
            ExecutionOutcome::TimedOut => "timed_out",
            ExecutionOutcome::Cancelled => "cancelled",
        }
    }
}

/// Result of running one command
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub tool: String,

    /// Argument vector that was executed
    pub command: Vec<String>,

    pub outcome: ExecutionOutcome,

    /// Exit code (None if terminated by a signal)
    pub exit_code: Option<i32>,

    pub stdout: String,

    pub stderr: String,

    pub duration_ms: u64,

    /// Output exceeded the capture limit and was cut
    pub truncated: bool,
}

impl ExecutionResult {
    /// Exited with status 0
    pub fn success(&self) -> bool {
        self.outcome == ExecutionOutcome::Exited && self.exit_code == Some(0)
    }

    /// Get a human-readable summary
    pub fn summary(&self) -> String {
        match self.outcome {
            ExecutionOutcome::TimedOut => format!("Timeout after {}ms", self.duration_ms),
            ExecutionOutcome::Cancelled => format!("Cancelled after {}ms", self.duration_ms),
            ExecutionOutcome::Exited if self.success() => format!(
                "Success ({}ms, {} bytes output)",
                self.duration_ms,
                self.stdout.len()
            ),
            ExecutionOutcome::Exited => format!(
                "Failed (exit code: {:?}, {}ms, {} bytes output)",
                self.exit_code,
                self.duration_ms,
                self.stdout.len() + self.stderr.len()
            ),
        }
    }
}

/// Process execution failures (not including non-zero exits or timeouts)
#[derive(Debug, thiserror::Error)]
pub enum ExecError {
    #[error("empty command")]
    EmptyCommand,

    #[error("failed to spawn '{binary}': {source}")]
    Spawn {
        binary: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed waiting for process: {0}")]
    Wait(#[source] std::io::Error),
}

/// Runs argument vectors as child processes
#[async_trait]
pub trait ProcessRunner: Send + Sync {
    async fn execute(
        &self,
        argv: &[String],
        timeout: Duration,
        cancel: CancellationToken,
    ) -> Result<ExecutionResult, ExecError>;

    /// Execute a plan, tagging the result with the plan's tool
    async fn run(
        &self,
        plan: &CommandPlan,
        cancel: CancellationToken,
    ) -> Result<ExecutionResult, ExecError> {
        let mut result = self.execute(&plan.argv, plan.timeout, cancel).await?;
        result.tool = plan.tool.clone();
        Ok(result)
    }
}

/// Runner settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunnerConfig {
    pub max_output_bytes: usize,
    pub kill_grace_period: Duration,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            max_output_bytes: DEFAULT_MAX_OUTPUT_BYTES,
            kill_grace_period: Duration::from_secs(DEFAULT_KILL_GRACE_SECS),
        }
    }
}

/// Production runner on `tokio::process`
#[derive(Debug, Clone, Default)]
pub struct TokioProcessRunner {
    config: RunnerConfig,
}

enum Waited {
    Exited(std::io::Result<ExitStatus>),
    TimedOut,
    Cancelled,
}

impl TokioProcessRunner {
    pub fn new(config: RunnerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RunnerConfig {
        &self.config
    }

    /// SIGTERM, wait out the grace period, then SIGKILL
    async fn terminate(&self, child: &mut Child) -> Option<ExitStatus> {
        if let Some(pid) = child.id() {
            match kill(Pid::from_raw(pid as i32), Signal::SIGTERM) {
                Ok(()) => debug!(pid, "Sent SIGTERM"),
                Err(e) => debug!(pid, "SIGTERM failed: {}", e),
            }
            match tokio::time::timeout(self.config.kill_grace_period, child.wait()).await {
                Ok(Ok(status)) => return Some(status),
                Ok(Err(e)) => warn!(pid, "Error waiting for process: {}", e),
                Err(_) => warn!(pid, "Grace period expired, sending SIGKILL"),
            }
        }
        if let Err(e) = child.kill().await {
            warn!("Failed to kill process: {}", e);
        }
        child.wait().await.ok()
    }

    /// Collect a stream reader; readers still blocked after the grace period
    /// (the pipe held open by a surviving grandchild) are abandoned.
    async fn collect(&self, handle: JoinHandle<std::io::Result<Captured>>) -> Captured {
        let mut handle = handle;
        match tokio::time::timeout(self.config.kill_grace_period, &mut handle).await {
            Ok(Ok(Ok(captured))) => captured,
            Ok(Ok(Err(e))) => {
                warn!("Error reading process output: {}", e);
                Captured::default()
            }
            Ok(Err(e)) => {
                warn!("Output reader failed: {}", e);
                Captured::default()
            }
            Err(_) => {
                warn!("Output stream still open after process exit; abandoning it");
                handle.abort();
                Captured::default()
            }
        }
    }
}

#[async_trait]
impl ProcessRunner for TokioProcessRunner {
    async fn execute(
        &self,
        argv: &[String],
        timeout: Duration,
        cancel: CancellationToken,
    ) -> Result<ExecutionResult, ExecError> {
        let (program, args) = argv.split_first().ok_or(ExecError::EmptyCommand)?;
        let start = Instant::now();

        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| ExecError::Spawn {
                binary: program.clone(),
                source,
            })?;

        info!(binary = %program, pid = child.id(), timeout_secs = timeout.as_secs(), "Process started");
        debug!(argv = ?argv, "Process argv");

        let limit = self.config.max_output_bytes;
        let stdout = tokio::spawn(read_capped(child.stdout.take(), limit));
        let stderr = tokio::spawn(read_capped(child.stderr.take(), limit));

        let waited = tokio::select! {
            status = child.wait() => Waited::Exited(status),
            _ = tokio::time::sleep(timeout) => Waited::TimedOut,
            _ = cancel.cancelled() => Waited::Cancelled,
        };

        let (outcome, status) = match waited {
            Waited::Exited(status) => (ExecutionOutcome::Exited, Some(status.map_err(ExecError::Wait)?)),
            Waited::TimedOut => {
                warn!(binary = %program, "Process timed out after {:?}", timeout);
                (ExecutionOutcome::TimedOut, self.terminate(&mut child).await)
            }
            Waited::Cancelled => {
                info!(binary = %program, "Process cancelled");
                (ExecutionOutcome::Cancelled, self.terminate(&mut child).await)
            }
        };

        let out = self.collect(stdout).await;
        let err = self.collect(stderr).await;
        let duration_ms = start.elapsed().as_millis() as u64;

        let exit_code = match outcome {
            ExecutionOutcome::Exited => status.and_then(|s| s.code()),
            _ => None,
        };

        let result = ExecutionResult {
            tool: program.clone(),
            command: argv.to_vec(),
            outcome,
            exit_code,
            stdout: String::from_utf8_lossy(&out.bytes).into_owned(),
            stderr: String::from_utf8_lossy(&err.bytes).into_owned(),
            duration_ms,
            truncated: out.truncated || err.truncated,
        };
        info!(binary = %program, "{}", result.summary());
        Ok(result)
    }
}

#[derive(Debug, Default)]
struct Captured {
    bytes: Vec<u8>,
    truncated: bool,
}

/// Read a stream to EOF, keeping at most `limit` bytes
///
/// The stream is drained past the limit so the child never blocks on a full pipe.
async fn read_capped<R>(reader: Option<R>, limit: usize) -> std::io::Result<Captured>
where
    R: AsyncRead + Unpin,
{
    let mut captured = Captured::default();
    let Some(mut reader) = reader else {
        return Ok(captured);
    };

    let mut chunk = [0u8; READ_CHUNK];
    loop {
        let n = reader.read(&mut chunk).await?;
        if n == 0 {
            break;
        }
        let room = limit.saturating_sub(captured.bytes.len());
        if n > room {
            captured.bytes.extend_from_slice(&chunk[..room]);
            captured.truncated = true;
        } else {
            captured.bytes.extend_from_slice(&chunk[..n]);
        }
    }
    Ok(captured)
}
