//! Deadline-bound execution of external commands.
//!
//! The [`CommandRunner`] trait abstracts process execution so the
//! provisioner and the runner can be driven by a scripted mock in tests.
//! [`ProcessRunner`] is the production implementation on `tokio::process`.
//!
//! ```text
//! ┌────────────────┐   ┌─────────────┐
//! │ ScenarioRunner │   │ Provisioner │
//! └───────┬────────┘   └──────┬──────┘
//!         └────────┬──────────┘
//!                  ▼
//!          ┌───────────────┐
//!          │ CommandRunner │ (trait)
//!          └───────────────┘
//!              │       │
//!              ▼       ▼
//!        ┌─────────┐ ┌──────┐
//!        │ Process │ │ Mock │
//!        └────┬────┘ └──────┘
//!             ▼
//!      child process group
//! ```
//!
//! # Process groups
//!
//! Every child is started as the leader of a new process group. When the
//! deadline expires, or when the future returned by [`CommandRunner::run`]
//! is dropped before completion, the whole group receives `SIGKILL`, so
//! processes forked by a `sh -c` step die with it.
//!
//! Output pipes are drained until EOF. A grandchild that escapes the group
//! while still holding stdout or stderr keeps the call open until the
//! deadline.

use std::future::Future;
use std::process::Stdio;
use std::time::{Duration, Instant};

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tracing::{debug, info, warn};

use faultline_core::types::{ExecutionResult, Invocation};

use crate::error::StepError;

/// Exit code reported when the process was ended by a signal.
const SIGNALED_EXIT_CODE: i32 = -1;

/// Runs one invocation under a deadline.
///
/// # Implementations
///
/// - [`ProcessRunner`]: spawns real processes
/// - `MockRunner`: scripted results, records every call (tests only)
pub trait CommandRunner: Send + Sync + 'static {
    /// Run `invocation`, killing it if it has not finished within `timeout`.
    ///
    /// # Errors
    ///
    /// - `StepError::NonZeroExit`: the process exited with a non-zero code
    /// - `StepError::Timeout`: the deadline expired first
    /// - `StepError::Spawn`: the process could not be started
    fn run(
        &self,
        invocation: &Invocation,
        timeout: Duration,
    ) -> impl Future<Output = Result<ExecutionResult, StepError>> + Send;
}

/// Production runner backed by `tokio::process`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessRunner;

impl ProcessRunner {
    pub fn new() -> Self {
        Self
    }
}

impl CommandRunner for ProcessRunner {
    async fn run(
        &self,
        invocation: &Invocation,
        timeout: Duration,
    ) -> Result<ExecutionResult, StepError> {
        execute(invocation, timeout).await
    }
}

/// Spawn `invocation`, buffer its output and wait for it under `timeout`.
async fn execute(invocation: &Invocation, timeout: Duration) -> Result<ExecutionResult, StepError> {
    info!(
        program = %invocation.program,
        args = ?invocation.args,
        timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
        "running command"
    );

    let mut command = Command::new(&invocation.program);
    command
        .args(&invocation.args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    if let Some(dir) = &invocation.working_dir {
        command.current_dir(dir);
    }
    #[cfg(unix)]
    command.process_group(0);

    let started = Instant::now();
    let mut child = command.spawn().map_err(|e| {
        warn!(program = %invocation.program, error = %e, "failed to start command");
        StepError::Spawn {
            invocation: invocation.clone(),
            reason: e.to_string(),
        }
    })?;
    // Declared after `child` so it drops first, while the leader is unreaped.
    let mut group = ProcessGroupGuard::new(child.id());

    let mut stdout_pipe = child.stdout.take();
    let mut stderr_pipe = child.stderr.take();
    let mut stdout = Vec::new();
    let mut stderr = Vec::new();

    let waited = tokio::time::timeout(timeout, async {
        let (status, (), ()) = tokio::join!(
            child.wait(),
            drain(stdout_pipe.as_mut(), &mut stdout),
            drain(stderr_pipe.as_mut(), &mut stderr),
        );
        status
    })
    .await;
    let duration = started.elapsed();
    let duration_ms = u64::try_from(duration.as_millis()).unwrap_or(u64::MAX);

    let status = match waited {
        Ok(Ok(status)) => {
            group.disarm();
            status
        }
        Ok(Err(e)) => {
            group.kill();
            return Err(StepError::Spawn {
                invocation: invocation.clone(),
                reason: format!("wait failed: {e}"),
            });
        }
        Err(_elapsed) => {
            group.kill();
            if let Err(e) = child.wait().await {
                debug!(error = %e, "failed to reap timed out child");
            }
            let stderr = String::from_utf8_lossy(&stderr).into_owned();
            warn!(
                program = %invocation.program,
                args = ?invocation.args,
                duration_ms,
                outcome = "timeout",
                stderr = %stderr,
                "command timed out"
            );
            return Err(StepError::Timeout {
                invocation: invocation.clone(),
                timeout,
                stderr,
            });
        }
    };

    let exit_code = status.code().unwrap_or(SIGNALED_EXIT_CODE);
    let result = ExecutionResult {
        stdout,
        stderr,
        exit_code,
        duration,
        invocation: invocation.clone(),
    };

    if !result.stdout.is_empty() {
        debug!(program = %invocation.program, stdout = %result.stdout_lossy(), "command stdout");
    }
    if !result.stderr.is_empty() {
        warn!(program = %invocation.program, stderr = %result.stderr_lossy(), "command wrote to stderr");
    }

    if result.success() {
        info!(
            program = %invocation.program,
            duration_ms,
            exit_code,
            outcome = "success",
            "command finished"
        );
        Ok(result)
    } else {
        warn!(
            program = %invocation.program,
            args = ?invocation.args,
            duration_ms,
            exit_code,
            outcome = "non_zero_exit",
            "command failed"
        );
        Err(StepError::NonZeroExit {
            invocation: result.invocation,
            exit_code,
            stderr: String::from_utf8_lossy(&result.stderr).into_owned(),
            duration,
        })
    }
}

/// Read a pipe to EOF. Bytes read before an error are kept.
async fn drain<R: AsyncRead + Unpin>(pipe: Option<&mut R>, buf: &mut Vec<u8>) {
    let Some(pipe) = pipe else {
        return;
    };
    if let Err(e) = pipe.read_to_end(buf).await {
        debug!(error = %e, "error reading child output");
    }
}

/// Kills the child's process group on drop unless disarmed.
struct ProcessGroupGuard {
    pgid: Option<i32>,
}

impl ProcessGroupGuard {
    fn new(pid: Option<u32>) -> Self {
        Self {
            pgid: pid.and_then(|p| i32::try_from(p).ok()),
        }
    }

    fn kill(&mut self) {
        if let Some(pgid) = self.pgid.take() {
            kill_group(pgid);
        }
    }

    fn disarm(&mut self) {
        self.pgid = None;
    }
}

impl Drop for ProcessGroupGuard {
    fn drop(&mut self) {
        self.kill();
    }
}

#[cfg(unix)]
fn kill_group(pgid: i32) {
    // SAFETY: killpg(2) has no memory-safety preconditions. The leader has
    // not been reaped yet, so the group id still belongs to our child.
    let rc = unsafe { libc::killpg(pgid as libc::pid_t, libc::SIGKILL) };
    if rc != 0 {
        debug!(pgid, error = %std::io::Error::last_os_error(), "killpg failed");
    }
}

#[cfg(not(unix))]
fn kill_group(_pgid: i32) {
    warn!("process group termination not supported on this platform");
}

/// Scripted runner for unit tests.
///
/// Every call is recorded. A call succeeds unless a rule registered with
/// [`MockRunner::fail_on`] or [`MockRunner::delay_on`] matches a substring of
/// its rendered command line.
#[cfg(test)]
#[derive(Default, Clone)]
pub struct MockRunner {
    calls: std::sync::Arc<std::sync::Mutex<Vec<Invocation>>>,
    failures: Vec<(String, i32)>,
    delays: Vec<(String, Duration)>,
}

#[cfg(test)]
impl MockRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Commands containing `needle` exit with `exit_code`.
    pub fn fail_on(mut self, needle: &str, exit_code: i32) -> Self {
        self.failures.push((needle.to_owned(), exit_code));
        self
    }

    /// Commands containing `needle` take `delay` to finish.
    pub fn delay_on(mut self, needle: &str, delay: Duration) -> Self {
        self.delays.push((needle.to_owned(), delay));
        self
    }

    /// Every invocation seen so far, in call order.
    pub fn calls(&self) -> Vec<Invocation> {
        self.calls.lock().unwrap().clone()
    }
}

#[cfg(test)]
impl CommandRunner for MockRunner {
    async fn run(
        &self,
        invocation: &Invocation,
        timeout: Duration,
    ) -> Result<ExecutionResult, StepError> {
        self.calls.lock().unwrap().push(invocation.clone());
        let line = invocation.to_string();

        if let Some((_, delay)) = self.delays.iter().find(|(n, _)| line.contains(n.as_str())) {
            if *delay > timeout {
                tokio::time::sleep(timeout).await;
                return Err(StepError::Timeout {
                    invocation: invocation.clone(),
                    timeout,
                    stderr: String::new(),
                });
            }
            tokio::time::sleep(*delay).await;
        }

        if let Some((_, code)) = self.failures.iter().find(|(n, _)| line.contains(n.as_str())) {
            return Err(StepError::NonZeroExit {
                invocation: invocation.clone(),
                exit_code: *code,
                stderr: "mock failure".to_owned(),
                duration: Duration::ZERO,
            });
        }

        Ok(ExecutionResult {
            stdout: Vec::new(),
            stderr: Vec::new(),
            exit_code: 0,
            duration: Duration::ZERO,
            invocation: invocation.clone(),
        })
    }
}
