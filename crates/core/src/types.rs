//! Types exchanged between the engine and its callers.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use serde::Serialize;

/// A concrete external-process invocation: program plus argument vector.
///
/// Produced by the dispatcher, consumed by the executor. The argument vector
/// is passed to the OS as-is; nothing is re-quoted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Invocation {
    /// Program name or path, looked up on `PATH`.
    pub program: String,
    /// Arguments, not including the program itself.
    pub args: Vec<String>,
    /// Working directory for the child. `None` inherits the caller's.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub working_dir: Option<PathBuf>,
}

impl Invocation {
    pub fn new<I, S>(program: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
            working_dir: None,
        }
    }

    /// Set the working directory the child is started in.
    pub fn in_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    /// Program followed by its arguments, as the OS sees `argv`.
    pub fn argv(&self) -> Vec<String> {
        std::iter::once(self.program.clone())
            .chain(self.args.iter().cloned())
            .collect()
    }
}

impl fmt::Display for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            if arg.is_empty() || arg.contains(char::is_whitespace) {
                write!(f, " {arg:?}")?;
            } else {
                write!(f, " {arg}")?;
            }
        }
        Ok(())
    }
}

/// Outcome of one executor call that ran to completion.
///
/// Built once by the executor and never mutated afterwards.
#[derive(Debug, Clone)]
pub struct ExecutionResult {
    /// Captured standard output.
    pub stdout: Vec<u8>,
    /// Captured standard error.
    pub stderr: Vec<u8>,
    /// Process exit code. `-1` when the process was ended by a signal.
    pub exit_code: i32,
    /// Wall-clock time from launch to exit.
    pub duration: Duration,
    /// What was run.
    pub invocation: Invocation,
}

impl ExecutionResult {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    /// Standard output decoded as UTF-8, lossily.
    pub fn stdout_lossy(&self) -> String {
        String::from_utf8_lossy(&self.stdout).into_owned()
    }

    /// Standard error decoded as UTF-8, lossily.
    pub fn stderr_lossy(&self) -> String {
        String::from_utf8_lossy(&self.stderr).into_owned()
    }
}
