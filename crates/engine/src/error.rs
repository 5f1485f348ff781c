//! Engine error types.
//!
//! [`StepError`] classifies one failed external command (or a step that
//! could not be turned into one). [`EngineError`] adds where in the run the
//! failure happened; it travels inside `RunOutcome` rather than up a `?`
//! chain.

use std::time::Duration;

use faultline_core::types::Invocation;

/// Why a single step (or the provisioning command) failed.
#[derive(Debug, thiserror::Error)]
pub enum StepError {
    /// The process ran to completion with a non-zero exit code.
    #[error("{invocation}: exit code {exit_code} after {duration:?}, stderr={stderr}")]
    NonZeroExit {
        invocation: Invocation,
        exit_code: i32,
        stderr: String,
        duration: Duration,
    },

    /// The deadline expired and the process was killed.
    #[error("{invocation}: timed out after {timeout:?}, stderr={stderr}")]
    Timeout {
        invocation: Invocation,
        timeout: Duration,
        stderr: String,
    },

    /// The step's action has no dispatch rule.
    #[error("unsupported step action '{kind}'")]
    UnsupportedVariant { kind: &'static str },

    /// The process could not be started at all.
    #[error("{invocation}: failed to start: {reason}")]
    Spawn {
        invocation: Invocation,
        reason: String,
    },
}

impl StepError {
    /// Exit code of the failed process, if it ran to completion.
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            Self::NonZeroExit { exit_code, .. } => Some(*exit_code),
            _ => None,
        }
    }

    /// The invocation that failed, if one was resolved.
    pub fn invocation(&self) -> Option<&Invocation> {
        match self {
            Self::NonZeroExit { invocation, .. }
            | Self::Timeout { invocation, .. }
            | Self::Spawn { invocation, .. } => Some(invocation),
            Self::UnsupportedVariant { .. } => None,
        }
    }

    /// Fixed classification name, used as a metric label.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::NonZeroExit { .. } => "non_zero_exit",
            Self::Timeout { .. } => "timeout",
            Self::UnsupportedVariant { .. } => "unsupported",
            Self::Spawn { .. } => "spawn",
        }
    }
}

/// A run-level failure.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Provisioning failed; no step ran.
    #[error("unable to meet requirements: {0}")]
    Provisioning(#[source] StepError),

    /// A foreground step failed; later steps were skipped. `step` is the
    /// 1-based position in the scenario.
    #[error("step {step} failed: {source}")]
    Step {
        step: usize,
        #[source]
        source: StepError,
    },
}

impl EngineError {
    /// The command-level failure underneath.
    pub fn step_error(&self) -> &StepError {
        match self {
            Self::Provisioning(source) | Self::Step { source, .. } => source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_invocation() -> Invocation {
        Invocation::new("sh", ["-c", "exit 7"])
    }

    #[test]
    fn non_zero_exit_display_carries_command_and_stderr() {
        let err = StepError::NonZeroExit {
            invocation: sample_invocation(),
            exit_code: 7,
            stderr: "boom".to_owned(),
            duration: Duration::from_millis(5),
        };
        let msg = err.to_string();
        assert!(msg.contains(r#"sh -c "exit 7""#));
        assert!(msg.contains("exit code 7"));
        assert!(msg.contains("stderr=boom"));
        assert_eq!(err.exit_code(), Some(7));
        assert_eq!(err.kind_name(), "non_zero_exit");
    }

    #[test]
    fn timeout_has_no_exit_code() {
        let err = StepError::Timeout {
            invocation: sample_invocation(),
            timeout: Duration::from_secs(1),
            stderr: String::new(),
        };
        assert_eq!(err.exit_code(), None);
        assert!(err.invocation().is_some());
        assert!(err.to_string().contains("timed out"));
    }

    #[test]
    fn unsupported_has_no_invocation() {
        let err = StepError::UnsupportedVariant { kind: "worker" };
        assert!(err.invocation().is_none());
        assert_eq!(err.to_string(), "unsupported step action 'worker'");
    }

    #[test]
    fn engine_error_exposes_step_error() {
        let err = EngineError::Step {
            step: 4,
            source: StepError::Timeout {
                invocation: sample_invocation(),
                timeout: Duration::from_secs(1),
                stderr: String::new(),
            },
        };
        assert!(err.to_string().starts_with("step 4 failed"));
        assert_eq!(err.step_error().kind_name(), "timeout");

        let err = EngineError::Provisioning(StepError::Spawn {
            invocation: Invocation::new("minikube", ["start"]),
            reason: "not found".to_owned(),
        });
        assert!(err.to_string().contains("unable to meet requirements"));
        assert_eq!(err.step_error().kind_name(), "spawn");
    }
}
