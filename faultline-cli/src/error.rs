//! CLI error type and exit code mapping.

use faultline_core::error::{ConfigError, FaultlineError, ScenarioError};

/// Errors that end the process before or around a run.
///
/// Run outcomes (step failures, provisioning failures) are not errors at
/// this level; they come back as a `RunOutcome` with its own exit code.
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    /// Bad flags, bad configuration, missing `--scene`.
    #[error("configuration error: {0}")]
    Config(String),

    /// The scenario file is missing or malformed.
    #[error("scenario error: {0}")]
    Scenario(#[from] ScenarioError),

    /// Wrapped domain error from faultline-core.
    #[error("{0}")]
    Core(#[from] FaultlineError),

    /// Logging, metrics or signal handling could not be set up.
    #[error("setup error: {0}")]
    Setup(String),

    /// JSON serialisation failed during output rendering.
    #[error("json output error: {0}")]
    JsonSerialize(#[from] serde_json::Error),

    /// IO error (stdout write, etc.).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<ConfigError> for CliError {
    fn from(e: ConfigError) -> Self {
        Self::Config(e.to_string())
    }
}

impl CliError {
    /// Map the error to a process exit code.
    ///
    /// | Code | Meaning                                  |
    /// |------|------------------------------------------|
    /// | 1    | Setup or IO error                        |
    /// | 3    | Configuration or scenario error          |
    ///
    /// Step and provisioning failures are `RunOutcome`s, not `CliError`s.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Config(_) | Self::Scenario(_) => 3,
            Self::Core(FaultlineError::Config(_)) => 3,
            Self::Core(FaultlineError::Io(_)) => 1,
            Self::Setup(_) | Self::JsonSerialize(_) | Self::Io(_) => 1,
        }
    }
}
