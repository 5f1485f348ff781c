//! Error types, one enum per domain.
//!
//! [`FaultlineError`] covers loading and validating configuration.
//! [`ScenarioError`] covers the scenario file. Run failures are not errors
//! at this level: the engine reports them as an outcome with its own exit
//! code.

/// faultline top-level error.
#[derive(Debug, thiserror::Error)]
pub enum FaultlineError {
    /// Configuration problem (config file or CLI input).
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// I/O error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Config file does not exist.
    #[error("config file not found: {path}")]
    FileNotFound { path: String },

    /// Config file is not valid TOML or has the wrong shape.
    #[error("failed to parse config: {reason}")]
    ParseFailed { reason: String },

    /// A field holds a value outside its allowed set.
    #[error("invalid config value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },
}

/// Scenario file errors.
///
/// All of these are reported before provisioning starts.
#[derive(Debug, thiserror::Error)]
pub enum ScenarioError {
    /// Scenario file does not exist.
    #[error("scenario file not found: {path}")]
    FileNotFound { path: String },

    /// Scenario file exceeds the loader's size limit.
    #[error("scenario file too large: {size} bytes (max: {max})")]
    TooLarge { size: u64, max: u64 },

    /// YAML syntax or shape error.
    #[error("failed to parse scenario {source_name}: {reason}")]
    ParseFailed { source_name: String, reason: String },

    /// A step declaration is malformed. `step` is the 1-based position.
    #[error("invalid step {step}: {reason}")]
    InvalidStep { step: usize, reason: String },

    /// The requirements block is malformed.
    #[error("invalid requirements: {field}: {reason}")]
    InvalidRequirements { field: String, reason: String },

    /// Too many steps.
    #[error("too many steps: {count} (max: {max})")]
    TooManySteps { count: usize, max: usize },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_error_converts_into_top_level() {
        let err: FaultlineError = ConfigError::FileNotFound {
            path: "faultline.toml".to_owned(),
        }
        .into();
        assert!(matches!(err, FaultlineError::Config(ConfigError::FileNotFound { .. })));
        assert!(err.to_string().contains("faultline.toml"));
    }

    #[test]
    fn invalid_step_display_names_position() {
        let err = ScenarioError::InvalidStep {
            step: 3,
            reason: "no action declared".to_owned(),
        };
        let msg = err.to_string();
        assert!(msg.contains("step 3"));
        assert!(msg.contains("no action declared"));
    }

    #[test]
    fn too_large_display() {
        let err = ScenarioError::TooLarge { size: 10, max: 5 };
        assert_eq!(err.to_string(), "scenario file too large: 10 bytes (max: 5)");
    }

    #[test]
    fn io_error_converts_into_top_level() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err: FaultlineError = io.into();
        assert!(matches!(err, FaultlineError::Io(_)));
    }
}
