//! Configuration: `faultline.toml` parsing and runtime settings.
//!
//! [`FaultlineConfig`] holds every section. All sections are optional and
//! fall back to their `Default` implementation.
//!
//! # Precedence
//! 1. CLI flags (applied by the binary)
//! 2. Environment variables (`FAULTLINE_RUNNER_TARGET=kind`)
//! 3. Config file (`faultline.toml`)
//! 4. Defaults
//!
//! # Example
//! ```no_run
//! # async fn example() -> Result<(), faultline_core::error::FaultlineError> {
//! use faultline_core::config::FaultlineConfig;
//!
//! let config = FaultlineConfig::load("faultline.toml").await?;
//! let config = FaultlineConfig::parse("[runner]\ntarget = \"kind\"")?;
//! # Ok(())
//! # }
//! ```

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{ConfigError, FaultlineError};

/// Cluster backends the engine knows how to drive.
pub const VALID_TARGETS: [&str; 4] = ["minikube", "kind", "k3d", "remote"];

const VALID_LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];
const VALID_LOG_FORMATS: [&str; 2] = ["json", "pretty"];

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FaultlineConfig {
    /// Logging settings.
    #[serde(default)]
    pub general: GeneralConfig,
    /// Scenario runner settings.
    #[serde(default)]
    pub runner: RunnerConfig,
    /// Target cluster naming and addressing.
    #[serde(default)]
    pub cluster: ClusterConfig,
    /// Prometheus endpoint.
    #[serde(default)]
    pub metrics: MetricsConfig,
}

impl FaultlineConfig {
    /// Load from a TOML file, apply environment overrides and validate.
    ///
    /// Rejected overrides are logged here; callers that load before logging
    /// is initialized should use [`apply_env_overrides`](Self::apply_env_overrides)
    /// and report them later.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, FaultlineError> {
        let mut config = Self::from_file(path).await?;
        for rejected in config.apply_env_overrides() {
            warn!(
                env_key = rejected.env_key,
                value = rejected.value.as_str(),
                expected = rejected.expected,
                "ignoring unparsable environment override"
            );
        }
        config.validate()?;
        Ok(config)
    }

    /// Load from a TOML file without environment overrides.
    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self, FaultlineError> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                FaultlineError::Config(ConfigError::FileNotFound {
                    path: path.display().to_string(),
                })
            } else {
                FaultlineError::Io(e)
            }
        })?;
        Self::parse(&content)
    }

    /// Parse a TOML string.
    pub fn parse(toml_str: &str) -> Result<Self, FaultlineError> {
        toml::from_str(toml_str).map_err(|e| {
            FaultlineError::Config(ConfigError::ParseFailed {
                reason: e.to_string(),
            })
        })
    }

    /// Override fields from `FAULTLINE_{SECTION}_{FIELD}` environment variables.
    ///
    /// Variables that are set but do not parse leave the field untouched and
    /// are returned so the caller can report them.
    #[must_use]
    pub fn apply_env_overrides(&mut self) -> Vec<RejectedOverride> {
        let mut rejected = Vec::new();
        override_string(&mut self.general.log_level, "FAULTLINE_GENERAL_LOG_LEVEL");
        override_string(&mut self.general.log_format, "FAULTLINE_GENERAL_LOG_FORMAT");

        override_string(&mut self.runner.target, "FAULTLINE_RUNNER_TARGET");
        override_parsed(
            &mut self.runner.step_timeout_secs,
            "FAULTLINE_RUNNER_STEP_TIMEOUT_SECS",
            &mut rejected,
        );
        override_string(&mut self.runner.scene_file, "FAULTLINE_RUNNER_SCENE_FILE");
        override_parsed(
            &mut self.runner.shutdown_grace_secs,
            "FAULTLINE_RUNNER_SHUTDOWN_GRACE_SECS",
            &mut rejected,
        );

        override_string(&mut self.cluster.name, "FAULTLINE_CLUSTER_NAME");
        override_string(&mut self.cluster.remote_host, "FAULTLINE_CLUSTER_REMOTE_HOST");

        override_parsed(
            &mut self.metrics.enabled,
            "FAULTLINE_METRICS_ENABLED",
            &mut rejected,
        );
        override_string(&mut self.metrics.listen_addr, "FAULTLINE_METRICS_LISTEN_ADDR");
        override_parsed(&mut self.metrics.port, "FAULTLINE_METRICS_PORT", &mut rejected);

        rejected
    }

    /// Check every field against its allowed values.
    pub fn validate(&self) -> Result<(), FaultlineError> {
        if !VALID_LOG_LEVELS.contains(&self.general.log_level.as_str()) {
            return Err(invalid(
                "general.log_level",
                format!("must be one of: {}", VALID_LOG_LEVELS.join(", ")),
            ));
        }

        if !VALID_LOG_FORMATS.contains(&self.general.log_format.as_str()) {
            return Err(invalid(
                "general.log_format",
                format!("must be one of: {}", VALID_LOG_FORMATS.join(", ")),
            ));
        }

        if !VALID_TARGETS.contains(&self.runner.target.as_str()) {
            return Err(invalid(
                "runner.target",
                format!("must be one of: {}", VALID_TARGETS.join(", ")),
            ));
        }

        if self.runner.step_timeout_secs == 0 {
            return Err(invalid(
                "runner.step_timeout_secs",
                "must be greater than 0".to_owned(),
            ));
        }

        if self.runner.scene_file.is_empty() {
            return Err(invalid(
                "runner.scene_file",
                "must not be empty".to_owned(),
            ));
        }

        if self.runner.target == "remote" && self.cluster.remote_host.is_empty() {
            return Err(invalid(
                "cluster.remote_host",
                "must be set when runner.target is 'remote'".to_owned(),
            ));
        }

        if self.metrics.enabled && self.metrics.port == 0 {
            return Err(invalid(
                "metrics.port",
                "must be greater than 0 when metrics are enabled".to_owned(),
            ));
        }

        Ok(())
    }
}

fn invalid(field: &str, reason: String) -> FaultlineError {
    ConfigError::InvalidValue {
        field: field.to_owned(),
        reason,
    }
    .into()
}

/// An environment override that was set but could not be parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RejectedOverride {
    pub env_key: &'static str,
    pub value: String,
    /// Type the value should have parsed as (`u64`, `bool`, ...).
    pub expected: &'static str,
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,
    /// Log format (json, pretty).
    pub log_format: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_owned(),
            log_format: "pretty".to_owned(),
        }
    }
}

/// Scenario runner settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RunnerConfig {
    /// Cluster backend (minikube, kind, k3d, remote).
    pub target: String,
    /// Deadline applied to every external command, in seconds.
    pub step_timeout_secs: u64,
    /// Scenario file name inside the scene directory.
    pub scene_file: String,
    /// How long to wait for background steps after an interrupt, in seconds.
    pub shutdown_grace_secs: u64,
}

impl RunnerConfig {
    pub fn step_timeout(&self) -> Duration {
        Duration::from_secs(self.step_timeout_secs)
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_secs)
    }
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            target: "minikube".to_owned(),
            step_timeout_secs: 6 * 60,
            scene_file: "scene.yaml".to_owned(),
            shutdown_grace_secs: 5,
        }
    }
}

/// Target cluster naming.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusterConfig {
    /// Cluster / profile name. Empty means the backend's default.
    pub name: String,
    /// SSH destination of the control-plane node (remote target only).
    pub remote_host: String,
}

/// Prometheus metrics endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// Whether to expose the endpoint.
    pub enabled: bool,
    /// Listen address.
    pub listen_addr: String,
    /// Listen port.
    pub port: u16,
    /// Scrape path. Only `/metrics` is supported.
    pub endpoint: String,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            listen_addr: "127.0.0.1".to_owned(),
            port: 9464,
            endpoint: "/metrics".to_owned(),
        }
    }
}

// --- environment override helpers ---

fn override_string(target: &mut String, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        *target = val;
    }
}

/// Parse `env_key` into `target`, recording the variable if it does not parse.
fn override_parsed<T: std::str::FromStr>(
    target: &mut T,
    env_key: &'static str,
    rejected: &mut Vec<RejectedOverride>,
) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<T>() {
            Ok(parsed) => *target = parsed,
            Err(_) => rejected.push(RejectedOverride {
                env_key,
                value: val,
                expected: std::any::type_name::<T>(),
            }),
        }
    }
}
