//! CLI argument definitions for faultline.
//!
//! Uses `clap` v4 derive macros. Purely declarative: no I/O happens here.

use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, ValueEnum};

/// Default configuration file, looked up in the working directory.
pub const DEFAULT_CONFIG_PATH: &str = "faultline.toml";

/// Run a chaos scenario against a test Kubernetes cluster.
///
/// Provisions the cluster the scenario asks for, then runs its setup steps
/// in order. A scenario with background steps keeps running until it is
/// interrupted (Ctrl+C or SIGTERM).
#[derive(Parser, Debug)]
#[command(name = "faultline", version, about, long_about = None)]
pub struct Cli {
    /// Directory holding the scenario file (scene.yaml).
    #[arg(short, long, value_name = "DIR")]
    pub scene: Option<PathBuf>,

    /// Cluster backend to run against.
    #[arg(short, long)]
    pub target: Option<Target>,

    /// Deadline for each external command, e.g. `6m`, `90s`. A bare number
    /// means minutes.
    #[arg(long, value_name = "DURATION", value_parser = parse_timeout)]
    pub timeout: Option<Duration>,

    /// Path to the faultline.toml configuration file.
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Cluster (or minikube profile) name.
    #[arg(long)]
    pub cluster_name: Option<String>,

    /// SSH destination of the control-plane node (remote target only).
    #[arg(long)]
    pub remote_host: Option<String>,

    /// Override log level (trace, debug, info, warn, error).
    #[arg(long)]
    pub log_level: Option<String>,

    /// Override log format (json, pretty).
    #[arg(long)]
    pub log_format: Option<String>,

    /// Reuse the existing cluster instead of provisioning one.
    #[arg(long)]
    pub skip_provision: bool,

    /// Print every command the scenario would run, then exit.
    #[arg(long)]
    pub dry_run: bool,

    /// Output format for --dry-run.
    #[arg(long, default_value = "text")]
    pub output: OutputFormat,
}

/// Cluster backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Target {
    Minikube,
    Kind,
    K3d,
    Remote,
}

impl Target {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Minikube => "minikube",
            Self::Kind => "kind",
            Self::K3d => "k3d",
            Self::Remote => "remote",
        }
    }
}

/// Supported output formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text.
    Text,
    /// Machine-readable JSON.
    Json,
}

/// Parse `--timeout`: a humantime duration, or a bare number of minutes.
pub fn parse_timeout(s: &str) -> Result<Duration, String> {
    let s = s.trim();
    let duration = if !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit()) {
        let minutes: u64 = s.parse().map_err(|e| format!("invalid minutes: {e}"))?;
        Duration::from_secs(minutes.saturating_mul(60))
    } else {
        humantime::parse_duration(s).map_err(|e| e.to_string())?
    };

    if duration.is_zero() {
        return Err("timeout must be greater than zero".to_owned());
    }
    Ok(duration)
}
