//! Wiring: settings resolution, engine assembly and the run itself.
//!
//! # Flow
//!
//! 1. Resolve settings (CLI > environment > config file > defaults)
//! 2. Initialize logging, report rejected environment overrides and, if
//!    enabled, start the metrics endpoint
//! 3. Load the scene and build the backend, dispatcher and runner
//! 4. `--dry-run`: print the plan and stop, exiting 2 if a real run would
//!    abort on an undispatchable foreground step
//! 5. Otherwise run until the scenario ends or a signal releases it

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use faultline_core::config::{FaultlineConfig, RejectedOverride};
use faultline_core::error::{ConfigError, FaultlineError};
use faultline_core::scenario::Scene;
use faultline_engine::{Backend, Dispatcher, Plan, ProcessRunner, RunOptions, ScenarioRunner};

use crate::cli::{Cli, DEFAULT_CONFIG_PATH, OutputFormat};
use crate::error::CliError;
use crate::{logging, metrics_server};

/// Everything a run needs, after every override has been applied.
#[derive(Debug, Clone)]
pub struct Settings {
    pub config: FaultlineConfig,
    pub scene_dir: PathBuf,
    pub step_timeout: Duration,
    pub skip_provision: bool,
    pub dry_run: bool,
    pub output: OutputFormat,
    /// Environment overrides that did not parse. Reported once logging is up.
    pub rejected_overrides: Vec<RejectedOverride>,
}

impl Settings {
    /// Merge CLI flags over environment, config file and defaults.
    ///
    /// # Errors
    ///
    /// `CliError::Config` (exit code 3) when `--scene` is missing, an
    /// explicitly named config file does not exist, or the merged values do
    /// not validate.
    pub async fn resolve(cli: &Cli) -> Result<Self, CliError> {
        let scene_dir = cli
            .scene
            .clone()
            .ok_or_else(|| CliError::Config("missing required --scene <DIR>".to_owned()))?;

        let (mut config, rejected_overrides) = load_config(cli.config.as_deref()).await?;
        apply_cli_overrides(&mut config, cli);
        config.validate()?;

        let step_timeout = cli
            .timeout
            .unwrap_or_else(|| config.runner.step_timeout());

        Ok(Self {
            config,
            scene_dir,
            step_timeout,
            skip_provision: cli.skip_provision,
            dry_run: cli.dry_run,
            output: cli.output,
            rejected_overrides,
        })
    }

    pub fn run_options(&self) -> RunOptions {
        RunOptions {
            step_timeout: self.step_timeout,
            shutdown_grace: self.config.runner.shutdown_grace(),
            skip_provision: self.skip_provision,
        }
    }
}

/// Load the config file and apply environment overrides.
///
/// A missing file at the default path means defaults; a missing file the
/// user named explicitly is an error.
async fn load_config(
    explicit: Option<&Path>,
) -> Result<(FaultlineConfig, Vec<RejectedOverride>), CliError> {
    let mut config = match explicit {
        Some(path) => FaultlineConfig::from_file(path).await?,
        None => match FaultlineConfig::from_file(DEFAULT_CONFIG_PATH).await {
            Ok(config) => config,
            Err(FaultlineError::Config(ConfigError::FileNotFound { .. })) => {
                FaultlineConfig::default()
            }
            Err(e) => return Err(e.into()),
        },
    };
    let rejected = config.apply_env_overrides();
    Ok((config, rejected))
}

fn apply_cli_overrides(config: &mut FaultlineConfig, cli: &Cli) {
    if let Some(target) = cli.target {
        config.runner.target = target.as_str().to_owned();
    }
    if let Some(name) = &cli.cluster_name {
        config.cluster.name.clone_from(name);
    }
    if let Some(host) = &cli.remote_host {
        config.cluster.remote_host.clone_from(host);
    }
    if let Some(level) = &cli.log_level {
        config.general.log_level.clone_from(level);
    }
    if let Some(format) = &cli.log_format {
        config.general.log_format.clone_from(format);
    }
}

/// Run the CLI and return the process exit code.
pub async fn run(cli: Cli) -> Result<i32, CliError> {
    let settings = Settings::resolve(&cli).await?;

    logging::init_tracing(&settings.config.general)?;
    for rejected in &settings.rejected_overrides {
        tracing::warn!(
            env_key = rejected.env_key,
            value = rejected.value.as_str(),
            expected = rejected.expected,
            "ignoring unparsable environment override"
        );
    }
    if settings.config.metrics.enabled {
        metrics_server::install_metrics_recorder(&settings.config.metrics)?;
    }

    let run_id = uuid::Uuid::new_v4();
    let span = tracing::info_span!("run", run_id = %run_id);
    execute(settings).instrument(span).await
}

async fn execute(settings: Settings) -> Result<i32, CliError> {
    tracing::info!(
        scene = %settings.scene_dir.display(),
        target = %settings.config.runner.target,
        step_timeout = %humantime::format_duration(settings.step_timeout),
        "faultline starting"
    );

    let scene = Scene::load(&settings.scene_dir, &settings.config.runner.scene_file).await?;
    let backend = Backend::from_config(&settings.config.runner.target, &settings.config.cluster)?;
    let dispatcher = Dispatcher::new(backend, scene.base_dir.clone());
    let runner = ScenarioRunner::new(
        dispatcher,
        Arc::new(ProcessRunner::new()),
        settings.run_options(),
    );

    if settings.dry_run {
        let plan = runner.plan(&scene.scenario);
        print_plan(&plan, settings.output)?;
        if let Some(blocking) = plan.blocking_step() {
            tracing::warn!(
                step = blocking.step,
                kind = blocking.kind,
                "a real run would abort at this step"
            );
        }
        return Ok(plan.exit_code());
    }

    let shutdown = CancellationToken::new();
    let signals = spawn_signal_listener(shutdown.clone())?;
    let outcome = runner.execute(&scene.scenario, shutdown).await;
    signals.abort();

    let exit_code = outcome.exit_code();
    tracing::info!(outcome = %outcome, exit_code, "faultline exiting");
    Ok(exit_code)
}

fn print_plan(plan: &Plan, format: OutputFormat) -> Result<(), CliError> {
    let mut stdout = std::io::stdout().lock();
    match format {
        OutputFormat::Text => write!(stdout, "{plan}")?,
        OutputFormat::Json => writeln!(stdout, "{}", serde_json::to_string_pretty(plan)?)?,
    }
    stdout.flush()?;
    Ok(())
}

/// Cancel `token` on the first SIGINT or SIGTERM.
///
/// Handlers are installed before this returns, so a signal arriving right
/// after startup is not lost.
fn spawn_signal_listener(token: CancellationToken) -> Result<JoinHandle<()>, CliError> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        let mut sigterm = signal(SignalKind::terminate())
            .map_err(|e| CliError::Setup(format!("failed to install SIGTERM handler: {e}")))?;
        let mut sigint = signal(SignalKind::interrupt())
            .map_err(|e| CliError::Setup(format!("failed to install SIGINT handler: {e}")))?;

        Ok(tokio::spawn(async move {
            let name = tokio::select! {
                _ = sigterm.recv() => "SIGTERM",
                _ = sigint.recv() => "SIGINT",
            };
            tracing::info!(signal = name, "shutdown signal received");
            token.cancel();
        }))
    }

    #[cfg(not(unix))]
    {
        Ok(tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!(signal = "ctrl-c", "shutdown signal received");
                token.cancel();
            }
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use serial_test::serial;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("faultline").chain(args.iter().copied())).unwrap()
    }

    #[tokio::test]
    #[serial]
    async fn test_missing_scene_is_config_error() {
        let err = Settings::resolve(&parse(&[])).await.unwrap_err();
        assert_eq!(err.exit_code(), 3);
        assert!(err.to_string().contains("--scene"));
    }

    #[tokio::test]
    #[serial]
    async fn test_defaults_without_config_file() {
        let settings = Settings::resolve(&parse(&["--scene", "s"])).await.unwrap();
        assert_eq!(settings.config.runner.target, "minikube");
        assert_eq!(settings.step_timeout, Duration::from_secs(360));
        assert_eq!(settings.run_options().shutdown_grace, Duration::from_secs(5));
        assert!(!settings.skip_provision);
    }

    #[tokio::test]
    #[serial]
    async fn test_explicit_missing_config_is_an_error() {
        let err = Settings::resolve(&parse(&["--scene", "s", "--config", "/nonexistent/f.toml"]))
            .await
            .unwrap_err();
        assert_eq!(err.exit_code(), 3);
    }

    #[tokio::test]
    #[serial]
    async fn test_cli_overrides_file_and_env() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("faultline.toml");
        std::fs::write(
            &path,
            "[runner]\ntarget = \"kind\"\nstep_timeout_secs = 30\n[general]\nlog_level = \"warn\"\n",
        )
        .unwrap();
        let config_arg = path.to_str().unwrap().to_owned();

        // SAFETY: serialized test, no other thread reads the environment.
        unsafe { std::env::set_var("FAULTLINE_RUNNER_TARGET", "k3d") };
        let from_env = Settings::resolve(&parse(&["--scene", "s", "--config", &config_arg])).await;
        let from_cli = Settings::resolve(&parse(&[
            "--scene",
            "s",
            "--config",
            &config_arg,
            "--target",
            "minikube",
            "--timeout",
            "2m",
            "--log-level",
            "debug",
        ]))
        .await;
        unsafe { std::env::remove_var("FAULTLINE_RUNNER_TARGET") };

        let from_env = from_env.unwrap();
        assert_eq!(from_env.config.runner.target, "k3d");
        assert_eq!(from_env.step_timeout, Duration::from_secs(30));
        assert_eq!(from_env.config.general.log_level, "warn");

        let from_cli = from_cli.unwrap();
        assert_eq!(from_cli.config.runner.target, "minikube");
        assert_eq!(from_cli.step_timeout, Duration::from_secs(120));
        assert_eq!(from_cli.config.general.log_level, "debug");
    }

    #[tokio::test]
    #[serial]
    async fn test_unparsable_env_override_is_kept_for_reporting() {
        // SAFETY: serialized test, no other thread reads the environment.
        unsafe { std::env::set_var("FAULTLINE_RUNNER_STEP_TIMEOUT_SECS", "soon") };
        let settings = Settings::resolve(&parse(&["--scene", "s"])).await;
        unsafe { std::env::remove_var("FAULTLINE_RUNNER_STEP_TIMEOUT_SECS") };

        let settings = settings.unwrap();
        assert_eq!(settings.step_timeout, Duration::from_secs(360));
        assert_eq!(settings.rejected_overrides.len(), 1);
        assert_eq!(
            settings.rejected_overrides[0].env_key,
            "FAULTLINE_RUNNER_STEP_TIMEOUT_SECS"
        );
        assert_eq!(settings.rejected_overrides[0].value, "soon");
    }

    #[tokio::test]
    #[serial]
    async fn test_remote_without_host_fails_validation() {
        let err = Settings::resolve(&parse(&["--scene", "s", "--target", "remote"]))
            .await
            .unwrap_err();
        assert_eq!(err.exit_code(), 3);

        let ok = Settings::resolve(&parse(&[
            "--scene",
            "s",
            "--target",
            "remote",
            "--remote-host",
            "root@10.0.0.5",
        ]))
        .await
        .unwrap();
        assert_eq!(ok.config.cluster.remote_host, "root@10.0.0.5");
    }

    #[tokio::test]
    #[serial]
    async fn test_invalid_log_level_override_rejected() {
        let err = Settings::resolve(&parse(&["--scene", "s", "--log-level", "loud"]))
            .await
            .unwrap_err();
        assert_eq!(err.exit_code(), 3);
    }
}
