//! Prometheus metrics endpoint.
//!
//! Uses the built-in HTTP listener from `metrics-exporter-prometheus`. Only
//! installed when `[metrics] enabled = true`; otherwise every `metrics::*!`
//! call in the engine is a no-op.

use std::net::SocketAddr;

use metrics_exporter_prometheus::PrometheusBuilder;

use faultline_core::config::MetricsConfig;

use crate::error::CliError;

const SUPPORTED_ENDPOINT: &str = "/metrics";

/// Install the global metrics recorder and start the HTTP listener.
///
/// Call once per process.
///
/// # Errors
///
/// - unsupported endpoint path or unparsable listen address
/// - socket binding fails
/// - a global recorder is already installed
pub fn install_metrics_recorder(config: &MetricsConfig) -> Result<(), CliError> {
    let addr = listen_addr(config)?;

    if addr.ip().is_unspecified() {
        tracing::warn!(
            listen_addr = %addr,
            "metrics endpoint is exposed on all interfaces"
        );
    }

    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| CliError::Setup(format!("failed to install metrics recorder: {e}")))?;

    faultline_core::metrics::describe_all();

    tracing::info!(listen_addr = %addr, "Prometheus metrics endpoint active");
    Ok(())
}

/// Validate the endpoint path and build the socket address.
fn listen_addr(config: &MetricsConfig) -> Result<SocketAddr, CliError> {
    if config.endpoint != SUPPORTED_ENDPOINT {
        return Err(CliError::Config(format!(
            "unsupported metrics endpoint '{}': only '{SUPPORTED_ENDPOINT}' is supported",
            config.endpoint
        )));
    }

    format!("{}:{}", config.listen_addr, config.port)
        .parse()
        .map_err(|e| CliError::Config(format!("invalid metrics listen address: {e}")))
}
