//! Requirement provisioning.
//!
//! Turns a scenario's [`Requirements`] into one cluster-control invocation
//! and runs it under the usual step deadline. Any failure is fatal for the
//! run: nothing is known about the cluster afterwards.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{error, info, warn};

use faultline_core::metrics as m;
use faultline_core::scenario::Requirements;
use faultline_core::types::ExecutionResult;

use crate::dispatch::Dispatcher;
use crate::error::EngineError;
use crate::executor::CommandRunner;

/// Brings the target cluster into the shape a scenario declares.
pub struct Provisioner<R: CommandRunner> {
    dispatcher: Dispatcher,
    runner: Arc<R>,
}

impl<R: CommandRunner> Provisioner<R> {
    pub fn new(dispatcher: Dispatcher, runner: Arc<R>) -> Self {
        Self { dispatcher, runner }
    }

    /// Run the provisioning command for `requirements`.
    ///
    /// # Errors
    ///
    /// `EngineError::Provisioning` wrapping whatever the command failed with.
    pub async fn ensure(
        &self,
        requirements: &Requirements,
        timeout: Duration,
    ) -> Result<ExecutionResult, EngineError> {
        let backend = self.dispatcher.backend();
        for gap in backend.unsupported_requirements(requirements) {
            warn!(backend = backend.name(), "{gap}");
        }

        let invocation = self.dispatcher.provision(requirements);
        info!(
            backend = backend.name(),
            kubernetes_version = %requirements.kubernetes_version,
            control_planes = requirements.control_planes,
            workers = requirements.workers,
            cni = %requirements.cni,
            "provisioning cluster"
        );

        let started = Instant::now();
        let result = self.runner.run(&invocation, timeout).await;
        metrics::histogram!(m::PROVISION_DURATION_SECONDS).record(started.elapsed().as_secs_f64());

        match result {
            Ok(result) => {
                metrics::counter!(m::PROVISION_TOTAL, m::LABEL_RESULT => "success").increment(1);
                info!(backend = backend.name(), "cluster ready");
                Ok(result)
            }
            Err(e) => {
                metrics::counter!(m::PROVISION_TOTAL, m::LABEL_RESULT => e.kind_name())
                    .increment(1);
                error!(backend = backend.name(), error = %e, "unable to meet requirements");
                Err(EngineError::Provisioning(e))
            }
        }
    }
}
