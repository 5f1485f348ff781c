//! Scenario sequencing.
//!
//! [`ScenarioRunner::execute`] drives one scenario from provisioning to its
//! terminal state:
//!
//! ```text
//! NotStarted ─▶ Provisioning ─▶ Running{1} ─▶ … ─▶ Running{n}
//!                   │                │                 │
//!                   ▼                ▼                 ├─▶ CompletedClean   (no background steps)
//!          ProvisioningFailed   Aborted{k}             └─▶ LiveIndefinite ─▶ Released
//! ```
//!
//! Any state before a terminal one can also end in `Interrupted` when the
//! shutdown token fires.
//!
//! Foreground steps run one at a time in declaration order. Background steps
//! are spawned into a [`JoinSet`] and never block the sequence; their
//! failures are logged and do not change the outcome. Once at least one
//! background step has been launched the run does not end on its own: it
//! waits for the shutdown token, then stops the background steps.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use faultline_core::metrics as m;
use faultline_core::scenario::{Scenario, Step};
use faultline_core::types::{ExecutionResult, Invocation};

use crate::dispatch::Dispatcher;
use crate::error::{EngineError, StepError};
use crate::executor::CommandRunner;
use crate::provision::Provisioner;

const MODE_FOREGROUND: &str = "foreground";
const MODE_BACKGROUND: &str = "background";

/// Knobs for one run.
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Deadline for each external command, provisioning included.
    pub step_timeout: Duration,
    /// How long stopped background steps get to finish before being aborted.
    pub shutdown_grace: Duration,
    /// Reuse the existing cluster instead of provisioning.
    pub skip_provision: bool,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            step_timeout: Duration::from_secs(360),
            shutdown_grace: Duration::from_secs(5),
            skip_provision: false,
        }
    }
}

/// Observable progress of a run. Step numbers are 1-based.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunState {
    NotStarted,
    Provisioning,
    Running { step: usize },
    ProvisioningFailed,
    Aborted { step: usize },
    CompletedClean,
    /// Every step was launched; `background` steps keep the run alive.
    LiveIndefinite { background: usize },
    Released,
    Interrupted,
}

/// How a run ended.
#[derive(Debug)]
pub enum RunOutcome {
    /// Every step succeeded and none ran in the background.
    CompletedClean,
    /// Background steps were live until the operator ended the run.
    Released { background: usize },
    /// The provisioning command failed; no step ran.
    ProvisioningFailed(EngineError),
    /// A foreground step failed; later steps were not dispatched.
    Aborted(EngineError),
    /// The shutdown token fired before the sequence finished.
    Interrupted { step: Option<usize> },
}

impl RunOutcome {
    /// Process exit code for this outcome.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::CompletedClean | Self::Released { .. } => 0,
            Self::ProvisioningFailed(_) => 1,
            Self::Aborted(_) => 2,
            Self::Interrupted { .. } => 130,
        }
    }

    pub fn is_success(&self) -> bool {
        self.exit_code() == 0
    }

    pub fn error(&self) -> Option<&EngineError> {
        match self {
            Self::ProvisioningFailed(e) | Self::Aborted(e) => Some(e),
            _ => None,
        }
    }

    /// Exit code of the command that ended the run, when it exited non-zero.
    pub fn failed_exit_code(&self) -> Option<i32> {
        self.error().and_then(|e| e.step_error().exit_code())
    }

    fn state(&self) -> RunState {
        match self {
            Self::CompletedClean => RunState::CompletedClean,
            Self::Released { .. } => RunState::Released,
            Self::ProvisioningFailed(_) => RunState::ProvisioningFailed,
            Self::Aborted(EngineError::Step { step, .. }) => RunState::Aborted { step: *step },
            Self::Aborted(EngineError::Provisioning(_)) => RunState::ProvisioningFailed,
            Self::Interrupted { .. } => RunState::Interrupted,
        }
    }
}

impl fmt::Display for RunOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CompletedClean => write!(f, "completed"),
            Self::Released { background } => {
                write!(f, "released after {background} background step(s)")
            }
            Self::ProvisioningFailed(e) | Self::Aborted(e) => write!(f, "{e}"),
            Self::Interrupted { step: Some(step) } => write!(f, "interrupted during step {step}"),
            Self::Interrupted { step: None } => write!(f, "interrupted"),
        }
    }
}

/// One resolved step of a [`Plan`].
#[derive(Debug, Clone, Serialize)]
pub struct PlannedStep {
    pub step: usize,
    pub kind: &'static str,
    pub background: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub invocation: Option<Invocation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Everything a run would execute, resolved without running anything.
#[derive(Debug, Clone, Serialize)]
pub struct Plan {
    pub backend: &'static str,
    pub base_dir: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provision: Option<Invocation>,
    pub steps: Vec<PlannedStep>,
}

impl Plan {
    /// First foreground step that cannot be dispatched. A real run would
    /// abort there.
    pub fn blocking_step(&self) -> Option<&PlannedStep> {
        self.steps
            .iter()
            .find(|planned| !planned.background && planned.error.is_some())
    }

    /// Exit code of a dry run: 2 when a real run would abort on an
    /// undispatchable foreground step, 0 otherwise.
    pub fn exit_code(&self) -> i32 {
        if self.blocking_step().is_some() { 2 } else { 0 }
    }
}

impl fmt::Display for Plan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "backend:   {}", self.backend)?;
        writeln!(f, "scene:     {}", self.base_dir.display())?;
        match &self.provision {
            Some(inv) => writeln!(f, "provision: {inv}")?,
            None => writeln!(f, "provision: skipped")?,
        }
        for planned in &self.steps {
            let mode = if planned.background { " [bg]" } else { "" };
            let label = format!("{}{mode}", planned.kind);
            match (&planned.invocation, &planned.error) {
                (Some(inv), _) => writeln!(f, "{:>4}  {label:<18} {inv}", planned.step)?,
                (None, Some(err)) => writeln!(f, "{:>4}  {label:<18} error: {err}", planned.step)?,
                (None, None) => writeln!(f, "{:>4}  {label}", planned.step)?,
            }
        }
        Ok(())
    }
}

/// Sequences one scenario against one cluster.
pub struct ScenarioRunner<R: CommandRunner> {
    dispatcher: Arc<Dispatcher>,
    runner: Arc<R>,
    options: RunOptions,
    state_tx: watch::Sender<RunState>,
}

impl<R: CommandRunner> ScenarioRunner<R> {
    pub fn new(dispatcher: Dispatcher, runner: Arc<R>, options: RunOptions) -> Self {
        let (state_tx, _) = watch::channel(RunState::NotStarted);
        Self {
            dispatcher: Arc::new(dispatcher),
            runner,
            options,
            state_tx,
        }
    }

    /// Subscribe to state changes.
    pub fn state(&self) -> watch::Receiver<RunState> {
        self.state_tx.subscribe()
    }

    /// Resolve every step without executing anything.
    pub fn plan(&self, scenario: &Scenario) -> Plan {
        let steps = scenario
            .steps
            .iter()
            .enumerate()
            .map(|(index, step)| {
                let (invocation, error) = match self.dispatcher.resolve(&step.action) {
                    Ok(inv) => (Some(inv), None),
                    Err(e) => (None, Some(e.to_string())),
                };
                PlannedStep {
                    step: index + 1,
                    kind: step.action.kind(),
                    background: step.background,
                    invocation,
                    error,
                }
            })
            .collect();

        Plan {
            backend: self.dispatcher.backend().name(),
            base_dir: self.dispatcher.base_dir().to_path_buf(),
            provision: (!self.options.skip_provision)
                .then(|| self.dispatcher.provision(&scenario.requirements)),
            steps,
        }
    }

    /// Run `scenario` to a terminal state.
    ///
    /// `shutdown` is the only way to end a run that launched background
    /// steps. Cancelling it earlier kills the in-flight command and ends
    /// the run as [`RunOutcome::Interrupted`].
    pub async fn execute(&self, scenario: &Scenario, shutdown: CancellationToken) -> RunOutcome {
        let total = scenario.steps.len();
        info!(
            backend = %self.dispatcher.backend(),
            base_dir = %self.dispatcher.base_dir().display(),
            steps = total,
            background = scenario.background_steps(),
            "starting scenario"
        );

        if self.options.skip_provision {
            info!("provisioning skipped, using existing cluster");
        } else {
            self.state_tx.send_replace(RunState::Provisioning);
            let provisioner =
                Provisioner::new(self.dispatcher.as_ref().clone(), Arc::clone(&self.runner));
            let ensured = tokio::select! {
                biased;
                () = shutdown.cancelled() => None,
                r = provisioner.ensure(&scenario.requirements, self.options.step_timeout) => Some(r),
            };
            match ensured {
                None => return self.finish(RunOutcome::Interrupted { step: None }),
                Some(Err(e)) => return self.finish(RunOutcome::ProvisioningFailed(e)),
                Some(Ok(_)) => {}
            }
        }

        let background_token = shutdown.child_token();
        let mut background = JoinSet::new();
        let mut launched = 0usize;

        for (index, step) in scenario.steps.iter().enumerate() {
            let number = index + 1;
            if shutdown.is_cancelled() {
                self.stop_background(&background_token, &mut background)
                    .await;
                return self.finish(RunOutcome::Interrupted { step: Some(number) });
            }

            info!(
                step = number,
                kind = step.action.kind(),
                background = step.background,
                "running step {number} of {total}"
            );

            if step.background {
                self.spawn_background(&mut background, number, step.clone(), &background_token);
                launched += 1;
                continue;
            }

            self.state_tx
                .send_replace(RunState::Running { step: number });
            let result = tokio::select! {
                biased;
                () = shutdown.cancelled() => None,
                r = run_step(&self.dispatcher, self.runner.as_ref(), step, self.options.step_timeout) => Some(r),
            };

            match result {
                Some(Ok(_)) => {}
                Some(Err(source)) => {
                    self.stop_background(&background_token, &mut background)
                        .await;
                    return self.finish(RunOutcome::Aborted(EngineError::Step {
                        step: number,
                        source,
                    }));
                }
                None => {
                    self.stop_background(&background_token, &mut background)
                        .await;
                    return self.finish(RunOutcome::Interrupted { step: Some(number) });
                }
            }
        }

        if launched == 0 {
            return self.finish(RunOutcome::CompletedClean);
        }

        self.state_tx
            .send_replace(RunState::LiveIndefinite {
                background: launched,
            });
        info!(
            background = launched,
            "all steps launched, background steps live until shutdown"
        );

        loop {
            tokio::select! {
                () = shutdown.cancelled() => break,
                Some(joined) = background.join_next(), if !background.is_empty() => {
                    if let Err(e) = joined {
                        warn!(error = %e, "background task ended abnormally");
                    }
                }
            }
        }

        info!("shutdown requested, releasing scenario");
        self.stop_background(&background_token, &mut background).await;
        self.finish(RunOutcome::Released {
            background: launched,
        })
    }

    fn spawn_background(
        &self,
        set: &mut JoinSet<()>,
        number: usize,
        step: Step,
        token: &CancellationToken,
    ) {
        let dispatcher = Arc::clone(&self.dispatcher);
        let runner = Arc::clone(&self.runner);
        let timeout = self.options.step_timeout;
        let token = token.clone();

        set.spawn(async move {
            let _live = LiveBackgroundStep::enter();
            let result = tokio::select! {
                biased;
                () = token.cancelled() => None,
                r = run_step(&dispatcher, runner.as_ref(), &step, timeout) => Some(r),
            };
            match result {
                Some(Ok(_)) => info!(step = number, "background step finished"),
                Some(Err(e)) => error!(step = number, error = %e, "background step failed"),
                None => debug!(step = number, "background step stopped"),
            }
        });
    }

    /// Cancel background steps and wait up to the grace period for them.
    async fn stop_background(&self, token: &CancellationToken, set: &mut JoinSet<()>) {
        token.cancel();
        if set.is_empty() {
            return;
        }

        let pending = set.len();
        let drained = tokio::time::timeout(self.options.shutdown_grace, async {
            while let Some(joined) = set.join_next().await {
                if let Err(e) = joined {
                    debug!(error = %e, "background task join error");
                }
            }
        })
        .await;

        if drained.is_err() {
            warn!(
                pending = set.len(),
                grace_ms = u64::try_from(self.options.shutdown_grace.as_millis()).unwrap_or(u64::MAX),
                "background steps did not stop in time, aborting"
            );
            set.abort_all();
            while set.join_next().await.is_some() {}
        } else {
            debug!(stopped = pending, "background steps stopped");
        }
    }

    fn finish(&self, outcome: RunOutcome) -> RunOutcome {
        self.state_tx.send_replace(outcome.state());
        match &outcome {
            RunOutcome::CompletedClean | RunOutcome::Released { .. } => {
                info!(outcome = %outcome, "scenario finished");
            }
            RunOutcome::Interrupted { .. } => {
                warn!(outcome = %outcome, "scenario interrupted");
            }
            RunOutcome::ProvisioningFailed(e) | RunOutcome::Aborted(e) => {
                error!(
                    error = %e,
                    exit_code = ?e.step_error().exit_code(),
                    kind = e.step_error().kind_name(),
                    "scenario failed"
                );
            }
        }
        outcome
    }
}

/// Resolve and run one step, recording step metrics.
async fn run_step<R: CommandRunner>(
    dispatcher: &Dispatcher,
    runner: &R,
    step: &Step,
    timeout: Duration,
) -> Result<ExecutionResult, StepError> {
    let kind = step.action.kind();
    let mode = if step.background {
        MODE_BACKGROUND
    } else {
        MODE_FOREGROUND
    };

    let started = Instant::now();
    let result = match dispatcher.resolve(&step.action) {
        Ok(invocation) => runner.run(&invocation, timeout).await,
        Err(e) => Err(e),
    };
    metrics::histogram!(m::STEP_DURATION_SECONDS, m::LABEL_KIND => kind)
        .record(started.elapsed().as_secs_f64());

    let label = match &result {
        Ok(_) => "success",
        Err(e) => e.kind_name(),
    };
    metrics::counter!(
        m::STEPS_TOTAL,
        m::LABEL_KIND => kind,
        m::LABEL_MODE => mode,
        m::LABEL_RESULT => label
    )
    .increment(1);

    result
}

/// Holds the live-background gauge up for as long as it exists.
struct LiveBackgroundStep;

impl LiveBackgroundStep {
    fn enter() -> Self {
        metrics::gauge!(m::BACKGROUND_STEPS_LIVE).increment(1.0);
        Self
    }
}

impl Drop for LiveBackgroundStep {
    fn drop(&mut self) {
        metrics::gauge!(m::BACKGROUND_STEPS_LIVE).decrement(1.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::Backend;
    use crate::executor::MockRunner;
    use faultline_core::scenario::{Requirements, StepAction};

    fn local(command: &str) -> StepAction {
        StepAction::Local {
            command: command.to_owned(),
        }
    }

    fn scenario(steps: Vec<Step>) -> Scenario {
        Scenario {
            requirements: Requirements::default(),
            steps,
        }
    }

    fn runner(
        mock: MockRunner,
        options: RunOptions,
    ) -> (Arc<ScenarioRunner<MockRunner>>, Arc<MockRunner>) {
        let mock = Arc::new(mock);
        let dispatcher = Dispatcher::new(
            Backend::Minikube {
                profile: "minikube".to_owned(),
            },
            "/scenes/test",
        );
        (
            Arc::new(ScenarioRunner::new(dispatcher, Arc::clone(&mock), options)),
            mock,
        )
    }

    fn local_commands(mock: &MockRunner) -> Vec<String> {
        mock.calls()
            .into_iter()
            .filter(|inv| inv.program == "sh")
            .map(|inv| inv.args[1].clone())
            .collect()
    }

    #[tokio::test]
    async fn single_clean_step_completes() {
        let (runner, mock) = runner(MockRunner::new(), RunOptions::default());
        let outcome = runner
            .execute(
                &scenario(vec![Step::foreground(local("exit 0"))]),
                CancellationToken::new(),
            )
            .await;

        assert!(matches!(outcome, RunOutcome::CompletedClean));
        assert_eq!(outcome.exit_code(), 0);
        let calls = mock.calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].program, "minikube");
        assert_eq!(*runner.state().borrow(), RunState::CompletedClean);
    }

    #[tokio::test]
    async fn foreground_steps_run_in_declared_order() {
        let (runner, mock) = runner(
            MockRunner::new().delay_on("first", Duration::from_millis(30)),
            RunOptions::default(),
        );
        let steps = vec![
            Step::foreground(local("echo first")),
            Step::foreground(local("echo second")),
            Step::foreground(local("echo third")),
        ];
        let outcome = runner
            .execute(&scenario(steps), CancellationToken::new())
            .await;

        assert!(outcome.is_success());
        assert_eq!(
            local_commands(&mock),
            vec!["echo first", "echo second", "echo third"]
        );
    }

    #[tokio::test]
    async fn failing_step_aborts_the_rest() {
        let (runner, mock) = runner(MockRunner::new().fail_on("exit 7", 7), RunOptions::default());
        let steps = vec![
            Step::foreground(local("exit 7")),
            Step::foreground(local("echo never")),
        ];
        let outcome = runner
            .execute(&scenario(steps), CancellationToken::new())
            .await;

        assert_eq!(outcome.exit_code(), 2);
        assert_eq!(outcome.failed_exit_code(), Some(7));
        assert!(matches!(
            outcome,
            RunOutcome::Aborted(EngineError::Step { step: 1, .. })
        ));
        assert_eq!(local_commands(&mock), vec!["exit 7"]);
        assert_eq!(*runner.state().borrow(), RunState::Aborted { step: 1 });
    }

    #[tokio::test]
    async fn provisioning_failure_runs_no_steps() {
        let (runner, mock) = runner(
            MockRunner::new().fail_on("minikube start", 1),
            RunOptions::default(),
        );
        let outcome = runner
            .execute(
                &scenario(vec![Step::foreground(local("echo step"))]),
                CancellationToken::new(),
            )
            .await;

        assert!(matches!(outcome, RunOutcome::ProvisioningFailed(_)));
        assert_eq!(outcome.exit_code(), 1);
        assert!(local_commands(&mock).is_empty());
    }

    #[tokio::test]
    async fn skip_provision_issues_no_cluster_command() {
        let options = RunOptions {
            skip_provision: true,
            ..RunOptions::default()
        };
        let (runner, mock) = runner(MockRunner::new(), options);
        runner
            .execute(
                &scenario(vec![Step::foreground(local("true"))]),
                CancellationToken::new(),
            )
            .await;
        assert!(mock.calls().iter().all(|inv| inv.program == "sh"));
    }

    #[tokio::test]
    async fn worker_step_aborts_as_unsupported() {
        let (runner, _mock) = runner(MockRunner::new(), RunOptions::default());
        let steps = vec![Step::foreground(StepAction::Worker {
            command: "uptime".to_owned(),
        })];
        let outcome = runner
            .execute(&scenario(steps), CancellationToken::new())
            .await;

        let err = outcome.error().expect("should fail");
        assert!(matches!(
            err.step_error(),
            StepError::UnsupportedVariant { kind: "worker" }
        ));
    }

    #[tokio::test]
    async fn background_step_keeps_run_alive_until_shutdown() {
        let (runner, mock) = runner(
            MockRunner::new().delay_on("sleep 9999", Duration::from_secs(9999)),
            RunOptions::default(),
        );
        let shutdown = CancellationToken::new();
        let mut state = runner.state();

        let task = {
            let runner = Arc::clone(&runner);
            let shutdown = shutdown.clone();
            tokio::spawn(async move {
                let steps = vec![Step::background(local("sleep 9999"))];
                runner.execute(&scenario(steps), shutdown).await
            })
        };

        state
            .wait_for(|s| matches!(s, RunState::LiveIndefinite { background: 1 }))
            .await
            .expect("runner should go live");
        for _ in 0..3 {
            tokio::time::sleep(Duration::from_millis(20)).await;
            assert!(!task.is_finished(), "live scenario must not end on its own");
        }
        assert_eq!(local_commands(&mock), vec!["sleep 9999"]);

        shutdown.cancel();
        let outcome = task.await.expect("join");
        assert!(matches!(outcome, RunOutcome::Released { background: 1 }));
        assert_eq!(outcome.exit_code(), 0);
    }

    #[tokio::test]
    async fn background_failure_does_not_change_outcome() {
        let (runner, mock) = runner(
            MockRunner::new().fail_on("chaos", 3),
            RunOptions::default(),
        );
        let shutdown = CancellationToken::new();
        let mut state = runner.state();

        let task = {
            let runner = Arc::clone(&runner);
            let shutdown = shutdown.clone();
            tokio::spawn(async move {
                let steps = vec![
                    Step::background(local("chaos")),
                    Step::foreground(local("echo after")),
                ];
                runner.execute(&scenario(steps), shutdown).await
            })
        };

        state
            .wait_for(|s| matches!(s, RunState::LiveIndefinite { .. }))
            .await
            .expect("runner should go live");
        shutdown.cancel();
        let outcome = task.await.expect("join");

        assert!(outcome.is_success());
        assert!(local_commands(&mock).contains(&"echo after".to_owned()));
    }

    #[tokio::test]
    async fn shutdown_during_foreground_step_interrupts() {
        let (runner, _mock) = runner(
            MockRunner::new().delay_on("slow", Duration::from_secs(60)),
            RunOptions::default(),
        );
        let shutdown = CancellationToken::new();
        let mut state = runner.state();

        let task = {
            let runner = Arc::clone(&runner);
            let shutdown = shutdown.clone();
            tokio::spawn(async move {
                let steps = vec![
                    Step::foreground(local("slow")),
                    Step::foreground(local("echo never")),
                ];
                runner.execute(&scenario(steps), shutdown).await
            })
        };

        state
            .wait_for(|s| matches!(s, RunState::Running { step: 1 }))
            .await
            .expect("first step should start");
        shutdown.cancel();
        let outcome = task.await.expect("join");

        assert!(matches!(outcome, RunOutcome::Interrupted { step: Some(1) }));
        assert_eq!(outcome.exit_code(), 130);
    }

    #[tokio::test]
    async fn foreground_failure_stops_background_steps() {
        let options = RunOptions {
            shutdown_grace: Duration::from_secs(1),
            ..RunOptions::default()
        };
        let (runner, _mock) = runner(
            MockRunner::new()
                .delay_on("sleep 9999", Duration::from_secs(9999))
                .fail_on("exit 2", 2),
            options,
        );
        let steps = vec![
            Step::background(local("sleep 9999")),
            Step::foreground(local("exit 2")),
        ];
        let outcome = tokio::time::timeout(
            Duration::from_secs(5),
            runner.execute(&scenario(steps), CancellationToken::new()),
        )
        .await
        .expect("run should end once the foreground step fails");
        assert_eq!(outcome.exit_code(), 2);
    }

    #[test]
    fn plan_resolves_without_running() {
        let (runner, mock) = runner(MockRunner::new(), RunOptions::default());
        let steps = vec![
            Step::foreground(local("echo hi")),
            Step::background(StepAction::Worker {
                command: "uptime".to_owned(),
            }),
        ];
        let plan = runner.plan(&scenario(steps));

        assert!(mock.calls().is_empty());
        assert_eq!(plan.backend, "minikube");
        assert!(plan.provision.is_some());
        assert_eq!(plan.steps.len(), 2);
        assert_eq!(plan.steps[0].step, 1);
        assert!(plan.steps[0].invocation.is_some());
        assert!(plan.steps[1].background);
        assert!(plan.steps[1].error.is_some());

        let text = plan.to_string();
        assert!(text.contains("local"));
        assert!(text.contains("worker [bg]"));

        // a background worker only gets logged in a real run
        assert!(plan.blocking_step().is_none());
        assert_eq!(plan.exit_code(), 0);
    }

    #[test]
    fn plan_with_foreground_worker_would_abort() {
        let (runner, _mock) = runner(MockRunner::new(), RunOptions::default());
        let steps = vec![
            Step::foreground(local("echo hi")),
            Step::foreground(StepAction::Worker {
                command: "uptime".to_owned(),
            }),
            Step::foreground(local("echo later")),
        ];
        let plan = runner.plan(&scenario(steps));

        let blocking = plan.blocking_step().expect("worker step blocks the run");
        assert_eq!(blocking.step, 2);
        assert_eq!(blocking.kind, "worker");
        assert_eq!(plan.exit_code(), 2);
    }

    #[test]
    fn outcome_exit_codes() {
        assert_eq!(RunOutcome::CompletedClean.exit_code(), 0);
        assert_eq!(RunOutcome::Released { background: 2 }.exit_code(), 0);
        assert_eq!(RunOutcome::Interrupted { step: None }.exit_code(), 130);
    }
}
