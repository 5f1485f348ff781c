//! Scenario model and YAML loader.
//!
//! A scenario file (`scene.yaml` inside a scene directory) declares the
//! cluster [`Requirements`] and an ordered `setup` list of steps:
//!
//! ```yaml
//! requirements:
//!   kubernetes-version: v1.28.3
//!   workers: 2
//! setup:
//!   - local: kubectl taint nodes --all chaos=on:NoSchedule
//!   - control-plane: sudo systemctl stop kubelet
//!     background: true
//!   - transfer:
//!       source: manifests/etcd-fill.sh
//!       dest: /tmp/etcd-fill.sh
//! ```
//!
//! Each step must declare exactly one action. The loader turns the
//! permissive wire shape into the closed [`StepAction`] sum type, so a
//! malformed step is reported here, before anything is provisioned.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ScenarioError;

/// Largest scenario file the loader accepts.
const MAX_SCENARIO_FILE_SIZE: u64 = 1024 * 1024; // 1MB
/// Largest number of steps in one scenario.
const MAX_STEPS: usize = 10_000;

/// Cluster shape the scenario needs before its first step runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Requirements {
    /// Kubernetes version, e.g. `v1.28.3`. Empty means the backend default.
    #[serde(rename = "kubernetes-version", alias = "kubernetesVersion")]
    pub kubernetes_version: String,
    /// Number of control-plane nodes.
    #[serde(
        rename = "control-planes",
        alias = "controlplanes",
        alias = "controlPlaneCount"
    )]
    pub control_planes: u32,
    /// Number of worker nodes.
    #[serde(alias = "workerCount")]
    pub workers: u32,
    /// Network plugin. Empty means the backend default.
    #[serde(alias = "networkPlugin")]
    pub cni: String,
}

impl Default for Requirements {
    fn default() -> Self {
        Self {
            kubernetes_version: String::new(),
            control_planes: 1,
            workers: 0,
            cni: String::new(),
        }
    }
}

impl Requirements {
    /// Total node count.
    pub fn nodes(&self) -> u32 {
        self.control_planes.saturating_add(self.workers)
    }

    fn validate(&self) -> Result<(), ScenarioError> {
        if self.control_planes == 0 {
            return Err(ScenarioError::InvalidRequirements {
                field: "control-planes".to_owned(),
                reason: "at least one control-plane node is required".to_owned(),
            });
        }
        if self.kubernetes_version.chars().any(char::is_whitespace) {
            return Err(ScenarioError::InvalidRequirements {
                field: "kubernetes-version".to_owned(),
                reason: "must not contain whitespace".to_owned(),
            });
        }
        Ok(())
    }
}

/// A file copy from the machine running faultline to a cluster node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Transfer {
    /// Local path. Relative paths resolve against the parent of the scene
    /// directory.
    pub source: PathBuf,
    /// Destination path on the node.
    pub dest: String,
    /// Node name. Empty means the backend's control-plane node.
    pub target: String,
}

/// What a step does. Exactly one action per step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum StepAction {
    /// Shell command on the machine running faultline.
    Local { command: String },
    /// Command run on the control-plane node.
    ControlPlane { command: String },
    /// Command run on a worker node. Declared but not dispatchable yet.
    Worker { command: String },
    /// File copy to a node.
    Transfer(Transfer),
}

impl StepAction {
    /// Fixed action name, used in logs and as a metric label.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Local { .. } => "local",
            Self::ControlPlane { .. } => "control-plane",
            Self::Worker { .. } => "worker",
            Self::Transfer(_) => "transfer",
        }
    }
}

impl fmt::Display for StepAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Local { command } => write!(f, "local: {command}"),
            Self::ControlPlane { command } => write!(f, "control-plane: {command}"),
            Self::Worker { command } => write!(f, "worker: {command}"),
            Self::Transfer(t) => {
                let target = if t.target.is_empty() {
                    "control-plane"
                } else {
                    t.target.as_str()
                };
                write!(f, "transfer: {} -> {}:{}", t.source.display(), target, t.dest)
            }
        }
    }
}

/// One declared step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Step {
    pub action: StepAction,
    /// Launch without waiting for completion.
    pub background: bool,
}

impl Step {
    pub fn foreground(action: StepAction) -> Self {
        Self {
            action,
            background: false,
        }
    }

    pub fn background(action: StepAction) -> Self {
        Self {
            action,
            background: true,
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.background {
            write!(f, "{} (background)", self.action)
        } else {
            write!(f, "{}", self.action)
        }
    }
}

/// Requirements plus the ordered step list.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct Scenario {
    pub requirements: Requirements,
    /// Steps in declaration order.
    pub steps: Vec<Step>,
}

impl Scenario {
    /// Parse and validate a scenario from YAML text.
    ///
    /// `source_name` only appears in error messages.
    pub fn parse_yaml(yaml_str: &str, source_name: &str) -> Result<Self, ScenarioError> {
        let raw: RawScenario =
            serde_yaml::from_str(yaml_str).map_err(|e| ScenarioError::ParseFailed {
                source_name: source_name.to_owned(),
                reason: e.to_string(),
            })?;

        if raw.setup.len() > MAX_STEPS {
            return Err(ScenarioError::TooManySteps {
                count: raw.setup.len(),
                max: MAX_STEPS,
            });
        }

        raw.requirements.validate()?;

        let steps = raw
            .setup
            .into_iter()
            .enumerate()
            .map(|(index, step)| step.into_step(index + 1))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            requirements: raw.requirements,
            steps,
        })
    }

    /// Load a scenario from a single file.
    pub async fn load_file(path: impl AsRef<Path>) -> Result<Self, ScenarioError> {
        let path = path.as_ref();
        let not_found = || ScenarioError::FileNotFound {
            path: path.display().to_string(),
        };

        let metadata = tokio::fs::metadata(path).await.map_err(|_| not_found())?;
        if metadata.len() > MAX_SCENARIO_FILE_SIZE {
            return Err(ScenarioError::TooLarge {
                size: metadata.len(),
                max: MAX_SCENARIO_FILE_SIZE,
            });
        }

        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| ScenarioError::ParseFailed {
                source_name: path.display().to_string(),
                reason: format!("failed to read file: {e}"),
            })?;

        Self::parse_yaml(&content, &path.display().to_string())
    }

    /// Number of steps flagged `background`.
    pub fn background_steps(&self) -> usize {
        self.steps.iter().filter(|s| s.background).count()
    }
}

/// A scenario together with the directory it was loaded from.
#[derive(Debug, Clone)]
pub struct Scene {
    pub scenario: Scenario,
    /// Absolute scene directory, the one holding the scenario file.
    pub dir: PathBuf,
    /// Parent of the scene directory. Local commands run here and relative
    /// transfer sources resolve against it, so a scene under
    /// `scenarios/005` refers to its payloads as `005/payload.sh`.
    pub base_dir: PathBuf,
    /// Absolute path of the scenario file.
    pub file: PathBuf,
}

impl Scene {
    /// Load `<dir>/<file_name>` and pin the parent of `dir` as base path.
    pub async fn load(dir: impl AsRef<Path>, file_name: &str) -> Result<Self, ScenarioError> {
        let dir = dir.as_ref();
        let dir = tokio::fs::canonicalize(dir)
            .await
            .map_err(|_| ScenarioError::FileNotFound {
                path: dir.display().to_string(),
            })?;
        let file = dir.join(file_name);
        let scenario = Scenario::load_file(&file).await?;
        // `/` has no parent; it is its own base.
        let base_dir = dir.parent().unwrap_or(dir.as_path()).to_path_buf();

        tracing::info!(
            file = %file.display(),
            base_dir = %base_dir.display(),
            steps = scenario.steps.len(),
            background = scenario.background_steps(),
            "loaded scenario"
        );

        Ok(Self {
            scenario,
            dir,
            base_dir,
            file,
        })
    }
}

// --- wire shape ---

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawScenario {
    #[serde(default)]
    requirements: Requirements,
    #[serde(default)]
    setup: Vec<RawStep>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawStep {
    local: Option<String>,
    #[serde(rename = "control-plane", alias = "controlPlane")]
    control_plane: Option<String>,
    worker: Option<String>,
    transfer: Option<RawTransfer>,
    #[serde(default)]
    background: bool,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawTransfer {
    #[serde(default)]
    source: String,
    #[serde(default)]
    dest: String,
    #[serde(default)]
    target: String,
}

impl RawStep {
    fn into_step(self, position: usize) -> Result<Step, ScenarioError> {
        let invalid = |reason: &str| ScenarioError::InvalidStep {
            step: position,
            reason: reason.to_owned(),
        };

        let mut actions = Vec::with_capacity(1);
        if let Some(command) = self.local {
            actions.push(StepAction::Local { command });
        }
        if let Some(command) = self.control_plane {
            actions.push(StepAction::ControlPlane { command });
        }
        if let Some(command) = self.worker {
            actions.push(StepAction::Worker { command });
        }
        if let Some(t) = self.transfer {
            actions.push(StepAction::Transfer(Transfer {
                source: PathBuf::from(t.source),
                dest: t.dest,
                target: t.target,
            }));
        }

        let action = match actions.len() {
            0 => {
                return Err(invalid(
                    "no action declared (expected one of: local, control-plane, worker, transfer)",
                ));
            }
            1 => actions.remove(0),
            n => {
                return Err(ScenarioError::InvalidStep {
                    step: position,
                    reason: format!("{n} actions declared, expected exactly one"),
                });
            }
        };

        match &action {
            StepAction::Local { command }
            | StepAction::ControlPlane { command }
            | StepAction::Worker { command } => {
                if command.trim().is_empty() {
                    return Err(invalid("command must not be empty"));
                }
            }
            StepAction::Transfer(t) => {
                if t.source.as_os_str().is_empty() {
                    return Err(invalid("transfer source must not be empty"));
                }
                if t.dest.is_empty() {
                    return Err(invalid("transfer dest must not be empty"));
                }
            }
        }

        Ok(Step {
            action,
            background: self.background,
        })
    }
}
