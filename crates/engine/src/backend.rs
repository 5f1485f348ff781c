//! Cluster backends.
//!
//! A [`Backend`] knows the connection syntax of one kind of test cluster:
//! how to provision it, how to run a command on its control-plane node and
//! how to copy a file onto one of its nodes. Every method only builds an
//! [`Invocation`]; nothing here runs a process.
//!
//! | Backend  | control-plane exec                       | transfer                     |
//! |----------|------------------------------------------|------------------------------|
//! | minikube | `minikube -p P ssh CMD`                  | `minikube -p P cp SRC N:DST` |
//! | kind     | `docker exec C-control-plane sh -c CMD`  | `docker cp SRC N:DST`        |
//! | k3d      | `docker exec k3d-C-server-0 sh -c CMD`   | `docker cp SRC N:DST`        |
//! | remote   | `ssh HOST CMD`                           | `scp SRC N:DST`              |

use std::fmt;
use std::path::Path;

use faultline_core::config::ClusterConfig;
use faultline_core::error::ConfigError;
use faultline_core::scenario::Requirements;
use faultline_core::types::Invocation;

/// Cluster name used when none is configured.
const DEFAULT_CLUSTER_NAME: &str = "faultline";
/// minikube's own default profile.
const MINIKUBE_DEFAULT_PROFILE: &str = "minikube";

/// Transfer target names that mean "the control-plane node".
const CONTROL_PLANE_ALIASES: [&str; 2] = ["", "control-plane"];

/// Target cluster backend, selected by `--target`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Backend {
    /// Local minikube VM or container; `profile` is passed as `-p`.
    Minikube { profile: String },
    /// kind (Kubernetes in Docker).
    Kind { cluster: String },
    /// k3d (k3s in Docker).
    K3d { cluster: String },
    /// Pre-existing cluster reached over SSH.
    Remote { host: String },
}

impl Backend {
    /// Build a backend from the `runner.target` string and `[cluster]` section.
    pub fn from_config(target: &str, cluster: &ClusterConfig) -> Result<Self, ConfigError> {
        let name = |default: &str| {
            if cluster.name.is_empty() {
                default.to_owned()
            } else {
                cluster.name.clone()
            }
        };

        match target {
            "minikube" => Ok(Self::Minikube {
                profile: name(MINIKUBE_DEFAULT_PROFILE),
            }),
            "kind" => Ok(Self::Kind {
                cluster: name(DEFAULT_CLUSTER_NAME),
            }),
            "k3d" => Ok(Self::K3d {
                cluster: name(DEFAULT_CLUSTER_NAME),
            }),
            "remote" => {
                if cluster.remote_host.is_empty() {
                    return Err(ConfigError::InvalidValue {
                        field: "cluster.remote_host".to_owned(),
                        reason: "must be set when runner.target is 'remote'".to_owned(),
                    });
                }
                Ok(Self::Remote {
                    host: cluster.remote_host.clone(),
                })
            }
            other => Err(ConfigError::InvalidValue {
                field: "runner.target".to_owned(),
                reason: format!("unknown target '{other}'"),
            }),
        }
    }

    /// Fixed backend name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Minikube { .. } => "minikube",
            Self::Kind { .. } => "kind",
            Self::K3d { .. } => "k3d",
            Self::Remote { .. } => "remote",
        }
    }

    /// Node name (or SSH destination) of the control-plane node.
    pub fn control_plane_node(&self) -> String {
        match self {
            Self::Minikube { profile } => profile.clone(),
            Self::Kind { cluster } => format!("{cluster}-control-plane"),
            Self::K3d { cluster } => format!("k3d-{cluster}-server-0"),
            Self::Remote { host } => host.clone(),
        }
    }

    /// Map a transfer `target` to the node name the backend's copy tool expects.
    pub fn resolve_node(&self, target: &str) -> String {
        if CONTROL_PLANE_ALIASES.contains(&target) {
            self.control_plane_node()
        } else {
            target.to_owned()
        }
    }

    /// The command that brings up (or validates) a cluster meeting `req`.
    pub fn provision(&self, req: &Requirements) -> Invocation {
        match self {
            Self::Minikube { profile } => {
                let mut args = vec!["start".to_owned(), "-p".to_owned(), profile.clone()];
                if !req.kubernetes_version.is_empty() {
                    args.push("--kubernetes-version".to_owned());
                    args.push(req.kubernetes_version.clone());
                }
                if req.nodes() > 1 {
                    args.push("--nodes".to_owned());
                    args.push(req.nodes().to_string());
                }
                if req.control_planes > 1 {
                    args.push("--ha".to_owned());
                }
                if !req.cni.is_empty() {
                    args.push("--cni".to_owned());
                    args.push(req.cni.clone());
                }
                Invocation::new("minikube", args)
            }
            Self::Kind { cluster } => {
                let mut args = vec![
                    "create".to_owned(),
                    "cluster".to_owned(),
                    "--name".to_owned(),
                    cluster.clone(),
                ];
                if !req.kubernetes_version.is_empty() {
                    args.push("--image".to_owned());
                    args.push(format!(
                        "kindest/node:{}",
                        with_v_prefix(&req.kubernetes_version)
                    ));
                }
                Invocation::new("kind", args)
            }
            Self::K3d { cluster } => {
                let mut args = vec![
                    "cluster".to_owned(),
                    "create".to_owned(),
                    cluster.clone(),
                    "--servers".to_owned(),
                    req.control_planes.to_string(),
                    "--agents".to_owned(),
                    req.workers.to_string(),
                ];
                if !req.kubernetes_version.is_empty() {
                    args.push("--image".to_owned());
                    args.push(format!(
                        "rancher/k3s:{}-k3s1",
                        with_v_prefix(&req.kubernetes_version)
                    ));
                }
                Invocation::new("k3d", args)
            }
            Self::Remote { .. } => Invocation::new("kubectl", ["version"]),
        }
    }

    /// Requirements this backend cannot express on its command line.
    ///
    /// The provisioner logs these as warnings and provisions anyway.
    pub fn unsupported_requirements(&self, req: &Requirements) -> Vec<String> {
        let mut unsupported = Vec::new();
        match self {
            Self::Kind { .. } => {
                if req.nodes() > 1 {
                    unsupported.push(format!(
                        "{} nodes requested; kind needs a config file for multi-node clusters",
                        req.nodes()
                    ));
                }
                if !req.cni.is_empty() {
                    unsupported.push(format!("cni '{}' requested; kind uses kindnet", req.cni));
                }
            }
            Self::K3d { .. } => {
                if !req.cni.is_empty() {
                    unsupported.push(format!("cni '{}' requested; k3d uses flannel", req.cni));
                }
            }
            Self::Remote { .. } => {
                if !req.kubernetes_version.is_empty() || req.nodes() > 1 || !req.cni.is_empty() {
                    unsupported.push(
                        "remote clusters are only validated, not reshaped".to_owned(),
                    );
                }
            }
            Self::Minikube { .. } => {}
        }
        unsupported
    }

    /// Run `command` on the control-plane node.
    pub fn control_plane_exec(&self, command: &str) -> Invocation {
        match self {
            Self::Minikube { profile } => {
                Invocation::new("minikube", ["-p", profile.as_str(), "ssh", command])
            }
            Self::Kind { .. } | Self::K3d { .. } => {
                let node = self.control_plane_node();
                Invocation::new("docker", ["exec", node.as_str(), "sh", "-c", command])
            }
            Self::Remote { host } => Invocation::new("ssh", [host.as_str(), command]),
        }
    }

    /// Copy local `source` to `dest` on `node`.
    pub fn copy_to_node(&self, source: &Path, node: &str, dest: &str) -> Invocation {
        let source = source.display().to_string();
        let remote = format!("{node}:{dest}");
        match self {
            Self::Minikube { profile } => Invocation::new(
                "minikube",
                ["-p", profile.as_str(), "cp", source.as_str(), remote.as_str()],
            ),
            Self::Kind { .. } | Self::K3d { .. } => {
                Invocation::new("docker", ["cp", source.as_str(), remote.as_str()])
            }
            Self::Remote { .. } => Invocation::new("scp", [source.as_str(), remote.as_str()]),
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Minikube { profile } => write!(f, "minikube(profile={profile})"),
            Self::Kind { cluster } => write!(f, "kind(cluster={cluster})"),
            Self::K3d { cluster } => write!(f, "k3d(cluster={cluster})"),
            Self::Remote { host } => write!(f, "remote(host={host})"),
        }
    }
}

fn with_v_prefix(version: &str) -> String {
    if version.starts_with('v') {
        version.to_owned()
    } else {
        format!("v{version}")
    }
}
