//! Step dispatch: turn a declared step into a concrete [`Invocation`].
//!
//! [`Dispatcher::resolve`] is pure. It performs no I/O, not even to check
//! whether a transfer source exists; the copy tool reports that.

use std::path::{Path, PathBuf};

use faultline_core::scenario::{Requirements, StepAction};
use faultline_core::types::Invocation;

use crate::backend::Backend;
use crate::error::StepError;

/// Shell used for `local` steps.
const SHELL: &str = "sh";

/// Resolves steps against one backend and one base directory.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    backend: Backend,
    /// Scene directory. Fixed for the lifetime of the dispatcher.
    base_dir: PathBuf,
}

impl Dispatcher {
    pub fn new(backend: Backend, base_dir: impl Into<PathBuf>) -> Self {
        Self {
            backend,
            base_dir: base_dir.into(),
        }
    }

    pub fn backend(&self) -> &Backend {
        &self.backend
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Resolve one step action.
    ///
    /// # Errors
    ///
    /// `StepError::UnsupportedVariant` for `worker` steps, which have no
    /// node resolver yet.
    pub fn resolve(&self, action: &StepAction) -> Result<Invocation, StepError> {
        let invocation = match action {
            StepAction::Local { command } => Invocation::new(SHELL, ["-c", command.as_str()]),
            StepAction::ControlPlane { command } => self.backend.control_plane_exec(command),
            StepAction::Worker { .. } => {
                return Err(StepError::UnsupportedVariant {
                    kind: action.kind(),
                });
            }
            StepAction::Transfer(transfer) => {
                let source = self.resolve_path(&transfer.source);
                let node = self.backend.resolve_node(&transfer.target);
                self.backend.copy_to_node(&source, &node, &transfer.dest)
            }
        };
        Ok(invocation.in_dir(&self.base_dir))
    }

    /// The provisioning invocation, run from the base directory.
    pub fn provision(&self, requirements: &Requirements) -> Invocation {
        self.backend.provision(requirements).in_dir(&self.base_dir)
    }

    fn resolve_path(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_dir.join(path)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use faultline_core::scenario::Transfer;
    use proptest::prelude::*;

    fn minikube() -> Dispatcher {
        Dispatcher::new(
            Backend::Minikube {
                profile: "minikube".to_owned(),
            },
            "/scenes/005",
        )
    }

    #[test]
    fn local_runs_through_shell_verbatim() {
        let inv = minikube()
            .resolve(&StepAction::Local {
                command: "kubectl get pods | grep -c Running".to_owned(),
            })
            .unwrap();
        assert_eq!(inv.program, "sh");
        assert_eq!(inv.args, vec!["-c", "kubectl get pods | grep -c Running"]);
        assert_eq!(inv.working_dir, Some(PathBuf::from("/scenes/005")));
    }

    #[test]
    fn control_plane_uses_backend_remote_exec() {
        let inv = minikube()
            .resolve(&StepAction::ControlPlane {
                command: "sudo pkill etcd".to_owned(),
            })
            .unwrap();
        assert_eq!(
            inv.argv(),
            vec!["minikube", "-p", "minikube", "ssh", "sudo pkill etcd"]
        );
    }

    #[test]
    fn worker_is_unsupported() {
        let err = minikube()
            .resolve(&StepAction::Worker {
                command: "uptime".to_owned(),
            })
            .unwrap_err();
        assert!(matches!(
            err,
            StepError::UnsupportedVariant { kind: "worker" }
        ));
    }

    #[test]
    fn transfer_resolves_relative_source_against_base_dir() {
        let inv = minikube()
            .resolve(&StepAction::Transfer(Transfer {
                source: PathBuf::from("payload/fill.sh"),
                dest: "/tmp/fill.sh".to_owned(),
                target: String::new(),
            }))
            .unwrap();
        assert_eq!(
            inv.argv(),
            vec![
                "minikube",
                "-p",
                "minikube",
                "cp",
                "/scenes/005/payload/fill.sh",
                "minikube:/tmp/fill.sh"
            ]
        );
    }

    #[test]
    fn transfer_keeps_absolute_source_and_named_target() {
        let dispatcher = Dispatcher::new(
            Backend::Kind {
                cluster: "faultline".to_owned(),
            },
            "/scenes/005",
        );
        let inv = dispatcher
            .resolve(&StepAction::Transfer(Transfer {
                source: PathBuf::from("/opt/payload.sh"),
                dest: "/root/payload.sh".to_owned(),
                target: "faultline-worker".to_owned(),
            }))
            .unwrap();
        assert_eq!(
            inv.argv(),
            vec![
                "docker",
                "cp",
                "/opt/payload.sh",
                "faultline-worker:/root/payload.sh"
            ]
        );
    }

    #[test]
    fn provision_runs_from_base_dir() {
        let inv = minikube().provision(&Requirements::default());
        assert_eq!(inv.program, "minikube");
        assert_eq!(inv.working_dir, Some(PathBuf::from("/scenes/005")));
    }

    proptest! {
        #[test]
        fn local_command_is_never_rewritten(command in "\\PC{1,64}") {
            let inv = minikube()
                .resolve(&StepAction::Local { command: command.clone() })
                .unwrap();
            prop_assert_eq!(inv.args.len(), 2);
            prop_assert_eq!(&inv.args[1], &command);
        }

        #[test]
        fn control_plane_command_is_last_argument(command in "\\PC{1,64}") {
            for backend in [
                Backend::Minikube { profile: "minikube".to_owned() },
                Backend::Kind { cluster: "c".to_owned() },
                Backend::K3d { cluster: "c".to_owned() },
                Backend::Remote { host: "h".to_owned() },
            ] {
                let inv = Dispatcher::new(backend, "/")
                    .resolve(&StepAction::ControlPlane { command: command.clone() })
                    .unwrap();
                prop_assert_eq!(inv.args.last(), Some(&command));
            }
        }
    }
}
