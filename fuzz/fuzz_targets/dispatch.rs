#![no_main]

use std::path::PathBuf;

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;

use faultline_core::scenario::{StepAction, Transfer};
use faultline_engine::{Backend, Dispatcher};

/// Structured input: one backend, one step action.
#[derive(Arbitrary, Debug)]
struct FuzzInput {
    backend: FuzzBackend,
    name: String,
    action: FuzzAction,
}

#[derive(Arbitrary, Debug)]
enum FuzzBackend {
    Minikube,
    Kind,
    K3d,
    Remote,
}

#[derive(Arbitrary, Debug)]
enum FuzzAction {
    Local(String),
    ControlPlane(String),
    Worker(String),
    Transfer {
        source: String,
        dest: String,
        target: String,
    },
}

fuzz_target!(|input: FuzzInput| {
    let backend = match input.backend {
        FuzzBackend::Minikube => Backend::Minikube { profile: input.name },
        FuzzBackend::Kind => Backend::Kind { cluster: input.name },
        FuzzBackend::K3d => Backend::K3d { cluster: input.name },
        FuzzBackend::Remote => Backend::Remote { host: input.name },
    };
    let dispatcher = Dispatcher::new(backend, "/scene");

    let action = match input.action {
        FuzzAction::Local(command) => StepAction::Local { command },
        FuzzAction::ControlPlane(command) => StepAction::ControlPlane { command },
        FuzzAction::Worker(command) => StepAction::Worker { command },
        FuzzAction::Transfer { source, dest, target } => StepAction::Transfer(Transfer {
            source: PathBuf::from(source),
            dest,
            target,
        }),
    };

    match (&action, dispatcher.resolve(&action)) {
        (StepAction::Worker { .. }, result) => assert!(result.is_err()),
        (StepAction::Local { command }, Ok(inv)) => assert_eq!(inv.args.last(), Some(command)),
        (_, result) => assert!(result.is_ok()),
    }
});
