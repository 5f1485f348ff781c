#![doc = include_str!("../README.md")]

pub mod backend;
pub mod dispatch;
pub mod error;
pub mod executor;
pub mod provision;
pub mod runner;

pub use backend::Backend;
pub use dispatch::Dispatcher;
pub use error::{EngineError, StepError};
pub use executor::{CommandRunner, ProcessRunner};
pub use provision::Provisioner;
pub use runner::{Plan, PlannedStep, RunOptions, RunOutcome, RunState, ScenarioRunner};
