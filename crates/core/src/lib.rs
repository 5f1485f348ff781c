#![doc = include_str!("../README.md")]

pub mod config;
pub mod error;
pub mod metrics;
pub mod scenario;
pub mod types;

// --- re-exports ---

// errors
pub use error::{ConfigError, FaultlineError, ScenarioError};

// config
pub use config::FaultlineConfig;

// scenario model
pub use scenario::{Requirements, Scenario, Scene, Step, StepAction, Transfer};

// execution types
pub use types::{ExecutionResult, Invocation};
