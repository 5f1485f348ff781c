//! faultline CLI library.
//!
//! Exposes the binary's modules for integration testing. In production
//! `faultline` is used as a binary (main.rs).

pub mod app;
pub mod cli;
pub mod error;
pub mod logging;
pub mod metrics_server;
