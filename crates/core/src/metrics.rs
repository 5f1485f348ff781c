//! Metric names and descriptions.
//!
//! Every crate records through the `metrics` facade using these constants.
//! Without an installed recorder the macros are no-ops.
//!
//! # Naming
//!
//! - prefix: `faultline_`
//! - suffix: `_total` (counter), `_seconds` (histogram), none (gauge)

use metrics::{describe_counter, describe_gauge, describe_histogram};

/// Result label key (success, non_zero_exit, timeout, unsupported, spawn).
pub const LABEL_RESULT: &str = "result";

/// Step action label key (local, control-plane, worker, transfer).
pub const LABEL_KIND: &str = "kind";

/// Step mode label key (foreground, background).
pub const LABEL_MODE: &str = "mode";

/// Executed steps (counter, labels: kind, mode, result).
pub const STEPS_TOTAL: &str = "faultline_steps_total";

/// Per-step wall-clock duration (histogram, seconds, label: kind).
pub const STEP_DURATION_SECONDS: &str = "faultline_step_duration_seconds";

/// Background steps launched and not yet finished (gauge).
pub const BACKGROUND_STEPS_LIVE: &str = "faultline_background_steps_live";

/// Provisioning attempts (counter, label: result).
pub const PROVISION_TOTAL: &str = "faultline_provision_total";

/// Provisioning duration (histogram, seconds).
pub const PROVISION_DURATION_SECONDS: &str = "faultline_provision_duration_seconds";

/// Register descriptions with the installed recorder.
///
/// Call once, right after installing a recorder.
pub fn describe_all() {
    describe_counter!(STEPS_TOTAL, "Scenario steps executed, by action kind, mode and result");
    describe_histogram!(
        STEP_DURATION_SECONDS,
        metrics::Unit::Seconds,
        "Wall-clock duration of each step's external command"
    );
    describe_gauge!(
        BACKGROUND_STEPS_LIVE,
        "Background steps launched and still running"
    );
    describe_counter!(PROVISION_TOTAL, "Cluster provisioning attempts, by result");
    describe_histogram!(
        PROVISION_DURATION_SECONDS,
        metrics::Unit::Seconds,
        "Wall-clock duration of the provisioning command"
    );
}
