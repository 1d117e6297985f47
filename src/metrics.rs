//! Metric helpers for `linebridge`.
//!
//! This module defines metric names and simple helper functions wrapping the
//! [`metrics`](https://docs.rs/metrics) crate. Without the `metrics` feature
//! the helpers compile to no-ops.

#[cfg(feature = "metrics")]
use metrics::{counter, gauge};

/// Name of the gauge reporting whether the outbound connection is up.
pub const CONNECTION_UP: &str = "linebridge_connection_up";
/// Name of the counter tracking forwarded frames by outcome.
pub const FRAMES_TOTAL: &str = "linebridge_frames_total";
/// Name of the counter tracking connect attempts by result.
pub const CONNECT_ATTEMPTS: &str = "linebridge_connect_attempts_total";
/// Name of the counter tracking failed serial reads.
pub const READ_ERRORS: &str = "linebridge_read_errors_total";

/// What happened to a frame handed to the forwarder.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Outcome {
    /// Every byte was written to the connection.
    Delivered,
    /// The frame was discarded.
    Dropped,
}

impl Outcome {
    /// Label value used for this outcome.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Outcome::Delivered => "delivered",
            Outcome::Dropped => "dropped",
        }
    }
}

/// Record the outcome of forwarding one frame.
pub fn inc_frames(outcome: Outcome) {
    #[cfg(feature = "metrics")]
    counter!(FRAMES_TOTAL, "outcome" => outcome.as_str()).increment(1);
    #[cfg(not(feature = "metrics"))]
    let _ = outcome;
}

/// Record a connect attempt.
pub fn inc_connect_attempts(succeeded: bool) {
    #[cfg(feature = "metrics")]
    counter!(CONNECT_ATTEMPTS, "result" => if succeeded { "ok" } else { "error" }).increment(1);
    #[cfg(not(feature = "metrics"))]
    let _ = succeeded;
}

/// Record a failed serial read.
pub fn inc_read_errors() {
    #[cfg(feature = "metrics")]
    counter!(READ_ERRORS).increment(1);
}

/// Publish whether the outbound connection is currently established.
pub fn set_connected(connected: bool) {
    #[cfg(feature = "metrics")]
    gauge!(CONNECTION_UP).set(if connected { 1.0 } else { 0.0 });
    #[cfg(not(feature = "metrics"))]
    let _ = connected;
}
