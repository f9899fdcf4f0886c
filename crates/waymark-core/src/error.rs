//! Error types for the acquisition pipeline.

use thiserror::Error;

/// Sensor-level errors that are surfaced to the caller for user
/// notification. Everything else the sensor reports is handled internally.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SensorError {
    /// The positioning service was denied or restricted. Tracking stops.
    #[error("positioning service disabled")]
    ServiceDisabled,

    /// Tracking works, but only while in the foreground. The caller should
    /// warn the user that background operation will not work.
    #[error("positioning only allowed in the foreground")]
    ForegroundOnly,
}

/// Failure to extract a usable record from a metadata response. Treated
/// identically to a fetch failure by the coordinator.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("malformed metadata document: {0}")]
    Json(#[from] serde_json::Error),

    #[error("metadata response contains no photos")]
    Empty,
}
