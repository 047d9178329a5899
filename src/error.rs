//! Error types for the drive library

use std::time::Duration;

/// Result type alias
pub type Result<T> = std::result::Result<T, DriveError>;

/// Errors raised by the drive controller and its collaborators
#[derive(Debug, thiserror::Error)]
pub enum DriveError {
    /// Rejected before any motor command was issued
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The motor/encoder channel reported a fault
    #[error("Hardware unavailable on port {port}: {reason}")]
    HardwareUnavailable { port: u8, reason: String },

    /// Motion stopped by a cancel token
    #[error("Motion cancelled at left={left_ticks}, right={right_ticks} ticks")]
    Cancelled { left_ticks: i64, right_ticks: i64 },

    /// Motion stopped because its deadline passed
    #[error("Motion timed out after {elapsed:?} at left={left_ticks}, right={right_ticks} ticks")]
    TimedOut {
        elapsed: Duration,
        left_ticks: i64,
        right_ticks: i64,
    },

    /// Configuration rejected or unreadable
    #[error("Config error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl DriveError {
    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        DriveError::InvalidArgument(msg.into())
    }

    /// True for errors raised before the motors were touched
    pub fn is_invalid_argument(&self) -> bool {
        matches!(self, DriveError::InvalidArgument(_))
    }
}
