//! Error types for analysis operations.

use thiserror::Error;

/// Result type for analysis operations.
pub type AnalysisResult<T> = Result<T, AnalysisError>;

/// Errors raised by the synchronous analysis core.
#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("Coordinate ({x}, {y}) is outside the {width}x{height} pitch")]
    InvalidZoneCoordinate {
        x: f64,
        y: f64,
        width: f64,
        height: f64,
    },

    #[error("Zone {zone} does not exist on a grid of {zone_count} zones")]
    InvalidZone { zone: u16, zone_count: u16 },

    #[error("Out-of-order input: timestamp {timestamp} is before {last_timestamp}")]
    OutOfOrder { timestamp: f64, last_timestamp: f64 },

    #[error("Non-finite timestamp: {0}")]
    InvalidTimestamp(f64),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl AnalysisError {
    /// Create an invalid configuration error.
    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::InvalidConfig(msg.into())
    }

    /// Create an out-of-order error.
    pub fn out_of_order(timestamp: f64, last_timestamp: f64) -> Self {
        Self::OutOfOrder {
            timestamp,
            last_timestamp,
        }
    }
}
