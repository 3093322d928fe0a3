//! Error types for the timer crate.

use std::time::Duration;
use thiserror::Error;

/// Errors surfaced synchronously by timer construction and control calls.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TimerError {
    /// The host failed the board capability gate.
    #[error("High-resolution timer not supported on this host: {board}")]
    NotSupported {
        /// Board description reported by the probe.
        board: String,
    },

    /// A duration exceeds the 32-bit millisecond ceiling of the sleep API.
    #[error("{what} of {requested:?} exceeds the maximum of {max:?}")]
    OutOfRange {
        /// Which argument was rejected.
        what: &'static str,
        /// The rejected duration.
        requested: Duration,
        /// The largest accepted duration.
        max: Duration,
    },

    /// A configuration value is invalid.
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// The OS refused to create the timer thread.
    #[error("Failed to spawn timer thread: {0}")]
    ThreadSpawn(String),
}

impl TimerError {
    /// Create a not supported error.
    #[must_use]
    pub fn not_supported(board: impl Into<String>) -> Self {
        Self::NotSupported {
            board: board.into(),
        }
    }

    /// Create an out of range error against [`crate::MAX_DURATION`].
    #[must_use]
    pub fn out_of_range(what: &'static str, requested: Duration) -> Self {
        Self::OutOfRange {
            what,
            requested,
            max: crate::MAX_DURATION,
        }
    }

    /// Create an invalid configuration error.
    #[must_use]
    pub fn invalid_configuration(reason: impl Into<String>) -> Self {
        Self::InvalidConfiguration(reason.into())
    }
}

/// A specialized `Result` type for timer operations.
pub type TimerResult<T = ()> = Result<T, TimerError>;
