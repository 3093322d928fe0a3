//! Prelude module for common timer types.
//!
//! This module provides a convenient way to import the most commonly used
//! types from the timer crate.

pub use crate::board::{BoardInfo, BoardProbe, FixedProbe, ProcfsProbe};
pub use crate::calibration::{CalibrationOffset, calibrate};
pub use crate::config::TimerConfig;
pub use crate::error::{TimerError, TimerResult};
pub use crate::jitter::JitterMetrics;
pub use crate::rt_setup::RtSetup;
pub use crate::sleep::{HybridSleeper, SleepTier, sleep};
pub use crate::timer::{Action, HighResolutionTimer, TimerStats};
pub use crate::MAX_DURATION;
