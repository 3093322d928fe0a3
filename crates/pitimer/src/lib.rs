//! Self-calibrating high-resolution periodic timer for single-board computers.
//!
//! Boards like the Raspberry Pi have no general-purpose high-resolution timer
//! API, and `nanosleep` wakes late by a roughly fixed amount. This crate
//! measures that overshoot once per process and combines compensated sleeps
//! with busy-waiting to fire a callback at sub-millisecond periods:
//!
//! - **Calibration**: averages the overshoot of 1000 one-millisecond sleeps
//! - **Hybrid sleep**: thread sleep, compensated `nanosleep`, or spin by delay
//! - **HighResolutionTimer**: dedicated-thread periodic callback with
//!   cooperative start/stop from any thread
//! - **Board probe**: the capability gate checked at construction
//! - **JitterMetrics**: fire-spacing statistics for validating a board
//!
//! # Example
//!
//! ```no_run
//! use pitimer::{HighResolutionTimer, ProcfsProbe, TimerConfig};
//! use std::time::Duration;
//!
//! let config = TimerConfig::builder()
//!     .interval(Duration::from_micros(250))
//!     .build()?;
//! let timer = HighResolutionTimer::with_config(config, &ProcfsProbe::default())?;
//! timer.set_callback(|| {
//!     // Toggle a GPIO, sample an ADC, ...
//! });
//! timer.start(Duration::ZERO)?;
//! # Ok::<(), pitimer::TimerError>(())
//! ```

#![deny(unsafe_op_in_unsafe_fn)]
#![deny(clippy::unwrap_used)]
#![deny(static_mut_refs)]
#![deny(unused_must_use)]

pub mod board;
pub mod calibration;
pub mod config;
pub mod error;
pub mod jitter;
pub mod platform;
pub mod rt_setup;
pub mod sleep;
pub mod timer;

pub mod prelude;

use std::time::Duration;

pub use board::{BoardInfo, BoardProbe, FixedProbe, ProcfsProbe};
pub use calibration::{CalibrationOffset, calibrate};
pub use config::{TimerConfig, TimerConfigBuilder};
pub use error::{TimerError, TimerResult};
pub use jitter::{JitterMetrics, JitterSummary};
pub use rt_setup::RtSetup;
pub use sleep::{HybridSleeper, SleepTier, sleep};
pub use timer::{Action, HighResolutionTimer, TimerStats};

/// Longest accepted interval or start delay: the 32-bit millisecond limit.
pub const MAX_DURATION: Duration = Duration::from_millis(u32::MAX as u64);

pub(crate) fn check_range(what: &'static str, duration: Duration) -> TimerResult<()> {
    if duration > MAX_DURATION {
        return Err(TimerError::out_of_range(what, duration));
    }
    Ok(())
}
