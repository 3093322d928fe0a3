//! Fallback implementation for hosts other than Linux.

use super::SleepOutcome;
use crate::rt_setup::{RtSetup, RtSetupOutcome};
use std::time::Duration;

/// Coarse sleep using the standard library.
pub(crate) fn coarse_sleep(duration: Duration) -> SleepOutcome {
    std::thread::sleep(duration);
    SleepOutcome::Completed
}

/// Real-time setup is not available; nothing is applied.
pub(crate) fn apply_rt_setup(_setup: &RtSetup) -> RtSetupOutcome {
    RtSetupOutcome::default()
}
