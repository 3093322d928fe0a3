//! Hybrid sleeper: OS sleep, offset-corrected nanosleep, or busy-spin.
//!
//! The tier is picked from the requested delay alone:
//!
//! | delay                | strategy                                    |
//! |----------------------|---------------------------------------------|
//! | `>= 100 ms`          | `std::thread::sleep`                        |
//! | `(450 us, 100 ms)`   | one `nanosleep` of `delay - offset`         |
//! | `<= 450 us`          | spin on the monotonic clock, never yielding |
//!
//! Below roughly half a millisecond the call and wake latency of `nanosleep`
//! swamps the request, so those delays are spun. The spin
//! tier is capped at [`SPIN_THRESHOLD`].

use crate::calibration::{CalibrationOffset, calibrate};
use crate::platform::{CoarseSleep, NanoSleep, SleepOutcome};
use std::time::{Duration, Instant};
use tracing::trace;

/// Delays at or above this use a plain thread sleep.
pub const COARSE_THRESHOLD: Duration = Duration::from_millis(100);

/// Delays at or below this are busy-waited.
pub const SPIN_THRESHOLD: Duration = Duration::from_micros(450);

/// Strategy used for one sleep request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SleepTier {
    /// Plain OS thread sleep; precision limited to OS granularity.
    Coarse,
    /// Single `nanosleep` shortened by the calibration offset.
    Compensated,
    /// Tight polling loop on the monotonic clock.
    Spin,
}

impl SleepTier {
    /// Tier that serves `delay`.
    #[inline]
    pub fn for_delay(delay: Duration) -> Self {
        if delay >= COARSE_THRESHOLD {
            Self::Coarse
        } else if delay > SPIN_THRESHOLD {
            Self::Compensated
        } else {
            Self::Spin
        }
    }

    /// Whether this tier suspends the calling thread.
    #[inline]
    pub fn suspends(self) -> bool {
        !matches!(self, Self::Spin)
    }
}

/// Sleeper bound to one calibration offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HybridSleeper {
    offset: CalibrationOffset,
}

impl HybridSleeper {
    /// Sleeper using the process-wide offset, calibrating on first use.
    pub fn calibrated() -> Self {
        Self {
            offset: calibrate(),
        }
    }

    /// Sleeper with an explicit offset.
    pub const fn with_offset(offset: CalibrationOffset) -> Self {
        Self { offset }
    }

    /// The offset subtracted from medium-tier requests.
    #[inline]
    pub fn offset(&self) -> CalibrationOffset {
        self.offset
    }

    /// Block for approximately `delay` and report the tier used.
    pub fn sleep(&self, delay: Duration) -> SleepTier {
        self.sleep_on(&NanoSleep, delay)
    }

    /// Like [`HybridSleeper::sleep`], serving the compensated tier with
    /// `coarse` instead of the OS primitive.
    pub fn sleep_on<S>(&self, coarse: &S, delay: Duration) -> SleepTier
    where
        S: CoarseSleep + ?Sized,
    {
        let tier = SleepTier::for_delay(delay);
        match tier {
            SleepTier::Coarse => std::thread::sleep(delay),
            SleepTier::Compensated => {
                let requested = u64::try_from(delay.as_nanos()).unwrap_or(u64::MAX);
                match coarse.sleep_ns(self.offset.compensate(requested)) {
                    SleepOutcome::Completed => {}
                    SleepOutcome::Interrupted { remaining } => {
                        trace!(?delay, ?remaining, "nanosleep interrupted");
                    }
                    SleepOutcome::Failed(code) => {
                        trace!(?delay, code, "nanosleep rejected");
                    }
                }
            }
            SleepTier::Spin => spin_for(delay),
        }
        tier
    }
}

impl Default for HybridSleeper {
    fn default() -> Self {
        Self::calibrated()
    }
}

/// Busy-wait until `delay` has elapsed. Never returns early.
#[inline]
pub fn spin_for(delay: Duration) {
    let start = Instant::now();
    while start.elapsed() < delay {
        std::hint::spin_loop();
    }
}

/// Block the calling thread for approximately `delay`.
///
/// The first call in a process runs the calibrator, which takes about a second.
pub fn sleep(delay: Duration) {
    HybridSleeper::calibrated().sleep(delay);
}
