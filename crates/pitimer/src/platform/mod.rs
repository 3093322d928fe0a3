//! Platform boundary for the coarse sleep primitive and timer thread setup.

#[cfg(target_os = "linux")]
mod linux;

#[cfg(not(target_os = "linux"))]
mod fallback;

#[cfg(target_os = "linux")]
pub(crate) use linux::{apply_rt_setup, coarse_sleep};

#[cfg(not(target_os = "linux"))]
pub(crate) use fallback::{apply_rt_setup, coarse_sleep};

use std::time::Duration;

/// Result of one call into the coarse sleep primitive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SleepOutcome {
    /// The full requested time elapsed.
    Completed,
    /// A signal woke the thread early. Callers do not retry.
    Interrupted {
        /// Time left on the request when the sleep was cut short.
        remaining: Duration,
    },
    /// The call was rejected outright (raw OS error code).
    Failed(i32),
}

/// A nanosecond-granularity sleep with a fixed but unknown wake latency.
///
/// The calibrator measures implementations of this trait; the hybrid sleeper
/// uses [`NanoSleep`] for its medium tier.
pub trait CoarseSleep {
    /// Sleep for `nanos` nanoseconds, once, without retrying.
    fn sleep_ns(&self, nanos: u64) -> SleepOutcome;
}

/// The OS `nanosleep` call (thread sleep on hosts without it).
#[derive(Debug, Default, Clone, Copy)]
pub struct NanoSleep;

impl CoarseSleep for NanoSleep {
    #[inline]
    fn sleep_ns(&self, nanos: u64) -> SleepOutcome {
        coarse_sleep(Duration::from_nanos(nanos))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[test]
    fn test_nanosleep_waits_at_least_requested() {
        let start = Instant::now();
        let outcome = NanoSleep.sleep_ns(2_000_000);
        let elapsed = start.elapsed();

        if outcome == SleepOutcome::Completed {
            assert!(elapsed >= Duration::from_millis(2), "elapsed {elapsed:?}");
        }
    }

    #[test]
    fn test_zero_sleep_completes() {
        assert_eq!(NanoSleep.sleep_ns(0), SleepOutcome::Completed);
    }
}
