//! One-time measurement of the coarse sleep primitive's wake overshoot.
//!
//! The offset is measured lazily on first use and never recomputed. Once
//! initialized it is plain immutable data, so readers on any thread can use it
//! without further synchronization.

use crate::platform::{CoarseSleep, NanoSleep, SleepOutcome};
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;
use std::time::Instant;
use tracing::{debug, trace};

/// Number of 1 ms sleeps averaged by [`calibrate`].
pub const CALIBRATION_SAMPLES: u32 = 1000;

/// Duration requested from the coarse sleep primitive per sample.
pub const CALIBRATION_REQUEST_NS: u64 = 1_000_000;

static OFFSET: OnceLock<CalibrationOffset> = OnceLock::new();

/// Average amount (ns) by which the coarse sleep primitive overshoots a request.
///
/// Subtracted from medium-tier sleep requests so that the actual elapsed time
/// converges on the requested delay.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CalibrationOffset(i64);

impl CalibrationOffset {
    /// No correction.
    pub const ZERO: Self = Self(0);

    /// Wrap a raw nanosecond offset.
    #[inline]
    pub const fn from_nanos(nanos: i64) -> Self {
        Self(nanos)
    }

    /// The offset in nanoseconds. Negative means the primitive wakes early.
    #[inline]
    pub const fn as_nanos(self) -> i64 {
        self.0
    }

    /// Mean of the per-sample overshoots, rounded half away from zero.
    pub fn from_overshoots<I>(overshoots: I) -> Self
    where
        I: IntoIterator<Item = i64>,
    {
        let (sum, count) = overshoots
            .into_iter()
            .fold((0i128, 0i128), |(sum, count), sample| {
                (sum.saturating_add(i128::from(sample)), count.saturating_add(1))
            });

        if count == 0 {
            return Self::ZERO;
        }

        let half = count / 2;
        let rounded = if sum >= 0 {
            sum.saturating_add(half) / count
        } else {
            sum.saturating_sub(half) / count
        };

        let clamped = rounded.clamp(i128::from(i64::MIN), i128::from(i64::MAX));
        Self(i64::try_from(clamped).unwrap_or_default())
    }

    /// Nanoseconds to request so the real sleep lands on `requested_ns`.
    ///
    /// Never negative: an overshoot larger than the request clamps to zero.
    #[inline]
    pub fn compensate(self, requested_ns: u64) -> u64 {
        let adjusted = i128::from(requested_ns).saturating_sub(i128::from(self.0));
        u64::try_from(adjusted.max(0)).unwrap_or(u64::MAX)
    }
}

/// Run the calibration algorithm against any coarse sleep implementation.
///
/// Each sample requests exactly [`CALIBRATION_REQUEST_NS`] and records how much
/// longer the call actually took on the monotonic clock.
pub fn calibrate_with<S>(sleeper: &S, samples: u32) -> CalibrationOffset
where
    S: CoarseSleep + ?Sized,
{
    let request = i128::from(CALIBRATION_REQUEST_NS);

    CalibrationOffset::from_overshoots((0..samples).map(|_| {
        let start = Instant::now();
        let outcome = sleeper.sleep_ns(CALIBRATION_REQUEST_NS);
        let actual = i128::try_from(start.elapsed().as_nanos()).unwrap_or(i128::MAX);

        if let SleepOutcome::Interrupted { remaining } = outcome {
            trace!(?remaining, "Calibration sample interrupted");
        }

        let overshoot = actual.saturating_sub(request);
        i64::try_from(overshoot.clamp(i128::from(i64::MIN), i128::from(i64::MAX)))
            .unwrap_or_default()
    }))
}

/// The process-wide calibration offset, measured on first call.
///
/// The first call blocks for roughly [`CALIBRATION_SAMPLES`] milliseconds.
pub fn calibrate() -> CalibrationOffset {
    *OFFSET.get_or_init(|| {
        let started = Instant::now();
        let offset = calibrate_with(&NanoSleep, CALIBRATION_SAMPLES);
        debug!(
            offset_ns = offset.as_nanos(),
            samples = CALIBRATION_SAMPLES,
            elapsed = ?started.elapsed(),
            "Calibrated coarse sleep overshoot"
        );
        offset
    })
}

/// The offset if calibration already ran, without triggering it.
pub fn calibration_offset() -> Option<CalibrationOffset> {
    OFFSET.get().copied()
}
