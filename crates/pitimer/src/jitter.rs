//! Fire-spacing jitter measurement.
//!
//! Callers record the instant of every callback invocation; the metrics compare
//! each spacing against the target interval. Samples live in a bounded ring
//! buffer so recording never allocates once the buffer is full.

use serde::Serialize;
use std::time::{Duration, Instant};

/// Spacing further than this past the target counts as a late fire.
pub const LATE_TOLERANCE: Duration = Duration::from_micros(250);

const DEFAULT_MAX_SAMPLES: usize = 10_000;

/// Jitter statistics for a periodic timer.
#[derive(Debug, Clone)]
pub struct JitterMetrics {
    target_ns: u64,

    /// Number of spacings recorded.
    pub total_fires: u64,

    /// Spacings longer than target + [`LATE_TOLERANCE`].
    pub late_fires: u64,

    /// Largest absolute deviation seen, in nanoseconds.
    pub max_jitter_ns: u64,

    /// Most recent absolute deviation, in nanoseconds.
    pub last_jitter_ns: u64,

    jitter_sum: u128,
    jitter_sum_squared: f64,
    spacing_sum: u128,
    last_fire: Option<Instant>,

    samples: Vec<u64>,
    max_samples: usize,
    next_sample_index: usize,
    scratch: Vec<u64>,
}

impl JitterMetrics {
    /// Metrics against `target` with the default sample capacity.
    pub fn new(target: Duration) -> Self {
        Self::with_capacity(target, DEFAULT_MAX_SAMPLES)
    }

    /// Metrics retaining at most `max_samples` deviations for percentiles.
    pub fn with_capacity(target: Duration, max_samples: usize) -> Self {
        Self {
            target_ns: duration_ns(target),
            total_fires: 0,
            late_fires: 0,
            max_jitter_ns: 0,
            last_jitter_ns: 0,
            jitter_sum: 0,
            jitter_sum_squared: 0.0,
            spacing_sum: 0,
            last_fire: None,
            samples: Vec::with_capacity(max_samples),
            max_samples,
            next_sample_index: 0,
            scratch: Vec::with_capacity(max_samples),
        }
    }

    /// Target interval.
    pub fn target(&self) -> Duration {
        Duration::from_nanos(self.target_ns)
    }

    /// Record a fire at `at`. The first fire only sets the reference point.
    pub fn record_fire(&mut self, at: Instant) {
        if let Some(previous) = self.last_fire.replace(at) {
            self.record_spacing(at.saturating_duration_since(previous));
        }
    }

    /// Record the time between two consecutive fires.
    pub fn record_spacing(&mut self, spacing: Duration) {
        let spacing_ns = duration_ns(spacing);
        let jitter_ns = spacing_ns.abs_diff(self.target_ns);

        self.total_fires = self.total_fires.saturating_add(1);
        if spacing_ns > self.target_ns.saturating_add(duration_ns(LATE_TOLERANCE)) {
            self.late_fires = self.late_fires.saturating_add(1);
        }

        self.max_jitter_ns = self.max_jitter_ns.max(jitter_ns);
        self.last_jitter_ns = jitter_ns;
        self.jitter_sum = self.jitter_sum.saturating_add(u128::from(jitter_ns));
        self.jitter_sum_squared += (jitter_ns as f64).powi(2);
        self.spacing_sum = self.spacing_sum.saturating_add(u128::from(spacing_ns));

        if self.max_samples == 0 {
            return;
        }

        if self.samples.len() < self.max_samples {
            self.samples.push(jitter_ns);
        } else if let Some(slot) = self.samples.get_mut(self.next_sample_index) {
            *slot = jitter_ns;
            self.next_sample_index = (self.next_sample_index + 1) % self.max_samples;
        }
    }

    /// Mean absolute deviation from the target, in nanoseconds.
    pub fn mean_jitter_ns(&self) -> f64 {
        if self.total_fires == 0 {
            return 0.0;
        }
        self.jitter_sum as f64 / self.total_fires as f64
    }

    /// Root mean square deviation, in nanoseconds.
    pub fn rms_jitter_ns(&self) -> f64 {
        if self.total_fires == 0 {
            return 0.0;
        }
        (self.jitter_sum_squared / self.total_fires as f64).sqrt()
    }

    /// Mean observed spacing.
    pub fn mean_spacing(&self) -> Duration {
        if self.total_fires == 0 {
            return Duration::ZERO;
        }
        let mean = self.spacing_sum / u128::from(self.total_fires);
        Duration::from_nanos(u64::try_from(mean).unwrap_or(u64::MAX))
    }

    /// Fraction of fires that were late (0.0 to 1.0).
    pub fn late_fire_rate(&self) -> f64 {
        if self.total_fires == 0 {
            0.0
        } else {
            self.late_fires as f64 / self.total_fires as f64
        }
    }

    /// Percentile (0.0 to 1.0) of retained deviations, 0 if none.
    pub fn percentile_jitter_ns(&mut self, percentile: f64) -> u64 {
        if self.samples.is_empty() {
            return 0;
        }

        let percentile = percentile.clamp(0.0, 1.0);
        self.scratch.clear();
        self.scratch.extend_from_slice(&self.samples);

        let len = self.scratch.len();
        let index = ((len as f64 * percentile) as usize).min(len.saturating_sub(1));
        let (_, value, _) = self.scratch.select_nth_unstable(index);
        *value
    }

    /// Median deviation.
    pub fn p50_jitter_ns(&mut self) -> u64 {
        self.percentile_jitter_ns(0.50)
    }

    /// 99th percentile deviation.
    pub fn p99_jitter_ns(&mut self) -> u64 {
        self.percentile_jitter_ns(0.99)
    }

    /// Number of retained samples.
    pub fn sample_count(&self) -> usize {
        self.samples.len()
    }

    /// Snapshot for reporting.
    pub fn summary(&mut self) -> JitterSummary {
        JitterSummary {
            target_ns: self.target_ns,
            fires: self.total_fires,
            late_fires: self.late_fires,
            mean_spacing_ns: duration_ns(self.mean_spacing()),
            mean_jitter_ns: self.mean_jitter_ns(),
            rms_jitter_ns: self.rms_jitter_ns(),
            p50_jitter_ns: self.p50_jitter_ns(),
            p99_jitter_ns: self.p99_jitter_ns(),
            max_jitter_ns: self.max_jitter_ns,
        }
    }

    /// Clear everything except the target and capacity.
    pub fn reset(&mut self) {
        self.total_fires = 0;
        self.late_fires = 0;
        self.max_jitter_ns = 0;
        self.last_jitter_ns = 0;
        self.jitter_sum = 0;
        self.jitter_sum_squared = 0.0;
        self.spacing_sum = 0;
        self.last_fire = None;
        self.samples.clear();
        self.next_sample_index = 0;
        self.scratch.clear();
    }
}

/// Serializable jitter report.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JitterSummary {
    /// Target interval in nanoseconds.
    pub target_ns: u64,
    /// Spacings recorded.
    pub fires: u64,
    /// Late spacings.
    pub late_fires: u64,
    /// Mean spacing in nanoseconds.
    pub mean_spacing_ns: u64,
    /// Mean absolute deviation.
    pub mean_jitter_ns: f64,
    /// RMS deviation.
    pub rms_jitter_ns: f64,
    /// Median deviation.
    pub p50_jitter_ns: u64,
    /// 99th percentile deviation.
    pub p99_jitter_ns: u64,
    /// Worst deviation.
    pub max_jitter_ns: u64,
}

fn duration_ns(duration: Duration) -> u64 {
    u64::try_from(duration.as_nanos()).unwrap_or(u64::MAX)
}
