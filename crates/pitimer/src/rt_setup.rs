//! Real-time configuration for the timer thread.

use serde::{Deserialize, Serialize};

/// Default SCHED_FIFO priority for the timer thread.
pub const DEFAULT_RT_PRIORITY: i32 = 80;

/// Real-time parameters applied by the timer thread to itself when it starts.
///
/// None of these are required for correct firing; they only reduce the wake
/// latency the calibrator has to absorb. Failures are logged and ignored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RtSetup {
    /// Request SCHED_FIFO scheduling on Linux.
    pub high_priority: bool,

    /// SCHED_FIFO priority (1..=99) used when `high_priority` is set.
    pub priority: i32,

    /// Lock current and future pages to avoid page faults while spinning.
    pub lock_memory: bool,
}

impl Default for RtSetup {
    fn default() -> Self {
        Self {
            high_priority: true,
            priority: DEFAULT_RT_PRIORITY,
            lock_memory: true,
        }
    }
}

impl RtSetup {
    /// Create a new RtSetup with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// No special configuration.
    pub fn minimal() -> Self {
        Self {
            high_priority: false,
            priority: DEFAULT_RT_PRIORITY,
            lock_memory: false,
        }
    }

    /// Settings for test runs: never touches scheduler class or locked memory.
    pub fn testing() -> Self {
        Self::minimal()
    }

    /// Set high priority.
    #[must_use]
    pub fn with_high_priority(mut self, enabled: bool) -> Self {
        self.high_priority = enabled;
        self
    }

    /// Set the SCHED_FIFO priority.
    #[must_use]
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// Set memory locking.
    #[must_use]
    pub fn with_lock_memory(mut self, enabled: bool) -> Self {
        self.lock_memory = enabled;
        self
    }

    /// Check if any RT features are enabled.
    pub fn has_rt_features(&self) -> bool {
        self.high_priority || self.lock_memory
    }

    /// Whether the priority is inside the SCHED_FIFO range.
    pub fn priority_is_valid(&self) -> bool {
        (1..=99).contains(&self.priority)
    }
}

/// What the platform actually applied for an [`RtSetup`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RtSetupOutcome {
    /// SCHED_FIFO took effect.
    pub priority_applied: bool,
    /// `mlockall` succeeded.
    pub memory_locked: bool,
}

impl RtSetupOutcome {
    /// Names of requested features that did not take effect.
    pub fn missing(&self, requested: &RtSetup) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if requested.high_priority && !self.priority_applied {
            missing.push("high_priority");
        }
        if requested.lock_memory && !self.memory_locked {
            missing.push("lock_memory");
        }
        missing
    }
}
