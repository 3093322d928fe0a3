//! Timer configuration.

use crate::error::{TimerError, TimerResult};
use crate::rt_setup::RtSetup;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default thread name for the timer thread.
pub const DEFAULT_THREAD_NAME: &str = "pitimer";

/// Timer configuration applied at construction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimerConfig {
    /// Period between callback invocations.
    pub interval: Duration,
    /// Delay before the first invocation of a run.
    pub start_delay: Duration,
    /// Name given to the dedicated timer thread.
    pub thread_name: String,
    /// Real-time settings the timer thread applies to itself.
    pub rt_setup: RtSetup,
}

impl Default for TimerConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(1),
            start_delay: Duration::ZERO,
            thread_name: DEFAULT_THREAD_NAME.to_string(),
            rt_setup: RtSetup::minimal(),
        }
    }
}

impl TimerConfig {
    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`TimerError::OutOfRange`] if a duration exceeds
    /// [`crate::MAX_DURATION`], or [`TimerError::InvalidConfiguration`] for an
    /// empty thread name or a SCHED_FIFO priority outside `1..=99`.
    pub fn validate(&self) -> TimerResult<()> {
        crate::check_range("interval", self.interval)?;
        crate::check_range("start delay", self.start_delay)?;
        if self.thread_name.trim().is_empty() {
            return Err(TimerError::invalid_configuration(
                "thread_name must not be empty",
            ));
        }
        if self.thread_name.contains('\0') {
            return Err(TimerError::invalid_configuration(
                "thread_name must not contain NUL bytes",
            ));
        }
        if self.rt_setup.high_priority && !self.rt_setup.priority_is_valid() {
            return Err(TimerError::invalid_configuration(format!(
                "rt_setup.priority {} is outside 1..=99",
                self.rt_setup.priority
            )));
        }
        Ok(())
    }

    /// Create a configuration builder.
    #[must_use]
    pub fn builder() -> TimerConfigBuilder {
        TimerConfigBuilder::default()
    }
}

/// Builder for `TimerConfig`.
#[derive(Debug, Default)]
pub struct TimerConfigBuilder {
    config: TimerConfig,
}

impl TimerConfigBuilder {
    /// Set the interval.
    #[must_use]
    pub fn interval(mut self, interval: Duration) -> Self {
        self.config.interval = interval;
        self
    }

    /// Set the start delay.
    #[must_use]
    pub fn start_delay(mut self, delay: Duration) -> Self {
        self.config.start_delay = delay;
        self
    }

    /// Set the timer thread name.
    #[must_use]
    pub fn thread_name(mut self, name: impl Into<String>) -> Self {
        self.config.thread_name = name.into();
        self
    }

    /// Set the real-time setup.
    #[must_use]
    pub fn rt_setup(mut self, setup: RtSetup) -> Self {
        self.config.rt_setup = setup;
        self
    }

    /// Build the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn build(self) -> TimerResult<TimerConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        assert!(TimerConfig::default().validate().is_ok());
    }

    #[test]
    fn test_builder() -> TimerResult<()> {
        let config = TimerConfig::builder()
            .interval(Duration::from_micros(250))
            .start_delay(Duration::from_millis(5))
            .thread_name("sampler")
            .build()?;

        assert_eq!(config.interval, Duration::from_micros(250));
        assert_eq!(config.start_delay, Duration::from_millis(5));
        assert_eq!(config.thread_name, "sampler");
        Ok(())
    }

    #[test]
    fn test_rejects_out_of_range_interval() {
        let result = TimerConfig::builder()
            .interval(crate::MAX_DURATION + Duration::from_millis(1))
            .build();
        assert!(matches!(
            result,
            Err(TimerError::OutOfRange {
                what: "interval",
                ..
            })
        ));
    }

    #[test]
    fn test_rejects_empty_thread_name() {
        let result = TimerConfig::builder().thread_name("  ").build();
        assert!(matches!(result, Err(TimerError::InvalidConfiguration(_))));
    }

    #[test]
    fn test_rejects_bad_priority_only_when_requested() {
        let bad = RtSetup::minimal().with_priority(0);
        assert!(TimerConfig::builder().rt_setup(bad.clone()).build().is_ok());

        let result = TimerConfig::builder()
            .rt_setup(bad.with_high_priority(true))
            .build();
        assert!(matches!(result, Err(TimerError::InvalidConfiguration(_))));
    }

    #[test]
    fn test_json_uses_defaults_for_missing_fields() -> Result<(), serde_json::Error> {
        let config: TimerConfig =
            serde_json::from_str(r#"{ "interval": { "secs": 0, "nanos": 500000 } }"#)?;
        assert_eq!(config.interval, Duration::from_micros(500));
        assert_eq!(config.thread_name, DEFAULT_THREAD_NAME);
        assert_eq!(config.rt_setup, RtSetup::minimal());
        Ok(())
    }
}
