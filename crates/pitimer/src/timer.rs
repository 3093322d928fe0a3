//! Periodic high-resolution timer on a dedicated thread.
//!
//! Each run owns one OS thread that sleeps through the [`HybridSleeper`] and
//! then fires the stored action, until its generation number stops matching
//! the engine's active generation. Stopping never joins or kills the thread:
//! it clears the active generation and the thread leaves at its next check.
//!
//! # Thread Safety
//!
//! `start`, `stop`, `set_interval` and `set_action` may be called from any
//! thread, including from inside the action itself. The start/stop transition
//! and every caller-side write happen under one per-instance mutex. The timer
//! thread never takes that mutex: it reads the interval atomically and clones
//! the action out of a read lock at each cycle boundary.
//!
//! Invocations never overlap. A thread fires only while holding the engine's
//! fire lock and only if it still owns the active generation once the lock is
//! held, so a thread started by a restart waits for an outgoing action to
//! return. Callers never take the fire lock.

use crate::board::{BoardProbe, ProcfsProbe};
use crate::config::TimerConfig;
use crate::error::{TimerError, TimerResult};
use crate::platform;
use crate::rt_setup::RtSetup;
use crate::sleep::HybridSleeper;
use parking_lot::{Mutex, RwLock};
use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, error, warn};

/// Callback fired on every timer cycle.
pub type Action = Arc<dyn Fn() + Send + Sync + 'static>;

/// Generation value meaning "no thread may fire".
const STOPPED: u64 = 0;

/// Counters describing a timer's lifetime so far.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TimerStats {
    /// Cycles completed, with or without an action set.
    pub fires: u64,
    /// Actions that panicked. The timer keeps running after each.
    pub callback_panics: u64,
    /// Restarts caused by changing the interval while running.
    pub restarts: u64,
}

/// State shared with the timer thread.
struct Shared {
    interval_ns: AtomicU64,
    action: RwLock<Option<Action>>,
    active: AtomicU64,
    fire_lock: Mutex<()>,
    fires: AtomicU64,
    callback_panics: AtomicU64,
    restarts: AtomicU64,
}

impl Shared {
    fn interval(&self) -> Duration {
        Duration::from_nanos(self.interval_ns.load(Ordering::Acquire))
    }

    fn owns(&self, generation: u64) -> bool {
        self.active.load(Ordering::Acquire) == generation
    }

    /// Invoke the action once if `generation` still owns the engine.
    fn fire(&self, generation: u64) {
        let _firing = self.fire_lock.lock();
        if !self.owns(generation) {
            return;
        }

        let action = self.action.read().clone();
        if let Some(action) = action {
            if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| action())) {
                self.callback_panics.fetch_add(1, Ordering::Relaxed);
                error!(
                    panic = panic_message(payload.as_ref()),
                    "Timer callback panicked; continuing"
                );
            }
        }
        self.fires.fetch_add(1, Ordering::Relaxed);
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&str>() {
        *message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.as_str()
    } else {
        "non-string panic payload"
    }
}

/// Caller-side run state, guarded by the engine mutex.
struct RunState {
    handle: Option<JoinHandle<()>>,
    last_generation: u64,
    start_delay: Duration,
}

/// Self-calibrating periodic timer with sub-millisecond accuracy.
///
/// # Example
///
/// ```no_run
/// use pitimer::HighResolutionTimer;
/// use std::time::Duration;
///
/// let timer = HighResolutionTimer::new()?;
/// timer.set_interval(Duration::from_micros(500))?;
/// timer.set_callback(|| { /* sample a sensor */ });
/// timer.start(Duration::ZERO)?;
/// # Ok::<(), pitimer::TimerError>(())
/// ```
pub struct HighResolutionTimer {
    shared: Arc<Shared>,
    run: Mutex<RunState>,
    sleeper: HybridSleeper,
    thread_name: String,
    rt_setup: RtSetup,
}

impl HighResolutionTimer {
    /// Timer with default configuration, gated on the procfs board probe.
    ///
    /// # Errors
    ///
    /// Returns [`TimerError::NotSupported`] when the host is not a supported board.
    pub fn new() -> TimerResult<Self> {
        Self::with_probe(&ProcfsProbe::default())
    }

    /// Timer with default configuration, gated on `probe`.
    ///
    /// # Errors
    ///
    /// Returns [`TimerError::NotSupported`] when `probe` rejects the host.
    pub fn with_probe(probe: &dyn BoardProbe) -> TimerResult<Self> {
        Self::with_config(TimerConfig::default(), probe)
    }

    /// Timer built from `config`, gated on `probe`.
    ///
    /// Runs the calibrator if this is the first timer in the process.
    ///
    /// # Errors
    ///
    /// Returns [`TimerError::NotSupported`] when `probe` rejects the host, or
    /// the validation error of `config`.
    pub fn with_config(config: TimerConfig, probe: &dyn BoardProbe) -> TimerResult<Self> {
        Self::build(config, probe, None)
    }

    /// Timer using an explicit sleeper instead of the process-wide calibration.
    ///
    /// # Errors
    ///
    /// Same as [`HighResolutionTimer::with_config`].
    pub fn with_sleeper(
        config: TimerConfig,
        probe: &dyn BoardProbe,
        sleeper: HybridSleeper,
    ) -> TimerResult<Self> {
        Self::build(config, probe, Some(sleeper))
    }

    fn build(
        config: TimerConfig,
        probe: &dyn BoardProbe,
        sleeper: Option<HybridSleeper>,
    ) -> TimerResult<Self> {
        if !probe.is_supported() {
            let board = probe.board_info().describe();
            warn!(%board, "High-resolution timer not supported on this board");
            return Err(TimerError::not_supported(board));
        }
        config.validate()?;

        let sleeper = sleeper.unwrap_or_else(HybridSleeper::calibrated);
        debug!(
            interval = ?config.interval,
            offset_ns = sleeper.offset().as_nanos(),
            "Created high-resolution timer"
        );

        Ok(Self {
            shared: Arc::new(Shared {
                interval_ns: AtomicU64::new(duration_ns(config.interval)),
                action: RwLock::new(None),
                active: AtomicU64::new(STOPPED),
                fire_lock: Mutex::new(()),
                fires: AtomicU64::new(0),
                callback_panics: AtomicU64::new(0),
                restarts: AtomicU64::new(0),
            }),
            run: Mutex::new(RunState {
                handle: None,
                last_generation: STOPPED,
                start_delay: config.start_delay,
            }),
            sleeper,
            thread_name: config.thread_name,
            rt_setup: config.rt_setup,
        })
    }

    /// Change the interval.
    ///
    /// When running, the timer restarts with no start delay so the new
    /// interval applies immediately. An action already running on the outgoing
    /// thread finishes before the new thread fires.
    ///
    /// # Errors
    ///
    /// Returns [`TimerError::OutOfRange`] above [`crate::MAX_DURATION`], leaving
    /// the timer untouched, or [`TimerError::ThreadSpawn`] if the restart could
    /// not create a thread (the timer is then stopped).
    pub fn set_interval(&self, interval: Duration) -> TimerResult<()> {
        crate::check_range("interval", interval)?;

        let mut run = self.run.lock();
        self.shared
            .interval_ns
            .store(duration_ns(interval), Ordering::Release);

        if run.handle.is_some() {
            self.halt(&mut run);
            self.launch(&mut run, Duration::ZERO)?;
            self.shared.restarts.fetch_add(1, Ordering::Relaxed);
            debug!(?interval, "Timer restarted with new interval");
        }
        Ok(())
    }

    /// Current interval.
    pub fn interval(&self) -> Duration {
        self.shared.interval()
    }

    /// Replace the action. `None` stops the timer before clearing it.
    pub fn set_action(&self, action: Option<Action>) {
        let mut run = self.run.lock();
        if action.is_none() {
            self.halt(&mut run);
        }
        *self.shared.action.write() = action;
    }

    /// Set the action from a closure.
    pub fn set_callback<F>(&self, callback: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.set_action(Some(Arc::new(callback)));
    }

    /// Whether an action is set.
    pub fn has_action(&self) -> bool {
        self.shared.action.read().is_some()
    }

    /// Start firing after `start_delay`. No-op if already running.
    ///
    /// # Errors
    ///
    /// Returns [`TimerError::OutOfRange`] above [`crate::MAX_DURATION`], or
    /// [`TimerError::ThreadSpawn`] if the OS refuses a new thread. Either way
    /// the timer stays stopped.
    pub fn start(&self, start_delay: Duration) -> TimerResult<()> {
        crate::check_range("start delay", start_delay)?;

        let mut run = self.run.lock();
        if run.handle.is_some() {
            return Ok(());
        }
        self.launch(&mut run, start_delay)
    }

    /// Stop firing. No-op if stopped. Never waits for the timer thread.
    pub fn stop(&self) {
        let mut run = self.run.lock();
        self.halt(&mut run);
    }

    /// Whether a timer thread currently owns the timer.
    pub fn is_running(&self) -> bool {
        self.run.lock().handle.is_some()
    }

    /// Start delay of the most recent run.
    pub fn start_delay(&self) -> Duration {
        self.run.lock().start_delay
    }

    /// Sleeper used by the timer thread.
    pub fn sleeper(&self) -> HybridSleeper {
        self.sleeper
    }

    /// Lifetime counters.
    pub fn stats(&self) -> TimerStats {
        TimerStats {
            fires: self.shared.fires.load(Ordering::Relaxed),
            callback_panics: self.shared.callback_panics.load(Ordering::Relaxed),
            restarts: self.shared.restarts.load(Ordering::Relaxed),
        }
    }

    fn launch(&self, run: &mut RunState, start_delay: Duration) -> TimerResult<()> {
        let generation = run.last_generation.checked_add(1).unwrap_or(1);
        self.shared.active.store(generation, Ordering::Release);

        let shared = Arc::clone(&self.shared);
        let sleeper = self.sleeper;
        let rt_setup = self.rt_setup.clone();
        let spawned = thread::Builder::new()
            .name(self.thread_name.clone())
            .spawn(move || timer_thread_main(shared, generation, start_delay, sleeper, rt_setup));

        match spawned {
            Ok(handle) => {
                run.handle = Some(handle);
                run.last_generation = generation;
                run.start_delay = start_delay;
                debug!(generation, ?start_delay, "Timer started");
                Ok(())
            }
            Err(e) => {
                self.shared.active.store(STOPPED, Ordering::Release);
                error!(error = %e, "Failed to spawn timer thread");
                Err(TimerError::ThreadSpawn(e.to_string()))
            }
        }
    }

    fn halt(&self, run: &mut RunState) {
        let Some(handle) = run.handle.take() else {
            return;
        };
        self.shared.active.store(STOPPED, Ordering::Release);

        // Detach: the thread exits on its own at the next generation check.
        let self_stop = handle.thread().id() == thread::current().id();
        drop(handle);
        debug!(self_stop, "Timer stopped");
    }
}

impl Drop for HighResolutionTimer {
    fn drop(&mut self) {
        self.stop();
    }
}

impl fmt::Debug for HighResolutionTimer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HighResolutionTimer")
            .field("interval", &self.interval())
            .field("running", &self.is_running())
            .field("has_action", &self.has_action())
            .field("offset", &self.sleeper.offset())
            .field("thread_name", &self.thread_name)
            .finish_non_exhaustive()
    }
}

fn timer_thread_main(
    shared: Arc<Shared>,
    generation: u64,
    start_delay: Duration,
    sleeper: HybridSleeper,
    rt_setup: RtSetup,
) {
    if rt_setup.has_rt_features() {
        let missing = platform::apply_rt_setup(&rt_setup).missing(&rt_setup);
        if !missing.is_empty() {
            warn!(?missing, "Real-time setup incomplete for timer thread");
        }
    }

    sleeper.sleep(start_delay);
    while shared.owns(generation) {
        shared.fire(generation);
        sleeper.sleep(shared.interval());
    }
    debug!(generation, "Timer thread exiting");
}

fn duration_ns(duration: Duration) -> u64 {
    u64::try_from(duration.as_nanos()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::FixedProbe;
    use crate::calibration::CalibrationOffset;
    use std::sync::atomic::AtomicUsize;
    use std::time::Instant;
    use tracing_test::traced_test;

    fn test_timer(interval: Duration) -> TimerResult<HighResolutionTimer> {
        let config = TimerConfig::builder()
            .interval(interval)
            .thread_name("pitimer-test")
            .build()?;
        HighResolutionTimer::with_sleeper(
            config,
            &FixedProbe::supported(),
            HybridSleeper::with_offset(CalibrationOffset::ZERO),
        )
    }

    fn wait_until(timeout: Duration, condition: impl Fn() -> bool) -> bool {
        let deadline = Instant::now() + timeout;
        while Instant::now() < deadline {
            if condition() {
                return true;
            }
            thread::sleep(Duration::from_millis(1));
        }
        condition()
    }

    #[test]
    #[traced_test]
    fn test_unsupported_board_fails_construction() {
        let result = HighResolutionTimer::with_probe(&FixedProbe::unsupported());
        assert!(matches!(result, Err(TimerError::NotSupported { .. })));
        assert!(logs_contain("not supported"));
    }

    #[test]
    fn test_new_timer_is_stopped() -> TimerResult<()> {
        let timer = test_timer(Duration::from_millis(2))?;
        assert!(!timer.is_running());
        assert!(!timer.has_action());
        assert_eq!(timer.interval(), Duration::from_millis(2));
        assert_eq!(timer.stats(), TimerStats::default());
        Ok(())
    }

    #[test]
    fn test_fires_without_action() -> TimerResult<()> {
        let timer = test_timer(Duration::from_millis(1))?;
        timer.start(Duration::ZERO)?;

        assert!(wait_until(Duration::from_secs(2), || timer.stats().fires >= 3));
        timer.stop();
        assert!(!timer.is_running());
        Ok(())
    }

    #[test]
    fn test_start_is_idempotent() -> TimerResult<()> {
        let timer = test_timer(Duration::from_millis(5))?;
        timer.start(Duration::from_millis(1))?;
        timer.start(Duration::from_millis(50))?;

        assert!(timer.is_running());
        assert_eq!(timer.start_delay(), Duration::from_millis(1));
        assert_eq!(timer.run.lock().last_generation, 1);
        timer.stop();
        Ok(())
    }

    #[test]
    fn test_stop_when_stopped_is_noop() -> TimerResult<()> {
        let timer = test_timer(Duration::from_millis(5))?;
        timer.stop();
        timer.stop();
        assert!(!timer.is_running());
        assert_eq!(timer.stats(), TimerStats::default());
        Ok(())
    }

    #[test]
    fn test_clearing_action_stops_timer() -> TimerResult<()> {
        let timer = test_timer(Duration::from_millis(2))?;
        timer.set_callback(|| {});
        timer.start(Duration::ZERO)?;
        assert!(timer.is_running());

        timer.set_action(None);
        assert!(!timer.is_running());
        assert!(!timer.has_action());
        Ok(())
    }

    #[test]
    fn test_setting_action_keeps_run_state() -> TimerResult<()> {
        let timer = test_timer(Duration::from_millis(2))?;
        timer.set_callback(|| {});
        assert!(!timer.is_running());

        timer.start(Duration::ZERO)?;
        timer.set_callback(|| {});
        assert!(timer.is_running());
        timer.stop();
        Ok(())
    }

    #[test]
    fn test_interval_change_while_stopped_does_not_start() -> TimerResult<()> {
        let timer = test_timer(Duration::from_millis(2))?;
        timer.set_interval(Duration::from_millis(7))?;
        assert!(!timer.is_running());
        assert_eq!(timer.stats().restarts, 0);
        Ok(())
    }

    #[test]
    fn test_interval_change_while_running_restarts() -> TimerResult<()> {
        let timer = test_timer(Duration::from_millis(50))?;
        timer.start(Duration::from_millis(20))?;
        timer.set_interval(Duration::from_millis(3))?;

        assert!(timer.is_running());
        assert_eq!(timer.stats().restarts, 1);
        assert_eq!(timer.start_delay(), Duration::ZERO);
        assert_eq!(timer.run.lock().last_generation, 2);
        timer.stop();
        Ok(())
    }

    #[test]
    fn test_out_of_range_leaves_state() -> TimerResult<()> {
        let timer = test_timer(Duration::from_millis(4))?;
        let too_long = crate::MAX_DURATION + Duration::from_nanos(1);

        assert!(matches!(
            timer.set_interval(too_long),
            Err(TimerError::OutOfRange { .. })
        ));
        assert!(matches!(
            timer.start(too_long),
            Err(TimerError::OutOfRange { .. })
        ));
        assert_eq!(timer.interval(), Duration::from_millis(4));
        assert!(!timer.is_running());
        Ok(())
    }

    #[test]
    fn test_panicking_callback_is_counted_and_timer_continues() -> TimerResult<()> {
        let timer = test_timer(Duration::from_millis(1))?;
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        timer.set_callback(move || {
            if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                panic!("first call fails");
            }
        });
        timer.start(Duration::ZERO)?;

        assert!(wait_until(Duration::from_secs(2), || {
            calls.load(Ordering::SeqCst) >= 3
        }));
        timer.stop();

        assert_eq!(timer.stats().callback_panics, 1);
        Ok(())
    }

    #[test]
    fn test_drop_stops_thread() -> TimerResult<()> {
        let calls = Arc::new(AtomicUsize::new(0));
        {
            let timer = test_timer(Duration::from_millis(1))?;
            let counter = Arc::clone(&calls);
            timer.set_callback(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            });
            timer.start(Duration::ZERO)?;
            assert!(wait_until(Duration::from_secs(2), || {
                calls.load(Ordering::SeqCst) >= 1
            }));
        }

        thread::sleep(Duration::from_millis(20));
        let settled = calls.load(Ordering::SeqCst);
        thread::sleep(Duration::from_millis(30));
        assert_eq!(calls.load(Ordering::SeqCst), settled);
        Ok(())
    }

    #[test]
    fn test_panic_message() {
        let text: Box<dyn Any + Send> = Box::new("boom");
        assert_eq!(panic_message(text.as_ref()), "boom");
        let owned: Box<dyn Any + Send> = Box::new(String::from("owned boom"));
        assert_eq!(panic_message(owned.as_ref()), "owned boom");
        let other: Box<dyn Any + Send> = Box::new(7u8);
        assert_eq!(panic_message(other.as_ref()), "non-string panic payload");
    }
}
