//! Run the periodic timer and report fire-spacing jitter

use anyhow::Result;
use parking_lot::Mutex;
use pitimer::{
    BoardProbe, FixedProbe, HighResolutionTimer, JitterMetrics, ProcfsProbe, RtSetup, TimerConfig,
};
use std::fs;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::info;

use crate::commands::RunArgs;
use crate::error::CliError;
use crate::output::{self, RunReport};

/// Run a timer for the requested duration while recording every fire
pub fn execute(args: &RunArgs, json: bool) -> Result<()> {
    let config = load_config(args)?;
    let interval = config.interval;

    let timer = if args.force {
        output::print_warning("Board check skipped (--force)", json);
        HighResolutionTimer::with_config(config, &FixedProbe::supported())
    } else {
        let probe = ProcfsProbe::default();
        if !probe.is_supported() {
            return Err(CliError::UnsupportedBoard(probe.board_info().describe()).into());
        }
        HighResolutionTimer::with_config(config, &probe)
    }
    .map_err(CliError::from)?;

    let metrics = Arc::new(Mutex::new(JitterMetrics::new(interval)));
    let recorder = Arc::clone(&metrics);
    timer.set_callback(move || recorder.lock().record_fire(Instant::now()));

    let duration = Duration::from_millis(args.duration_ms);
    info!(?interval, ?duration, "Starting timer run");
    timer.start(timer.start_delay()).map_err(CliError::from)?;
    thread::sleep(duration);
    timer.stop();

    // Let a fire that was already in flight land before reading the metrics.
    thread::sleep(interval.min(Duration::from_millis(100)));

    let summary = metrics.lock().summary();
    let report = RunReport::new(interval, duration, timer.stats(), summary);
    output::print_run(&report, json);
    Ok(())
}

/// Config file (or defaults) with command-line overrides applied and validated
fn load_config(args: &RunArgs) -> Result<TimerConfig, CliError> {
    let mut config = match &args.config {
        Some(path) => {
            let text = fs::read_to_string(path)?;
            serde_json::from_str::<TimerConfig>(&text)?
        }
        None => TimerConfig::default(),
    };

    if let Some(micros) = args.interval_us {
        config.interval = Duration::from_micros(micros);
    }
    if let Some(micros) = args.start_delay_us {
        config.start_delay = Duration::from_micros(micros);
    }
    if args.rt {
        config.rt_setup = RtSetup::new();
    }

    config.validate().map_err(|e| match e {
        pitimer::TimerError::InvalidConfiguration(msg) => CliError::InvalidConfiguration(msg),
        other => CliError::TimerError(other),
    })?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    type TestResult = Result<(), Box<dyn std::error::Error>>;

    fn args() -> RunArgs {
        RunArgs {
            interval_us: None,
            duration_ms: 10,
            start_delay_us: None,
            config: None,
            force: true,
            rt: false,
        }
    }

    #[test]
    fn test_defaults_without_config_file() -> TestResult {
        let config = load_config(&args())?;
        assert_eq!(config, TimerConfig::default());
        Ok(())
    }

    #[test]
    fn test_overrides_apply() -> TestResult {
        let mut run = args();
        run.interval_us = Some(250);
        run.start_delay_us = Some(5_000);
        run.rt = true;

        let config = load_config(&run)?;
        assert_eq!(config.interval, Duration::from_micros(250));
        assert_eq!(config.start_delay, Duration::from_millis(5));
        assert!(config.rt_setup.high_priority);
        Ok(())
    }

    #[test]
    fn test_config_file_is_read() -> TestResult {
        let mut file = tempfile::NamedTempFile::new()?;
        let config = TimerConfig::builder()
            .interval(Duration::from_millis(4))
            .thread_name("from-file")
            .build()?;
        write!(file, "{}", serde_json::to_string(&config)?)?;

        let mut run = args();
        run.config = Some(file.path().to_path_buf());
        let loaded = load_config(&run)?;
        assert_eq!(loaded.interval, Duration::from_millis(4));
        assert_eq!(loaded.thread_name, "from-file");
        Ok(())
    }

    #[test]
    fn test_out_of_range_interval_is_rejected() {
        let mut run = args();
        run.interval_us = Some(u64::MAX);
        assert!(matches!(
            load_config(&run),
            Err(CliError::TimerError(pitimer::TimerError::OutOfRange { .. }))
        ));
    }

    #[test]
    fn test_bad_json_is_a_json_error() -> TestResult {
        let mut file = tempfile::NamedTempFile::new()?;
        write!(file, "{{ not json")?;

        let mut run = args();
        run.config = Some(file.path().to_path_buf());
        assert!(matches!(load_config(&run), Err(CliError::JsonError(_))));
        Ok(())
    }
}
