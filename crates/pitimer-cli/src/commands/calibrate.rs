//! Stand-alone calibration run

use anyhow::Result;
use pitimer::calibration::calibrate_with;
use pitimer::platform::NanoSleep;
use std::time::Instant;
use tracing::info;

use crate::commands::CalibrateArgs;
use crate::error::CliError;
use crate::output::{self, CalibrationReport};

/// Measure the coarse sleep overshoot with a custom sample count
pub fn execute(args: &CalibrateArgs, json: bool) -> Result<()> {
    if args.samples == 0 {
        return Err(CliError::InvalidArgument("--samples must be at least 1".to_string()).into());
    }

    let started = Instant::now();
    let offset = calibrate_with(&NanoSleep, args.samples);
    let elapsed = started.elapsed();
    info!(samples = args.samples, offset_ns = offset.as_nanos(), ?elapsed, "Calibration finished");

    let report = CalibrationReport {
        samples: args.samples,
        offset_ns: offset.as_nanos(),
        elapsed_ms: u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
    };
    output::print_calibration(&report, json);
    Ok(())
}
