//! Hybrid sleep accuracy check

use anyhow::Result;
use pitimer::{HybridSleeper, MAX_DURATION};
use std::time::{Duration, Instant};
use tracing::debug;

use crate::commands::SleepArgs;
use crate::error::CliError;
use crate::output::{self, SleepReport};

/// Sleep `repeat` times and report how close each wake-up landed
pub fn execute(args: &SleepArgs, json: bool) -> Result<()> {
    if args.repeat == 0 {
        return Err(CliError::InvalidArgument("--repeat must be at least 1".to_string()).into());
    }

    let delay = Duration::from_micros(args.micros);
    if delay > MAX_DURATION {
        return Err(CliError::from(pitimer::TimerError::out_of_range("delay", delay)).into());
    }

    let sleeper = HybridSleeper::calibrated();
    let mut elapsed = Vec::with_capacity(args.repeat as usize);
    let mut tier = pitimer::SleepTier::for_delay(delay);

    for _ in 0..args.repeat {
        let start = Instant::now();
        tier = sleeper.sleep(delay);
        let took = output::nanos(start.elapsed());
        debug!(took_ns = took, ?tier, "Sleep sample");
        elapsed.push(took);
    }

    let report = summarize(delay, output::tier_name(tier), &elapsed, sleeper.offset().as_nanos());
    output::print_sleep(&report, json);
    Ok(())
}

fn summarize(delay: Duration, tier: &str, elapsed: &[u64], offset_ns: i64) -> SleepReport {
    let requested_ns = output::nanos(delay);
    let count = elapsed.len().max(1) as u128;
    let total: u128 = elapsed.iter().map(|&ns| u128::from(ns)).sum();
    let mean_elapsed_ns = u64::try_from(total / count).unwrap_or(u64::MAX);
    let mean_error = i128::from(mean_elapsed_ns) - i128::from(requested_ns);

    SleepReport {
        requested_ns,
        tier: tier.to_string(),
        repeats: u32::try_from(elapsed.len()).unwrap_or(u32::MAX),
        mean_elapsed_ns,
        min_elapsed_ns: elapsed.iter().copied().min().unwrap_or_default(),
        max_elapsed_ns: elapsed.iter().copied().max().unwrap_or_default(),
        mean_error_ns: i64::try_from(mean_error).unwrap_or(i64::MAX),
        offset_ns,
    }
}
