//! Output formatting for CLI responses

use anyhow::Error;
use colored::*;
use pitimer::{BoardInfo, JitterSummary, SleepTier, TimerStats};
use serde::Serialize;
use serde_json::json;
use std::time::Duration;

use crate::error::CliError;

/// Result of a `sleep` measurement run.
#[derive(Debug, Clone, Serialize)]
pub struct SleepReport {
    pub requested_ns: u64,
    pub tier: String,
    pub repeats: u32,
    pub mean_elapsed_ns: u64,
    pub min_elapsed_ns: u64,
    pub max_elapsed_ns: u64,
    pub mean_error_ns: i64,
    pub offset_ns: i64,
}

/// Result of a `calibrate` run.
#[derive(Debug, Clone, Serialize)]
pub struct CalibrationReport {
    pub samples: u32,
    pub offset_ns: i64,
    pub elapsed_ms: u64,
}

/// Result of a `run` session.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub interval_ns: u64,
    pub tier: String,
    pub duration_ms: u64,
    pub callback_panics: u64,
    pub restarts: u64,
    pub jitter: JitterSummary,
}

impl RunReport {
    pub fn new(interval: Duration, duration: Duration, stats: TimerStats, jitter: JitterSummary) -> Self {
        Self {
            interval_ns: nanos(interval),
            tier: tier_name(SleepTier::for_delay(interval)).to_string(),
            duration_ms: u64::try_from(duration.as_millis()).unwrap_or(u64::MAX),
            callback_panics: stats.callback_panics,
            restarts: stats.restarts,
            jitter,
        }
    }
}

/// Print error in JSON format
pub fn print_error_json(error: &Error) {
    let error_json = json!({
        "success": false,
        "error": {
            "message": error.to_string(),
            "type": error_type_name(error)
        }
    });
    print_json(&error_json);
}

/// Print error in human-readable format
pub fn print_error_human(error: &Error) {
    eprintln!("{} {}", "Error:".red().bold(), error);

    let mut source = error.source();
    while let Some(err) = source {
        eprintln!("  {} {}", "Caused by:".yellow(), err);
        source = err.source();
    }
}

/// Print board identification and gate result
pub fn print_board(info: &BoardInfo, supported: bool, json: bool) {
    if json {
        print_json(&json!({
            "success": true,
            "board": info,
            "supported": supported
        }));
        return;
    }

    println!("{}", "Board:".bold());
    println!("  Model:    {}", info.describe());
    println!("  Hardware: {}", info.hardware.as_deref().unwrap_or("-"));
    println!("  Revision: {}", info.revision.as_deref().unwrap_or("-"));
    println!("  Serial:   {}", info.serial.as_deref().unwrap_or("-"));
    if supported {
        println!("  {} High-resolution timer supported", "✓".green());
    } else {
        println!("  {} High-resolution timer not supported", "✗".red());
    }
}

/// Print calibration outcome
pub fn print_calibration(report: &CalibrationReport, json: bool) {
    if json {
        print_json(&json!({ "success": true, "calibration": report }));
        return;
    }

    println!("{}", "Calibration:".bold());
    println!("  Samples:  {}", report.samples);
    println!("  Offset:   {}", format_ns(report.offset_ns as f64).cyan());
    println!("  Took:     {} ms", report.elapsed_ms);
}

/// Print a sleep measurement
pub fn print_sleep(report: &SleepReport, json: bool) {
    if json {
        print_json(&json!({ "success": true, "sleep": report }));
        return;
    }

    println!("{}", "Sleep:".bold());
    println!("  Requested: {}", format_ns(report.requested_ns as f64));
    println!("  Tier:      {}", report.tier.cyan());
    println!("  Repeats:   {}", report.repeats);
    println!("  Mean:      {}", format_ns(report.mean_elapsed_ns as f64));
    println!(
        "  Range:     {} .. {}",
        format_ns(report.min_elapsed_ns as f64),
        format_ns(report.max_elapsed_ns as f64)
    );
    println!("  Error:     {}", colorize_error(report.mean_error_ns));
    println!("  Offset:    {}", format_ns(report.offset_ns as f64));
}

/// Print a timer session report
pub fn print_run(report: &RunReport, json: bool) {
    if json {
        print_json(&json!({ "success": true, "run": report }));
        return;
    }

    let jitter = &report.jitter;
    println!("{}", "Timer run:".bold());
    println!("  Interval:     {} ({})", format_ns(report.interval_ns as f64), report.tier.cyan());
    println!("  Duration:     {} ms", report.duration_ms);
    println!("  Fires:        {}", jitter.fires);
    println!("  Mean spacing: {}", format_ns(jitter.mean_spacing_ns as f64));
    println!("  Mean jitter:  {}", format_ns(jitter.mean_jitter_ns));
    println!("  RMS jitter:   {}", format_ns(jitter.rms_jitter_ns));
    println!("  p50 / p99:    {} / {}", format_ns(jitter.p50_jitter_ns as f64), format_ns(jitter.p99_jitter_ns as f64));
    println!("  Max jitter:   {}", format_ns(jitter.max_jitter_ns as f64));
    if jitter.late_fires > 0 {
        println!("  Late fires:   {}", jitter.late_fires.to_string().yellow());
    } else {
        println!("  Late fires:   {}", "0".green());
    }
    if report.callback_panics > 0 {
        println!("  Panics:       {}", report.callback_panics.to_string().red());
    }
}

/// Print warning message
pub fn print_warning(message: &str, json: bool) {
    if json {
        // stdout carries only the JSON document
        eprintln!("warning: {}", message);
    } else {
        println!("{} {}", "⚠".yellow(), message);
    }
}

pub fn tier_name(tier: SleepTier) -> &'static str {
    match tier {
        SleepTier::Coarse => "coarse",
        SleepTier::Compensated => "compensated",
        SleepTier::Spin => "spin",
    }
}

pub fn nanos(duration: Duration) -> u64 {
    u64::try_from(duration.as_nanos()).unwrap_or(u64::MAX)
}

fn print_json(value: &serde_json::Value) {
    match serde_json::to_string_pretty(value) {
        Ok(s) => println!("{}", s),
        Err(e) => eprintln!("Failed to format output as JSON: {}", e),
    }
}

fn format_ns(ns: f64) -> String {
    let magnitude = ns.abs();
    if magnitude >= 1_000_000.0 {
        format!("{:.3} ms", ns / 1_000_000.0)
    } else if magnitude >= 1_000.0 {
        format!("{:.1} µs", ns / 1_000.0)
    } else {
        format!("{:.0} ns", ns)
    }
}

fn colorize_error(error_ns: i64) -> ColoredString {
    let text = format!("{:+} ns", error_ns);
    match error_ns.unsigned_abs() {
        0..=50_000 => text.green(),
        50_001..=500_000 => text.yellow(),
        _ => text.red(),
    }
}

fn error_type_name(error: &Error) -> &'static str {
    match error.downcast_ref::<CliError>() {
        Some(CliError::UnsupportedBoard(_)) => "UnsupportedBoard",
        Some(CliError::InvalidArgument(_)) => "InvalidArgument",
        Some(CliError::InvalidConfiguration(_)) => "InvalidConfiguration",
        Some(CliError::IoError(_)) => "IoError",
        Some(CliError::JsonError(_)) => "JsonError",
        Some(CliError::TimerError(_)) => "TimerError",
        None => "Unknown",
    }
}
