//! pitimer - high-resolution timer diagnostics
//!
//! Identifies the board, measures the sleep calibration offset, checks hybrid
//! sleep accuracy and runs the periodic timer while recording fire jitter.

#![deny(static_mut_refs)]
#![deny(unused_must_use)]
#![deny(clippy::unwrap_used)]

mod commands;
mod error;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::process::ExitCode;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::commands::{CalibrateArgs, RunArgs, SleepArgs};
use crate::error::CliError;

#[derive(Parser, Debug)]
#[command(name = "pitimer")]
#[command(about = "High-resolution periodic timer diagnostics for Raspberry Pi boards")]
#[command(version)]
#[command(long_about = "
pitimer exercises the pitimer library on the current host: it reports the
board identification used by the capability check, measures the coarse sleep
overshoot, checks how closely the hybrid sleeper meets a delay and runs the
periodic timer while recording fire-spacing jitter.

Use --json for machine-readable output suitable for scripting.
")]
struct Cli {
    /// Output format (human-readable or JSON)
    #[arg(long, global = true, help = "Output in JSON format for machine parsing")]
    json: bool,

    /// Verbose logging
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Show board identification and whether the timer is supported
    Board,

    /// Measure the coarse sleep overshoot
    Calibrate(CalibrateArgs),

    /// Check hybrid sleep accuracy for one delay
    Sleep(SleepArgs),

    /// Run the periodic timer and report jitter
    Run(RunArgs),
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let log_level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("pitimer={log_level},pitimer_cli={log_level}").into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();

    match execute_command(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            if cli.json {
                output::print_error_json(&e);
            } else {
                output::print_error_human(&e);
            }

            let code = e.downcast_ref::<CliError>().map_or(1, CliError::exit_code);
            ExitCode::from(code)
        }
    }
}

fn execute_command(cli: &Cli) -> Result<()> {
    match &cli.command {
        Commands::Board => commands::board::execute(cli.json),
        Commands::Calibrate(args) => commands::calibrate::execute(args, cli.json),
        Commands::Sleep(args) => commands::sleep::execute(args, cli.json),
        Commands::Run(args) => commands::run::execute(args, cli.json),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    type TestResult = Result<(), Box<dyn std::error::Error>>;

    #[test]
    fn parse_board_defaults() -> TestResult {
        let cli = Cli::try_parse_from(["pitimer", "board"])?;
        assert!(!cli.json);
        assert_eq!(cli.verbose, 0);
        assert!(matches!(cli.command, Commands::Board));
        Ok(())
    }

    #[test]
    fn parse_global_flags_after_subcommand() -> TestResult {
        let cli = Cli::try_parse_from(["pitimer", "board", "--json", "-vv"])?;
        assert!(cli.json);
        assert_eq!(cli.verbose, 2);
        Ok(())
    }

    #[test]
    fn parse_calibrate_default_samples() -> TestResult {
        let cli = Cli::try_parse_from(["pitimer", "calibrate"])?;
        match cli.command {
            Commands::Calibrate(args) => {
                assert_eq!(args.samples, pitimer::calibration::CALIBRATION_SAMPLES);
            }
            other => return Err(format!("unexpected command {other:?}").into()),
        }
        Ok(())
    }

    #[test]
    fn parse_sleep_with_repeat() -> TestResult {
        let cli = Cli::try_parse_from(["pitimer", "sleep", "250", "--repeat", "3"])?;
        match cli.command {
            Commands::Sleep(args) => {
                assert_eq!(args.micros, 250);
                assert_eq!(args.repeat, 3);
            }
            other => return Err(format!("unexpected command {other:?}").into()),
        }
        Ok(())
    }

    #[test]
    fn parse_run_options() -> TestResult {
        let cli = Cli::try_parse_from([
            "pitimer",
            "run",
            "--interval-us",
            "500",
            "--duration-ms",
            "50",
            "--force",
            "--rt",
        ])?;
        match cli.command {
            Commands::Run(args) => {
                assert_eq!(args.interval_us, Some(500));
                assert_eq!(args.duration_ms, 50);
                assert!(args.force);
                assert!(args.rt);
                assert!(args.config.is_none());
                assert!(args.start_delay_us.is_none());
            }
            other => return Err(format!("unexpected command {other:?}").into()),
        }
        Ok(())
    }

    #[test]
    fn parse_sleep_requires_delay() {
        assert!(Cli::try_parse_from(["pitimer", "sleep"]).is_err());
    }

    #[test]
    fn parse_rejects_negative_interval() {
        assert!(Cli::try_parse_from(["pitimer", "run", "--interval-us", "-5"]).is_err());
    }
}
