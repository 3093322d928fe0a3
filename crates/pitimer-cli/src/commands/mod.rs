//! Command implementations for the pitimer CLI

pub mod board;
pub mod calibrate;
pub mod run;
pub mod sleep;

use clap::Args;
use std::path::PathBuf;

#[derive(Args, Debug, Clone, PartialEq, Eq)]
pub struct CalibrateArgs {
    /// Number of 1 ms sleeps to sample
    #[arg(short, long, default_value_t = pitimer::calibration::CALIBRATION_SAMPLES)]
    pub samples: u32,
}

#[derive(Args, Debug, Clone, PartialEq, Eq)]
pub struct SleepArgs {
    /// Delay to request, in microseconds
    pub micros: u64,

    /// Number of measured sleeps
    #[arg(short, long, default_value_t = 10)]
    pub repeat: u32,
}

#[derive(Args, Debug, Clone, PartialEq, Eq)]
pub struct RunArgs {
    /// Timer interval in microseconds (overrides the config file)
    #[arg(short, long)]
    pub interval_us: Option<u64>,

    /// How long to let the timer run, in milliseconds
    #[arg(short, long, default_value_t = 1000)]
    pub duration_ms: u64,

    /// Delay before the first fire, in microseconds (overrides the config file)
    #[arg(long)]
    pub start_delay_us: Option<u64>,

    /// JSON timer configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Skip the board check
    #[arg(short, long)]
    pub force: bool,

    /// Request SCHED_FIFO priority and locked memory on the timer thread
    #[arg(long)]
    pub rt: bool,
}
