//! Error types for the pitimer CLI

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CliError {
    #[error("Board not supported: {0} (pass --force to run anyway)")]
    UnsupportedBoard(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Timer error: {0}")]
    TimerError(#[from] pitimer::TimerError),
}

impl CliError {
    /// Process exit code for this error.
    pub fn exit_code(&self) -> u8 {
        match self {
            CliError::UnsupportedBoard(_) => 2,
            CliError::InvalidArgument(_) => 3,
            CliError::InvalidConfiguration(_) | CliError::JsonError(_) => 4,
            CliError::IoError(_) => 5,
            CliError::TimerError(pitimer::TimerError::NotSupported { .. }) => 2,
            CliError::TimerError(pitimer::TimerError::OutOfRange { .. }) => 3,
            CliError::TimerError(_) => 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_exit_codes() {
        assert_eq!(CliError::UnsupportedBoard("x86".into()).exit_code(), 2);
        assert_eq!(
            CliError::from(pitimer::TimerError::not_supported("x86")).exit_code(),
            2
        );
        assert_eq!(
            CliError::from(pitimer::TimerError::out_of_range(
                "interval",
                Duration::MAX
            ))
            .exit_code(),
            3
        );
        assert_eq!(CliError::InvalidConfiguration("bad".into()).exit_code(), 4);
    }
}
