use std::io;

use thiserror::Error;

/// Custom error type for the visualizer.
#[derive(Error, Debug)]
pub enum VizError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Time error: {0}")]
    Time(String),

    #[error("Transaction error: {0}")]
    Transaction(String),

    #[error("Mining error: {0}")]
    Mining(String),
}

/// Type alias for Result with our custom error type.
pub type Result<T> = std::result::Result<T, VizError>;
