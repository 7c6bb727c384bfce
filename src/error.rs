use std::time::Duration;

use thiserror::Error;

/// Internal failures. None of these reach an HTTP client: fetch errors are
/// logged and counted per target, config errors stop startup.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Unexpected HTTP status: {0}")]
    Status(u16),

    #[error("Fetch timed out after {0:?}")]
    Timeout(Duration),

    #[error("Row has fewer than 5 cells: {cells}")]
    RowShape { cells: usize },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, AppError>;
