//! Error types for the Slidegate service.

use thiserror::Error;

/// Main error type for Slidegate operations.
#[derive(Error, Debug)]
pub enum SlidegateError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Broker directory errors (bad status, unreadable payload)
    #[error("Broker directory error: {0}")]
    Directory(String),

    /// HTTP client errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for Slidegate operations.
pub type Result<T> = std::result::Result<T, SlidegateError>;
