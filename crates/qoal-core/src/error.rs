//! Error types for the engine.

use thiserror::Error;

/// Engine-wide error type.
#[derive(Error, Debug)]
pub enum Error {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid configuration value
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Resource not found
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Logging could not be initialized
    #[error("Logging setup failed: {0}")]
    Logging(String),
}

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;
