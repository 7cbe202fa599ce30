//! Crate-level error type

use thiserror::Error;

/// Errors surfaced by the server layer
#[derive(Debug, Error)]
pub enum Error {
    /// Socket or listener failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// Invalid or unsafe configuration
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Result alias using the crate [`Error`]
pub type Result<T> = std::result::Result<T, Error>;
