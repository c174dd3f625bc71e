//! Error types for docrelay.

use thiserror::Error;

use crate::storage::StorageError;

/// Common error type for docrelay.
#[derive(Error, Debug)]
pub enum RelayError {
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Validation error for user input.
    #[error("validation error: {0}")]
    Validation(String),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// Blob storage error.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
}

/// Result type alias for docrelay operations.
pub type Result<T> = std::result::Result<T, RelayError>;
