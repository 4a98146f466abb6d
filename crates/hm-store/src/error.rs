//! Store error type.

use thiserror::Error;

/// Errors raised by the distribution store.
#[derive(Error, Debug)]
pub enum StoreError {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Requested path does not exist in the store.
    #[error("path not found in store: {0}")]
    PathNotFound(String),

    /// Stored record cannot be turned into a valid histogram.
    #[error("malformed record at '{path}': {source}")]
    Record {
        /// Store path of the offending record.
        path: String,
        /// Underlying validation failure.
        source: hm_core::Error,
    },

    /// Store opened read-only cannot be written.
    #[error("store '{0}' is not open for update")]
    ReadOnly(String),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, StoreError>;
