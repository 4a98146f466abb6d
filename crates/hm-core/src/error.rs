//! Error types for histogram arithmetic.

use thiserror::Error;

/// Core error type.
#[derive(Error, Debug)]
pub enum Error {
    /// Operand binning differs in bin count or edge positions.
    #[error("binning mismatch: {0}")]
    BinningMismatch(String),

    /// Requested rebinning is not a coarsening of the original edges.
    #[error("rebin error: {0}")]
    Rebin(String),

    /// Structural validation failure.
    #[error("validation error: {0}")]
    Validation(String),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
