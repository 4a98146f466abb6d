//! Engine error taxonomy.
//!
//! Configuration and data errors are fatal and propagate to the binary;
//! the only recoverable condition (a zero-integral background) is handled
//! in place with a diagnostic and never surfaces here.

use thiserror::Error;

/// Errors raised by the aggregation engine.
#[derive(Error, Debug)]
pub enum Error {
    /// Histogram arithmetic error
    #[error(transparent)]
    Core(#[from] hm_core::Error),

    /// Store access error
    #[error(transparent)]
    Store(#[from] hm_store::StoreError),

    /// I/O error (override files)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing error (override files)
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Tag is not a member of the closed input/channel tables.
    #[error("unknown {kind} tag: '{tag}'")]
    UnknownType {
        /// Table the tag was checked against ("input" or "channel").
        kind: &'static str,
        /// The offending tag.
        tag: String,
    },

    /// More than one channel claims the same input.
    #[error("input '{input}' is claimed by more than one channel: {channels:?}")]
    AmbiguousMerge {
        /// The contested input tag.
        input: String,
        /// All channels whose merge rule contains the input.
        channels: Vec<String>,
    },

    /// No channel claims the input.
    #[error("no channel absorbs input '{0}'")]
    UnmappedInput(String),

    /// A required channel received no input.
    #[error("channel '{0}' is not loaded")]
    ChannelNotLoaded(String),

    /// A required plot is absent from the store.
    #[error("plot '{0}' is not loaded")]
    PlotNotFound(String),

    /// The fraction fit did not converge and no fallback was supplied.
    #[error("fraction fit did not converge: {0}")]
    FitConvergence(String),

    /// Unrecognized systematic source name.
    #[error("unsupported systematic: '{0}'")]
    UnsupportedSystematic(String),

    /// Invalid run configuration.
    #[error("configuration error: {0}")]
    Config(String),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
