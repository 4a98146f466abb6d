//! # hm-store
//!
//! Backing distribution store for histmill: a hierarchical, named
//! container of binned distributions persisted as JSON. Opened once per
//! batch pass, read many times, saved explicitly on completion.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod file;
pub mod record;

pub use error::{Result, StoreError};
pub use file::HistStore;
pub use record::HistRecord;
