//! # hm-core
//!
//! Core value types for histmill: the 1-D binned distribution
//! ([`Histogram`]) with bin-wise arithmetic and error propagation, and the
//! cumulative/efficiency transform derived from it.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod efficiency;
pub mod error;
pub mod hist;

pub use efficiency::cumulative;
pub use error::{Error, Result};
pub use hist::Histogram;
