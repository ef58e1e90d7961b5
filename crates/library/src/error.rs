//! Library Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction.
//!
//! Only failures that leave no usable cache behind are errors. Everything that
//! goes wrong with an individual pack is reported as a failed
//! [`PackResult`](crate::PackResult) instead.

use derive_more::{Display, Error};
use std::path::PathBuf;

/// A library error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for library operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Classifies the origin of a build failure.
#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// The cache could not be created, migrated or finalised.
    #[display("compendium cache unavailable")]
    Cache,
    /// The collision log could not be written.
    #[display("unable to write collision log: {}", _0.display())]
    CollisionLog(#[error(not(source))] PathBuf),
    /// A worker task panicked or was cancelled.
    #[display("pipeline worker failed")]
    Worker,
    /// The build options are unusable.
    #[display("invalid build options: {_0}")]
    Options(#[error(not(source))] &'static str),
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Cache)
    }
}
