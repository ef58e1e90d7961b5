//! Pack Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction.
//!
//! Most problems found while reading packs are *not* errors: a malformed line
//! or file is recorded as a [`Rejected`](crate::Rejected) record and reading
//! carries on. These kinds are reserved for failures that make a whole pack
//! (or manifest) unusable.

use derive_more::{Display, Error};
use std::path::PathBuf;

/// A pack error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for pack operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// The pack (or one of its directories) could not be read at all.
    #[display("unable to read: {}", _0.display())]
    Io(#[error(not(source))] PathBuf),
    /// A manifest exists but does not describe packs in a form we understand.
    #[display("invalid manifest: {}", _0.display())]
    InvalidManifest(#[error(not(source))] PathBuf),
    /// The reader was handed a path of a format it does not handle.
    #[display("unsupported pack format: {}", _0.display())]
    UnsupportedFormat(#[error(not(source))] PathBuf),
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Io(_))
    }
}
