//! Bridge Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction.

use derive_more::{Display, Error};
use std::path::PathBuf;

/// A bridge error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for bridge operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    #[display("no PowerShell executable detected on your system")]
    ProgramNotFound,
    #[display("extraction script not found: {}", _0.display())]
    ScriptNotFound(#[error(not(source))] PathBuf),
    #[display("unable to start extraction helper")]
    Spawn,
    /// The helper ran past its deadline and was killed.
    #[display("extraction helper timed out after {_0}s")]
    Timeout(#[error(not(source))] u64),
    /// The helper exited unsuccessfully; carries a one-line summary of stderr.
    #[display("{_0}")]
    Failed(#[error(not(source))] String),
    /// The helper succeeded but never printed an existing output directory.
    #[display("extraction helper reported no output directory")]
    MissingOutput,
    Io,
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Timeout(_) | Self::Io)
    }
}
