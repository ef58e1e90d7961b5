//! Config Error Types

use derive_more::{Display, Error};
use std::path::PathBuf;

/// A configuration error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for configuration operations.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// An explicitly requested configuration file does not exist.
    #[display("configuration file not found: {}", _0.display())]
    NotFound(#[error(not(source))] PathBuf),
    /// Only TOML, YAML and JSON files are understood.
    #[display("unsupported configuration format: {}", _0.display())]
    UnsupportedFormat(#[error(not(source))] PathBuf),
    /// Values could not be merged or deserialised.
    #[display("invalid configuration")]
    Invalid,
    /// A value was well-formed but unusable.
    #[display("invalid configuration value `{_0}`: {_1}")]
    Validation(#[error(not(source))] &'static str, #[error(not(source))] &'static str),
    /// Nothing pointed at a Foundry data directory.
    #[display("no Foundry data directory configured")]
    NoDataPath,
    /// The Foundry data directory does not exist.
    #[display("Foundry data directory not found: {}", _0.display())]
    DataPath(#[error(not(source))] PathBuf),
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        false
    }
}
