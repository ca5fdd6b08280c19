//! Archive Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction.

use crate::detect::ForeignFormat;
use derive_more::{Display, Error};

/// An archive error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for archive operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// Not enough bytes to hold even an empty container.
    #[display("file is too small to be a package ({_0} bytes)")]
    TooSmall(#[error(not(source))] usize),
    /// Neither gzip-wrapped nor a raw tarball.
    #[display("unrecognized container format ({})", describe(_0))]
    Unrecognized(#[error(not(source))] Option<ForeignFormat>),
    /// Decompression or tar structure failed before a single entry was read.
    /// Don't retry with the same input; the file needs to be downloaded again.
    #[display("package is corrupted, re-download it")]
    Corrupt,
    /// The package could not be opened or read from.
    #[display("I/O error")]
    Io,
}

fn describe(format: &Option<ForeignFormat>) -> &'static str {
    match format {
        Some(format) => format.as_str(),
        None => "unknown",
    }
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Io)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_kind_display() {
        assert_eq!(ErrorKind::TooSmall(3).to_string(), "file is too small to be a package (3 bytes)");
        assert_eq!(
            ErrorKind::Unrecognized(Some(ForeignFormat::Zip)).to_string(),
            "unrecognized container format (zip archive)"
        );
        assert_eq!(ErrorKind::Unrecognized(None).to_string(), "unrecognized container format (unknown)");
        assert_eq!(ErrorKind::Corrupt.to_string(), "package is corrupted, re-download it");
    }
}
