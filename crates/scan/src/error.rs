//! Scan Error Types
//!
//! Only failures that prevent reading the package at all are errors. A file
//! inside the package that cannot be read is skipped.

use derive_more::{Display, Error};
use unipkg_archive::error::{Error as ArchiveError, ErrorKind as ArchiveErrorKind};

/// A scan error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for scan operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// `Clone`, so that every caller waiting on a shared scan receives the same
/// failure.
#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// The package file could not be opened or read.
    #[display("package could not be opened")]
    Open,
    /// The input is not a package at all.
    #[display("not a unity package: {_0}")]
    Format(ArchiveErrorKind),
    /// The container broke before a single entry could be read.
    #[display("package is corrupted, re-download it")]
    Corrupt,
    /// The background scan task panicked or was aborted.
    #[display("scan task did not complete")]
    Task,
}

impl ErrorKind {
    /// Convert a container error into a scan error, keeping the archive
    /// crate's frame as a child.
    #[track_caller]
    pub fn archive(err: ArchiveError) -> Error {
        let kind = match &*err {
            ArchiveErrorKind::Corrupt => ErrorKind::Corrupt,
            ArchiveErrorKind::Io => ErrorKind::Open,
            inner @ (ArchiveErrorKind::TooSmall(_) | ArchiveErrorKind::Unrecognized(_)) => {
                ErrorKind::Format(inner.clone())
            },
        };
        err.raise(kind)
    }

    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Open | Self::Task)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_archive_errors_map_to_scan_errors() {
        let err = ErrorKind::archive(exn::Exn::from(ArchiveErrorKind::TooSmall(3)));
        assert_eq!(*err, ErrorKind::Format(ArchiveErrorKind::TooSmall(3)));
        let err = ErrorKind::archive(exn::Exn::from(ArchiveErrorKind::Corrupt));
        assert_eq!(*err, ErrorKind::Corrupt);
        assert!(!err.is_retryable());
        let err = ErrorKind::archive(exn::Exn::from(ArchiveErrorKind::Io));
        assert_eq!(*err, ErrorKind::Open);
        assert!(err.is_retryable());
    }
}
