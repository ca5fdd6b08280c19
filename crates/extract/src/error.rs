//! Extraction Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction.

use crate::limits::LimitViolation;
use derive_more::{Display, Error};
use std::path::PathBuf;
use unipkg_archive::error::{Error as ArchiveError, ErrorKind as ArchiveErrorKind};

/// An extraction error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for extraction operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
/// Cancellation is not an error; see [`Outcome`](crate::Outcome).
#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// The input is not a package at all (too small, or some other format).
    #[display("not a unity package: {_0}")]
    Format(ArchiveErrorKind),
    /// The container broke before a single entry could be read.
    #[display("package is corrupted, re-download it")]
    Corrupt,
    /// An asset's destination resolved outside of the output directory.
    /// The whole run is aborted; nothing about this package can be trusted.
    #[display("asset {entry:?} resolves outside of the output directory: {}", resolved.display())]
    PathTraversal { entry: String, resolved: PathBuf },
    /// A size or count cap was exceeded. The whole run is aborted.
    #[display("resource limit exceeded: {_0}")]
    ResourceLimit(#[error(not(source))] LimitViolation),
    /// Reading the package, or writing to the output or temporary directory,
    /// failed.
    #[display("I/O error")]
    Io,
    /// The background extraction task panicked or was aborted.
    #[display("extraction task did not complete")]
    Task,
}

impl ErrorKind {
    /// Convert a container error into an extraction error, preserving the
    /// archive crate's `Exn` frame (error tree) as a child in its own
    /// error tree.
    #[track_caller]
    pub fn archive(err: ArchiveError) -> Error {
        let kind = match &*err {
            ArchiveErrorKind::Corrupt => ErrorKind::Corrupt,
            ArchiveErrorKind::Io => ErrorKind::Io,
            inner @ (ArchiveErrorKind::TooSmall(_) | ArchiveErrorKind::Unrecognized(_)) => {
                ErrorKind::Format(inner.clone())
            },
        };
        err.raise(kind)
    }

    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Io)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::limits::LimitViolation;

    #[test]
    fn error_kind_display() {
        assert_eq!(
            ErrorKind::Format(ArchiveErrorKind::TooSmall(4)).to_string(),
            "not a unity package: file is too small to be a package (4 bytes)"
        );
        assert_eq!(
            ErrorKind::ResourceLimit(LimitViolation::TooManyAssets { limit: 10 }).to_string(),
            "resource limit exceeded: more than 10 assets in package"
        );
        let traversal = ErrorKind::PathTraversal { entry: "abc".into(), resolved: PathBuf::from("/etc/passwd") };
        assert_eq!(traversal.to_string(), "asset \"abc\" resolves outside of the output directory: /etc/passwd");
    }

    #[test]
    fn archive_errors_keep_their_category() {
        let err = ErrorKind::archive(exn::Exn::from(ArchiveErrorKind::Corrupt));
        assert_eq!(*err, ErrorKind::Corrupt);
        let err = ErrorKind::archive(exn::Exn::from(ArchiveErrorKind::Unrecognized(None)));
        assert!(matches!(*err, ErrorKind::Format(ArchiveErrorKind::Unrecognized(None))));
        assert!(!err.is_retryable());
    }
}
