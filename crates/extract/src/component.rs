//! Temp-file backed component blobs.

use crate::error::{ErrorKind, Result};
use crate::limits::Limiter;
use exn::ResultExt;
use std::fs::File;
use std::io::{self, Read, Write};
use std::path::Path;
use tempfile::NamedTempFile;
use tokio_util::sync::CancellationToken;

pub(crate) const COPY_BUFFER: usize = 64 * 1024;

/// One component's content, parked in the session's temporary directory.
///
/// Dropping a component deletes its backing file; [`release`](Self::release)
/// does the same but reports failures.
pub(crate) struct Component {
    file: NamedTempFile,
    len: u64,
    hash: blake3::Hash,
}

impl Component {
    pub(crate) fn len(&self) -> u64 {
        self.len
    }

    pub(crate) fn hash(&self) -> &blake3::Hash {
        &self.hash
    }

    /// A fresh handle positioned at the start of the content.
    pub(crate) fn open(&self) -> io::Result<File> {
        self.file.reopen()
    }

    pub(crate) fn release(self) {
        let path = self.file.path().to_path_buf();
        if let Err(e) = self.file.close() {
            tracing::warn!(path = %path.display(), error = %e, "Failed to delete temporary component");
        }
    }
}

/// How materializing a component ended, short of a fatal error.
pub(crate) enum Materialized {
    Complete(Component),
    Cancelled,
    /// Reading the entry body failed; the container is damaged from here on.
    Interrupted(io::Error),
}

/// Stream an entry body into a new temporary file, hashing as it goes.
///
/// Every chunk is accounted with the [`Limiter`] before it is written, so
/// an oversized body fails at the chunk that crosses a cap. A body shorter
/// than its declared length counts as an interrupted read.
pub(crate) fn materialize(
    body: &mut impl Read,
    declared: u64,
    temp_dir: &Path,
    limiter: &mut Limiter,
    cancel: &CancellationToken,
) -> Result<Materialized> {
    limiter.check_declared(declared)?;
    let mut file = NamedTempFile::new_in(temp_dir).or_raise(|| ErrorKind::Io)?;
    let mut hasher = blake3::Hasher::new();
    let mut buffer = vec![0; COPY_BUFFER];
    let mut len = 0;
    loop {
        if cancel.is_cancelled() {
            return Ok(Materialized::Cancelled);
        }
        let bytes = match body.read(&mut buffer) {
            Ok(0) => break,
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Ok(Materialized::Interrupted(e)),
        };
        limiter.consume(&mut len, bytes as u64)?;
        hasher.update(&buffer[..bytes]);
        file.write_all(&buffer[..bytes]).or_raise(|| ErrorKind::Io)?;
    }
    if len < declared {
        let e = io::Error::new(io::ErrorKind::UnexpectedEof, format!("entry ended after {len} of {declared} bytes"));
        return Ok(Materialized::Interrupted(e));
    }
    file.flush().or_raise(|| ErrorKind::Io)?;
    Ok(Materialized::Complete(Component { file, len, hash: hasher.finalize() }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::limits::{ExtractionLimits, LimitViolation};
    use std::io::Cursor;
    use tempfile::TempDir;

    fn complete(result: Materialized) -> Component {
        match result {
            Materialized::Complete(component) => component,
            Materialized::Cancelled => panic!("unexpected cancellation"),
            Materialized::Interrupted(e) => panic!("unexpected interruption: {e}"),
        }
    }

    #[test]
    fn test_materialize_hashes_and_persists() {
        let dir = TempDir::new().unwrap();
        let mut limiter = Limiter::new(ExtractionLimits::default());
        let data = b"some asset content".to_vec();
        let component = complete(
            materialize(&mut Cursor::new(&data), data.len() as u64, dir.path(), &mut limiter, &CancellationToken::new())
                .unwrap(),
        );
        assert_eq!(component.len(), data.len() as u64);
        assert_eq!(component.hash(), &blake3::hash(&data));
        let mut read_back = Vec::new();
        component.open().unwrap().read_to_end(&mut read_back).unwrap();
        assert_eq!(read_back, data);
        assert_eq!(limiter.package_bytes(), data.len() as u64);
    }

    #[test]
    fn test_release_deletes_backing_file() {
        let dir = TempDir::new().unwrap();
        let mut limiter = Limiter::new(ExtractionLimits::default());
        let cancel = CancellationToken::new();
        let component = complete(materialize(&mut Cursor::new(b"x"), 1, dir.path(), &mut limiter, &cancel).unwrap());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
        component.release();
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_declared_length_rejected_before_reading() {
        let dir = TempDir::new().unwrap();
        let mut limiter = Limiter::new(ExtractionLimits::new(4, 100, 10));
        let mut body = Cursor::new(b"0123456789".to_vec());
        let err = materialize(&mut body, 10, dir.path(), &mut limiter, &CancellationToken::new()).err().unwrap();
        assert_eq!(*err, ErrorKind::ResourceLimit(LimitViolation::AssetTooLarge { limit: 4, actual: 10 }));
        assert_eq!(body.position(), 0);
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_short_body_is_interrupted() {
        let dir = TempDir::new().unwrap();
        let mut limiter = Limiter::new(ExtractionLimits::default());
        let result = materialize(&mut Cursor::new(b"abc"), 10, dir.path(), &mut limiter, &CancellationToken::new());
        assert!(matches!(result.unwrap(), Materialized::Interrupted(e) if e.kind() == io::ErrorKind::UnexpectedEof));
    }

    #[test]
    fn test_cancelled_before_first_chunk() {
        let dir = TempDir::new().unwrap();
        let mut limiter = Limiter::new(ExtractionLimits::default());
        let cancel = CancellationToken::new();
        cancel.cancel();
        let result = materialize(&mut Cursor::new(b"abc"), 3, dir.path(), &mut limiter, &cancel).unwrap();
        assert!(matches!(result, Materialized::Cancelled));
    }
}
