//! Sequential entry stream over a package.

use crate::detect::{ContainerKind, SNIFF_BYTES, classify};
use crate::entry::{ComponentKind, split_entry_name};
use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::Path;
use tracing::instrument;
use unipkg_compress::{Compression, Decoder, Peeked};

const READ_BUFFER_CAPACITY: usize = 64 * 1024;

type Stream = Decoder<io::Chain<io::Cursor<Vec<u8>>, Box<dyn Read + Send>>>;

/// An opened, classified package ready to be iterated.
///
/// Construction peeks at the leading bytes without consuming them, rejects
/// anything that isn't a (possibly gzip-wrapped) tarball, and installs the
/// decompression layer. Entries are then pulled one at a time with
/// [`entries`](Self::entries); nothing is buffered beyond the current entry.
pub struct PackageReader {
    archive: tar::Archive<Stream>,
    kind: ContainerKind,
}

impl PackageReader {
    /// Open a package file from disk.
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path.as_ref()).or_raise(|| ErrorKind::Io)?;
        Self::from_reader(BufReader::with_capacity(READ_BUFFER_CAPACITY, file))
    }

    /// Classify and wrap any readable stream.
    pub fn from_reader<R: Read + Send + 'static>(reader: R) -> Result<Self> {
        let source: Box<dyn Read + Send> = Box::new(reader);
        let peeked = Peeked::new(source, SNIFF_BYTES).or_raise(|| ErrorKind::Io)?;
        let kind = classify(peeked.head());
        let compression = match kind {
            ContainerKind::TooSmall(len) => exn::bail!(ErrorKind::TooSmall(len)),
            ContainerKind::Unrecognized(foreign) => exn::bail!(ErrorKind::Unrecognized(foreign)),
            ContainerKind::GzipTar => Compression::Gzip,
            ContainerKind::RawTar => Compression::None,
        };
        tracing::debug!(container = ?kind, %compression, "Package container classified");
        Ok(Self { archive: tar::Archive::new(peeked.into_decoder(compression)), kind })
    }

    pub fn kind(&self) -> ContainerKind {
        self.kind
    }

    /// Begin pulling entries. Can only be called once per reader; the
    /// underlying stream is not rewindable.
    pub fn entries(&mut self) -> Result<PackageEntries<'_>> {
        let inner = self.archive.entries().or_raise(|| ErrorKind::Corrupt)?;
        Ok(PackageEntries { inner, stats: DecodeStats::default(), done: false })
    }
}

/// Counters describing how much of the container was decoded.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DecodeStats {
    /// Tar headers parsed successfully, material or not.
    pub headers: u64,
    /// Entries fully consumed (their successor's header was reached).
    pub completed: u64,
    /// Non-file entries and entries whose names aren't `<key>/<component>`.
    pub skipped: u64,
    /// A structural failure ended decoding after at least one complete entry.
    pub trailing_corruption: bool,
}

/// One material entry: a regular file under `<key>/<component>`.
pub struct PackageEntry<'a> {
    /// Lower-cased grouping key.
    pub key: String,
    pub component: ComponentKind,
    /// Size recorded in the tar header, before any byte is read.
    pub declared_len: u64,
    inner: tar::Entry<'a, Stream>,
}

impl Read for PackageEntry<'_> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.inner.read(buf)
    }
}

/// Pull iterator over the material entries of a package.
///
/// Yields only regular files whose names split into a known
/// [`ComponentKind`]; everything else is counted in
/// [`DecodeStats::skipped`]. A structural failure before any entry has been
/// completely read is yielded as [`ErrorKind::Corrupt`]. A failure after that
/// point ends iteration, sets [`DecodeStats::trailing_corruption`], and
/// logs a warning; whatever was read so far remains usable.
pub struct PackageEntries<'a> {
    inner: tar::Entries<'a, Stream>,
    stats: DecodeStats,
    done: bool,
}

impl<'a> PackageEntries<'a> {
    pub fn stats(&self) -> DecodeStats {
        self.stats
    }

    /// Report an I/O failure that happened while reading the body of the
    /// most recently yielded entry.
    ///
    /// Returns [`ErrorKind::Corrupt`] when no entry had been completed yet;
    /// otherwise records trailing corruption and returns `Ok`, after which
    /// the iterator is exhausted.
    pub fn payload_failure(&mut self, error: io::Error) -> Result<()> {
        // The entry being read when the failure happened never completed.
        self.stats.completed = self.stats.headers.saturating_sub(1);
        self.structural_failure(error)
    }

    fn structural_failure(&mut self, error: io::Error) -> Result<()> {
        self.done = true;
        if self.stats.completed == 0 {
            return Err(error).or_raise(|| ErrorKind::Corrupt);
        }
        self.stats.trailing_corruption = true;
        tracing::warn!(
            completed = self.stats.completed,
            error = %error,
            "Trailing corruption in package; continuing with the entries already read"
        );
        Ok(())
    }

    fn material(entry: tar::Entry<'a, Stream>) -> Option<PackageEntry<'a>> {
        let name = String::from_utf8_lossy(&entry.path_bytes()).into_owned();
        if !entry.header().entry_type().is_file() {
            tracing::trace!(entry = %name, entry_type = ?entry.header().entry_type(), "Skipping non-file entry");
            return None;
        }
        let Some((key, component)) = split_entry_name(&name) else {
            tracing::debug!(entry = %name, "Skipping entry without an asset key");
            return None;
        };
        let Some(component) = ComponentKind::from_name(component) else {
            tracing::debug!(entry = %name, "Skipping entry with an unknown component");
            return None;
        };
        let declared_len = entry.header().size().unwrap_or(entry.size());
        Some(PackageEntry { key, component, declared_len, inner: entry })
    }
}

impl<'a> Iterator for PackageEntries<'a> {
    type Item = Result<PackageEntry<'a>>;

    fn next(&mut self) -> Option<Self::Item> {
        while !self.done {
            match self.inner.next() {
                None => {
                    self.done = true;
                    self.stats.completed = self.stats.headers;
                },
                Some(Err(error)) => {
                    // Reaching a header means the previous entry was fully consumed.
                    self.stats.completed = self.stats.headers;
                    if let Err(e) = self.structural_failure(error) {
                        return Some(Err(e));
                    }
                },
                Some(Ok(entry)) => {
                    self.stats.completed = self.stats.headers;
                    self.stats.headers += 1;
                    match Self::material(entry) {
                        Some(entry) => return Some(Ok(entry)),
                        None => self.stats.skipped += 1,
                    }
                },
            }
        }
        None
    }
}
