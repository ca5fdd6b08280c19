//! In-memory package builder for tests.

use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use std::path::Path;
use unipkg_compress::{Compression, Encoder};

enum Node {
    File(Vec<u8>),
    Directory,
}

/// Builds `.unitypackage` bytes entry by entry.
///
/// Entries are written in insertion order, which lets tests control the
/// interleaving the extractor has to cope with (meta before pathname, asset
/// slots replaced, and so on). Names are written verbatim, so tests can also
/// produce entries a real exporter never would.
pub struct PackageBuilder {
    compression: Compression,
    entries: Vec<(String, Node)>,
}

impl Default for PackageBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl PackageBuilder {
    pub fn new() -> Self {
        Self { compression: Compression::Gzip, entries: Vec::new() }
    }

    /// Produce an uncompressed tarball instead of a gzip stream.
    pub fn raw(mut self) -> Self {
        self.compression = Compression::None;
        self
    }

    /// Add a `pathname` entry followed by an `asset` entry for `key`.
    pub fn asset(self, key: &str, pathname: &str, content: &[u8]) -> Self {
        self.entry(&format!("{key}/pathname"), pathname.as_bytes()).entry(&format!("{key}/asset"), content)
    }

    /// Add a regular file entry with an arbitrary name.
    pub fn entry(mut self, name: &str, data: &[u8]) -> Self {
        self.entries.push((name.to_string(), Node::File(data.to_vec())));
        self
    }

    /// Add a directory entry.
    pub fn directory(mut self, name: &str) -> Self {
        self.entries.push((name.to_string(), Node::Directory));
        self
    }

    pub fn build(&self) -> Result<Vec<u8>> {
        let mut builder = tar::Builder::new(Encoder::new(Vec::new(), self.compression));
        for (name, node) in &self.entries {
            let mut header = tar::Header::new_gnu();
            header.set_mode(0o644);
            match node {
                Node::File(data) => {
                    header.set_entry_type(tar::EntryType::Regular);
                    header.set_size(data.len() as u64);
                    builder.append_data(&mut header, name, data.as_slice()).or_raise(|| ErrorKind::Io)?;
                },
                Node::Directory => {
                    header.set_entry_type(tar::EntryType::Directory);
                    header.set_size(0);
                    builder.append_data(&mut header, name, std::io::empty()).or_raise(|| ErrorKind::Io)?;
                },
            }
        }
        let encoder = builder.into_inner().or_raise(|| ErrorKind::Io)?;
        encoder.finish().or_raise(|| ErrorKind::Io)
    }

    /// Build and write the package to `path`.
    pub fn write_to(&self, path: impl AsRef<Path>) -> Result<()> {
        std::fs::write(path, self.build()?).or_raise(|| ErrorKind::Io)
    }
}
