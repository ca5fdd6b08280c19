//! Streaming reader for `.unitypackage` containers.
//!
//! A package is a gzip-wrapped (occasionally bare) tarball whose entries are
//! named `<asset key>/<component>`. This crate classifies the container,
//! strips the compression layer, and yields the material entries one at a
//! time. It knows nothing about destinations or the filesystem beyond
//! opening the input; see `unipkg-extract` for that.

mod detect;
mod entry;
pub mod error;
#[cfg(any(test, feature = "fixture"))]
mod fixture;
mod reader;

pub use crate::detect::{ContainerKind, ForeignFormat, MIN_PACKAGE_BYTES, SNIFF_BYTES, classify};
pub use crate::entry::{ComponentKind, split_entry_name};
#[cfg(any(test, feature = "fixture"))]
pub use crate::fixture::PackageBuilder;
pub use crate::reader::{DecodeStats, PackageEntries, PackageEntry, PackageReader};
