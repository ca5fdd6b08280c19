//! Safe extraction of `.unitypackage` archives.
//!
//! Reads a package with `unipkg-archive`, reassembles its scattered entries
//! into whole assets, and writes them under an output directory:
//!
//! - Destination paths are sanitized, de-duplicated, optionally sorted into
//!   category folders, and **must** resolve inside the output directory; an
//!   escaping path aborts the run ([`ErrorKind::PathTraversal`]).
//! - Per-asset, per-package and asset-count caps ([`ExtractionLimits`]) fail
//!   the run as soon as they are crossed.
//! - Re-running against the same output only writes components whose
//!   content changed ([`WritePlan`]).
//! - A damaged tail is tolerated once at least one entry was read
//!   ([`ExtractionResult::trailing_corruption`]).
//!
//! The core is synchronous; [`extract_package_async`] runs it on Tokio's
//! blocking pool.
//!
//! [`ErrorKind::PathTraversal`]: crate::error::ErrorKind::PathTraversal

mod assembly;
mod component;
pub mod error;
mod limits;
mod options;
mod plan;
pub mod resolve;
mod session;

pub use crate::limits::{
    CEILING_MAX_ASSET_BYTES, CEILING_MAX_ASSET_COUNT, CEILING_MAX_PACKAGE_BYTES, DEFAULT_MAX_ASSET_BYTES,
    DEFAULT_MAX_ASSET_COUNT, DEFAULT_MAX_PACKAGE_BYTES, ExtractionLimits, LimitViolation,
};
#[cfg(feature = "serde")]
pub use crate::limits::RawLimits;
pub use crate::options::{ExtractOptions, ProgressSink};
pub use crate::plan::WritePlan;

use crate::error::{ErrorKind, Result};
use crate::session::Session;
use exn::ResultExt;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::instrument;
use unipkg_archive::PackageReader;

/// What a finished run produced.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ExtractionResult {
    pub source: PathBuf,
    /// Canonical output directory.
    pub output_dir: PathBuf,
    /// Assets now present in the output, whether written this run or
    /// already up to date.
    pub assets_extracted: u64,
    /// Files written this run, in write order.
    pub written_files: Vec<PathBuf>,
    /// Bytes written this run.
    pub total_bytes: u64,
    /// Entries that were not regular `<key>/<component>` files.
    pub skipped_entries: u64,
    /// The package was damaged after its first entry; everything readable
    /// before the damage was extracted.
    pub trailing_corruption: bool,
}

/// How a run ended, short of an error.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Outcome {
    Completed(ExtractionResult),
    /// The cancellation token fired. Files written before that remain; the
    /// result describes them.
    Cancelled(ExtractionResult),
}

impl Outcome {
    pub fn result(&self) -> &ExtractionResult {
        match self {
            Self::Completed(result) | Self::Cancelled(result) => result,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled(_))
    }
}

static SESSIONS: AtomicU64 = AtomicU64::new(0);

/// Opaque token grouping the log lines of one run.
fn correlation_id() -> String {
    let session = SESSIONS.fetch_add(1, Ordering::Relaxed);
    let started = time::UtcDateTime::now().unix_timestamp_nanos() / 1_000_000;
    format!("{started:x}-{session:x}")
}

/// Extract the package at `package` into `output`.
///
/// The output directory is created if needed. Cancellation is reported as
/// [`Outcome::Cancelled`], not as an error.
#[instrument(name = "extract", skip_all, fields(
    id = %correlation_id(),
    package = %package.as_ref().display(),
))]
pub fn extract_package(
    package: impl AsRef<Path>,
    output: impl AsRef<Path>,
    options: &ExtractOptions,
) -> Result<Outcome> {
    let mut reader = PackageReader::open(package.as_ref()).map_err(ErrorKind::archive)?;
    Session::new(package.as_ref().to_path_buf(), output.as_ref(), options)?.run(&mut reader)
}

/// Extract a package from any stream. `source` only labels the result and
/// log lines.
#[instrument(name = "extract", skip_all, fields(id = %correlation_id(), package = %source.display()))]
pub fn extract_reader<R: Read + Send + 'static>(
    reader: R,
    source: &Path,
    output: impl AsRef<Path>,
    options: &ExtractOptions,
) -> Result<Outcome> {
    let mut reader = PackageReader::from_reader(reader).map_err(ErrorKind::archive)?;
    Session::new(source.to_path_buf(), output.as_ref(), options)?.run(&mut reader)
}

/// [`extract_package`] on Tokio's blocking pool, so the caller's executor
/// isn't held up by decompression, hashing and file I/O.
pub async fn extract_package_async(package: PathBuf, output: PathBuf, options: ExtractOptions) -> Result<Outcome> {
    tokio::task::spawn_blocking(move || extract_package(&package, &output, &options))
        .await
        .or_raise(|| ErrorKind::Task)?
}
