//! Malicious content scanner for `.unitypackage` archives.
//!
//! Reads a package independently of any extraction and looks inside its
//! script-like files (C#, JavaScript, shell and batch scripts, and scripts
//! hidden behind a second extension) for:
//!
//! - Discord webhook URLs ([`Severity::High`]), the usual exfiltration channel;
//! - URLs to domains outside a known-benign list ([`Severity::Low`]);
//! - APIs for spawning processes, deleting files, editing the registry,
//!   loading code, opening sockets and binding native code
//!   ([`Severity::Medium`]).
//!
//! [`scan_package`] does one synchronous pass. [`ScanCache`] runs scans on
//! Tokio's blocking pool, shares one computation between concurrent callers
//! for the same package and serves recent results from memory.

mod cache;
pub mod error;
mod scanner;
mod signature;
mod target;

pub use crate::cache::{DEFAULT_CACHE_TTL, ScanCache};
pub use crate::signature::{EXTERNAL_URL, SUSPICIOUS_APIS, Severity, Signature, WEBHOOK};

use crate::error::{ErrorKind, Result};
use crate::scanner::Scan;
use std::io::Read;
use std::path::Path;
use tracing::instrument;
use unipkg_archive::PackageReader;

/// Default for [`ScanOptions::max_scan_bytes`].
pub const DEFAULT_MAX_SCAN_BYTES: u64 = 4 * 1024 * 1024;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ScanOptions {
    /// Only this many leading bytes of each file are inspected.
    pub max_scan_bytes: u64,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self { max_scan_bytes: DEFAULT_MAX_SCAN_BYTES }
    }
}

impl ScanOptions {
    pub fn max_scan_bytes(mut self, bytes: u64) -> Self {
        self.max_scan_bytes = bytes;
        self
    }
}

/// Where a signature matched.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ThreatMatch {
    /// Path of the file inside the package.
    pub file: String,
    /// The match with some surrounding context, on one line.
    pub snippet: String,
}

/// Every match of one signature across the package.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Threat {
    pub signature: &'static str,
    pub description: &'static str,
    pub severity: Severity,
    pub matches: Vec<ThreatMatch>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ScanResult {
    /// At least one [`Severity::High`] threat was found.
    pub is_malicious: bool,
    /// Most severe first.
    pub threats: Vec<Threat>,
    pub files_scanned: u64,
    /// The package was damaged after its first entry; only the readable part
    /// was scanned.
    pub trailing_corruption: bool,
    pub timestamp: time::UtcDateTime,
}

impl ScanResult {
    /// A result stamped with the current time. The package is malicious if
    /// any threat is [`Severity::High`].
    pub fn new(threats: Vec<Threat>, files_scanned: u64, trailing_corruption: bool) -> Self {
        Self {
            is_malicious: threats.iter().any(|threat| threat.severity == Severity::High),
            threats,
            files_scanned,
            trailing_corruption,
            timestamp: time::UtcDateTime::now(),
        }
    }
}

/// Scan the package at `path`.
#[instrument(name = "scan", skip_all, fields(package = %path.as_ref().display()))]
pub fn scan_package(path: impl AsRef<Path>, options: &ScanOptions) -> Result<ScanResult> {
    let mut reader = PackageReader::open(path.as_ref()).map_err(ErrorKind::archive)?;
    Scan::new(options).run(&mut reader)
}

/// Scan a package from any stream.
pub fn scan_reader<R: Read + Send + 'static>(reader: R, options: &ScanOptions) -> Result<ScanResult> {
    let mut reader = PackageReader::from_reader(reader).map_err(ErrorKind::archive)?;
    Scan::new(options).run(&mut reader)
}
