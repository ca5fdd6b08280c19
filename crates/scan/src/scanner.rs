//! A single pass over a package's entries.

use crate::error::{ErrorKind, Result};
use crate::signature::{Hit, detect};
use crate::target::{Reason, classify};
use crate::{ScanOptions, ScanResult, Threat, ThreatMatch};
use std::cmp::Reverse;
use std::collections::HashMap;
use std::io::{self, Read};
use unipkg_archive::{ComponentKind, PackageEntry, PackageReader};

/// `pathname` payloads beyond this are not paths.
const MAX_PATHNAME_BYTES: u64 = 64 * 1024;
/// Ceiling on content held back while waiting for its path.
const MAX_PENDING_BYTES: u64 = 256 * 1024 * 1024;

#[derive(Default)]
struct PendingFile {
    path: Option<String>,
    content: Option<Vec<u8>>,
}

/// The matches found in one asset's content.
struct ScannedFile {
    path: String,
    hits: Vec<Hit>,
}

/// Scanned files in first-scan order. A key scanned again (a duplicate
/// `asset` entry) has its earlier matches replaced, so only the content that
/// would end up on disk is reported.
#[derive(Default)]
struct Report {
    files: Vec<ScannedFile>,
    index: HashMap<String, usize>,
}

impl Report {
    fn is_scanned(&self, key: &str) -> bool {
        self.index.contains_key(key)
    }

    fn inspect(&mut self, key: &str, path: &str, reason: Reason, content: &[u8]) {
        if reason == Reason::Stealth {
            tracing::debug!(path, "Scanning script disguised behind a second extension");
        }
        let text = String::from_utf8_lossy(content);
        let scanned = ScannedFile { path: path.to_string(), hits: detect(&text) };
        for hit in &scanned.hits {
            let signature = hit.signature;
            tracing::debug!(path, signature = signature.name, severity = %signature.severity, "Signature matched");
        }
        match self.index.get(key) {
            Some(&slot) => {
                tracing::debug!(key, path, "Replacing matches from a duplicate asset entry");
                self.files[slot] = scanned;
            },
            None => {
                self.index.insert(key.to_string(), self.files.len());
                self.files.push(scanned);
            },
        }
    }

    /// Group every match by signature, highest severity first.
    fn into_threats(self) -> (Vec<Threat>, u64) {
        let files_scanned = self.files.len() as u64;
        let mut threats: Vec<Threat> = Vec::new();
        for ScannedFile { path, hits } in self.files {
            for Hit { signature, snippet } in hits {
                let found = ThreatMatch { file: path.clone(), snippet };
                let existing =
                    threats.iter_mut().find(|t| t.signature == signature.name && t.severity == signature.severity);
                match existing {
                    Some(threat) => threat.matches.push(found),
                    None => threats.push(Threat {
                        signature: signature.name,
                        description: signature.description,
                        severity: signature.severity,
                        matches: vec![found],
                    }),
                }
            }
        }
        threats.sort_by_key(|threat| Reverse(threat.severity));
        (threats, files_scanned)
    }
}

pub(crate) struct Scan<'o> {
    options: &'o ScanOptions,
    files: HashMap<String, PendingFile>,
    pending_bytes: u64,
    report: Report,
}

impl<'o> Scan<'o> {
    pub(crate) fn new(options: &'o ScanOptions) -> Self {
        Self { options, files: HashMap::new(), pending_bytes: 0, report: Report::default() }
    }

    pub(crate) fn run(mut self, reader: &mut PackageReader) -> Result<ScanResult> {
        let mut entries = reader.entries().map_err(ErrorKind::archive)?;
        while let Some(entry) = entries.next() {
            let mut entry = entry.map_err(ErrorKind::archive)?;
            let read = match entry.component {
                ComponentKind::Pathname => self.on_pathname(&mut entry),
                ComponentKind::Asset => self.on_asset(&mut entry),
                ComponentKind::Meta | ComponentKind::Preview => continue,
            };
            if let Err(e) = read {
                entries.payload_failure(e).map_err(ErrorKind::archive)?;
                break;
            }
        }
        let trailing_corruption = entries.stats().trailing_corruption;
        Ok(self.finish(trailing_corruption))
    }

    /// A key's path is fixed once its content has been scanned.
    fn on_pathname(&mut self, entry: &mut PackageEntry<'_>) -> io::Result<()> {
        if entry.declared_len > MAX_PATHNAME_BYTES {
            tracing::warn!(key = %entry.key, size = entry.declared_len, "Ignoring oversized pathname entry");
            return Ok(());
        }
        let mut bytes = Vec::new();
        let declared = entry.declared_len;
        read_exact_prefix(entry, declared, &mut bytes)?;
        if self.report.is_scanned(&entry.key) {
            tracing::debug!(key = %entry.key, "Ignoring pathname for an asset that was already scanned");
            return Ok(());
        }
        let text = String::from_utf8_lossy(&bytes);
        let path = text.trim_start_matches('\u{feff}').lines().next().unwrap_or_default().trim().to_string();

        let file = self.files.entry(entry.key.clone()).or_default();
        if let Some(content) = file.content.take() {
            self.pending_bytes -= content.len() as u64;
            if let Some(reason) = classify(&path) {
                self.report.inspect(&entry.key, &path, reason, &content);
            }
        }
        file.path = Some(path);
        Ok(())
    }

    /// Content with a known path is classified and scanned at once. Anything
    /// else is held, binary or not, until its path arrives; the path alone
    /// decides whether it is a script.
    fn on_asset(&mut self, entry: &mut PackageEntry<'_>) -> io::Result<()> {
        let limit = self.options.max_scan_bytes;
        let declared = entry.declared_len;
        let file = self.files.entry(entry.key.clone()).or_default();
        if let Some(path) = &file.path {
            let Some(reason) = classify(path) else {
                return Ok(());
            };
            if declared > limit {
                tracing::debug!(path = %path, size = declared, limit, "Scanning only the start of a large file");
            }
            let mut content = Vec::new();
            read_exact_prefix(entry, declared.min(limit), &mut content)?;
            self.report.inspect(&entry.key, path, reason, &content);
            return Ok(());
        }

        let mut content = Vec::new();
        read_exact_prefix(entry, declared.min(limit), &mut content)?;
        if let Some(previous) = file.content.take() {
            self.pending_bytes -= previous.len() as u64;
        }
        if self.pending_bytes + content.len() as u64 > MAX_PENDING_BYTES {
            tracing::warn!(key = %entry.key, "Too much content waiting for a path; skipping file");
            return Ok(());
        }
        self.pending_bytes += content.len() as u64;
        file.content = Some(content);
        Ok(())
    }

    fn finish(self, trailing_corruption: bool) -> ScanResult {
        let Self { files, report, .. } = self;
        for (key, file) in files {
            if file.path.is_none() && file.content.is_some() {
                tracing::warn!(key = %key, "Asset never received a pathname; content not scanned");
            }
        }
        let (threats, files_scanned) = report.into_threats();
        let result = ScanResult::new(threats, files_scanned, trailing_corruption);
        tracing::info!(
            files = result.files_scanned,
            threats = result.threats.len(),
            malicious = result.is_malicious,
            "Package scanned"
        );
        result
    }
}

/// Read exactly `len` bytes of the body, failing if it ends early.
fn read_exact_prefix(entry: &mut impl Read, len: u64, buffer: &mut Vec<u8>) -> io::Result<()> {
    entry.take(len).read_to_end(buffer)?;
    if (buffer.len() as u64) < len {
        return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "entry ended early"));
    }
    Ok(())
}
