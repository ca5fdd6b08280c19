//! The extraction state machine.
//!
//! Entries are consumed strictly in order. Each asset is handed over the
//! moment it first becomes ready, whichever of its path or content arrived
//! last. Writing is deferred until the first asset whose plan actually needs
//! a write: at that point every asset that was ready before it is flushed
//! together, and every later asset is written as soon as it is ready. A run where nothing needs writing finalizes as a
//! no-op.

use crate::assembly::{AssemblyTable, Slots, Update};
use crate::component::{COPY_BUFFER, Component, Materialized, materialize};
use crate::error::{ErrorKind, Result};
use crate::limits::Limiter;
use crate::options::ExtractOptions;
use crate::plan::WritePlan;
use crate::resolve::{Destination, Resolver, Target, prepare_root};
use crate::{ExtractionResult, Outcome};
use exn::ResultExt;
use std::cmp::Reverse;
use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use unipkg_archive::{ComponentKind, DecodeStats, PackageEntries, PackageReader};

/// `pathname` payloads beyond this are not paths.
const MAX_PATHNAME_BYTES: u64 = 64 * 1024;

enum Flow {
    Continue,
    Cancelled,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Phase {
    /// No asset has needed a write yet; ready assets accumulate in `pending`.
    Deferring,
    /// The first real write happened; ready assets are written immediately.
    Streaming,
}

pub(crate) struct Session<'o> {
    options: &'o ExtractOptions,
    source: PathBuf,
    root: PathBuf,
    temp: TempDir,
    table: AssemblyTable,
    limiter: Limiter,
    resolver: Resolver,
    destinations: HashMap<String, Destination>,
    phase: Phase,
    pending: Vec<String>,
    created_dirs: Vec<PathBuf>,
    written_files: Vec<PathBuf>,
    total_bytes: u64,
    assets_extracted: u64,
    assets_written: u64,
}

impl<'o> Session<'o> {
    pub(crate) fn new(source: PathBuf, output: &Path, options: &'o ExtractOptions) -> Result<Self> {
        let root = prepare_root(output)?;
        let temp = temp_scope(options.temp_dir.as_deref())?;
        tracing::debug!(output = %root.display(), temp = %temp.path().display(), "Extraction session started");
        Ok(Self {
            options,
            source,
            resolver: Resolver::new(root.clone(), options.organize_by_category),
            root,
            temp,
            table: AssemblyTable::default(),
            limiter: Limiter::new(options.limits),
            destinations: HashMap::new(),
            phase: Phase::Deferring,
            pending: Vec::new(),
            created_dirs: Vec::new(),
            written_files: Vec::new(),
            total_bytes: 0,
            assets_extracted: 0,
            assets_written: 0,
        })
    }

    /// Drive the session to completion. Temporary resources are released and
    /// empty directories this session created are pruned on every exit path.
    pub(crate) fn run(mut self, reader: &mut PackageReader) -> Result<Outcome> {
        let driven = self.drive(reader);
        self.table.release_all();
        self.prune();
        let Self { temp, .. } = self;
        let temp_path = temp.path().to_path_buf();
        if let Err(e) = temp.close() {
            tracing::warn!(path = %temp_path.display(), error = %e, "Failed to remove temporary directory");
        }
        let (flow, stats) = driven?;
        let result = ExtractionResult {
            source: self.source,
            output_dir: self.root,
            assets_extracted: self.assets_extracted,
            written_files: self.written_files,
            total_bytes: self.total_bytes,
            skipped_entries: stats.skipped,
            trailing_corruption: stats.trailing_corruption,
        };
        Ok(match flow {
            Flow::Continue => Outcome::Completed(result),
            Flow::Cancelled => Outcome::Cancelled(result),
        })
    }

    fn drive(&mut self, reader: &mut PackageReader) -> Result<(Flow, DecodeStats)> {
        let mut entries = reader.entries().map_err(ErrorKind::archive)?;
        let flow = self.consume(&mut entries)?;
        let stats = entries.stats();
        if let Flow::Cancelled = flow {
            tracing::info!(assets = self.assets_extracted, "Extraction cancelled");
            return Ok((flow, stats));
        }
        let flow = self.finish()?;
        if let Flow::Continue = flow {
            tracing::info!(
                assets = self.assets_extracted,
                written = self.assets_written,
                bytes = self.total_bytes,
                entries = stats.headers,
                skipped = stats.skipped,
                trailing_corruption = stats.trailing_corruption,
                "Package extracted"
            );
        }
        Ok((flow, stats))
    }

    fn consume(&mut self, entries: &mut PackageEntries<'_>) -> Result<Flow> {
        while let Some(entry) = entries.next() {
            if self.options.cancel.is_cancelled() {
                return Ok(Flow::Cancelled);
            }
            let mut entry = entry.map_err(ErrorKind::archive)?;
            let key = entry.key.clone();
            let declared = entry.declared_len;
            let update = match entry.component {
                ComponentKind::Pathname => match read_pathname(&mut entry, declared, &key) {
                    Ok(Some(raw)) => self.table.set_path(&key, raw),
                    Ok(None) => continue,
                    Err(e) => {
                        entries.payload_failure(e).map_err(ErrorKind::archive)?;
                        break;
                    },
                },
                kind => {
                    let cancel = &self.options.cancel;
                    match materialize(&mut entry, declared, self.temp.path(), &mut self.limiter, cancel)? {
                        Materialized::Complete(component) => self.table.install(&key, kind, component),
                        Materialized::Cancelled => return Ok(Flow::Cancelled),
                        Materialized::Interrupted(e) => {
                            entries.payload_failure(e).map_err(ErrorKind::archive)?;
                            break;
                        },
                    }
                },
            };
            if update == Update::Ready
                && let Flow::Cancelled = self.on_ready(&key)?
            {
                return Ok(Flow::Cancelled);
            }
        }
        Ok(Flow::Continue)
    }

    /// Entry stream exhausted: drop the assets that never became ready and
    /// settle whatever is still pending.
    fn finish(&mut self) -> Result<Flow> {
        let unready = self.table.release_unready();
        if unready > 0 {
            tracing::debug!(count = unready, "Released assets that never became ready");
        }
        if self.phase == Phase::Deferring {
            // Pending assets may have had components replaced since they
            // were first planned.
            let mut needs_write = false;
            for key in &self.pending {
                needs_write |= self.needs_write(key)?;
            }
            if !needs_write {
                return Ok(self.finalize_noop());
            }
            self.phase = Phase::Streaming;
        }
        self.flush_pending()
    }

    fn on_ready(&mut self, key: &str) -> Result<Flow> {
        self.limiter.register_asset()?;
        let Some(record) = self.table.get(key) else {
            return Ok(Flow::Continue);
        };
        let asset_len = record.slots.asset.as_ref().map_or(0, Component::len);
        let destination = self.resolver.resolve(key, &record.path, asset_len)?;
        self.destinations.insert(key.to_string(), destination);
        if self.phase == Phase::Streaming {
            return self.commit(key);
        }
        if !self.needs_write(key)? {
            self.pending.push(key.to_string());
            return Ok(Flow::Continue);
        }
        tracing::debug!(pending = self.pending.len(), "First write required; flushing pending assets");
        self.phase = Phase::Streaming;
        if let Flow::Cancelled = self.flush_pending()? {
            return Ok(Flow::Cancelled);
        }
        self.commit(key)
    }

    fn needs_write(&self, key: &str) -> Result<bool> {
        match (self.destinations.get(key), self.table.get(key)) {
            (Some(Destination::File(target)), Some(record)) => Ok(WritePlan::new(&record.slots, target)?.any()),
            _ => Ok(false),
        }
    }

    fn flush_pending(&mut self) -> Result<Flow> {
        for key in std::mem::take(&mut self.pending) {
            if let Flow::Cancelled = self.commit(&key)? {
                return Ok(Flow::Cancelled);
            }
        }
        Ok(Flow::Continue)
    }

    /// Nothing needs writing: every pending asset is already on disk.
    fn finalize_noop(&mut self) -> Flow {
        for key in std::mem::take(&mut self.pending) {
            if let Some(slots) = self.table.complete(&key) {
                slots.release();
            }
            if let Some(Destination::File(_)) = self.destinations.remove(&key) {
                self.assets_extracted += 1;
            }
        }
        tracing::info!(assets = self.assets_extracted, "Output is already up to date; nothing written");
        Flow::Continue
    }

    /// Write whatever the asset's plan calls for, then complete it.
    fn commit(&mut self, key: &str) -> Result<Flow> {
        let Some(slots) = self.table.complete(key) else {
            return Ok(Flow::Continue);
        };
        let target = match self.destinations.remove(key) {
            Some(Destination::File(target)) => target,
            Some(Destination::FolderMarker) | None => {
                tracing::trace!(key, "Folder marker completed without writing");
                slots.release();
                return Ok(Flow::Continue);
            },
        };
        let flow = self.write_slots(&slots, &target);
        slots.release();
        let written = match flow? {
            (Flow::Cancelled, _) => return Ok(Flow::Cancelled),
            (Flow::Continue, written) => written,
        };
        self.assets_extracted += 1;
        if written {
            self.assets_written += 1;
            tracing::debug!(key, path = %target.relative, count = self.assets_written, "Asset written");
            if let Some(progress) = &self.options.progress {
                progress(Path::new(&target.relative), self.assets_written);
            }
        }
        Ok(Flow::Continue)
    }

    fn write_slots(&mut self, slots: &Slots, target: &Target) -> Result<(Flow, bool)> {
        let plan = WritePlan::new(slots, target)?;
        let writes = [
            (plan.asset, slots.asset.as_ref(), &target.asset),
            (plan.meta, slots.meta.as_ref(), &target.meta),
            (plan.preview, slots.preview.as_ref(), &target.preview),
        ];
        let mut written = false;
        for (_, component, destination) in writes.into_iter().filter(|(needed, _, _)| *needed) {
            let Some(component) = component else {
                continue;
            };
            if let Flow::Cancelled = self.write_component(component, destination)? {
                return Ok((Flow::Cancelled, written));
            }
            written = true;
        }
        Ok((Flow::Continue, written))
    }

    fn write_component(&mut self, component: &Component, destination: &Path) -> Result<Flow> {
        if let Some(parent) = destination.parent() {
            self.create_dirs(parent)?;
        }
        let mut source = component.open().or_raise(|| ErrorKind::Io)?;
        let mut file = File::create(destination).or_raise(|| ErrorKind::Io)?;
        let mut buffer = vec![0; COPY_BUFFER];
        loop {
            if self.options.cancel.is_cancelled() {
                drop(file);
                // A partial file is not a written file.
                if let Err(e) = fs::remove_file(destination) {
                    tracing::warn!(path = %destination.display(), error = %e, "Failed to remove partial file");
                }
                return Ok(Flow::Cancelled);
            }
            let bytes = source.read(&mut buffer).or_raise(|| ErrorKind::Io)?;
            if bytes == 0 {
                break;
            }
            file.write_all(&buffer[..bytes]).or_raise(|| ErrorKind::Io)?;
        }
        file.flush().or_raise(|| ErrorKind::Io)?;
        self.written_files.push(destination.to_path_buf());
        self.total_bytes += component.len();
        Ok(Flow::Continue)
    }

    /// Create `dir` and any missing ancestors, remembering which ones this
    /// session created so they can be pruned.
    fn create_dirs(&mut self, dir: &Path) -> Result<()> {
        let missing: Vec<&Path> = dir.ancestors().take_while(|ancestor| !ancestor.is_dir()).collect();
        for ancestor in missing.into_iter().rev() {
            match fs::create_dir(ancestor) {
                Ok(()) => self.created_dirs.push(ancestor.to_path_buf()),
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists && ancestor.is_dir() => {},
                Err(e) => return Err(e).or_raise(|| ErrorKind::Io),
            }
        }
        Ok(())
    }

    /// Remove directories this session created that ended up empty, deepest
    /// first. Failures are logged only.
    fn prune(&mut self) {
        self.created_dirs.sort_by_key(|dir| Reverse(dir.components().count()));
        for dir in self.created_dirs.drain(..) {
            match fs::remove_dir(&dir) {
                Ok(()) => tracing::debug!(path = %dir.display(), "Pruned empty directory"),
                Err(e) if e.kind() == io::ErrorKind::DirectoryNotEmpty => {},
                Err(e) => tracing::debug!(path = %dir.display(), error = %e, "Failed to prune directory"),
            }
        }
    }
}

fn temp_scope(dir: Option<&Path>) -> Result<TempDir> {
    let mut builder = tempfile::Builder::new();
    builder.prefix("unipkg-");
    match dir {
        Some(dir) => {
            fs::create_dir_all(dir).or_raise(|| ErrorKind::Io)?;
            builder.tempdir_in(dir).or_raise(|| ErrorKind::Io)
        },
        None => builder.tempdir().or_raise(|| ErrorKind::Io),
    }
}

/// Read a `pathname` payload. Returns `None` when the payload is too large
/// to be a path.
fn read_pathname(entry: &mut impl Read, declared: u64, key: &str) -> io::Result<Option<String>> {
    if declared > MAX_PATHNAME_BYTES {
        tracing::warn!(key, size = declared, "Ignoring oversized pathname entry");
        return Ok(None);
    }
    let mut bytes = Vec::new();
    entry.take(MAX_PATHNAME_BYTES + 1).read_to_end(&mut bytes)?;
    if (bytes.len() as u64) < declared {
        return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "pathname entry ended early"));
    }
    if bytes.len() as u64 > MAX_PATHNAME_BYTES {
        tracing::warn!(key, "Ignoring oversized pathname entry");
        return Ok(None);
    }
    let text = String::from_utf8_lossy(&bytes);
    Ok(Some(text.trim_start_matches('\u{feff}').to_string()))
}
