//! Asset assembly: scattered `<key>/<component>` entries → whole assets.

use crate::component::Component;
use crate::resolve::{NormalizedPath, normalize};
use std::collections::{HashMap, HashSet};
use unipkg_archive::ComponentKind;

/// The content-bearing slots of an asset.
#[derive(Default)]
pub(crate) struct Slots {
    pub(crate) asset: Option<Component>,
    pub(crate) meta: Option<Component>,
    pub(crate) preview: Option<Component>,
}

impl Slots {
    fn slot(&mut self, kind: ComponentKind) -> Option<&mut Option<Component>> {
        match kind {
            ComponentKind::Asset => Some(&mut self.asset),
            ComponentKind::Meta => Some(&mut self.meta),
            ComponentKind::Preview => Some(&mut self.preview),
            ComponentKind::Pathname => None,
        }
    }

    pub(crate) fn release(self) {
        [self.asset, self.meta, self.preview].into_iter().flatten().for_each(Component::release);
    }
}

/// Everything known so far about one key.
#[derive(Default)]
pub(crate) struct AssetRecord {
    pub(crate) raw_path: Option<String>,
    pub(crate) path: NormalizedPath,
    pub(crate) slots: Slots,
    pub(crate) completed: bool,
}

impl AssetRecord {
    /// Writable once it has somewhere to go and something to put there.
    /// Zero-length content counts.
    pub(crate) fn is_ready(&self) -> bool {
        !self.path.is_empty() && self.slots.asset.is_some()
    }
}

/// What an update did to its record.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Update {
    /// The update was not applied; any incoming content was released.
    Discarded,
    Stored,
    /// The record just became ready for the first time.
    Ready,
}

/// Key → record arena plus the set of keys already handed to the session.
#[derive(Default)]
pub(crate) struct AssemblyTable {
    records: HashMap<String, AssetRecord>,
    queued: HashSet<String>,
}

impl AssemblyTable {
    pub(crate) fn get(&self, key: &str) -> Option<&AssetRecord> {
        self.records.get(key)
    }

    /// Store the destination path text for `key`.
    ///
    /// Once a record has been queued its destination is fixed, so later
    /// path entries are ignored.
    pub(crate) fn set_path(&mut self, key: &str, raw: String) -> Update {
        if self.queued.contains(key) {
            tracing::debug!(key, path = %raw, "Ignoring pathname for an asset that is already queued");
            return Update::Discarded;
        }
        let record = self.records.entry(key.to_string()).or_default();
        record.path = normalize(&raw);
        if record.path.is_empty() {
            tracing::warn!(key, path = %raw, "Asset path is empty after normalization");
        }
        record.raw_path = Some(raw);
        self.check_ready(key)
    }

    /// Install a content component, releasing whatever occupied the slot.
    pub(crate) fn install(&mut self, key: &str, kind: ComponentKind, component: Component) -> Update {
        let record = self.records.entry(key.to_string()).or_default();
        let completed = record.completed;
        let Some(slot) = record.slots.slot(kind).filter(|_| !completed) else {
            tracing::debug!(key, component = %kind, "Discarding component for a completed asset");
            component.release();
            return Update::Discarded;
        };
        if let Some(previous) = slot.replace(component) {
            tracing::debug!(key, component = %kind, "Replacing duplicate component");
            previous.release();
        }
        self.check_ready(key)
    }

    fn check_ready(&mut self, key: &str) -> Update {
        let ready = self.records.get(key).is_some_and(AssetRecord::is_ready);
        if ready && self.queued.insert(key.to_string()) {
            return Update::Ready;
        }
        Update::Stored
    }

    /// Mark `key` completed and hand over its slots for writing and release.
    /// Returns `None` if there is no such record or it already completed.
    pub(crate) fn complete(&mut self, key: &str) -> Option<Slots> {
        let record = self.records.get_mut(key).filter(|record| !record.completed)?;
        record.completed = true;
        Some(std::mem::take(&mut record.slots))
    }

    /// Release every record that never became ready. Returns how many there
    /// were.
    pub(crate) fn release_unready(&mut self) -> usize {
        let mut released = 0;
        for (key, record) in self.records.iter_mut().filter(|(_, record)| !record.completed && !record.is_ready()) {
            match (&record.raw_path, record.slots.asset.is_some()) {
                // Folders ship a path and a meta file but no content.
                (Some(raw), false) => tracing::trace!(key = %key, path = %raw, "Asset has no content"),
                (None, _) => tracing::warn!(key = %key, "Asset never received a pathname; discarding"),
                (Some(raw), true) => tracing::warn!(key = %key, path = %raw, "Asset path unusable; discarding"),
            }
            record.completed = true;
            std::mem::take(&mut record.slots).release();
            released += 1;
        }
        released
    }

    /// Release all remaining content, whatever state it's in.
    pub(crate) fn release_all(&mut self) {
        for record in self.records.values_mut() {
            std::mem::take(&mut record.slots).release();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::{Materialized, materialize};
    use crate::limits::{ExtractionLimits, Limiter};
    use std::io::Cursor;
    use tempfile::TempDir;
    use tokio_util::sync::CancellationToken;

    struct Fixture {
        dir: TempDir,
        limiter: Limiter,
    }

    impl Fixture {
        fn new() -> Self {
            Self { dir: TempDir::new().unwrap(), limiter: Limiter::new(ExtractionLimits::default()) }
        }

        fn component(&mut self, data: &[u8]) -> Component {
            let cancel = CancellationToken::new();
            match materialize(&mut Cursor::new(data), data.len() as u64, self.dir.path(), &mut self.limiter, &cancel)
                .unwrap()
            {
                Materialized::Complete(component) => component,
                _ => panic!("component was not materialized"),
            }
        }

        fn blobs(&self) -> usize {
            std::fs::read_dir(self.dir.path()).unwrap().count()
        }
    }

    #[test]
    fn test_ready_once_path_and_asset_present() {
        let mut fx = Fixture::new();
        let mut table = AssemblyTable::default();
        assert_eq!(table.install("k", ComponentKind::Meta, fx.component(b"meta")), Update::Stored);
        assert_eq!(table.install("k", ComponentKind::Asset, fx.component(b"")), Update::Stored);
        assert_eq!(table.set_path("k", "Assets/a.txt".into()), Update::Ready);
        assert_eq!(table.install("k", ComponentKind::Preview, fx.component(b"png")), Update::Stored);
        assert!(table.get("k").unwrap().slots.preview.is_some());
    }

    #[test]
    fn test_last_write_wins_and_releases_previous() {
        let mut fx = Fixture::new();
        let mut table = AssemblyTable::default();
        table.install("k", ComponentKind::Asset, fx.component(b"first"));
        table.install("k", ComponentKind::Asset, fx.component(b"second"));
        assert_eq!(fx.blobs(), 1);
        assert_eq!(table.get("k").unwrap().slots.asset.as_ref().unwrap().len(), 6);
    }

    #[test]
    fn test_completed_records_discard_new_components() {
        let mut fx = Fixture::new();
        let mut table = AssemblyTable::default();
        table.set_path("k", "Assets/a.txt".into());
        assert_eq!(table.install("k", ComponentKind::Asset, fx.component(b"a")), Update::Ready);
        table.complete("k").unwrap().release();
        assert_eq!(table.install("k", ComponentKind::Asset, fx.component(b"b")), Update::Discarded);
        assert_eq!(fx.blobs(), 0);
        assert!(table.complete("k").is_none());
    }

    #[test]
    fn test_unusable_path_never_ready() {
        let mut fx = Fixture::new();
        let mut table = AssemblyTable::default();
        table.install("k", ComponentKind::Asset, fx.component(b"a"));
        assert_eq!(table.set_path("k", "../..".into()), Update::Stored);
        assert_eq!(table.release_unready(), 1);
        assert_eq!(fx.blobs(), 0);
    }

    #[test]
    fn test_path_fixed_once_queued() {
        let mut fx = Fixture::new();
        let mut table = AssemblyTable::default();
        table.set_path("k", "Assets/a.txt".into());
        table.install("k", ComponentKind::Asset, fx.component(b"a"));
        assert_eq!(table.set_path("k", "Assets/b.txt".into()), Update::Discarded);
        assert_eq!(table.get("k").unwrap().path.as_relative(), "Assets/a.txt");
    }
}
