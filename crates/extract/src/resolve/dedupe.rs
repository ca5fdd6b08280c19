//! Destination collisions within one session.

use std::collections::{HashMap, HashSet};

/// Hands out unique relative destinations for the life of a session.
///
/// Paths are compared ignoring case, since the output may well live on a
/// case-insensitive filesystem. When a destination is taken, a `" (N)"`
/// suffix is inserted before the extension, with `N` counting up per
/// `(directory, file name)` pair so repeated collisions don't rescan from 1.
/// Files already on disk from an earlier run are not collisions: re-running
/// against the same output yields the same names, which keeps re-extraction
/// idempotent.
#[derive(Debug, Default)]
pub(crate) struct DuplicateTracker {
    used: HashSet<String>,
    counters: HashMap<(String, String), u32>,
}

impl DuplicateTracker {
    /// Claim `relative` (a `/`-separated path), or the first free suffixed
    /// variant of it, together with the sidecar paths formed by appending
    /// each of `sidecars`. A candidate is only taken when none of those paths
    /// is in use, so an asset can't land on another asset's sidecar or the
    /// other way round.
    pub(crate) fn claim(&mut self, relative: &str, sidecars: &[&str]) -> String {
        if self.try_claim(relative, sidecars) {
            return relative.to_string();
        }
        let (directory, file_name) = match relative.rsplit_once('/') {
            Some((directory, file_name)) => (Some(directory), file_name),
            None => (None, relative),
        };
        let (stem, extension) = match file_name.rsplit_once('.') {
            Some((stem, extension)) if !stem.is_empty() => (stem, Some(extension)),
            _ => (file_name, None),
        };
        let bucket = (directory.unwrap_or_default().to_lowercase(), file_name.to_lowercase());
        loop {
            let counter = self.counters.entry(bucket.clone()).or_insert(0);
            *counter += 1;
            let renamed = match extension {
                Some(extension) => format!("{stem} ({counter}).{extension}"),
                None => format!("{stem} ({counter})"),
            };
            let candidate = match directory {
                Some(directory) => format!("{directory}/{renamed}"),
                None => renamed,
            };
            if self.try_claim(&candidate, sidecars) {
                tracing::debug!(original = relative, renamed = %candidate, "Renamed colliding destination");
                return candidate;
            }
        }
    }

    fn try_claim(&mut self, relative: &str, sidecars: &[&str]) -> bool {
        let base = relative.to_lowercase();
        let paths: Vec<String> =
            std::iter::once(base.clone()).chain(sidecars.iter().map(|suffix| format!("{base}{suffix}"))).collect();
        if paths.iter().any(|path| self.used.contains(path)) {
            return false;
        }
        self.used.extend(paths);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_claim_is_unchanged() {
        let mut tracker = DuplicateTracker::default();
        assert_eq!(tracker.claim("Assets/a.png", &[]), "Assets/a.png");
        assert_eq!(tracker.claim("Assets/b.png", &[]), "Assets/b.png");
    }

    #[test]
    fn test_collisions_count_up_per_bucket() {
        let mut tracker = DuplicateTracker::default();
        assert_eq!(tracker.claim("Assets/a.png", &[]), "Assets/a.png");
        assert_eq!(tracker.claim("Assets/a.png", &[]), "Assets/a (1).png");
        assert_eq!(tracker.claim("assets/A.PNG", &[]), "assets/A (2).PNG");
        assert_eq!(tracker.claim("Other/a.png", &[]), "Other/a.png");
        assert_eq!(tracker.claim("Other/a.png", &[]), "Other/a (1).png");
    }

    #[test]
    fn test_suffix_skips_names_already_taken() {
        let mut tracker = DuplicateTracker::default();
        tracker.claim("a (1).txt", &[]);
        tracker.claim("a.txt", &[]);
        assert_eq!(tracker.claim("a.txt", &[]), "a (2).txt");
    }

    const SIDECARS: &[&str] = &[".meta", ".preview.png"];

    #[test]
    fn test_asset_named_like_a_sidecar_is_renamed() {
        let mut tracker = DuplicateTracker::default();
        assert_eq!(tracker.claim("Assets/a.txt", SIDECARS), "Assets/a.txt");
        assert_eq!(tracker.claim("Assets/a.txt.meta", SIDECARS), "Assets/a.txt (1).meta");
        assert_eq!(tracker.claim("Assets/b.png.preview.png", SIDECARS), "Assets/b.png.preview.png");
    }

    #[test]
    fn test_asset_whose_sidecar_is_taken_is_renamed() {
        let mut tracker = DuplicateTracker::default();
        assert_eq!(tracker.claim("Assets/a.txt.meta", SIDECARS), "Assets/a.txt.meta");
        assert_eq!(tracker.claim("Assets/A.TXT", SIDECARS), "Assets/A (1).TXT");
        assert_eq!(tracker.claim("Assets/b.png.preview.png", SIDECARS), "Assets/b.png.preview.png");
        assert_eq!(tracker.claim("Assets/b.png", SIDECARS), "Assets/b (1).png");
    }

    #[test]
    fn test_names_without_extension() {
        let mut tracker = DuplicateTracker::default();
        tracker.claim("Assets/LICENSE", &[]);
        assert_eq!(tracker.claim("Assets/LICENSE", &[]), "Assets/LICENSE (1)");
        tracker.claim(".gitignore", &[]);
        assert_eq!(tracker.claim(".gitignore", &[]), ".gitignore (1)");
    }
}
