//! Output-root containment.
//!
//! This is the security boundary: every destination is resolved against the
//! real filesystem (following any symlinks that already exist) and must land
//! inside the canonical output directory.

use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use std::ffi::OsString;
use std::path::{Component, Path, PathBuf};

/// Canonicalize the output directory, creating it first if needed.
pub(crate) fn prepare_root(root: &Path) -> Result<PathBuf> {
    std::fs::create_dir_all(root).or_raise(|| ErrorKind::Io)?;
    root.canonicalize().or_raise(|| ErrorKind::Io)
}

/// Join `relative` onto the canonical `root` and verify the result stays
/// inside it.
///
/// The deepest ancestor that already exists is canonicalized and the rest of
/// the path appended, so links planted in the output directory by a previous
/// run are followed rather than trusted. The comparison ignores case,
/// so a case-insensitive filesystem cannot be used to sidestep it.
pub(crate) fn contain(root: &Path, relative: &Path, entry: &str) -> Result<PathBuf> {
    let candidate = root.join(relative);
    let resolved = resolve_existing(&candidate).ok_or_else(|| exn::Exn::from(traversal(entry, &candidate)))?;
    if !starts_with_ignore_case(&resolved, root) {
        tracing::error!(entry, resolved = %resolved.display(), "Asset path escapes the output directory");
        exn::bail!(ErrorKind::PathTraversal { entry: entry.to_string(), resolved });
    }
    Ok(resolved)
}

fn traversal(entry: &str, candidate: &Path) -> ErrorKind {
    ErrorKind::PathTraversal { entry: entry.to_string(), resolved: candidate.to_path_buf() }
}

fn resolve_existing(path: &Path) -> Option<PathBuf> {
    let mut missing: Vec<OsString> = Vec::new();
    let mut current = path;
    loop {
        match current.canonicalize() {
            Ok(canonical) => {
                return Some(missing.into_iter().rev().fold(canonical, |acc, name| acc.join(name)));
            },
            Err(_) => {
                // Only plain names can be re-appended; anything else means the
                // path cannot be reasoned about.
                match current.components().next_back() {
                    Some(Component::Normal(name)) => missing.push(name.to_os_string()),
                    _ => return None,
                }
                current = current.parent()?;
            },
        }
    }
}

fn starts_with_ignore_case(path: &Path, root: &Path) -> bool {
    let mut path = path.components();
    root.components().all(|expected| {
        path.next().is_some_and(|actual| {
            actual.as_os_str().to_string_lossy().to_lowercase() == expected.as_os_str().to_string_lossy().to_lowercase()
        })
    })
}
