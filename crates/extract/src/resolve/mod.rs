//! Path & category resolution: raw `pathname` text in, contained and
//! de-duplicated destination out.

mod category;
mod contain;
mod dedupe;
mod normalize;

pub use self::category::{Category, categorize};
pub(crate) use self::contain::prepare_root;
pub use self::normalize::{NormalizedPath, SegmentPair, normalize, repair_extension};

use self::contain::contain;
use self::dedupe::DuplicateTracker;
use crate::error::Result;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

const META_SUFFIX: &str = ".meta";
const PREVIEW_SUFFIX: &str = ".preview.png";

/// Where an asset's components go.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Target {
    /// Destination relative to the output directory, `/`-separated.
    pub relative: String,
    pub asset: PathBuf,
    pub meta: PathBuf,
    pub preview: PathBuf,
}

/// What to do with a ready asset.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Destination {
    File(Target),
    /// Organize mode only: a folder placeholder, completed without writing.
    FolderMarker,
}

pub(crate) struct Resolver {
    root: PathBuf,
    organize: bool,
    names: DuplicateTracker,
}

impl Resolver {
    /// `root` must already be canonical (see [`prepare_root`]).
    pub(crate) fn new(root: PathBuf, organize: bool) -> Self {
        Self { root, organize, names: DuplicateTracker::default() }
    }

    /// Decide the destination for the asset under `key`.
    ///
    /// Fails with [`PathTraversal`](crate::error::ErrorKind::PathTraversal)
    /// if the destination would fall outside the output directory.
    pub(crate) fn resolve(&mut self, key: &str, path: &NormalizedPath, asset_len: u64) -> Result<Destination> {
        let relative = match (self.organize, path.file_name()) {
            (true, Some(file_name)) => match categorize(file_name, asset_len) {
                Category::FolderMarker => return Ok(Destination::FolderMarker),
                category => format!("{category}/{file_name}"),
            },
            _ => path.as_relative(),
        };
        let relative = self.names.claim(&relative, &[META_SUFFIX, PREVIEW_SUFFIX]);
        let asset = contain(&self.root, Path::new(&relative), key)?;
        Ok(Destination::File(Target {
            meta: sidecar(&asset, META_SUFFIX),
            preview: sidecar(&asset, PREVIEW_SUFFIX),
            asset,
            relative,
        }))
    }
}

fn sidecar(asset: &Path, suffix: &str) -> PathBuf {
    let mut path = OsString::from(asset.as_os_str());
    path.push(suffix);
    PathBuf::from(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use tempfile::TempDir;

    fn resolver(organize: bool) -> (TempDir, Resolver) {
        let dir = TempDir::new().unwrap();
        let root = prepare_root(dir.path()).unwrap();
        (dir, Resolver::new(root, organize))
    }

    #[test]
    fn test_mirrors_package_layout() {
        let (dir, mut resolver) = resolver(false);
        let root = dir.path().canonicalize().unwrap();
        let Destination::File(target) = resolver.resolve("k", &normalize("Assets/Art/tree.png"), 10).unwrap() else {
            panic!("expected a file destination");
        };
        assert_eq!(target.relative, "Assets/Art/tree.png");
        assert_eq!(target.asset, root.join("Assets/Art/tree.png"));
        assert_eq!(target.meta, root.join("Assets/Art/tree.png.meta"));
        assert_eq!(target.preview, root.join("Assets/Art/tree.png.preview.png"));
    }

    #[test]
    fn test_organize_flattens_into_categories() {
        let (_dir, mut resolver) = resolver(true);
        let Destination::File(target) = resolver.resolve("k", &normalize("Assets/Deep/Nested/Hero.cs"), 10).unwrap()
        else {
            panic!("expected a file destination");
        };
        assert_eq!(target.relative, "Scripts/Hero.cs");
        let Destination::File(target) = resolver.resolve("j", &normalize("Assets/Other/Hero.cs"), 10).unwrap() else {
            panic!("expected a file destination");
        };
        assert_eq!(target.relative, "Scripts/Hero (1).cs");
    }

    #[test]
    fn test_organize_recognizes_folder_markers() {
        let (_dir, mut resolver) = resolver(true);
        assert_eq!(resolver.resolve("k", &normalize("Assets/Materials"), 0).unwrap(), Destination::FolderMarker);
        let (_dir, mut resolver) = self::resolver(false);
        assert!(matches!(resolver.resolve("k", &normalize("Assets/Materials"), 0).unwrap(), Destination::File(_)));
    }

    #[cfg(unix)]
    #[test]
    fn test_planted_symlink_is_fatal() {
        let (dir, mut resolver) = resolver(false);
        let outside = TempDir::new().unwrap();
        std::os::unix::fs::symlink(outside.path(), dir.path().join("Assets")).unwrap();
        let err = resolver.resolve("k", &normalize("Assets/x.txt"), 1).unwrap_err();
        assert!(matches!(&*err, ErrorKind::PathTraversal { entry, .. } if entry == "k"));
    }
}
