//! Write plans: which components of a ready asset actually need writing.

use crate::assembly::Slots;
use crate::component::Component;
use crate::error::{ErrorKind, Result};
use crate::resolve::Target;
use exn::ResultExt;
use std::fs::File;
use std::io;
use std::path::Path;

/// Per-asset decision, derived by comparing each candidate component with
/// whatever already sits at its destination.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct WritePlan {
    pub asset: bool,
    pub meta: bool,
    pub preview: bool,
}

impl WritePlan {
    pub(crate) fn new(slots: &Slots, target: &Target) -> Result<Self> {
        Ok(Self {
            asset: needs_write(slots.asset.as_ref(), &target.asset)?,
            meta: needs_write(slots.meta.as_ref(), &target.meta)?,
            preview: needs_write(slots.preview.as_ref(), &target.preview)?,
        })
    }

    pub fn any(&self) -> bool {
        self.asset || self.meta || self.preview
    }
}

/// A component needs writing unless the destination already holds exactly
/// the same bytes: same length first, then the same BLAKE3 hash.
fn needs_write(component: Option<&Component>, destination: &Path) -> Result<bool> {
    let Some(component) = component else {
        return Ok(false);
    };
    let file = match File::open(destination) {
        Ok(file) => file,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(true),
        Err(e) => return Err(e).or_raise(|| ErrorKind::Io),
    };
    let metadata = file.metadata().or_raise(|| ErrorKind::Io)?;
    if !metadata.is_file() || metadata.len() != component.len() {
        return Ok(true);
    }
    let mut hasher = blake3::Hasher::new();
    hasher.update_reader(file).or_raise(|| ErrorKind::Io)?;
    Ok(hasher.finalize() != *component.hash())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::{Materialized, materialize};
    use crate::limits::{ExtractionLimits, Limiter};
    use std::io::Cursor;
    use tempfile::TempDir;
    use tokio_util::sync::CancellationToken;

    fn component(dir: &Path, data: &[u8]) -> Component {
        let mut limiter = Limiter::new(ExtractionLimits::default());
        let cancel = CancellationToken::new();
        match materialize(&mut Cursor::new(data), data.len() as u64, dir, &mut limiter, &cancel).unwrap() {
            Materialized::Complete(component) => component,
            _ => panic!("component was not materialized"),
        }
    }

    fn target(root: &Path) -> Target {
        Target {
            relative: "a.txt".into(),
            asset: root.join("a.txt"),
            meta: root.join("a.txt.meta"),
            preview: root.join("a.txt.preview.png"),
        }
    }

    #[test]
    fn test_missing_destinations_need_writing() {
        let temp = TempDir::new().unwrap();
        let out = TempDir::new().unwrap();
        let slots = Slots { asset: Some(component(temp.path(), b"hello")), meta: None, preview: None };
        let plan = WritePlan::new(&slots, &target(out.path())).unwrap();
        assert_eq!(plan, WritePlan { asset: true, meta: false, preview: false });
        assert!(plan.any());
    }

    #[test]
    fn test_identical_content_is_skipped() {
        let temp = TempDir::new().unwrap();
        let out = TempDir::new().unwrap();
        std::fs::write(out.path().join("a.txt"), b"hello").unwrap();
        std::fs::write(out.path().join("a.txt.meta"), b"guid: 1").unwrap();
        let slots = Slots {
            asset: Some(component(temp.path(), b"hello")),
            meta: Some(component(temp.path(), b"guid: 2")),
            preview: None,
        };
        let plan = WritePlan::new(&slots, &target(out.path())).unwrap();
        assert_eq!(plan, WritePlan { asset: false, meta: true, preview: false });
    }

    #[test]
    fn test_length_mismatch_needs_writing() {
        let temp = TempDir::new().unwrap();
        let out = TempDir::new().unwrap();
        std::fs::write(out.path().join("a.txt"), b"hello world").unwrap();
        let slots = Slots { asset: Some(component(temp.path(), b"hello")), meta: None, preview: None };
        assert!(WritePlan::new(&slots, &target(out.path())).unwrap().asset);
    }

    #[cfg(unix)]
    #[test]
    fn test_directory_in_the_way_needs_writing() {
        let temp = TempDir::new().unwrap();
        let out = TempDir::new().unwrap();
        std::fs::create_dir(out.path().join("a.txt")).unwrap();
        let slots = Slots { asset: Some(component(temp.path(), b"")), meta: None, preview: None };
        assert!(WritePlan::new(&slots, &target(out.path())).unwrap().asset);
    }
}
