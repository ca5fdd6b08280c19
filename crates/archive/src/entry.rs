//! Entry naming: `<asset key>/<component>`.
//!
//! A package is a flat tarball of directories named by an opaque key (a GUID
//! in packages exported by the editor), each holding up to four files:
//!
//! - `pathname`: UTF-8 text, the project-relative destination path
//! - `asset`: the file contents (absent for folders)
//! - `asset.meta`: the YAML import settings sidecar
//! - `preview.png`: an editor thumbnail

use std::fmt::{Display, Formatter, Result as FmtResult};

/// One of the four entry kinds an asset key can carry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ComponentKind {
    Pathname,
    Asset,
    Meta,
    Preview,
}

impl ComponentKind {
    /// Match an entry's component name, ignoring ASCII case.
    pub fn from_name(name: &str) -> Option<Self> {
        [Self::Pathname, Self::Asset, Self::Meta, Self::Preview]
            .into_iter()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(name))
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pathname => "pathname",
            Self::Asset => "asset",
            Self::Meta => "asset.meta",
            Self::Preview => "preview.png",
        }
    }
}

impl Display for ComponentKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.as_str())
    }
}

/// Split a raw entry name into `(asset key, component name)` on the first
/// path separator.
///
/// Keys group case-insensitively, so the returned key is lower-cased. A
/// leading `./` (written by some tar implementations) is ignored. Returns
/// `None` when either half would be empty.
pub fn split_entry_name(name: &str) -> Option<(String, &str)> {
    let name = name.trim_start_matches("./").trim_start_matches('/');
    let (key, component) = name.split_once(['/', '\\'])?;
    let component = component.trim_end_matches(['/', '\\']);
    if key.is_empty() || component.is_empty() {
        return None;
    }
    Some((key.to_ascii_lowercase(), component))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("pathname", Some(ComponentKind::Pathname))]
    #[case("asset", Some(ComponentKind::Asset))]
    #[case("Asset.Meta", Some(ComponentKind::Meta))]
    #[case("PREVIEW.PNG", Some(ComponentKind::Preview))]
    #[case("asset.txt", None)]
    #[case("", None)]
    fn test_component_from_name(#[case] name: &str, #[case] expected: Option<ComponentKind>) {
        assert_eq!(ComponentKind::from_name(name), expected);
    }

    #[rstest]
    #[case("0a1b2c/asset", Some(("0a1b2c", "asset")))]
    #[case("0A1B2C/pathname", Some(("0a1b2c", "pathname")))]
    #[case("./0a1b2c/asset.meta", Some(("0a1b2c", "asset.meta")))]
    #[case("0a1b2c\\preview.png", Some(("0a1b2c", "preview.png")))]
    #[case("0a1b2c/nested/asset", Some(("0a1b2c", "nested/asset")))]
    #[case("0a1b2c/", None)]
    #[case("0a1b2c", None)]
    #[case("/asset", None)]
    #[case("", None)]
    fn test_split_entry_name(#[case] name: &str, #[case] expected: Option<(&str, &str)>) {
        let actual = split_entry_name(name);
        assert_eq!(actual.as_ref().map(|(k, c)| (k.as_str(), *c)), expected);
    }
}
