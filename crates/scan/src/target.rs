//! Which files inside a package are worth reading.

/// Extensions of files that can carry executable logic.
const SCRIPT_EXTENSIONS: &[&str] = &["cs", "js", "boo", "jslib", "jspre", "py", "sh", "bat", "cmd", "ps1", "vbs"];

/// Why a file is scanned.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Reason {
    Script,
    /// A script extension hidden behind another one, like `Loader.cs.txt`.
    Stealth,
}

/// Decide whether the file at `path` (as written in its `pathname` entry)
/// should be scanned.
pub(crate) fn classify(path: &str) -> Option<Reason> {
    let file_name = path.trim_end().rsplit(['/', '\\']).next().unwrap_or(path);
    let mut extensions: Vec<String> = file_name.split('.').skip(1).map(str::to_ascii_lowercase).collect();
    let last = extensions.pop()?;
    if SCRIPT_EXTENSIONS.contains(&last.as_str()) {
        return Some(Reason::Script);
    }
    extensions.iter().any(|extension| SCRIPT_EXTENSIONS.contains(&extension.as_str())).then_some(Reason::Stealth)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("Assets/Scripts/Player.cs", Some(Reason::Script))]
    #[case("Assets/Plugins/WebGL/bridge.JSLIB", Some(Reason::Script))]
    #[case("Assets\\Editor\\setup.ps1", Some(Reason::Script))]
    #[case("Assets/Tools/build.sh\n", Some(Reason::Script))]
    #[case("Assets/Textures/icon.png.cs", Some(Reason::Script))]
    #[case("Assets/Docs/Loader.cs.txt", Some(Reason::Stealth))]
    #[case("Assets/Resources/run.bat.bytes", Some(Reason::Stealth))]
    #[case("Assets/Textures/grass.png", None)]
    #[case("Assets/Models/hero.fbx.meta", None)]
    #[case("Assets/Scripts", None)]
    #[case("Assets/cs/readme.txt", None)]
    #[case("", None)]
    fn test_classify(#[case] path: &str, #[case] expected: Option<Reason>) {
        assert_eq!(classify(path), expected);
    }
}
