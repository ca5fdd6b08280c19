//! Extension-based destination buckets for organize-by-category mode.

use std::collections::HashMap;
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::sync::LazyLock;

/// Destination subfolder an asset is sorted into.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Category {
    Textures,
    Models,
    Materials,
    Prefabs,
    Scenes,
    Scripts,
    Shaders,
    Audio,
    Animations,
    Fonts,
    Video,
    Data,
    Plugins,
    Documents,
    Other,
    /// No extension and no content: the exporter's placeholder for a folder.
    /// Never written as a file.
    FolderMarker,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Textures => "Textures",
            Self::Models => "Models",
            Self::Materials => "Materials",
            Self::Prefabs => "Prefabs",
            Self::Scenes => "Scenes",
            Self::Scripts => "Scripts",
            Self::Shaders => "Shaders",
            Self::Audio => "Audio",
            Self::Animations => "Animations",
            Self::Fonts => "Fonts",
            Self::Video => "Video",
            Self::Data => "Data",
            Self::Plugins => "Plugins",
            Self::Documents => "Documents",
            Self::Other => "Other",
            Self::FolderMarker => "Folders",
        }
    }
}

impl Display for Category {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.as_str())
    }
}

#[rustfmt::skip]
const TABLE: &[(Category, &[&str])] = &[
    (Category::Textures, &["png", "jpg", "jpeg", "tga", "psd", "tif", "tiff", "bmp", "gif", "exr", "hdr", "dds",
        "ktx", "webp", "svg", "iff", "pict", "cubemap", "spriteatlas", "spriteatlasv2"]),
    (Category::Models, &["fbx", "obj", "dae", "3ds", "blend", "max", "ma", "mb", "dxf", "skp", "c4d", "lxo", "gltf",
        "glb", "usd", "usdz", "ply", "stl", "abc", "mesh"]),
    (Category::Materials, &["mat", "physicmaterial", "physicsmaterial2d", "flare", "rendertexture", "terrainlayer",
        "brush", "guiskin"]),
    (Category::Prefabs, &["prefab"]),
    (Category::Scenes, &["unity", "scenetemplate", "lighting"]),
    (Category::Scripts, &["cs", "js", "boo", "asmdef", "asmref", "jslib", "jspre", "rsp"]),
    (Category::Shaders, &["shader", "cginc", "hlsl", "glsl", "compute", "shadergraph", "shadersubgraph",
        "shadervariants", "raytrace"]),
    (Category::Audio, &["wav", "mp3", "ogg", "aif", "aiff", "flac", "mod", "it", "s3m", "xm", "mixer"]),
    (Category::Animations, &["anim", "controller", "overridecontroller", "mask", "playable", "signal"]),
    (Category::Fonts, &["ttf", "otf", "fontsettings", "dfont"]),
    (Category::Video, &["mp4", "mov", "webm", "avi", "asf", "wmv", "mpg", "mpeg", "m4v", "ogv"]),
    (Category::Data, &["asset", "json", "xml", "yaml", "yml", "txt", "csv", "tsv", "bytes", "preset",
        "inputactions", "uxml", "uss", "tss", "meta"]),
    (Category::Plugins, &["dll", "so", "dylib", "bundle", "aar", "jar", "pdb", "mdb"]),
    (Category::Documents, &["pdf", "md", "rtf", "html", "htm", "doc", "docx"]),
];

/// Lower-cased extension → category. Doubles as the reference extension list
/// used when repairing mangled file names.
static EXTENSIONS: LazyLock<HashMap<&'static str, Category>> = LazyLock::new(|| {
    TABLE.iter().flat_map(|(category, extensions)| extensions.iter().map(move |ext| (*ext, *category))).collect()
});

/// Whether `ext` (without the dot) is a recognized extension, ignoring case.
pub(crate) fn is_known_extension(ext: &str) -> bool {
    EXTENSIONS.contains_key(ext.to_ascii_lowercase().as_str())
}

/// The longest recognized extension that `suffix` starts with, ignoring case.
pub(crate) fn longest_known_prefix(suffix: &str) -> Option<usize> {
    EXTENSIONS
        .keys()
        .map(|ext| ext.len())
        .filter(|len| suffix.get(..*len).is_some_and(|head| is_known_extension(head)))
        .max()
}

/// Pick the bucket for a file name with `len` bytes of content.
pub fn categorize(file_name: &str, len: u64) -> Category {
    let extension = file_name.rsplit_once('.').filter(|(stem, _)| !stem.is_empty());
    match extension {
        None if len == 0 => Category::FolderMarker,
        None => Category::Other,
        Some((_, ext)) => EXTENSIONS.get(ext.to_ascii_lowercase().as_str()).copied().unwrap_or(Category::Other),
    }
}
