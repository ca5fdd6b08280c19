//! Container classification from leading bytes.

use unipkg_compress::Compression;

/// Smallest well-formed gzip member (10-byte header, empty deflate block,
/// 8-byte trailer). Anything shorter cannot hold a package.
pub const MIN_PACKAGE_BYTES: usize = 20;
/// Bytes to sniff: one full tar header block.
pub const SNIFF_BYTES: usize = 512;

const TAR_MAGIC_OFFSET: usize = 257;
const TAR_CHECKSUM: std::ops::Range<usize> = 148..156;

/// The shape of a container, decided from its first [`SNIFF_BYTES`] bytes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ContainerKind {
    /// Fewer than [`MIN_PACKAGE_BYTES`] bytes were available.
    TooSmall(usize),
    /// A gzip stream, assumed to wrap a tarball (the normal case).
    GzipTar,
    /// An uncompressed tarball, as written by some repackaging tools.
    RawTar,
    /// Anything else, named when the magic is recognisable.
    Unrecognized(Option<ForeignFormat>),
}

/// Formats people commonly mistake for (or rename to) `.unitypackage`.
/// Only used to produce a better diagnostic.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ForeignFormat {
    Zip,
    SevenZip,
    Rar,
    Bzip2,
    Xz,
    Zstd,
    UnityAssetBundle,
    Png,
}

impl ForeignFormat {
    const MAGIC: &[(&'static [u8], ForeignFormat)] = &[
        (b"PK\x03\x04", ForeignFormat::Zip),
        (b"PK\x05\x06", ForeignFormat::Zip),
        (b"7z\xBC\xAF\x27\x1C", ForeignFormat::SevenZip),
        (b"Rar!\x1A\x07", ForeignFormat::Rar),
        (b"BZh", ForeignFormat::Bzip2),
        (b"\xFD7zXZ\x00", ForeignFormat::Xz),
        (b"\x28\xB5\x2F\xFD", ForeignFormat::Zstd),
        (b"UnityFS\x00", ForeignFormat::UnityAssetBundle),
        (b"UnityWeb\x00", ForeignFormat::UnityAssetBundle),
        (b"\x89PNG\r\n\x1A\n", ForeignFormat::Png),
    ];

    fn sniff(head: &[u8]) -> Option<Self> {
        Self::MAGIC.iter().find(|(magic, _)| head.starts_with(magic)).map(|(_, format)| *format)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Zip => "zip archive",
            Self::SevenZip => "7-zip archive",
            Self::Rar => "rar archive",
            Self::Bzip2 => "bzip2 stream",
            Self::Xz => "xz stream",
            Self::Zstd => "zstd stream",
            Self::UnityAssetBundle => "Unity asset bundle",
            Self::Png => "PNG image",
        }
    }
}

/// Classify a container from its leading bytes.
///
/// `head` should hold the first [`SNIFF_BYTES`] bytes of the file, or all of
/// it when the file is shorter.
pub fn classify(head: &[u8]) -> ContainerKind {
    if head.len() < MIN_PACKAGE_BYTES {
        return ContainerKind::TooSmall(head.len());
    }
    if Compression::sniff(head) == Compression::Gzip {
        return ContainerKind::GzipTar;
    }
    if is_tar_header(head) {
        return ContainerKind::RawTar;
    }
    ContainerKind::Unrecognized(ForeignFormat::sniff(head))
}

/// POSIX and GNU tar both put a magic at offset 257; pre-POSIX (v7) headers
/// don't, so fall back to validating the header checksum.
fn is_tar_header(head: &[u8]) -> bool {
    if head.len() < SNIFF_BYTES {
        return false;
    }
    let magic = &head[TAR_MAGIC_OFFSET..TAR_MAGIC_OFFSET + 6];
    if magic == b"ustar\0" || magic == b"ustar " {
        return true;
    }
    let Some(expected) = parse_octal(&head[TAR_CHECKSUM]) else {
        return false;
    };
    // The checksum is computed with its own field read as eight spaces.
    let actual: u64 = head[..SNIFF_BYTES]
        .iter()
        .enumerate()
        .map(|(i, byte)| if TAR_CHECKSUM.contains(&i) { u64::from(b' ') } else { u64::from(*byte) })
        .sum();
    expected == actual
}

fn parse_octal(field: &[u8]) -> Option<u64> {
    let digits: Vec<u8> =
        field.iter().copied().skip_while(|b| *b == b' ').take_while(|b| (b'0'..=b'7').contains(b)).collect();
    if digits.is_empty() {
        return None;
    }
    digits.iter().try_fold(0u64, |acc, d| acc.checked_mul(8)?.checked_add(u64::from(d - b'0')))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn ustar_header() -> Vec<u8> {
        let mut header = vec![0u8; SNIFF_BYTES];
        header[TAR_MAGIC_OFFSET..TAR_MAGIC_OFFSET + 6].copy_from_slice(b"ustar\0");
        header
    }

    fn v7_header() -> Vec<u8> {
        let mut header = vec![0u8; SNIFF_BYTES];
        header[..9].copy_from_slice(b"abc/asset");
        let sum: u64 = header.iter().map(|b| u64::from(*b)).sum::<u64>() + 8 * u64::from(b' ');
        let field = format!("{sum:06o}\0 ");
        header[TAR_CHECKSUM].copy_from_slice(field.as_bytes());
        header
    }

    #[rstest]
    #[case(&[], ContainerKind::TooSmall(0))]
    #[case(&[0x1F, 0x8B, 0x08], ContainerKind::TooSmall(3))]
    #[case(&[0u8; 19], ContainerKind::TooSmall(19))]
    fn test_too_small(#[case] head: &[u8], #[case] expected: ContainerKind) {
        assert_eq!(classify(head), expected);
    }

    #[test]
    fn test_gzip_magic_is_gzip_tar() {
        let mut head = vec![0x1F, 0x8B, 0x08, 0x00];
        head.resize(64, 0);
        assert_eq!(classify(&head), ContainerKind::GzipTar);
    }

    #[test]
    fn test_ustar_is_raw_tar() {
        assert_eq!(classify(&ustar_header()), ContainerKind::RawTar);
    }

    #[test]
    fn test_v7_checksum_is_raw_tar() {
        assert_eq!(classify(&v7_header()), ContainerKind::RawTar);
    }

    #[test]
    fn test_bad_checksum_is_unrecognized() {
        let mut header = v7_header();
        header[0] = b'x';
        assert_eq!(classify(&header), ContainerKind::Unrecognized(None));
    }

    #[rstest]
    #[case(b"PK\x03\x04 some zip content here....", Some(ForeignFormat::Zip))]
    #[case(b"UnityFS\x00\x00\x00\x00\x08 5.x.x 2021.3.1f1", Some(ForeignFormat::UnityAssetBundle))]
    #[case(b"\x89PNG\r\n\x1A\n\x00\x00\x00\rIHDR....", Some(ForeignFormat::Png))]
    #[case(b"Rar!\x1A\x07\x01\x00 more rar bytes....", Some(ForeignFormat::Rar))]
    #[case(b"just some plain text, nothing to see", None)]
    fn test_unrecognized_names_foreign_formats(#[case] head: &[u8], #[case] expected: Option<ForeignFormat>) {
        assert_eq!(classify(head), ContainerKind::Unrecognized(expected));
    }
}
