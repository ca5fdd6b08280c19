//! Compression layers around package containers.
//!
//! A `.unitypackage` is normally a gzip stream around a tarball, but
//! repackaging tools also emit bare tarballs, and now and then a gzip stream
//! made of several concatenated members. This crate tells the layers apart
//! from a stream's first bytes without consuming them ([`Peeked`]), strips
//! the layer while reading ([`Decoder`]) and produces it again for tools and
//! fixtures that build packages ([`Encoder`]).
//!
//! Everything is streaming: a package of any size is decoded in constant
//! memory.

mod decode;
mod encode;
mod peek;

pub use crate::decode::Decoder;
pub use crate::encode::Encoder;
pub use crate::peek::Peeked;

use derive_more::Display;

const GZIP_MAGIC: [u8; 2] = [0x1F, 0x8B];

/// The layer wrapped around a container.
#[derive(Clone, Copy, Debug, Default, Display, PartialEq, Eq, Hash)]
pub enum Compression {
    #[default]
    #[display("none")]
    None,
    #[display("gzip")]
    Gzip,
}

impl Compression {
    /// Identify the layer from the first bytes of a stream.
    ///
    /// Anything that doesn't start with the gzip magic is [`None`](Self::None);
    /// whether those bytes are a tarball at all is for the caller to decide.
    pub fn sniff(head: &[u8]) -> Self {
        if head.starts_with(&GZIP_MAGIC) { Compression::Gzip } else { Compression::None }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(&[0x1F, 0x8B, 0x08, 0x00], Compression::Gzip)]
    #[case(&[0x1F, 0x8B], Compression::Gzip)]
    #[case(&[0x1F], Compression::None)]
    #[case(b"Assets/", Compression::None)]
    #[case(&[], Compression::None)]
    fn test_sniff(#[case] head: &[u8], #[case] expected: Compression) {
        assert_eq!(Compression::sniff(head), expected);
    }

    #[test]
    fn test_display() {
        assert_eq!(Compression::Gzip.to_string(), "gzip");
        assert_eq!(Compression::default().to_string(), "none");
    }
}
