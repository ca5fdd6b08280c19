use crate::Compression;
use flate2::write::GzEncoder;
use std::io::{self, Write};

/// Writes a stream through a compression layer.
///
/// Call [`finish`](Self::finish) when done: dropping an unfinished gzip
/// encoder writes its trailer but swallows any error doing so.
pub enum Encoder<W: Write> {
    Plain(W),
    Gzip(GzEncoder<W>),
}

impl<W: Write> Encoder<W> {
    /// Packages are built once and unpacked many times, so gzip uses the
    /// best (slowest) level.
    pub fn new(writer: W, compression: Compression) -> Self {
        match compression {
            Compression::None => Self::Plain(writer),
            Compression::Gzip => Self::Gzip(GzEncoder::new(writer, flate2::Compression::best())),
        }
    }

    /// Write any trailer and hand back the underlying writer.
    pub fn finish(self) -> io::Result<W> {
        match self {
            Self::Plain(mut writer) => {
                writer.flush()?;
                Ok(writer)
            },
            Self::Gzip(encoder) => encoder.finish(),
        }
    }
}

impl<W: Write> Write for Encoder<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Self::Plain(writer) => writer.write(buf),
            Self::Gzip(encoder) => encoder.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Self::Plain(writer) => writer.flush(),
            Self::Gzip(encoder) => encoder.flush(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gzip_output_carries_magic_and_trailer() {
        let mut encoder = Encoder::new(Vec::new(), Compression::Gzip);
        encoder.write_all(&[0; 4096]).unwrap();
        let bytes = encoder.finish().unwrap();
        assert_eq!(Compression::sniff(&bytes), Compression::Gzip);
        // The trailer ends with the uncompressed length, little-endian.
        assert_eq!(bytes[bytes.len() - 4..], 4096u32.to_le_bytes());
        assert!(bytes.len() < 4096);
    }

    #[test]
    fn test_plain_output_is_verbatim() {
        let mut encoder = Encoder::new(Vec::new(), Compression::None);
        encoder.write_all(b"tarball").unwrap();
        assert_eq!(encoder.finish().unwrap(), b"tarball");
    }
}
