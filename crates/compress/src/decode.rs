use crate::Compression;
use flate2::read::MultiGzDecoder;
use std::io::{self, Read};

/// Reads a stream with its compression layer stripped.
///
/// Gzip input may consist of several members back to back; they are read as
/// one continuous stream. Damaged input surfaces as an [`io::Error`] from
/// [`read`](Read::read) at the point of damage, so everything before it can
/// still be consumed.
pub enum Decoder<R: Read> {
    Plain(R),
    Gzip(MultiGzDecoder<R>),
}

impl<R: Read> Decoder<R> {
    pub fn new(reader: R, compression: Compression) -> Self {
        match compression {
            Compression::None => Self::Plain(reader),
            Compression::Gzip => Self::Gzip(MultiGzDecoder::new(reader)),
        }
    }

    pub fn compression(&self) -> Compression {
        match self {
            Self::Plain(_) => Compression::None,
            Self::Gzip(_) => Compression::Gzip,
        }
    }
}

impl<R: Read> Read for Decoder<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            Self::Plain(reader) => reader.read(buf),
            Self::Gzip(decoder) => decoder.read(buf),
        }
    }
}
