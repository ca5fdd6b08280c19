use crate::{Compression, Decoder};
use std::io::{self, Chain, Cursor, Read};

/// A stream whose first bytes were read for sniffing but not consumed.
///
/// Works on sources that can't seek: the head is kept and replayed in front
/// of the rest of the stream.
pub struct Peeked<R> {
    head: Vec<u8>,
    rest: R,
}

impl<R: Read> Peeked<R> {
    /// Read up to `limit` bytes from the start of `reader`. A head shorter
    /// than `limit` means the whole stream was shorter.
    pub fn new(mut reader: R, limit: usize) -> io::Result<Self> {
        let mut head = Vec::with_capacity(limit);
        (&mut reader).take(limit as u64).read_to_end(&mut head)?;
        Ok(Self { head, rest: reader })
    }

    pub fn head(&self) -> &[u8] {
        &self.head
    }

    /// The whole stream again, head included.
    pub fn into_reader(self) -> Chain<Cursor<Vec<u8>>, R> {
        Cursor::new(self.head).chain(self.rest)
    }

    /// The whole stream with the `compression` layer stripped.
    pub fn into_decoder(self, compression: Compression) -> Decoder<Chain<Cursor<Vec<u8>>, R>> {
        Decoder::new(self.into_reader(), compression)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Encoder;
    use std::io::Write;

    /// Hands out at most three bytes per read, like a slow pipe.
    struct Trickle(Cursor<Vec<u8>>);

    impl Read for Trickle {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            let len = buf.len().min(3);
            self.0.read(&mut buf[..len])
        }
    }

    #[test]
    fn test_head_is_filled_across_short_reads() {
        let peeked = Peeked::new(Trickle(Cursor::new(b"0123456789abcdef".to_vec())), 10).unwrap();
        assert_eq!(peeked.head(), b"0123456789");
        let mut replay = Vec::new();
        peeked.into_reader().read_to_end(&mut replay).unwrap();
        assert_eq!(replay, b"0123456789abcdef");
    }

    #[test]
    fn test_short_stream() {
        let peeked = Peeked::new(Cursor::new(b"tiny".to_vec()), 512).unwrap();
        assert_eq!(peeked.head(), b"tiny");
    }

    #[test]
    fn test_sniff_then_decode() {
        let mut encoder = Encoder::new(Vec::new(), Compression::Gzip);
        encoder.write_all(b"tar entries follow").unwrap();
        let peeked = Peeked::new(Cursor::new(encoder.finish().unwrap()), 2).unwrap();
        let compression = Compression::sniff(peeked.head());
        assert_eq!(compression, Compression::Gzip);
        let mut output = String::new();
        peeked.into_decoder(compression).read_to_string(&mut output).unwrap();
        assert_eq!(output, "tar entries follow");
    }
}
