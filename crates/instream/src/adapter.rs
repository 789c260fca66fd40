use std::io::{Cursor, Read, Seek, SeekFrom};

use crate::handle::InputStream;
use crate::source::StreamSource;
use crate::status::SeekBasis;

/// Adapts any `Read + Seek` value (files, cursors) to the stream contract.
///
/// I/O errors have no channel of their own in the handler signatures, so
/// they surface as the contract's failure values: `false` from seek, a
/// negative count from read, `None` from length.
pub struct ReadSeekSource<R> {
    inner: R,
}

impl<R: Read + Seek + Send + 'static> ReadSeekSource<R> {
    pub fn new(inner: R) -> Self {
        Self { inner }
    }
}

impl<R: Read + Seek + Send + 'static> StreamSource for ReadSeekSource<R> {
    fn seek(&mut self, offset: i64, basis: SeekBasis) -> bool {
        let pos = match basis {
            SeekBasis::Start => {
                let Ok(offset) = u64::try_from(offset) else {
                    return false;
                };
                SeekFrom::Start(offset)
            }
            SeekBasis::Current => SeekFrom::Current(offset),
        };
        self.inner.seek(pos).is_ok()
    }

    fn read(&mut self, dest: &mut [u8]) -> isize {
        match self.inner.read(dest) {
            Ok(n) => n as isize,
            Err(_) => -1,
        }
    }

    fn length(&mut self) -> Option<i64> {
        let current = self.inner.stream_position().ok()?;
        let end = self.inner.seek(SeekFrom::End(0)).ok()?;
        self.inner.seek(SeekFrom::Start(current)).ok()?;
        i64::try_from(end).ok()
    }
}

impl InputStream {
    /// Stream over any seekable reader.
    pub fn from_reader(reader: impl Read + Seek + Send + 'static) -> Self {
        InputStream::from_source(ReadSeekSource::new(reader))
    }

    /// In-memory stream over an owned byte buffer.
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        InputStream::from_reader(Cursor::new(bytes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_bytes_reads_in_fixed_chunks_until_end() {
        let mut stream = InputStream::from_bytes(b"a long string here".to_vec());
        let mut buf = [0_u8; 4];
        let mut out = Vec::new();

        loop {
            let n = stream.read(&mut buf).unwrap();
            if n == 0 {
                break;
            }
            out.extend_from_slice(&buf[..n]);
        }

        assert_eq!(out, b"a long string here");
        assert!(stream.status().unwrap().is_end_of_stream);
    }

    #[test]
    fn seek_start_and_current_reposition() {
        let mut stream = InputStream::from_bytes(b"abcdef".to_vec());
        let mut buf = [0_u8; 2];

        stream.seek(4, SeekBasis::Start).unwrap();
        assert_eq!(stream.read(&mut buf).unwrap(), 2);
        assert_eq!(&buf, b"ef");

        stream.seek(-4, SeekBasis::Current).unwrap();
        assert_eq!(stream.read(&mut buf).unwrap(), 2);
        assert_eq!(&buf, b"cd");
    }

    #[test]
    fn negative_offset_from_start_fails_without_moving() {
        let mut stream = InputStream::from_bytes(b"abcdef".to_vec());
        assert!(stream.seek(-1, SeekBasis::Start).is_err());

        let mut buf = [0_u8; 2];
        assert_eq!(stream.read(&mut buf).unwrap(), 2);
        assert_eq!(&buf, b"ab");
    }

    #[test]
    fn length_is_reported_and_position_preserved() {
        let mut stream = InputStream::from_bytes(b"abcdef".to_vec());
        let mut buf = [0_u8; 2];
        stream.read(&mut buf).unwrap();

        assert_eq!(stream.length().unwrap(), 6);

        // length() must not disturb the read position.
        assert_eq!(stream.read(&mut buf).unwrap(), 2);
        assert_eq!(&buf, b"cd");
    }
}
