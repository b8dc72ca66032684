//! Partial-line aware line splitting.

use std::io::{self, BufRead, BufReader, Read};

/// Splits a byte stream into lines, keeping partial data across timeouts.
///
/// `BufRead::read_until` appends whatever it consumed before a timeout error
/// to the caller's buffer, so the buffer lives here instead of on the stack
/// and the next call completes the line.
pub(crate) struct LineReader<R> {
    inner: BufReader<R>,
    pending: Vec<u8>,
}

impl<R: Read> LineReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner: BufReader::new(inner),
            pending: Vec::new(),
        }
    }

    /// Read the next line. `Ok(None)` means end of stream.
    ///
    /// An unterminated trailing line is returned before end of stream is
    /// reported. Timeout errors are passed through untouched.
    pub fn read_line(&mut self) -> io::Result<Option<String>> {
        match self.inner.read_until(b'\n', &mut self.pending) {
            Ok(0) if self.pending.is_empty() => Ok(None),
            Ok(_) => Ok(Some(self.take_line())),
            Err(e) => Err(e),
        }
    }

    fn take_line(&mut self) -> String {
        let mut bytes = std::mem::take(&mut self.pending);
        while matches!(bytes.last(), Some(b'\n' | b'\r')) {
            bytes.pop();
        }
        String::from_utf8_lossy(&bytes).into_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    /// Yields its chunks one read at a time, with a timeout between them.
    struct Stuttering {
        chunks: Vec<Vec<u8>>,
        timed_out: bool,
    }

    impl Read for Stuttering {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            if !self.timed_out {
                self.timed_out = true;
                return Err(io::Error::from(io::ErrorKind::WouldBlock));
            }
            self.timed_out = false;
            if self.chunks.is_empty() {
                return Ok(0);
            }
            let chunk = self.chunks.remove(0);
            buf[..chunk.len()].copy_from_slice(&chunk);
            Ok(chunk.len())
        }
    }

    #[test]
    fn test_splits_lines_and_strips_terminators() {
        let mut reader = LineReader::new(Cursor::new("one\r\ntwo\nthree"));
        assert_eq!(reader.read_line().unwrap().as_deref(), Some("one"));
        assert_eq!(reader.read_line().unwrap().as_deref(), Some("two"));
        assert_eq!(reader.read_line().unwrap().as_deref(), Some("three"));
        assert_eq!(reader.read_line().unwrap(), None);
    }

    #[test]
    fn test_partial_line_survives_timeout() {
        let mut reader = LineReader::new(Stuttering {
            chunks: vec![b"TV (0): power ".to_vec(), b"status\n".to_vec()],
            timed_out: true,
        });

        // First chunk arrives, then the source times out mid-line.
        let err = reader.read_line().unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::WouldBlock);

        // Nothing may be lost: the next successful read completes the line.
        let mut line = None;
        for _ in 0..4 {
            match reader.read_line() {
                Ok(found) => {
                    line = found;
                    break;
                }
                Err(e) => assert_eq!(e.kind(), io::ErrorKind::WouldBlock),
            }
        }
        assert_eq!(line.as_deref(), Some("TV (0): power status"));
    }

    #[test]
    fn test_invalid_utf8_is_replaced() {
        let mut reader = LineReader::new(Cursor::new(vec![b'o', 0xFF, b'k', b'\n']));
        assert_eq!(reader.read_line().unwrap().as_deref(), Some("o\u{FFFD}k"));
    }
}
