//! Line framing for the inbound byte stream.
//!
//! Lines end at either `\n` or `\r`; a `\r\n` pair therefore produces an
//! empty line in between, which is skipped along with any other empty line.
//! A line that fills the whole buffer without a terminator is handed out as
//! it stands, and the remainder of the line follows as the next one.

use std::io::{self, Read};

use bytes::{Buf, BytesMut};

use crate::config::MIN_INPUT_BUFFER;

/// Fixed-capacity accumulator that splits bytes into lines.
#[derive(Debug)]
pub struct LineBuffer {
    buffer: BytesMut,
    capacity: usize,
    /// Bytes already searched for a terminator.
    scanned: usize,
}

fn is_terminator(byte: u8) -> bool { byte == b'\n' || byte == b'\r' }

fn decode(bytes: &[u8]) -> String { String::from_utf8_lossy(bytes).into_owned() }

impl LineBuffer {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(MIN_INPUT_BUFFER);
        Self {
            buffer: BytesMut::with_capacity(capacity),
            capacity,
            scanned: 0,
        }
    }

    /// Pop the next complete line, or `None` if more input is needed.
    pub fn next_line(&mut self) -> Option<String> {
        loop {
            let found = self.buffer[self.scanned..]
                .iter()
                .position(|byte| is_terminator(*byte));
            match found {
                Some(offset) => {
                    let line = self.buffer.split_to(self.scanned + offset);
                    self.buffer.advance(1);
                    self.scanned = 0;
                    if !line.is_empty() {
                        return Some(decode(&line));
                    }
                }
                None if self.buffer.len() >= self.capacity => {
                    let line = self.buffer.split();
                    self.scanned = 0;
                    return Some(decode(&line));
                }
                None => {
                    self.scanned = self.buffer.len();
                    return None;
                }
            }
        }
    }

    /// Read once from `reader` into the free space of the buffer.
    ///
    /// Call only after [`next_line`](Self::next_line) returned `None`, which
    /// guarantees free space. `Ok(0)` therefore means end of stream.
    ///
    /// # Errors
    ///
    /// Propagates the reader's error; the buffer is left unchanged.
    pub fn fill_from<R: Read>(&mut self, reader: &mut R) -> io::Result<usize> {
        let start = self.buffer.len();
        self.buffer.resize(self.capacity, 0);
        let result = reader.read(&mut self.buffer[start..]);
        let read = result.as_ref().map_or(0, |read| *read);
        self.buffer.truncate(start + read);
        result
    }

    /// Discard buffered input.
    pub fn clear(&mut self) {
        self.buffer.clear();
        self.scanned = 0;
    }

    #[must_use]
    pub fn len(&self) -> usize { self.buffer.len() }

    #[must_use]
    pub fn is_empty(&self) -> bool { self.buffer.is_empty() }

    #[must_use]
    pub fn capacity(&self) -> usize { self.capacity }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use proptest::prelude::*;
    use rstest::rstest;

    use super::*;

    fn drain(buffer: &mut LineBuffer, input: &[u8]) -> Vec<String> {
        let mut reader = Cursor::new(input.to_vec());
        let mut lines = Vec::new();
        loop {
            while let Some(line) = buffer.next_line() {
                lines.push(line);
            }
            if buffer.fill_from(&mut reader).expect("cursor reads succeed") == 0 {
                return lines;
            }
        }
    }

    #[rstest]
    #[case(b"LOGINOK:bot\n".as_slice(), vec!["LOGINOK:bot"])]
    #[case(b"A\r\nB\r\n".as_slice(), vec!["A", "B"])]
    #[case(b"A\rB\n\n\nC\n".as_slice(), vec!["A", "B", "C"])]
    #[case(b"\r\n\r\n".as_slice(), vec![])]
    #[case(b"partial".as_slice(), vec![])]
    fn splits_on_either_terminator(#[case] input: &[u8], #[case] expected: Vec<&str>) {
        let mut buffer = LineBuffer::new(64);
        assert_eq!(drain(&mut buffer, input), expected);
    }

    #[test]
    fn overlong_line_is_split_at_capacity() {
        let mut buffer = LineBuffer::new(MIN_INPUT_BUFFER);
        let long = "x".repeat(MIN_INPUT_BUFFER + 4);
        let input = format!("{long}\nnext\n");
        let lines = drain(&mut buffer, input.as_bytes());
        assert_eq!(
            lines,
            ["x".repeat(MIN_INPUT_BUFFER), "xxxx".to_owned(), "next".to_owned()]
        );
    }

    #[test]
    fn partial_line_survives_between_reads() {
        let mut buffer = LineBuffer::new(64);
        let mut first = Cursor::new(b"MSG:PUB:al".to_vec());
        buffer.fill_from(&mut first).expect("read first half");
        assert_eq!(buffer.next_line(), None);

        let mut second = Cursor::new(b"ice:hi\n".to_vec());
        buffer.fill_from(&mut second).expect("read second half");
        assert_eq!(buffer.next_line().as_deref(), Some("MSG:PUB:alice:hi"));
        assert!(buffer.is_empty());
    }

    #[test]
    fn invalid_utf8_is_replaced() {
        let mut buffer = LineBuffer::new(64);
        let lines = drain(&mut buffer, b"MSG:\xff\n");
        assert_eq!(lines, ["MSG:\u{fffd}"]);
    }

    proptest! {
        #[test]
        fn chunking_does_not_change_the_lines(
            lines in proptest::collection::vec("[A-Za-z0-9:;! ]{1,40}", 1..20),
            crlf in any::<bool>(),
            chunk in 1usize..17,
        ) {
            let terminator = if crlf { "\r\n" } else { "\n" };
            let wire: String = lines.iter().map(|line| format!("{line}{terminator}")).collect();
            let mut buffer = LineBuffer::new(64);
            let mut received = Vec::new();
            for piece in wire.as_bytes().chunks(chunk) {
                let mut reader = Cursor::new(piece.to_vec());
                buffer.fill_from(&mut reader).expect("cursor reads succeed");
                while let Some(line) = buffer.next_line() {
                    received.push(line);
                }
            }
            prop_assert_eq!(received, lines);
        }
    }
}
