//! Delimiter-based message framing
//!
//! GPSD writes one JSON object per line, but a TCP read may return half a
//! line, several lines, or a line split across many reads. [`FrameBuffer`]
//! accumulates the raw bytes and hands back complete messages one at a time.
//!
//! # Example
//!
//! ```
//! use gpsd_events::framing::FrameBuffer;
//!
//! let mut buffer = FrameBuffer::new();
//! buffer.push(b"{\"class\":\"TPV\"}\n{\"cla");
//!
//! assert_eq!(buffer.extract().as_deref(), Some("{\"class\":\"TPV\"}"));
//! assert_eq!(buffer.extract(), None);
//!
//! buffer.push(b"ss\":\"SKY\"}\n");
//! assert_eq!(buffer.extract().as_deref(), Some("{\"class\":\"SKY\"}"));
//! ```

/// Line delimiter used by the GPSD JSON protocol
pub const DEFAULT_DELIMITER: &str = "\n";

/// Accumulates raw bytes and extracts complete delimiter-terminated messages
///
/// The delimiter is fixed for the lifetime of the buffer. Extraction never
/// blocks: when no delimiter is present the buffer is left untouched and
/// `None` is returned.
#[derive(Debug, Clone)]
pub struct FrameBuffer {
    buffer: Vec<u8>,
    delimiter: Vec<u8>,
}

impl Default for FrameBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameBuffer {
    /// Creates a buffer framing on the newline delimiter
    pub fn new() -> Self {
        Self::with_delimiter(DEFAULT_DELIMITER)
    }

    /// Creates a buffer framing on a custom delimiter
    ///
    /// An empty delimiter falls back to [`DEFAULT_DELIMITER`].
    pub fn with_delimiter<D: AsRef<str>>(delimiter: D) -> Self {
        let delimiter = match delimiter.as_ref() {
            "" => DEFAULT_DELIMITER,
            other => other,
        };

        FrameBuffer {
            buffer: Vec::with_capacity(4096),
            delimiter: delimiter.as_bytes().to_vec(),
        }
    }

    /// Appends a chunk of received bytes
    pub fn push(&mut self, chunk: &[u8]) {
        self.buffer.extend_from_slice(chunk);
    }

    /// Returns true if at least one complete message can be extracted
    pub fn has_complete_message(&self) -> bool {
        self.find_delimiter().is_some()
    }

    /// Removes and returns the first complete message
    ///
    /// The returned text excludes the delimiter. Exactly the message and its
    /// trailing delimiter are removed from the front of the buffer. Invalid
    /// UTF-8 is replaced rather than rejected, the router reports it as a
    /// malformed unit.
    pub fn extract(&mut self) -> Option<String> {
        let index = self.find_delimiter()?;
        let message = String::from_utf8_lossy(&self.buffer[..index]).into_owned();
        self.buffer.drain(..index + self.delimiter.len());
        Some(message)
    }

    /// Discards everything buffered, including partial messages
    pub fn clear(&mut self) {
        self.buffer.clear();
    }

    /// Returns true when nothing is buffered
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Number of buffered bytes
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Delimiter this buffer frames on
    pub fn delimiter(&self) -> &[u8] {
        &self.delimiter
    }

    /// Buffered bytes not yet extracted
    pub fn pending(&self) -> &[u8] {
        &self.buffer
    }

    fn find_delimiter(&self) -> Option<usize> {
        let delimiter = self.delimiter.as_slice();
        if delimiter.len() == 1 {
            return self.buffer.iter().position(|b| *b == delimiter[0]);
        }

        self.buffer
            .windows(delimiter.len())
            .position(|window| window == delimiter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drain(buffer: &mut FrameBuffer) -> Vec<String> {
        let mut out = Vec::new();
        while let Some(message) = buffer.extract() {
            out.push(message);
        }
        out
    }

    #[test]
    fn extract_without_delimiter_leaves_buffer_untouched() {
        let mut buffer = FrameBuffer::new();
        buffer.push(b"{\"class\":\"TPV\"");
        let before = buffer.pending().to_vec();

        assert!(!buffer.has_complete_message());
        assert_eq!(buffer.extract(), None);
        assert_eq!(buffer.pending(), before.as_slice());
    }

    #[test]
    fn empty_buffer_has_nothing_to_extract() {
        let mut buffer = FrameBuffer::new();
        assert!(buffer.is_empty());
        assert!(!buffer.has_complete_message());
        assert_eq!(buffer.extract(), None);
    }

    #[test]
    fn extract_removes_only_first_occurrence() {
        let mut buffer = FrameBuffer::new();
        buffer.push(b"abc\nabc\nab");

        assert_eq!(buffer.extract().as_deref(), Some("abc"));
        assert_eq!(buffer.pending(), b"abc\nab");
        assert_eq!(buffer.extract().as_deref(), Some("abc"));
        assert_eq!(buffer.pending(), b"ab");
        assert_eq!(buffer.extract(), None);
    }

    #[test]
    fn empty_lines_are_extracted_as_empty_messages() {
        let mut buffer = FrameBuffer::new();
        buffer.push(b"\n\nx\n");
        assert_eq!(drain(&mut buffer), vec!["", "", "x"]);
        assert!(buffer.is_empty());
    }

    #[test]
    fn multi_byte_delimiter() {
        let mut buffer = FrameBuffer::with_delimiter("\r\n");
        buffer.push(b"one\r");
        assert!(!buffer.has_complete_message());
        buffer.push(b"\ntwo\r\nthree");

        assert_eq!(drain(&mut buffer), vec!["one", "two"]);
        assert_eq!(buffer.pending(), b"three");
        assert_eq!(buffer.delimiter(), b"\r\n");
    }

    #[test]
    fn chunking_does_not_change_extracted_sequence() {
        let stream: &[u8] =
            b"{\"class\":\"VERSION\"}\n{\"class\":\"TPV\",\"mode\":3}{\"class\":\"SKY\"}\n\n{\"class\":\"DEVICES\"}\npartial";

        let mut whole = FrameBuffer::new();
        whole.push(stream);
        let expected = drain(&mut whole);

        for chunk_size in 1..stream.len() {
            let mut buffer = FrameBuffer::new();
            let mut got = Vec::new();
            for chunk in stream.chunks(chunk_size) {
                buffer.push(chunk);
                got.extend(drain(&mut buffer));
            }
            assert_eq!(got, expected, "chunk size {chunk_size}");
            assert_eq!(buffer.pending(), b"partial");
        }
    }

    #[test]
    fn clear_discards_partial_message() {
        let mut buffer = FrameBuffer::new();
        buffer.push(b"half a mess");
        buffer.clear();
        buffer.push(b"age\n");
        assert_eq!(buffer.extract().as_deref(), Some("age"));
        assert_eq!(buffer.len(), 0);
    }
}
