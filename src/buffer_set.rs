//! Buffer set for the connection state machine.
//!
//! The read side reassembles frames from transport chunks of arbitrary size;
//! the write side collects encoded frontend frames until the driver flushes them.

use crate::error::{Error, Result};

/// Size of a backend frame header: type byte + 4-byte length.
pub const HEADER_LEN: usize = 5;

/// One complete backend frame borrowed from the read buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Frame<'a> {
    /// Message type byte
    pub type_byte: u8,
    /// Message payload (after length field)
    pub payload: &'a [u8],
}

/// Growable reassembly buffer with a consumed-bytes cursor.
///
/// Extracted frames only advance the cursor; consumed bytes are compacted away
/// lazily when more data is appended.
#[derive(Debug, Default)]
pub struct ReadBuffer {
    data: Vec<u8>,
    consumed: usize,
}

impl ReadBuffer {
    pub fn new() -> Self {
        Self::with_capacity(8192)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            data: Vec::with_capacity(capacity),
            consumed: 0,
        }
    }

    /// Number of buffered bytes not yet extracted as frames.
    pub fn buffered(&self) -> usize {
        self.data.len() - self.consumed
    }

    pub fn is_empty(&self) -> bool {
        self.buffered() == 0
    }

    /// Append an inbound chunk.
    pub fn extend(&mut self, chunk: &[u8]) {
        if self.consumed == self.data.len() {
            self.data.clear();
            self.consumed = 0;
        } else if self.consumed > self.data.len() / 2 {
            self.data.drain(..self.consumed);
            self.consumed = 0;
        }
        self.data.extend_from_slice(chunk);
    }

    /// Extract the next complete frame, if one is fully buffered.
    ///
    /// A length field below 4 can never be valid and is a protocol error;
    /// framing cannot be recovered after it.
    pub fn next_frame(&mut self) -> Result<Option<Frame<'_>>> {
        let available = &self.data[self.consumed..];
        if available.len() < HEADER_LEN {
            return Ok(None);
        }

        let type_byte = available[0];
        let len = i32::from_be_bytes([available[1], available[2], available[3], available[4]]);
        if len < 4 {
            return Err(Error::Protocol(format!(
                "invalid length {} for message type '{}'",
                len,
                type_byte.escape_ascii()
            )));
        }

        let frame_len = 1 + len as usize;
        if available.len() < frame_len {
            return Ok(None);
        }

        let start = self.consumed;
        self.consumed += frame_len;
        Ok(Some(Frame {
            type_byte,
            payload: &self.data[start + HEADER_LEN..start + frame_len],
        }))
    }
}

/// Read and write buffers owned by one connection.
#[derive(Debug, Default)]
pub struct BufferSet {
    /// Reassembly buffer for inbound bytes
    pub read_buffer: ReadBuffer,
    /// Encoded frontend frames waiting to be written
    pub write_buffer: Vec<u8>,
}

impl BufferSet {
    pub fn new() -> Self {
        Self {
            read_buffer: ReadBuffer::new(),
            write_buffer: Vec::with_capacity(8192),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(type_byte: u8, payload: &[u8]) -> Vec<u8> {
        let mut buf = vec![type_byte];
        buf.extend_from_slice(&(payload.len() as i32 + 4).to_be_bytes());
        buf.extend_from_slice(payload);
        buf
    }

    #[test]
    fn test_incomplete_header() {
        let mut rb = ReadBuffer::new();
        rb.extend(&[b'Z', 0, 0]);
        assert!(rb.next_frame().unwrap().is_none());
        assert_eq!(rb.buffered(), 3);
    }

    #[test]
    fn test_split_frame() {
        let bytes = frame(b'C', b"SELECT 1\0");
        let mut rb = ReadBuffer::new();
        for b in &bytes[..bytes.len() - 1] {
            rb.extend(&[*b]);
            assert!(rb.next_frame().unwrap().is_none());
        }
        rb.extend(&bytes[bytes.len() - 1..]);
        let f = rb.next_frame().unwrap().unwrap();
        assert_eq!(f.type_byte, b'C');
        assert_eq!(f.payload, b"SELECT 1\0");
        assert!(rb.is_empty());
    }

    #[test]
    fn test_coalesced_frames() {
        let mut bytes = frame(b'1', b"");
        bytes.extend(frame(b'Z', b"I"));
        bytes.extend_from_slice(&[b'2', 0]);

        let mut rb = ReadBuffer::new();
        rb.extend(&bytes);
        assert_eq!(rb.next_frame().unwrap().unwrap().type_byte, b'1');
        let z = rb.next_frame().unwrap().unwrap();
        assert_eq!((z.type_byte, z.payload), (b'Z', &b"I"[..]));
        assert!(rb.next_frame().unwrap().is_none());
        assert_eq!(rb.buffered(), 2);

        rb.extend(&[0, 0, 4]);
        assert_eq!(rb.next_frame().unwrap().unwrap().type_byte, b'2');
        assert!(rb.is_empty());
    }

    #[test]
    fn test_invalid_length() {
        let mut rb = ReadBuffer::new();
        rb.extend(&[b'Z', 0, 0, 0, 3]);
        assert!(matches!(rb.next_frame(), Err(Error::Protocol(_))));
    }

    #[test]
    fn test_compaction_keeps_partial_data() {
        let mut rb = ReadBuffer::with_capacity(16);
        let mut bytes = frame(b'C', b"INSERT 0 1\0");
        let tail = frame(b'Z', b"I");
        bytes.extend_from_slice(&tail[..3]);
        rb.extend(&bytes);
        assert!(rb.next_frame().unwrap().is_some());

        rb.extend(&tail[3..]);
        let z = rb.next_frame().unwrap().unwrap();
        assert_eq!(z.payload, b"I");
    }
}
