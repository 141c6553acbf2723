//! PostgreSQL wire protocol encoding and decoding primitives.
//!
//! PostgreSQL uses big-endian (network byte order) for all integers.

use std::ops::Range;

use zerocopy::FromBytes;

use crate::error::{Error, Result};

use super::types::{I16BE, I32BE};

/// Forward-only cursor over one frame payload.
///
/// Reading past the end is an error; a short read never returns partial data.
#[derive(Debug, Clone)]
pub struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    /// Create a reader positioned at the start of `data`.
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    /// Current offset into the payload.
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Number of bytes not yet consumed.
    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    /// Check if every byte has been consumed.
    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    fn take(&mut self, len: usize, what: &str) -> Result<&'a [u8]> {
        let end = self
            .pos
            .checked_add(len)
            .filter(|end| *end <= self.data.len())
            .ok_or_else(|| {
                Error::Protocol(format!(
                    "{}: buffer too short: {} < {}",
                    what,
                    self.remaining(),
                    len
                ))
            })?;
        let bytes = &self.data[self.pos..end];
        self.pos = end;
        Ok(bytes)
    }

    /// Read 1-byte unsigned integer.
    #[inline]
    pub fn read_u8(&mut self) -> Result<u8> {
        Ok(self.take(1, "read_u8")?[0])
    }

    /// Read 2-byte big-endian signed integer.
    #[inline]
    pub fn read_i16(&mut self) -> Result<i16> {
        let bytes = self.take(2, "read_i16")?;
        let value = I16BE::ref_from_bytes(bytes)
            .map_err(|e| Error::Protocol(format!("read_i16: {e:?}")))?;
        Ok(value.get())
    }

    /// Read 4-byte big-endian signed integer.
    #[inline]
    pub fn read_i32(&mut self) -> Result<i32> {
        let bytes = self.take(4, "read_i32")?;
        let value = I32BE::ref_from_bytes(bytes)
            .map_err(|e| Error::Protocol(format!("read_i32: {e:?}")))?;
        Ok(value.get())
    }

    /// Read fixed-length bytes.
    #[inline]
    pub fn read_bytes(&mut self, len: usize) -> Result<&'a [u8]> {
        self.take(len, "read_bytes")
    }

    /// Read a string terminated by `0x00` or by the end of the payload.
    ///
    /// The terminator, when present, is consumed but not returned.
    pub fn read_cstr(&mut self) -> Result<&'a str> {
        let rest = &self.data[self.pos..];
        let (bytes, consumed) = match memchr::memchr(0, rest) {
            Some(nul) => (&rest[..nul], nul + 1),
            None => (rest, rest.len()),
        };
        let s = simdutf8::compat::from_utf8(bytes)
            .map_err(|e| Error::Protocol(format!("read_cstr: invalid UTF-8: {e}")))?;
        self.pos += consumed;
        Ok(s)
    }
}

#[derive(Debug, Clone)]
enum Fragment {
    Bytes(Range<usize>),
    Length { delta: i32 },
}

/// Two-phase frame builder.
///
/// Writes accumulate as fragments; `write_len` records a length marker instead
/// of bytes. `finish` serializes everything in emission order and resolves each
/// marker to `total frame bytes + delta`:
/// - startup frames (no type byte) use delta `0`
/// - tagged frames use delta `-1`, since the type byte is not counted
#[derive(Debug, Clone, Default)]
pub struct MessageWriter {
    data: Vec<u8>,
    fragments: Vec<Fragment>,
    len: usize,
}

impl MessageWriter {
    /// Create an empty writer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a tagged frame: type byte followed by its length marker.
    pub fn tagged(type_byte: u8) -> Self {
        let mut w = Self::new();
        w.write_u8(type_byte).write_len(-1);
        w
    }

    /// Start a startup-style frame: only a length marker, no type byte.
    pub fn untagged() -> Self {
        let mut w = Self::new();
        w.write_len(0);
        w
    }

    /// Total bytes written so far, including length markers.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Check if nothing has been written.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    fn push_bytes(&mut self, bytes: &[u8]) -> &mut Self {
        let start = self.data.len();
        self.data.extend_from_slice(bytes);
        let end = self.data.len();
        match self.fragments.last_mut() {
            Some(Fragment::Bytes(range)) if range.end == start => range.end = end,
            _ => self.fragments.push(Fragment::Bytes(start..end)),
        }
        self.len += bytes.len();
        self
    }

    /// Reserve a 4-byte length slot resolved at `finish` time.
    pub fn write_len(&mut self, delta: i32) -> &mut Self {
        self.fragments.push(Fragment::Length { delta });
        self.len += 4;
        self
    }

    /// Write a u8.
    pub fn write_u8(&mut self, value: u8) -> &mut Self {
        self.push_bytes(&[value])
    }

    /// Write an i16.
    pub fn write_i16(&mut self, value: i16) -> &mut Self {
        self.push_bytes(&value.to_be_bytes())
    }

    /// Write an i32.
    pub fn write_i32(&mut self, value: i32) -> &mut Self {
        self.push_bytes(&value.to_be_bytes())
    }

    /// Write raw bytes.
    pub fn write_bytes(&mut self, data: &[u8]) -> &mut Self {
        self.push_bytes(data)
    }

    /// Write a null-terminated string.
    pub fn write_cstr(&mut self, s: &str) -> &mut Self {
        self.push_bytes(s.as_bytes()).write_u8(0)
    }

    /// Serialize all fragments onto the end of `out`.
    pub fn finish_into(self, out: &mut Vec<u8>) {
        let total = self.len as i32;
        out.reserve(self.len);
        for fragment in &self.fragments {
            match fragment {
                Fragment::Bytes(range) => out.extend_from_slice(&self.data[range.clone()]),
                Fragment::Length { delta } => out.extend_from_slice(&(total + delta).to_be_bytes()),
            }
        }
    }

    /// Serialize all fragments into a new buffer.
    pub fn finish(self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.len);
        self.finish_into(&mut out);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reader_integers() {
        let data = [0x01, 0xff, 0xfe, 0x00, 0x03, 0x00, 0x00];
        let mut r = Reader::new(&data);
        assert_eq!(r.read_u8().unwrap(), 1);
        assert_eq!(r.read_i16().unwrap(), -2);
        assert_eq!(r.read_i32().unwrap(), 196608);
        assert!(r.is_empty());
        assert!(r.read_u8().is_err());
    }

    #[test]
    fn test_reader_short_read_fails() {
        let data = [0x00, 0x00, 0x01];
        let mut r = Reader::new(&data);
        assert!(r.read_i32().is_err());
        // failed read does not advance
        assert_eq!(r.position(), 0);
        assert!(r.read_bytes(4).is_err());
        assert_eq!(r.read_bytes(3).unwrap(), &data);
    }

    #[test]
    fn test_reader_cstr() {
        let data = b"user\0postgres\0tail";
        let mut r = Reader::new(data);
        assert_eq!(r.read_cstr().unwrap(), "user");
        assert_eq!(r.read_cstr().unwrap(), "postgres");
        // unterminated string runs to the end of the payload
        assert_eq!(r.read_cstr().unwrap(), "tail");
        assert!(r.is_empty());
    }

    #[test]
    fn test_reader_cstr_invalid_utf8() {
        let data = [0xff, 0xfe, 0x00];
        let mut r = Reader::new(&data);
        assert!(r.read_cstr().is_err());
    }

    #[test]
    fn test_writer_startup_length() {
        let mut w = MessageWriter::untagged();
        w.write_i32(196608).write_u8(0);
        let buf = w.finish();
        assert_eq!(buf, [0, 0, 0, 9, 0, 3, 0, 0, 0]);
    }

    #[test]
    fn test_writer_tagged_length() {
        let mut w = MessageWriter::tagged(b'Q');
        w.write_cstr("SELECT 1");
        let buf = w.finish();
        assert_eq!(buf[0], b'Q');
        assert_eq!(&buf[1..5], &13_i32.to_be_bytes());
        assert_eq!(&buf[5..], b"SELECT 1\0");
    }

    #[test]
    fn test_writer_split_writes_are_identical() {
        let mut whole = MessageWriter::tagged(b'X');
        whole.write_bytes(b"abcdef").write_i16(7);

        let mut split = MessageWriter::tagged(b'X');
        split
            .write_bytes(b"ab")
            .write_bytes(b"")
            .write_bytes(b"cd")
            .write_u8(b'e')
            .write_u8(b'f')
            .write_bytes(&7_i16.to_be_bytes());

        assert_eq!(whole.finish(), split.finish());
    }

    #[test]
    fn test_writer_finish_into_appends() {
        let mut out = vec![0xaa];
        MessageWriter::tagged(b'S').finish_into(&mut out);
        assert_eq!(out, [0xaa, b'S', 0, 0, 0, 4]);
    }
}
