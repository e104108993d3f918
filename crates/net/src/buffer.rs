//! Byte cursor primitives: fixed-width numbers, packed integers, strings and
//! length-prefixed sub-frames.

use auproxy_core::UnknownValue;
use thiserror::Error;

/// Failure while decoding or encoding a frame.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    /// A read ran past the end of the buffer.
    #[error("truncated buffer: wanted {wanted} bytes at offset {offset}, {remaining} remaining")]
    TruncatedBuffer {
        /// Cursor position when the read started.
        offset: usize,
        /// Bytes the read needed.
        wanted: usize,
        /// Bytes that were left.
        remaining: usize,
    },
    /// A field held a value outside its enumeration.
    #[error(transparent)]
    InvalidValue(#[from] UnknownValue),
    /// A packed integer kept its continuation bit past 32 bits.
    #[error("packed integer at offset {offset} exceeds 32 bits")]
    PackedOverflow {
        /// Cursor position of the first byte.
        offset: usize,
    },
    /// A payload was encoded for a direction it has no layout for.
    #[error("payload {id:#04x} has no {bound}-bound layout")]
    WrongDirection {
        /// Payload id.
        id: u8,
        /// Direction that was asked for.
        bound: &'static str,
    },
    /// A list does not fit its one-byte count.
    #[error("list of {len} entries exceeds the one-byte count")]
    ListTooLong {
        /// Entries that were attempted.
        len: usize,
    },
    /// A frame body does not fit its 16-bit length prefix.
    #[error("frame body of {len} bytes exceeds the 16-bit length prefix")]
    FrameTooLarge {
        /// Body length that was attempted.
        len: usize,
    },
}

/// Convenience alias for codec results.
pub type CodecResult<T> = Result<T, CodecError>;

/// Read cursor over a borrowed buffer.
#[derive(Debug, Clone)]
pub struct Reader<'a> {
    buf: &'a [u8],
    offset: usize,
}

impl<'a> Reader<'a> {
    /// Start reading at the beginning of `buf`.
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, offset: 0 }
    }

    /// Current cursor position.
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Bytes left after the cursor.
    pub fn remaining(&self) -> usize {
        self.buf.len() - self.offset
    }

    /// Whether the cursor reached the end.
    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    /// Take the next `len` bytes.
    pub fn bytes(&mut self, len: usize) -> CodecResult<&'a [u8]> {
        if len > self.remaining() {
            return Err(CodecError::TruncatedBuffer {
                offset: self.offset,
                wanted: len,
                remaining: self.remaining(),
            });
        }
        let slice = &self.buf[self.offset..self.offset + len];
        self.offset += len;
        Ok(slice)
    }

    /// Take everything left.
    pub fn rest(&mut self) -> &'a [u8] {
        let slice = &self.buf[self.offset..];
        self.offset = self.buf.len();
        slice
    }

    /// Advance without looking at the bytes.
    pub fn skip(&mut self, len: usize) -> CodecResult<()> {
        self.bytes(len).map(|_| ())
    }

    fn array<const N: usize>(&mut self) -> CodecResult<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.bytes(N)?);
        Ok(out)
    }

    /// Read one byte.
    pub fn u8(&mut self) -> CodecResult<u8> {
        Ok(self.array::<1>()?[0])
    }

    /// Read one signed byte.
    pub fn i8(&mut self) -> CodecResult<i8> {
        Ok(self.u8()? as i8)
    }

    /// Read a boolean; any non-zero byte is true.
    pub fn bool(&mut self) -> CodecResult<bool> {
        Ok(self.u8()? != 0)
    }

    /// Little-endian `u16`.
    pub fn u16_le(&mut self) -> CodecResult<u16> {
        Ok(u16::from_le_bytes(self.array()?))
    }

    /// Big-endian `u16`.
    pub fn u16_be(&mut self) -> CodecResult<u16> {
        Ok(u16::from_be_bytes(self.array()?))
    }

    /// Little-endian `u32`.
    pub fn u32_le(&mut self) -> CodecResult<u32> {
        Ok(u32::from_le_bytes(self.array()?))
    }

    /// Little-endian `i32`.
    pub fn i32_le(&mut self) -> CodecResult<i32> {
        Ok(i32::from_le_bytes(self.array()?))
    }

    /// Big-endian `i32`.
    pub fn i32_be(&mut self) -> CodecResult<i32> {
        Ok(i32::from_be_bytes(self.array()?))
    }

    /// Little-endian IEEE 754 single.
    pub fn f32_le(&mut self) -> CodecResult<f32> {
        Ok(f32::from_le_bytes(self.array()?))
    }

    /// Variable-length integer, 7 bits per byte, least significant group first.
    pub fn packed(&mut self) -> CodecResult<u32> {
        let start = self.offset;
        let mut value: u32 = 0;
        let mut shift = 0u32;
        loop {
            let byte = self.u8()?;
            if shift >= 32 {
                return Err(CodecError::PackedOverflow { offset: start });
            }
            value |= ((byte & 0x7F) as u32) << shift;
            if byte & 0x80 == 0 {
                return Ok(value);
            }
            shift += 7;
        }
    }

    /// Packed integer reinterpreted as signed (owner ids use `-2` for the server).
    pub fn packed_i32(&mut self) -> CodecResult<i32> {
        Ok(self.packed()? as i32)
    }

    /// Packed byte count followed by that many bytes of UTF-8.
    ///
    /// Invalid sequences are replaced rather than rejected.
    pub fn string(&mut self) -> CodecResult<String> {
        let len = self.packed()? as usize;
        let raw = self.bytes(len)?;
        Ok(String::from_utf8_lossy(raw).into_owned())
    }

    /// Read a `[len: u16 LE][tag: u8][len bytes]` frame header and split off
    /// its body as a separate reader. The outer cursor moves past the body.
    pub fn frame(&mut self) -> CodecResult<(u8, Reader<'a>)> {
        let len = self.u16_le()? as usize;
        let tag = self.u8()?;
        let body = self.bytes(len)?;
        Ok((tag, Reader::new(body)))
    }

    /// Split off the next `len` bytes as a separate reader.
    pub fn sub(&mut self, len: usize) -> CodecResult<Reader<'a>> {
        Ok(Reader::new(self.bytes(len)?))
    }
}

/// Growable write buffer.
#[derive(Debug, Clone, Default)]
pub struct Writer {
    buf: Vec<u8>,
}

/// Position of an open frame returned by [`Writer::begin_frame`].
#[derive(Debug, Clone, Copy)]
#[must_use = "a frame must be closed with Writer::end_frame"]
pub struct FrameMark {
    len_at: usize,
}

impl Writer {
    /// Empty writer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Bytes written so far.
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// Whether nothing was written.
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Borrow the written bytes.
    pub fn as_slice(&self) -> &[u8] {
        &self.buf
    }

    /// Take the written bytes.
    pub fn into_inner(self) -> Vec<u8> {
        self.buf
    }

    /// Append raw bytes.
    pub fn bytes(&mut self, data: &[u8]) -> &mut Self {
        self.buf.extend_from_slice(data);
        self
    }

    /// Write one byte.
    pub fn u8(&mut self, value: u8) -> &mut Self {
        self.buf.push(value);
        self
    }

    /// Write one signed byte.
    pub fn i8(&mut self, value: i8) -> &mut Self {
        self.u8(value as u8)
    }

    /// Write a boolean as `0` or `1`.
    pub fn bool(&mut self, value: bool) -> &mut Self {
        self.u8(value as u8)
    }

    /// Little-endian `u16`.
    pub fn u16_le(&mut self, value: u16) -> &mut Self {
        self.bytes(&value.to_le_bytes())
    }

    /// Big-endian `u16`.
    pub fn u16_be(&mut self, value: u16) -> &mut Self {
        self.bytes(&value.to_be_bytes())
    }

    /// Little-endian `u32`.
    pub fn u32_le(&mut self, value: u32) -> &mut Self {
        self.bytes(&value.to_le_bytes())
    }

    /// Little-endian `i32`.
    pub fn i32_le(&mut self, value: i32) -> &mut Self {
        self.bytes(&value.to_le_bytes())
    }

    /// Big-endian `i32`.
    pub fn i32_be(&mut self, value: i32) -> &mut Self {
        self.bytes(&value.to_be_bytes())
    }

    /// Little-endian IEEE 754 single.
    pub fn f32_le(&mut self, value: f32) -> &mut Self {
        self.bytes(&value.to_le_bytes())
    }

    /// Variable-length integer using the fewest bytes that hold `value`.
    pub fn packed(&mut self, mut value: u32) -> &mut Self {
        loop {
            let mut byte = (value & 0x7F) as u8;
            value >>= 7;
            if value != 0 {
                byte |= 0x80;
            }
            self.buf.push(byte);
            if value == 0 {
                return self;
            }
        }
    }

    /// Signed value written through its two's-complement bits.
    pub fn packed_i32(&mut self, value: i32) -> &mut Self {
        self.packed(value as u32)
    }

    /// Packed byte count followed by the UTF-8 bytes of `value`.
    pub fn string(&mut self, value: &str) -> &mut Self {
        self.packed(value.len() as u32);
        self.bytes(value.as_bytes())
    }

    /// Open a `[len: u16 LE][tag: u8]` frame; the length is patched by
    /// [`Writer::end_frame`].
    pub fn begin_frame(&mut self, tag: u8) -> FrameMark {
        let len_at = self.buf.len();
        self.buf.extend_from_slice(&[0, 0, tag]);
        FrameMark { len_at }
    }

    /// Close a frame opened with [`Writer::begin_frame`].
    pub fn end_frame(&mut self, mark: FrameMark) -> CodecResult<()> {
        let len = self.buf.len() - mark.len_at - 3;
        let len16 = u16::try_from(len).map_err(|_| CodecError::FrameTooLarge { len })?;
        self.buf[mark.len_at..mark.len_at + 2].copy_from_slice(&len16.to_le_bytes());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn packed_bytes(value: u32) -> Vec<u8> {
        let mut w = Writer::new();
        w.packed(value);
        w.into_inner()
    }

    #[test]
    fn test_packed_known_encodings() {
        assert_eq!(packed_bytes(0), vec![0x00]);
        assert_eq!(packed_bytes(0x7F), vec![0x7F]);
        assert_eq!(packed_bytes(0x80), vec![0x80, 0x01]);
        assert_eq!(packed_bytes(300), vec![0xAC, 0x02]);
        assert_eq!(packed_bytes(u32::MAX), vec![0xFF, 0xFF, 0xFF, 0xFF, 0x0F]);
    }

    #[test]
    fn test_packed_negative_owner() {
        let mut w = Writer::new();
        w.packed_i32(-2);
        let bytes = w.into_inner();
        assert_eq!(bytes.len(), 5);
        assert_eq!(Reader::new(&bytes).packed_i32(), Ok(-2));
    }

    #[test]
    fn test_packed_overflow_rejected() {
        let bytes = [0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0x01];
        assert_eq!(
            Reader::new(&bytes).packed(),
            Err(CodecError::PackedOverflow { offset: 0 })
        );
    }

    #[test]
    fn test_truncated_read_reports_position() {
        let mut r = Reader::new(&[1, 2, 3]);
        r.u8().unwrap();
        assert_eq!(
            r.u32_le(),
            Err(CodecError::TruncatedBuffer {
                offset: 1,
                wanted: 4,
                remaining: 2
            })
        );
    }

    #[test]
    fn test_endianness() {
        let mut w = Writer::new();
        w.u16_be(0x0102).u16_le(0x0102).i32_be(0x0A0B0C0D);
        assert_eq!(
            w.as_slice(),
            &[0x01, 0x02, 0x02, 0x01, 0x0A, 0x0B, 0x0C, 0x0D]
        );
        let mut r = Reader::new(w.as_slice());
        assert_eq!(r.u16_be(), Ok(0x0102));
        assert_eq!(r.u16_le(), Ok(0x0102));
        assert_eq!(r.i32_be(), Ok(0x0A0B0C0D));
        assert!(r.is_empty());
    }

    #[test]
    fn test_string_is_utf8() {
        let mut w = Writer::new();
        w.string("héllo");
        let bytes = w.into_inner();
        assert_eq!(bytes[0], 6);
        assert_eq!(Reader::new(&bytes).string().unwrap(), "héllo");
    }

    #[test]
    fn test_string_invalid_utf8_is_lossy() {
        let bytes = [2, 0xFF, b'a'];
        assert_eq!(Reader::new(&bytes).string().unwrap(), "\u{FFFD}a");
    }

    #[test]
    fn test_frame_roundtrip_and_bounds() {
        let mut w = Writer::new();
        let mark = w.begin_frame(7);
        w.u8(0xAA).u8(0xBB);
        w.end_frame(mark).unwrap();
        w.u8(0xCC);
        assert_eq!(w.as_slice(), &[2, 0, 7, 0xAA, 0xBB, 0xCC]);

        let mut r = Reader::new(w.as_slice());
        let (tag, mut body) = r.frame().unwrap();
        assert_eq!(tag, 7);
        assert_eq!(body.rest(), &[0xAA, 0xBB]);
        assert_eq!(r.u8(), Ok(0xCC));
    }

    #[test]
    fn test_frame_too_large() {
        let mut w = Writer::new();
        let mark = w.begin_frame(0);
        w.bytes(&vec![0u8; 70_000]);
        assert_eq!(
            w.end_frame(mark),
            Err(CodecError::FrameTooLarge { len: 70_000 })
        );
    }
}
