//! Raw little-endian reader/writer
//!
//! The bottom layer of the wire codec. Every read is bounds-checked and
//! returns a [`DecodeError`] instead of panicking.

/// Longest string accepted by [`BinaryReader::read_string`]
pub const MAX_STRING_LEN: usize = 10 * 1024 * 1024;

/// Errors that can occur while decoding a buffer
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    #[error("Unexpected end of buffer: need {needed} bytes at offset {offset}, {available} available")]
    UnexpectedEof {
        offset: usize,
        needed: usize,
        available: usize,
    },
    #[error("String too long: {0} bytes (max {MAX_STRING_LEN})")]
    StringTooLong(usize),
    #[error("Invalid UTF-8 in string field")]
    InvalidUtf8,
}

/// Growable byte buffer with typed little-endian writers
#[derive(Debug, Clone, Default)]
pub struct BinaryWriter {
    buffer: Vec<u8>,
}

impl BinaryWriter {
    pub fn new() -> Self {
        Self::with_capacity(256)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buffer: Vec::with_capacity(capacity),
        }
    }

    /// Write raw bytes
    pub fn write_bytes(&mut self, data: &[u8]) -> &mut Self {
        self.buffer.extend_from_slice(data);
        self
    }

    pub fn write_u8(&mut self, value: u8) -> &mut Self {
        self.buffer.push(value);
        self
    }

    pub fn write_i8(&mut self, value: i8) -> &mut Self {
        self.buffer.push(value as u8);
        self
    }

    pub fn write_bool(&mut self, value: bool) -> &mut Self {
        self.write_u8(u8::from(value))
    }

    pub fn write_u16(&mut self, value: u16) -> &mut Self {
        self.write_bytes(&value.to_le_bytes())
    }

    pub fn write_i16(&mut self, value: i16) -> &mut Self {
        self.write_bytes(&value.to_le_bytes())
    }

    pub fn write_u32(&mut self, value: u32) -> &mut Self {
        self.write_bytes(&value.to_le_bytes())
    }

    pub fn write_i32(&mut self, value: i32) -> &mut Self {
        self.write_bytes(&value.to_le_bytes())
    }

    pub fn write_u64(&mut self, value: u64) -> &mut Self {
        self.write_bytes(&value.to_le_bytes())
    }

    pub fn write_f32(&mut self, value: f32) -> &mut Self {
        self.write_bytes(&value.to_le_bytes())
    }

    /// Write a u32 length prefix followed by the UTF-8 bytes
    pub fn write_string(&mut self, value: &str) -> &mut Self {
        self.write_u32(value.len() as u32);
        self.write_bytes(value.as_bytes())
    }

    /// Overwrite a byte already written (e.g. a count patched after the body)
    pub fn patch_u8(&mut self, offset: usize, value: u8) {
        if let Some(slot) = self.buffer.get_mut(offset) {
            *slot = value;
        }
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.buffer
    }

    /// Consume the writer, returning the bytes
    pub fn into_inner(self) -> Vec<u8> {
        self.buffer
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn clear(&mut self) {
        self.buffer.clear();
    }
}

/// Cursor over a borrowed buffer
pub struct BinaryReader<'a> {
    data: &'a [u8],
    position: usize,
}

impl<'a> BinaryReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, position: 0 }
    }

    /// Read `n` bytes
    pub fn read_bytes(&mut self, n: usize) -> Result<&'a [u8], DecodeError> {
        let available = self.remaining_len();
        if n > available {
            return Err(DecodeError::UnexpectedEof {
                offset: self.position,
                needed: n,
                available,
            });
        }
        let slice = &self.data[self.position..self.position + n];
        self.position += n;
        Ok(slice)
    }

    fn read_array<const N: usize>(&mut self) -> Result<[u8; N], DecodeError> {
        let bytes = self.read_bytes(N)?;
        let mut out = [0u8; N];
        out.copy_from_slice(bytes);
        Ok(out)
    }

    pub fn read_u8(&mut self) -> Result<u8, DecodeError> {
        Ok(self.read_array::<1>()?[0])
    }

    pub fn read_i8(&mut self) -> Result<i8, DecodeError> {
        Ok(self.read_u8()? as i8)
    }

    /// Any non-zero byte is true
    pub fn read_bool(&mut self) -> Result<bool, DecodeError> {
        Ok(self.read_u8()? != 0)
    }

    pub fn read_u16(&mut self) -> Result<u16, DecodeError> {
        self.read_array().map(u16::from_le_bytes)
    }

    pub fn read_i16(&mut self) -> Result<i16, DecodeError> {
        self.read_array().map(i16::from_le_bytes)
    }

    pub fn read_u32(&mut self) -> Result<u32, DecodeError> {
        self.read_array().map(u32::from_le_bytes)
    }

    pub fn read_i32(&mut self) -> Result<i32, DecodeError> {
        self.read_array().map(i32::from_le_bytes)
    }

    pub fn read_u64(&mut self) -> Result<u64, DecodeError> {
        self.read_array().map(u64::from_le_bytes)
    }

    pub fn read_f32(&mut self) -> Result<f32, DecodeError> {
        self.read_array().map(f32::from_le_bytes)
    }

    /// Read a u32-length-prefixed UTF-8 string
    pub fn read_string(&mut self) -> Result<String, DecodeError> {
        let len = self.read_u32()? as usize;
        if len > MAX_STRING_LEN {
            return Err(DecodeError::StringTooLong(len));
        }
        let bytes = self.read_bytes(len)?;
        String::from_utf8(bytes.to_vec()).map_err(|_| DecodeError::InvalidUtf8)
    }

    /// Unread tail of the buffer
    pub fn remaining(&self) -> &'a [u8] {
        &self.data[self.position..]
    }

    pub fn remaining_len(&self) -> usize {
        self.data.len() - self.position
    }

    pub fn has_remaining(&self) -> bool {
        self.position < self.data.len()
    }

    pub fn position(&self) -> usize {
        self.position
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_writer_layout() {
        let mut w = BinaryWriter::new();
        w.write_u8(0x01).write_u16(0xB542).write_u32(7).write_f32(1.5);

        let bytes = w.into_inner();
        assert_eq!(bytes.len(), 1 + 2 + 4 + 4);
        assert_eq!(&bytes[1..3], &[0x42, 0xB5]);
    }

    #[test]
    fn test_reader_sequence() {
        let mut w = BinaryWriter::new();
        w.write_u8(42)
            .write_i8(-3)
            .write_u16(1000)
            .write_i32(-99_999)
            .write_u64(1 << 40)
            .write_f32(2.5)
            .write_bool(true);
        let data = w.into_inner();

        let mut r = BinaryReader::new(&data);
        assert_eq!(r.read_u8(), Ok(42));
        assert_eq!(r.read_i8(), Ok(-3));
        assert_eq!(r.read_u16(), Ok(1000));
        assert_eq!(r.read_i32(), Ok(-99_999));
        assert_eq!(r.read_u64(), Ok(1 << 40));
        assert!((r.read_f32().unwrap() - 2.5).abs() < f32::EPSILON);
        assert_eq!(r.read_bool(), Ok(true));
        assert!(!r.has_remaining());
    }

    #[test]
    fn test_read_past_end() {
        let data = [1u8, 2, 3];
        let mut r = BinaryReader::new(&data);

        assert!(r.read_u16().is_ok());
        let err = r.read_u32().unwrap_err();
        assert_eq!(
            err,
            DecodeError::UnexpectedEof {
                offset: 2,
                needed: 4,
                available: 1
            }
        );
        // Failed read does not advance
        assert_eq!(r.position(), 2);
        assert_eq!(r.read_u8(), Ok(3));
    }

    #[test]
    fn test_string() {
        let mut w = BinaryWriter::new();
        w.write_string("Lobby 1").write_string("");
        let data = w.into_inner();

        let mut r = BinaryReader::new(&data);
        assert_eq!(r.read_string().unwrap(), "Lobby 1");
        assert_eq!(r.read_string().unwrap(), "");
    }

    #[test]
    fn test_string_length_exceeds_buffer() {
        let mut w = BinaryWriter::new();
        w.write_u32(50).write_bytes(b"short");
        let data = w.into_inner();

        let mut r = BinaryReader::new(&data);
        assert!(matches!(
            r.read_string(),
            Err(DecodeError::UnexpectedEof { needed: 50, .. })
        ));
    }

    #[test]
    fn test_string_over_limit() {
        let mut w = BinaryWriter::new();
        w.write_u32((MAX_STRING_LEN + 1) as u32);
        let data = w.into_inner();

        let mut r = BinaryReader::new(&data);
        assert_eq!(
            r.read_string(),
            Err(DecodeError::StringTooLong(MAX_STRING_LEN + 1))
        );
    }

    #[test]
    fn test_invalid_utf8() {
        let mut w = BinaryWriter::new();
        w.write_u32(2).write_bytes(&[0xFF, 0xFE]);
        let data = w.into_inner();

        assert_eq!(
            BinaryReader::new(&data).read_string(),
            Err(DecodeError::InvalidUtf8)
        );
    }

    #[test]
    fn test_patch_u8() {
        let mut w = BinaryWriter::new();
        w.write_u8(0).write_u8(9);
        w.patch_u8(0, 5);
        w.patch_u8(10, 1);
        assert_eq!(w.as_slice(), &[5, 9]);
    }
}
