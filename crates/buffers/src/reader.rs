//! Binary buffer reader with cursor tracking.

use crate::BufferError;

/// A binary buffer reader over a byte slice.
///
/// Every read is bounds-checked: running past the end of the input yields
/// [`BufferError::EndOfBuffer`] and leaves the cursor where it was.
///
/// # Example
///
/// ```
/// use plankton_buffers::Reader;
///
/// let data = [0x01, 0x03, 0x02];
/// let mut reader = Reader::new(&data);
///
/// assert_eq!(reader.try_u8().unwrap(), 0x01);
/// assert_eq!(reader.try_u16().unwrap(), 0x0203);
/// assert!(reader.try_u8().is_err());
/// ```
#[derive(Clone)]
pub struct Reader<'a> {
    /// The underlying byte slice.
    pub uint8: &'a [u8],
    /// Current cursor position.
    pub x: usize,
}

impl<'a> Reader<'a> {
    /// Creates a new reader for the given byte slice.
    pub fn new(uint8: &'a [u8]) -> Self {
        Self { uint8, x: 0 }
    }

    /// Resets the reader with a new byte slice.
    pub fn reset(&mut self, uint8: &'a [u8]) {
        self.x = 0;
        self.uint8 = uint8;
    }

    /// Returns the number of remaining bytes.
    pub fn size(&self) -> usize {
        self.uint8.len() - self.x
    }

    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    /// Current cursor position.
    pub fn position(&self) -> usize {
        self.x
    }

    /// Checks that `n` more bytes are available from the current cursor.
    #[inline]
    fn check(&self, n: usize) -> Result<(), BufferError> {
        if n > self.size() {
            Err(BufferError::EndOfBuffer {
                offset: self.x,
                needed: n,
                available: self.size(),
            })
        } else {
            Ok(())
        }
    }

    #[inline]
    fn array<const N: usize>(&mut self) -> Result<[u8; N], BufferError> {
        self.check(N)?;
        let mut out = [0u8; N];
        out.copy_from_slice(&self.uint8[self.x..self.x + N]);
        self.x += N;
        Ok(out)
    }

    /// Peeks at the current byte without advancing.
    pub fn try_peek(&self) -> Result<u8, BufferError> {
        self.check(1)?;
        Ok(self.uint8[self.x])
    }

    /// Advances the cursor by the given number of bytes.
    pub fn try_skip(&mut self, length: usize) -> Result<(), BufferError> {
        self.check(length)?;
        self.x += length;
        Ok(())
    }

    #[inline]
    pub fn try_u8(&mut self) -> Result<u8, BufferError> {
        self.check(1)?;
        let val = self.uint8[self.x];
        self.x += 1;
        Ok(val)
    }

    #[inline]
    pub fn try_i8(&mut self) -> Result<i8, BufferError> {
        Ok(self.try_u8()? as i8)
    }

    /// Reads an unsigned 16-bit little-endian integer.
    #[inline]
    pub fn try_u16(&mut self) -> Result<u16, BufferError> {
        Ok(u16::from_le_bytes(self.array()?))
    }

    /// Reads a signed 16-bit little-endian integer.
    #[inline]
    pub fn try_i16(&mut self) -> Result<i16, BufferError> {
        Ok(i16::from_le_bytes(self.array()?))
    }

    /// Reads an unsigned 32-bit little-endian integer.
    #[inline]
    pub fn try_u32(&mut self) -> Result<u32, BufferError> {
        Ok(u32::from_le_bytes(self.array()?))
    }

    /// Reads a signed 32-bit little-endian integer.
    #[inline]
    pub fn try_i32(&mut self) -> Result<i32, BufferError> {
        Ok(i32::from_le_bytes(self.array()?))
    }

    /// Reads an unsigned 64-bit little-endian integer.
    #[inline]
    pub fn try_u64(&mut self) -> Result<u64, BufferError> {
        Ok(u64::from_le_bytes(self.array()?))
    }

    /// Reads a signed 64-bit little-endian integer.
    #[inline]
    pub fn try_i64(&mut self) -> Result<i64, BufferError> {
        Ok(i64::from_le_bytes(self.array()?))
    }

    /// Reads an unsigned 128-bit little-endian integer.
    #[inline]
    pub fn try_u128(&mut self) -> Result<u128, BufferError> {
        Ok(u128::from_le_bytes(self.array()?))
    }

    /// Reads a 32-bit little-endian float.
    #[inline]
    pub fn try_f32(&mut self) -> Result<f32, BufferError> {
        Ok(f32::from_le_bytes(self.array()?))
    }

    /// Reads a 64-bit little-endian float.
    #[inline]
    pub fn try_f64(&mut self) -> Result<f64, BufferError> {
        Ok(f64::from_le_bytes(self.array()?))
    }

    /// Returns a subslice of the given size and advances the cursor.
    pub fn try_buf(&mut self, size: usize) -> Result<&'a [u8], BufferError> {
        self.check(size)?;
        let bin = &self.uint8[self.x..self.x + size];
        self.x += size;
        Ok(bin)
    }

    /// Everything from the cursor to the end, without advancing.
    pub fn rest(&self) -> &'a [u8] {
        &self.uint8[self.x..]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_u8() {
        let data = [0x01, 0x02, 0x03];
        let mut reader = Reader::new(&data);
        assert_eq!(reader.try_u8().unwrap(), 0x01);
        assert_eq!(reader.try_u8().unwrap(), 0x02);
        assert_eq!(reader.try_u8().unwrap(), 0x03);
        assert!(reader.is_empty());
    }

    #[test]
    fn test_u16_little_endian() {
        let data = [0x02, 0x01, 0x04, 0x03];
        let mut reader = Reader::new(&data);
        assert_eq!(reader.try_u16().unwrap(), 0x0102);
        assert_eq!(reader.try_u16().unwrap(), 0x0304);
    }

    #[test]
    fn test_u32_little_endian() {
        let data = [0x04, 0x03, 0x02, 0x01];
        let mut reader = Reader::new(&data);
        assert_eq!(reader.try_u32().unwrap(), 0x01020304);
    }

    #[test]
    fn test_skip() {
        let data = [0x01, 0x02, 0x03, 0x04];
        let mut reader = Reader::new(&data);
        reader.try_skip(2).unwrap();
        assert_eq!(reader.try_u8().unwrap(), 0x03);
        assert!(reader.try_skip(2).is_err());
    }

    #[test]
    fn test_end_of_buffer_reports_position() {
        let data = [0x01, 0x02, 0x03];
        let mut reader = Reader::new(&data);
        reader.try_u8().unwrap();
        assert_eq!(
            reader.try_u32(),
            Err(BufferError::EndOfBuffer {
                offset: 1,
                needed: 4,
                available: 2
            })
        );
        // A failed read does not move the cursor.
        assert_eq!(reader.position(), 1);
        assert_eq!(reader.try_u16().unwrap(), 0x0302);
    }

    #[test]
    fn test_buf_and_rest() {
        let data = b"hello world";
        let mut reader = Reader::new(data);
        assert_eq!(reader.try_buf(5).unwrap(), b"hello");
        assert_eq!(reader.rest(), b" world");
        assert!(reader.try_buf(7).is_err());
    }

    #[test]
    fn test_floats() {
        let mut data = Vec::new();
        data.extend_from_slice(&1.5f32.to_le_bytes());
        data.extend_from_slice(&(-2.25f64).to_le_bytes());
        let mut reader = Reader::new(&data);
        assert_eq!(reader.try_f32().unwrap(), 1.5);
        assert_eq!(reader.try_f64().unwrap(), -2.25);
    }
}
