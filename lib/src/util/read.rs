use zerocopy::{ByteOrder, LittleEndian};

use crate::error::{DecodeError, DecodeResult};

/// Bounds-checked little-endian reader over an immutable byte buffer.
///
/// Every read takes an absolute offset; the cursor itself holds no position,
/// so it can be copied freely and shared between decoders.
#[derive(Copy, Clone, Debug)]
pub struct ByteCursor<'a> {
    data: &'a [u8],
}

impl<'a> ByteCursor<'a> {
    #[inline]
    pub fn new(data: &'a [u8]) -> Self { Self { data } }

    #[inline]
    pub fn len(&self) -> usize { self.data.len() }

    #[inline]
    pub fn is_empty(&self) -> bool { self.data.is_empty() }

    #[inline]
    pub fn data(&self) -> &'a [u8] { self.data }

    /// Returns `len` bytes starting at `offset`.
    #[inline(always)]
    pub fn bytes(&self, offset: usize, len: usize) -> DecodeResult<&'a [u8]> {
        offset
            .checked_add(len)
            .and_then(|end| self.data.get(offset..end))
            .ok_or(DecodeError::OutOfBounds {
                offset: offset as i64,
                width: len,
                len: self.data.len(),
            })
    }

    #[inline(always)]
    pub fn read_u8(&self, offset: usize) -> DecodeResult<u8> { Ok(self.bytes(offset, 1)?[0]) }

    #[inline(always)]
    pub fn read_i8(&self, offset: usize) -> DecodeResult<i8> { Ok(self.read_u8(offset)? as i8) }

    #[inline(always)]
    pub fn read_u16(&self, offset: usize) -> DecodeResult<u16> {
        Ok(LittleEndian::read_u16(self.bytes(offset, 2)?))
    }

    #[inline(always)]
    pub fn read_i16(&self, offset: usize) -> DecodeResult<i16> {
        Ok(LittleEndian::read_i16(self.bytes(offset, 2)?))
    }

    #[inline(always)]
    pub fn read_u32(&self, offset: usize) -> DecodeResult<u32> {
        Ok(LittleEndian::read_u32(self.bytes(offset, 4)?))
    }

    #[inline(always)]
    pub fn read_i32(&self, offset: usize) -> DecodeResult<i32> {
        Ok(LittleEndian::read_i32(self.bytes(offset, 4)?))
    }

    /// Reads a stored element count. Negative values count as zero.
    #[inline]
    pub fn read_count(&self, offset: usize) -> DecodeResult<usize> {
        Ok(self.read_i32(offset)?.max(0) as usize)
    }
}
