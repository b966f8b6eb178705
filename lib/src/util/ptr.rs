//! Pointer resolution over immutable buffers.
//!
//! Container files link structures with signed offsets relative to the
//! structure that stores them. Memory dumps store PSX addresses instead.

use crate::{
    error::{DecodeError, DecodeResult},
    util::read::ByteCursor,
};

/// Bits of a PSX address that index into main RAM (drops the KSEG prefix).
pub const PSX_ADDRESS_MASK: u32 = 0x00FF_FFFF;

/// Adds a signed delta to `base`, failing if the result lies outside `0..=len`.
#[inline]
pub fn offset_by(cursor: ByteCursor, base: usize, delta: i32) -> DecodeResult<usize> {
    let target = base as i64 + delta as i64;
    if target < 0 || target > cursor.len() as i64 {
        return Err(DecodeError::OutOfBounds { offset: target, width: 0, len: cursor.len() });
    }
    Ok(target as usize)
}

/// `base + read_i32(base + field)`: a pointer stored in a structure field,
/// relative to the start of that structure.
#[inline]
pub fn resolve_relative_at(cursor: ByteCursor, base: usize, field: usize) -> DecodeResult<usize> {
    let delta = cursor.read_i32(base + field)?;
    offset_by(cursor, base, delta)
}

/// `base + read_i32(base)`: a pointer relative to where it was read.
#[inline]
pub fn resolve_relative(cursor: ByteCursor, base: usize) -> DecodeResult<usize> {
    resolve_relative_at(cursor, base, 0)
}

/// Reads a PSX address (e.g. `3D 25 0A 80` is `0x800A253D`) and returns its
/// offset into a main RAM dump. A null pointer resolves to `0`.
#[inline]
pub fn resolve_psx_pointer(cursor: ByteCursor, offset: usize) -> DecodeResult<usize> {
    Ok((cursor.read_u32(offset)? & PSX_ADDRESS_MASK) as usize)
}
