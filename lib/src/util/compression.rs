use std::{borrow::Cow, io::Read};

use anyhow::{Context, Result};
use flate2::read::GzDecoder;

/// gzip member header: ID1, ID2, CM = deflate.
pub const GZIP_MAGIC: [u8; 3] = [0x1F, 0x8B, 0x08];

#[inline]
pub fn is_gzip(data: &[u8]) -> bool { data.starts_with(&GZIP_MAGIC) }

/// Inflates `data` if it is gzip-compressed, otherwise borrows it.
pub fn decompress_buffer(data: &[u8]) -> Result<Cow<[u8]>> {
    if !is_gzip(data) {
        return Ok(Cow::Borrowed(data));
    }
    let mut out = Vec::new();
    GzDecoder::new(data).read_to_end(&mut out).context("Failed to inflate gzip stream")?;
    log::debug!("Inflated {:#X} bytes to {:#X}", data.len(), out.len());
    Ok(Cow::Owned(out))
}
