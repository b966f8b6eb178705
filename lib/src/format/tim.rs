//! TIM texture files (`TEX_<id>.TIM`).
//!
//! # Layout
//! ```text
//! 0x00: magic u32 (0x10)
//! 0x04: flags u32 (bits 0-2 pixel mode, bit 3 CLUT present)
//! 0x08: CLUT block: size u32, x u16, y u16, entries u16, palettes u16, data
//! var:  image block: size u32, x u16, y u16, width u16 (words), height u16, data
//! ```

use crate::{
    error::{DecodeError, DecodeResult},
    format::bitmap::{decode_bitmap, BitDepth, Bitmap, BitmapParams, ChannelScale, WORD_SIZE},
    util::read::ByteCursor,
};

pub const TIM_MAGIC: u32 = 0x10;
const FLAG_CLUT: u32 = 0x8;
const FLAG_PIXEL_MODE: u32 = 0x7;
const BLOCK_HEADER_SIZE: usize = 0xC;
const CLUT_BLOCK: usize = 0x8;

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct TimHeader {
    pub bit_depth: BitDepth,
    pub palette_entries: usize,
    pub palette_count: usize,
    pub image_block: usize,
    pub vram_x: u16,
    pub vram_y: u16,
    /// Width in 16-bit words.
    pub width: usize,
    pub height: usize,
}

impl TimHeader {
    pub fn read(data: &[u8]) -> DecodeResult<Self> {
        let cursor = ByteCursor::new(data);
        let magic = cursor.read_u32(0x0)?;
        if magic != TIM_MAGIC {
            return Err(DecodeError::MalformedBitmapHeader(format!(
                "not a TIM file (magic {magic:#X})"
            )));
        }
        let flags = cursor.read_u32(0x4)?;
        let bit_depth = match flags & FLAG_PIXEL_MODE {
            0 => BitDepth::Four,
            1 => BitDepth::Eight,
            mode => {
                return Err(DecodeError::MalformedBitmapHeader(format!(
                    "unsupported TIM pixel mode {mode} (flags {flags:#X})"
                )))
            }
        };
        if flags & FLAG_CLUT == 0 {
            return Err(DecodeError::MalformedBitmapHeader(format!(
                "{bit_depth} TIM without CLUT (flags {flags:#X})"
            )));
        }

        let clut_block_size = cursor.read_u32(CLUT_BLOCK)? as usize;
        let palette_entries = cursor.read_u16(CLUT_BLOCK + 0x8)? as usize;
        let palette_count = cursor.read_u16(CLUT_BLOCK + 0xA)? as usize;
        let clut_data = palette_entries * palette_count * WORD_SIZE;
        if clut_block_size < BLOCK_HEADER_SIZE + clut_data {
            return Err(DecodeError::MalformedBitmapHeader(format!(
                "CLUT block size {clut_block_size:#X} too small for {palette_count}x{palette_entries} entries"
            )));
        }

        let image_block = CLUT_BLOCK + clut_block_size;
        Ok(Self {
            bit_depth,
            palette_entries,
            palette_count,
            image_block,
            vram_x: cursor.read_u16(image_block + 0x4)?,
            vram_y: cursor.read_u16(image_block + 0x6)?,
            width: cursor.read_u16(image_block + 0x8)? as usize,
            height: cursor.read_u16(image_block + 0xA)? as usize,
        })
    }

    pub fn bitmap_params(&self) -> BitmapParams {
        let palette_size = self.palette_entries * WORD_SIZE;
        BitmapParams {
            bit_depth: self.bit_depth,
            palette_offset: CLUT_BLOCK + BLOCK_HEADER_SIZE,
            palette_size,
            palette_count: self.palette_count,
            palette_stride: palette_size,
            pixel_offset: self.image_block + BLOCK_HEADER_SIZE,
            width: self.width,
            height: self.height,
            row_stride: self.width * WORD_SIZE,
            channel_scale: ChannelScale::Shift,
            active_palette: 0,
        }
    }
}

/// Decodes a whole TIM file using its first palette.
pub fn decode_tim(data: &[u8]) -> DecodeResult<Bitmap> {
    let header = TimHeader::read(data)?;
    log::debug!(
        "TIM {}: {}x{} words, {} palette(s) of {}",
        header.bit_depth,
        header.width,
        header.height,
        header.palette_count,
        header.palette_entries
    );
    decode_bitmap(data, 0, &header.bitmap_params())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Builds a TIM with the given flags, palettes and pixel words.
    pub(crate) fn build_tim(
        flags: u32,
        palettes: &[Vec<u16>],
        width: u16,
        height: u16,
        pixels: &[u8],
    ) -> Vec<u8> {
        let entries = palettes.first().map_or(0, |p| p.len());
        let mut out = Vec::new();
        out.extend_from_slice(&TIM_MAGIC.to_le_bytes());
        out.extend_from_slice(&flags.to_le_bytes());
        let clut_size = (BLOCK_HEADER_SIZE + entries * palettes.len() * 2) as u32;
        out.extend_from_slice(&clut_size.to_le_bytes());
        out.extend_from_slice(&[0, 0, 0xE0, 0x01]);
        out.extend_from_slice(&(entries as u16).to_le_bytes());
        out.extend_from_slice(&(palettes.len() as u16).to_le_bytes());
        for palette in palettes {
            for color in palette {
                out.extend_from_slice(&color.to_le_bytes());
            }
        }
        let image_size = (BLOCK_HEADER_SIZE + pixels.len()) as u32;
        out.extend_from_slice(&image_size.to_le_bytes());
        out.extend_from_slice(&320u16.to_le_bytes());
        out.extend_from_slice(&256u16.to_le_bytes());
        out.extend_from_slice(&width.to_le_bytes());
        out.extend_from_slice(&height.to_le_bytes());
        out.extend_from_slice(pixels);
        out
    }

    #[test]
    fn reads_four_bit_header() {
        let data = build_tim(0x8, &[vec![0; 16], vec![0; 16]], 2, 3, &[0; 12]);
        let header = TimHeader::read(&data).unwrap();
        assert_eq!(header.bit_depth, BitDepth::Four);
        assert_eq!(header.palette_count, 2);
        assert_eq!(header.image_block, 0x8 + 0xC + 64);
        assert_eq!((header.vram_x, header.vram_y), (320, 256));
        let params = header.bitmap_params();
        assert_eq!(params.pixel_offset, 0x8 + 0xC + 64 + 0xC);
        assert_eq!(params.palette_size, 32);
    }

    #[test]
    fn decodes_eight_bit_tim() {
        let mut palette = vec![0u16; 256];
        palette[0xAB] = 0x7C00;
        let data = build_tim(0x9, &[palette], 1, 1, &[0xAB, 0x00]);
        let bitmap = decode_tim(&data).unwrap();
        assert_eq!(bitmap.width_actual, 2);
        assert_eq!(bitmap.pixels, vec![0xAB, 0x00]);
        assert_eq!(bitmap.color_at(0, 0).unwrap().blue, 248);
    }

    #[test]
    fn rejects_bad_headers() {
        let mut data = build_tim(0x8, &[vec![0; 16]], 1, 1, &[0; 2]);
        data[0] = 0x11;
        assert!(matches!(TimHeader::read(&data), Err(DecodeError::MalformedBitmapHeader(_))));

        let data = build_tim(0x2, &[vec![0; 16]], 1, 1, &[0; 2]);
        assert!(matches!(TimHeader::read(&data), Err(DecodeError::MalformedBitmapHeader(_))));

        let data = build_tim(0x0, &[vec![0; 16]], 1, 1, &[0; 2]);
        assert!(matches!(TimHeader::read(&data), Err(DecodeError::MalformedBitmapHeader(_))));

        let data = build_tim(0x8, &[vec![0; 16]], 4, 1, &[0; 2]);
        assert!(matches!(decode_tim(&data), Err(DecodeError::OutOfBounds { .. })));
    }

    #[test]
    fn tiny_tim_with_huge_dimensions_is_rejected() {
        let data = build_tim(0x8, &[vec![0; 16]], 0xFFFF, 0xFFFF, &[0; 4]);
        assert!(data.len() < 0x60);
        assert!(matches!(decode_tim(&data), Err(DecodeError::OutOfBounds { .. })));
    }
}
