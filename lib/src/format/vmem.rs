//! Texture regions found by scanning main RAM for `VMEM` descriptors.
//!
//! The game keeps a small descriptor for every texture it uploads to VRAM.
//! Scanning a RAM dump for them recovers each texture's VRAM position, CLUT
//! and size. All such textures are 4bpp.

use std::io::Cursor;

use binrw::{binread, BinReaderExt};
use serde_derive::Serialize;

use crate::{
    error::{DecodeError, DecodeResult},
    format::{
        bitmap::{decode_bitmap, BitDepth, Bitmap, BitmapParams, ChannelScale, WORD_SIZE},
        peek_four_cc, FourCC,
    },
};

pub const K_VMEM: FourCC = FourCC(*b"VMEM");

/// VRAM is 1024x512 16-bit words.
pub const VRAM_WIDTH: usize = 1024;
pub const VRAM_HEIGHT: usize = 512;
pub const VRAM_ROW_BYTES: usize = VRAM_WIDTH * WORD_SIZE;

/// Texture pages are 64 words wide and 256 rows tall, 16 per row.
pub const PAGE_WIDTH: u16 = 64;
pub const PAGE_HEIGHT: u16 = 256;
pub const PAGES_PER_ROW: u16 = 16;

/// Largest CLUT x that still leaves room for 16 entries.
const MAX_CLUT_X: u16 = 1008;
const MAX_CLUT_Y: u16 = 512;
const CLUT_ENTRIES: usize = 16;

#[binread]
#[br(little)]
#[derive(Clone, Debug)]
struct VmemHeader {
    #[br(temp, assert(magic == K_VMEM.0))]
    magic: FourCC,
    #[br(temp, assert(version == 16))]
    version: u32,
    x: u16,
    y: u16,
    clut_x: u16,
    clut_y: u16,
    flag: u16,
    width: u16,
    _unk: u16,
    height: u16,
    #[br(temp, assert(trailer == K_VMEM.0))]
    trailer: FourCC,
}

/// How a region's VRAM placement differs from its header fields.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize)]
pub enum Placement {
    /// Header fields are used as stored.
    Direct,
    /// Stored width and height are swapped.
    Rotated,
    /// The stored x is the right edge; the origin is `x - width`.
    OriginRight,
    /// Flag value with no known correction.
    Unrecognized(u16),
}

/// Flags of rotated textures.
const ROTATED_FLAGS: [u16; 10] = [6, 8, 12, 14, 16, 24, 26, 32, 38, 42];
/// Flags of textures whose origin is their right edge.
const ORIGIN_RIGHT_FLAGS: [u16; 1] = [4];
/// Flags observed on textures that need no correction.
const DIRECT_FLAGS: [u16; 2] = [0, 2];

impl Placement {
    pub fn for_flag(flag: u16) -> Self {
        if ROTATED_FLAGS.contains(&flag) {
            Placement::Rotated
        } else if ORIGIN_RIGHT_FLAGS.contains(&flag) {
            Placement::OriginRight
        } else if DIRECT_FLAGS.contains(&flag) {
            Placement::Direct
        } else {
            Placement::Unrecognized(flag)
        }
    }
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct TextureRegion {
    /// Offset of the descriptor in the scanned buffer.
    pub offset: usize,
    /// VRAM x in words, after placement correction.
    pub x: i32,
    pub y: u16,
    pub page_index: u16,
    pub page_col: u16,
    pub page_row: u16,
    /// Position on the texture page in pixels.
    pub x_on_page: u16,
    pub y_on_page: u16,
    pub clut_x: u16,
    pub clut_y: u16,
    pub flag: u16,
    pub placement: Placement,
    /// Size in pixels, after placement correction.
    pub width: u16,
    pub height: u16,
}

impl TextureRegion {
    fn from_header(offset: usize, header: &VmemHeader) -> Self {
        let page_col = header.x / PAGE_WIDTH;
        let page_row = if header.y >= PAGE_HEIGHT { 1 } else { 0 };
        let placement = Placement::for_flag(header.flag);
        let (width, height) = match placement {
            Placement::Rotated => (header.height, header.width),
            _ => (header.width, header.height),
        };
        let x = match placement {
            Placement::OriginRight => header.x as i32 - header.width as i32,
            _ => header.x as i32,
        };
        Self {
            offset,
            x,
            y: header.y,
            page_index: page_col + page_row * PAGES_PER_ROW,
            page_col,
            page_row,
            x_on_page: (header.x - page_col * PAGE_WIDTH) * 4,
            y_on_page: header.y - page_row * PAGE_HEIGHT,
            clut_x: header.clut_x,
            clut_y: header.clut_y,
            flag: header.flag,
            placement,
            width,
            height,
        }
    }

    /// Whether a page-relative texel lies inside this region.
    #[inline]
    pub fn contains(&self, page: u16, u: u8, v: u8) -> bool {
        let (u, v) = (u as u32, v as u32);
        let (x, y) = (self.x_on_page as u32, self.y_on_page as u32);
        page == self.page_index
            && u >= x
            && u < x + self.width as u32
            && v >= y
            && v < y + self.height as u32
    }

    /// Parameters to decode this region from a VRAM image.
    pub fn bitmap_params(&self) -> DecodeResult<BitmapParams> {
        if self.x < 0 {
            return Err(DecodeError::OutOfBounds {
                offset: self.x as i64 * WORD_SIZE as i64,
                width: WORD_SIZE,
                len: VRAM_ROW_BYTES * VRAM_HEIGHT,
            });
        }
        let words = (self.width as usize).div_ceil(BitDepth::Four.pixels_per_word());
        let palette_size = CLUT_ENTRIES * WORD_SIZE;
        Ok(BitmapParams {
            bit_depth: BitDepth::Four,
            palette_offset: self.clut_y as usize * VRAM_ROW_BYTES + self.clut_x as usize * WORD_SIZE,
            palette_size,
            palette_count: 1,
            palette_stride: palette_size,
            pixel_offset: self.y as usize * VRAM_ROW_BYTES + self.x as usize * WORD_SIZE,
            width: words,
            height: self.height as usize,
            row_stride: VRAM_ROW_BYTES,
            channel_scale: ChannelScale::Round,
            active_palette: 0,
        })
    }

    /// Decodes this region's pixels from a VRAM image.
    pub fn decode(&self, vram: &[u8]) -> DecodeResult<Bitmap> {
        decode_bitmap(vram, 0, &self.bitmap_params()?)
    }
}

/// Scans `data` for `VMEM` descriptors and returns their regions in scan order.
pub fn locate_textures(data: &[u8]) -> Vec<TextureRegion> {
    let mut regions = Vec::new();
    for offset in 0..data.len() {
        if peek_four_cc(data, offset) != Some(K_VMEM) {
            continue;
        }
        let Ok(header) = Cursor::new(&data[offset..]).read_le::<VmemHeader>() else {
            continue;
        };
        // Garbage CLUT coordinates mean this is not a real texture.
        if header.clut_x > MAX_CLUT_X || header.clut_y > MAX_CLUT_Y {
            log::debug!(
                "Discarding VMEM at {offset:#X}: CLUT ({}, {}) out of range",
                header.clut_x,
                header.clut_y
            );
            continue;
        }
        let region = TextureRegion::from_header(offset, &header);
        if let Placement::Unrecognized(flag) = region.placement {
            log::warn!("VMEM at {offset:#X} has unrecognized flag {flag}");
        }
        regions.push(region);
    }
    log::debug!("Located {} texture regions", regions.len());
    regions
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn vmem_header(fields: [u16; 8]) -> Vec<u8> {
        let mut out = b"VMEM".to_vec();
        out.extend_from_slice(&16u32.to_le_bytes());
        for field in fields {
            out.extend_from_slice(&field.to_le_bytes());
        }
        out.extend_from_slice(b"VMEM");
        out
    }

    #[test]
    fn locates_regions_and_page_coordinates() {
        let mut data = vec![0xCC; 5];
        // x, y, clut_x, clut_y, flag, width, unk, height
        data.extend(vmem_header([640 + 10, 300, 0, 480, 0, 32, 0, 16]));
        data.extend(vmem_header([5, 2, 16, 481, 2, 8, 0, 8]));
        let regions = locate_textures(&data);
        assert_eq!(regions.len(), 2);
        let first = &regions[0];
        assert_eq!(first.offset, 5);
        assert_eq!((first.page_col, first.page_row, first.page_index), (10, 1, 26));
        assert_eq!((first.x_on_page, first.y_on_page), (40, 44));
        assert_eq!(first.placement, Placement::Direct);
        assert_eq!(regions[1].page_index, 0);
    }

    #[test]
    fn rejects_false_positives() {
        let mut data = vmem_header([0, 0, 1009, 0, 0, 8, 0, 8]);
        data.extend(vmem_header([0, 0, 0, 513, 0, 8, 0, 8]));
        let mut broken = vmem_header([0, 0, 0, 0, 0, 8, 0, 8]);
        broken[0x18] = b'X';
        data.extend(broken);
        let mut wrong_version = vmem_header([0, 0, 0, 0, 0, 8, 0, 8]);
        wrong_version[4] = 17;
        data.extend(wrong_version);
        data.extend_from_slice(b"VMEM");
        assert!(locate_textures(&data).is_empty());
    }

    #[test]
    fn applies_flag_corrections() {
        let rotated = locate_textures(&vmem_header([100, 0, 0, 0, 12, 32, 0, 16]));
        assert_eq!(rotated[0].placement, Placement::Rotated);
        assert_eq!((rotated[0].width, rotated[0].height), (16, 32));
        assert_eq!(rotated[0].x, 100);

        let shifted = locate_textures(&vmem_header([100, 0, 0, 0, 4, 32, 0, 16]));
        assert_eq!(shifted[0].placement, Placement::OriginRight);
        assert_eq!(shifted[0].x, 68);
        // Page coordinates come from the stored x.
        assert_eq!(shifted[0].x_on_page, (100 - 64) * 4);

        let unknown = locate_textures(&vmem_header([100, 0, 0, 0, 7, 32, 0, 16]));
        assert_eq!(unknown[0].placement, Placement::Unrecognized(7));
        assert_eq!((unknown[0].width, unknown[0].x), (32, 100));
    }

    #[test]
    fn containment_is_half_open() {
        let region = &locate_textures(&vmem_header([64 + 4, 10, 0, 0, 0, 16, 0, 8]))[0];
        assert_eq!((region.page_index, region.x_on_page, region.y_on_page), (1, 16, 10));
        assert!(region.contains(1, 16, 10));
        assert!(region.contains(1, 31, 17));
        assert!(!region.contains(1, 32, 10));
        assert!(!region.contains(1, 16, 18));
        assert!(!region.contains(0, 16, 10));
    }

    #[test]
    fn decodes_region_from_vram() {
        let mut vram = vec![0u8; VRAM_ROW_BYTES * 4];
        // CLUT at (16, 3): entry 2 is pure green
        let clut = 3 * VRAM_ROW_BYTES + 16 * WORD_SIZE;
        vram[clut + 4..clut + 6].copy_from_slice(&(31u16 << 5).to_le_bytes());
        // Texture at (2, 1), 6 pixels wide: two words per row
        let texels = VRAM_ROW_BYTES + 2 * WORD_SIZE;
        vram[texels..texels + 4].copy_from_slice(&[0x02, 0x20, 0x00, 0x02]);

        let region = &locate_textures(&vmem_header([2, 1, 16, 3, 0, 6, 0, 1]))[0];
        let bitmap = region.decode(&vram).unwrap();
        assert_eq!(bitmap.width_actual, 8);
        assert_eq!(&bitmap.pixels, &[2, 0, 0, 2, 0, 0, 2, 0]);
        let image = bitmap.to_rgba_image_cropped(region.width as usize);
        assert_eq!(image.dimensions(), (6, 1));
        assert_eq!(image.get_pixel(0, 0).0, [0, 255, 0, 255]);
        assert_eq!(image.get_pixel(1, 0).0, [0, 0, 0, 255]);
    }

    #[test]
    fn negative_origin_is_out_of_bounds() {
        let region = &locate_textures(&vmem_header([4, 0, 0, 0, 4, 32, 0, 16]))[0];
        assert!(matches!(region.bitmap_params(), Err(DecodeError::OutOfBounds { .. })));
    }
}
