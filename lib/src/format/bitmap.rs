//! Indexed-color bitmaps: 15-bit palettes plus packed 4/8-bit pixel indices.

use std::fmt::{Display, Formatter};

use image::{Rgba, RgbaImage};

use crate::{
    error::{DecodeError, DecodeResult},
    util::read::ByteCursor,
};

/// Bytes per palette entry and per packed pixel word.
pub const WORD_SIZE: usize = 2;

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum BitDepth {
    Four,
    Eight,
}

impl BitDepth {
    /// Pixels packed into each 16-bit word.
    #[inline]
    pub const fn pixels_per_word(self) -> usize {
        match self {
            BitDepth::Four => 4,
            BitDepth::Eight => 2,
        }
    }

    #[inline]
    pub const fn bits(self) -> u8 {
        match self {
            BitDepth::Four => 4,
            BitDepth::Eight => 8,
        }
    }

    /// Unpacks one little-endian pixel word, first pixel first.
    #[inline]
    fn unpack(self, lo: u8, hi: u8, out: &mut Vec<u8>) {
        match self {
            BitDepth::Four => out.extend_from_slice(&[lo & 0xF, lo >> 4, hi & 0xF, hi >> 4]),
            BitDepth::Eight => out.extend_from_slice(&[lo, hi]),
        }
    }
}

impl Display for BitDepth {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result { write!(f, "{}bpp", self.bits()) }
}

/// Expansion of a 5-bit channel to 8 bits. The variants are distinct on
/// purpose and differ for most inputs.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum ChannelScale {
    /// `v * 8`; TIM files.
    Shift,
    /// `round(v / 31 * 255)`; VRAM texture regions.
    Round,
}

impl ChannelScale {
    #[inline]
    pub fn expand(self, v: u8) -> u8 {
        let v = v & 0x1F;
        match self {
            ChannelScale::Shift => v << 3,
            ChannelScale::Round => ((v as f32 / 31.0) * 255.0).round() as u8,
        }
    }
}

#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash)]
pub struct Color {
    pub red: u8,
    pub green: u8,
    pub blue: u8,
    /// Bit 15 of the raw entry (semi-transparency / STP flag).
    pub transparent: bool,
}

impl Color {
    pub fn from_raw(raw: u16, scale: ChannelScale) -> Self {
        Self {
            red: scale.expand((raw & 0x1F) as u8),
            green: scale.expand(((raw >> 5) & 0x1F) as u8),
            blue: scale.expand(((raw >> 10) & 0x1F) as u8),
            transparent: raw & 0x8000 != 0,
        }
    }

    #[inline]
    pub fn to_rgba(self) -> Rgba<u8> { Rgba([self.red, self.green, self.blue, 0xFF]) }
}

pub type Palette = Vec<Color>;

/// Where and how to read a bitmap, relative to the offset passed to
/// [`decode_bitmap`].
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct BitmapParams {
    pub bit_depth: BitDepth,
    pub palette_offset: usize,
    /// Size of one palette in bytes (two bytes per entry).
    pub palette_size: usize,
    pub palette_count: usize,
    /// Distance between consecutive palettes; equal to `palette_size` when
    /// palettes are packed.
    pub palette_stride: usize,
    pub pixel_offset: usize,
    /// Row width in 16-bit words.
    pub width: usize,
    pub height: usize,
    /// Distance between rows in bytes.
    pub row_stride: usize,
    pub channel_scale: ChannelScale,
    /// Palette used for color lookup.
    pub active_palette: usize,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Bitmap {
    /// Width in 16-bit words.
    pub width: usize,
    /// Width in pixels.
    pub width_actual: usize,
    pub height: usize,
    pub bit_depth: BitDepth,
    pub palettes: Vec<Palette>,
    pub active_palette: usize,
    /// Row-major palette indices, `width_actual * height` entries.
    pub pixels: Vec<u8>,
}

impl Bitmap {
    #[inline]
    pub fn index_at(&self, x: usize, y: usize) -> Option<u8> {
        if x >= self.width_actual {
            return None;
        }
        self.pixels.get(y * self.width_actual + x).copied()
    }

    /// Looks a pixel up in the active palette. Indices past the palette end
    /// read as opaque black.
    pub fn color_at(&self, x: usize, y: usize) -> Option<Color> {
        let index = self.index_at(x, y)?;
        let palette = self.palettes.get(self.active_palette)?;
        Some(palette.get(index as usize).copied().unwrap_or_default())
    }

    /// Converts the left `width` pixels of every row to RGBA.
    pub fn to_rgba_image_cropped(&self, width: usize) -> RgbaImage {
        let width = width.min(self.width_actual);
        RgbaImage::from_fn(width as u32, self.height as u32, |x, y| {
            self.color_at(x as usize, y as usize).unwrap_or_default().to_rgba()
        })
    }

    pub fn to_rgba_image(&self) -> RgbaImage { self.to_rgba_image_cropped(self.width_actual) }
}

fn decode_palette(
    cursor: ByteCursor,
    offset: usize,
    size: usize,
    scale: ChannelScale,
) -> DecodeResult<Palette> {
    let raw = cursor.bytes(offset, size)?;
    Ok(raw
        .chunks_exact(WORD_SIZE)
        .map(|entry| Color::from_raw(u16::from_le_bytes([entry[0], entry[1]]), scale))
        .collect())
}

/// Decodes an indexed-color bitmap at `offset` described by `params`.
pub fn decode_bitmap(data: &[u8], offset: usize, params: &BitmapParams) -> DecodeResult<Bitmap> {
    if params.palette_count == 0 {
        return Err(DecodeError::MalformedBitmapHeader("bitmap has no palette".to_string()));
    }
    if params.palette_size % WORD_SIZE != 0 {
        return Err(DecodeError::MalformedBitmapHeader(format!(
            "palette size {:#X} is not a whole number of entries",
            params.palette_size
        )));
    }
    if params.active_palette >= params.palette_count {
        return Err(DecodeError::MalformedBitmapHeader(format!(
            "palette {} selected, {} stored",
            params.active_palette, params.palette_count
        )));
    }

    let cursor = ByteCursor::new(data);
    let palettes = (0..params.palette_count)
        .map(|i| {
            let at = offset + params.palette_offset + i * params.palette_stride;
            decode_palette(cursor, at, params.palette_size, params.channel_scale)
        })
        .collect::<DecodeResult<Vec<_>>>()?;

    let row_bytes = params.width.saturating_mul(WORD_SIZE);
    if params.height > 1 && params.row_stride < row_bytes {
        return Err(DecodeError::MalformedBitmapHeader(format!(
            "row stride {:#X} shorter than a row of {:#X} bytes",
            params.row_stride, row_bytes
        )));
    }
    // The whole pixel grid must be present before anything is allocated.
    if params.height > 0 {
        let last_row = (params.height - 1)
            .checked_mul(params.row_stride)
            .zip(offset.checked_add(params.pixel_offset))
            .and_then(|(rows, base)| rows.checked_add(base));
        match last_row {
            Some(start) => {
                cursor.bytes(start, row_bytes)?;
            }
            None => {
                return Err(DecodeError::OutOfBounds {
                    offset: i64::MAX,
                    width: row_bytes,
                    len: data.len(),
                })
            }
        }
    }

    let width_actual = params.width.saturating_mul(params.bit_depth.pixels_per_word());
    let mut pixels = Vec::with_capacity(width_actual * params.height);
    for row in 0..params.height {
        let start = offset + params.pixel_offset + row * params.row_stride;
        let raw = cursor.bytes(start, row_bytes)?;
        for word in raw.chunks_exact(WORD_SIZE) {
            params.bit_depth.unpack(word[0], word[1], &mut pixels);
        }
    }

    Ok(Bitmap {
        width: params.width,
        width_actual,
        height: params.height,
        bit_depth: params.bit_depth,
        palettes,
        active_palette: params.active_palette,
        pixels,
    })
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    fn params_4bpp(width: usize, height: usize) -> BitmapParams {
        BitmapParams {
            bit_depth: BitDepth::Four,
            palette_offset: 0,
            palette_size: 32,
            palette_count: 1,
            palette_stride: 32,
            pixel_offset: 32,
            width,
            height,
            row_stride: width * WORD_SIZE,
            channel_scale: ChannelScale::Shift,
            active_palette: 0,
        }
    }

    #[test]
    fn decodes_palette_entries() {
        let raw: u16 = 0x8000 | (3 << 10) | (31 << 5) | 1;
        let color = Color::from_raw(raw, ChannelScale::Shift);
        assert_eq!(color, Color { red: 8, green: 248, blue: 24, transparent: true });
        let color = Color::from_raw(raw & 0x7FFF, ChannelScale::Round);
        assert_eq!(color, Color { red: 8, green: 255, blue: 25, transparent: false });
    }

    #[test]
    fn unpacks_four_bit_rows() {
        let mut data = vec![0u8; 32];
        data.extend_from_slice(&[0x21, 0x43, 0x65, 0x87, 0xA9, 0xCB, 0xED, 0x0F]);
        let bitmap = decode_bitmap(&data, 0, &params_4bpp(2, 2)).unwrap();
        assert_eq!(bitmap.width_actual, 8);
        assert_eq!(bitmap.pixels, vec![1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15, 0]);
        assert_eq!(bitmap.index_at(0, 1), Some(9));
        assert_eq!(bitmap.index_at(8, 0), None);
    }

    #[test]
    fn unpacks_eight_bit_rows_with_stride() {
        let mut data = vec![0u8; 0x200];
        data.extend_from_slice(&[1, 2, 0xEE, 0xEE, 3, 4]);
        let params = BitmapParams {
            bit_depth: BitDepth::Eight,
            palette_size: 0x200,
            palette_stride: 0x200,
            pixel_offset: 0x200,
            width: 1,
            height: 2,
            row_stride: 4,
            ..params_4bpp(1, 2)
        };
        let bitmap = decode_bitmap(&data, 0, &params).unwrap();
        assert_eq!(bitmap.width_actual, 2);
        assert_eq!(bitmap.palettes[0].len(), 256);
        assert_eq!(bitmap.pixels, vec![1, 2, 3, 4]);
    }

    #[test]
    fn selects_active_palette() {
        let mut data = vec![0u8; 64];
        // palette 1, entry 1: pure red
        data[32 + 2..32 + 4].copy_from_slice(&0x001Fu16.to_le_bytes());
        data.extend_from_slice(&[0x11, 0x11]);
        let params = BitmapParams {
            palette_count: 2,
            pixel_offset: 64,
            active_palette: 1,
            ..params_4bpp(1, 1)
        };
        let bitmap = decode_bitmap(&data, 0, &params).unwrap();
        assert_eq!(bitmap.color_at(0, 0).unwrap().red, 248);
        let image = bitmap.to_rgba_image_cropped(3);
        assert_eq!(image.dimensions(), (3, 1));
        assert_eq!(image.get_pixel(2, 0), &Rgba([248, 0, 0, 255]));
    }

    #[test]
    fn rejects_bad_parameters() {
        let data = vec![0u8; 64];
        let params = BitmapParams { palette_count: 0, ..params_4bpp(1, 1) };
        assert!(matches!(
            decode_bitmap(&data, 0, &params),
            Err(DecodeError::MalformedBitmapHeader(_))
        ));
        let params = BitmapParams { active_palette: 1, ..params_4bpp(1, 1) };
        assert!(matches!(
            decode_bitmap(&data, 0, &params),
            Err(DecodeError::MalformedBitmapHeader(_))
        ));
        assert!(matches!(
            decode_bitmap(&data, 0, &params_4bpp(32, 1)),
            Err(DecodeError::OutOfBounds { .. })
        ));
        let params = BitmapParams { row_stride: 1, ..params_4bpp(2, 2) };
        assert!(matches!(
            decode_bitmap(&data, 0, &params),
            Err(DecodeError::MalformedBitmapHeader(_))
        ));
    }

    #[test]
    fn huge_dimensions_fail_before_allocating() {
        let data = vec![0u8; 64];
        let params = params_4bpp(0xFFFF, 0xFFFF);
        assert!(matches!(decode_bitmap(&data, 0, &params), Err(DecodeError::OutOfBounds { .. })));
        let params = BitmapParams { row_stride: usize::MAX / 2, ..params_4bpp(1, 4) };
        assert!(matches!(decode_bitmap(&data, 0, &params), Err(DecodeError::OutOfBounds { .. })));
    }

    proptest! {
        #[test]
        fn shift_scale_multiplies_by_eight(v in 0u8..32) {
            prop_assert_eq!(ChannelScale::Shift.expand(v) as u32, v as u32 * 8);
        }

        #[test]
        fn round_scale_matches_formula(v in 0u8..32) {
            let expected = ((v as f64) / 31.0 * 255.0).round() as u8;
            prop_assert_eq!(ChannelScale::Round.expand(v), expected);
        }
    }

    #[test]
    fn scales_differ_at_full_intensity() {
        assert_eq!(ChannelScale::Shift.expand(31), 248);
        assert_eq!(ChannelScale::Round.expand(31), 255);
    }
}
