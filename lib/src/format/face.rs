//! Face records and the tag tables that make the face stream self-describing.
//!
//! A face stream is a packed sequence of variable-size records. The first
//! u16 of a record is its type tag; the tag alone determines the record size,
//! the vertex count and where (if anywhere) UVs and the texture page live.

use serde_derive::Serialize;

use crate::{
    error::{DecodeError, DecodeResult},
    format::FormatContext,
    util::read::ByteCursor,
};

/// Location of the texture fields inside a face record.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct UvLayout {
    /// Offset of the `(u, v)` byte pairs, one pair per vertex.
    pub uv_offset: u32,
    /// Offset of the u16 texture page field.
    pub texture_page_offset: u32,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct FaceLayout {
    pub tag: u16,
    pub record_size: u32,
    pub is_quad: bool,
    pub uv: Option<UvLayout>,
}

impl FaceLayout {
    #[inline]
    pub const fn vertex_count(&self) -> usize {
        if self.is_quad {
            4
        } else {
            3
        }
    }
}

const fn untextured(tag: u16, record_size: u32, is_quad: bool) -> FaceLayout {
    FaceLayout { tag, record_size, is_quad, uv: None }
}

const fn textured(
    tag: u16,
    record_size: u32,
    is_quad: bool,
    texture_page_offset: u32,
    uv_offset: u32,
) -> FaceLayout {
    FaceLayout { tag, record_size, is_quad, uv: Some(UvLayout { uv_offset, texture_page_offset }) }
}

static CONTAINER_LAYOUTS: &[FaceLayout] = &[
    untextured(0x0920, 0x12, false),
    untextured(0x0961, 0x12, false),
    untextured(0x0962, 0x12, false),
    untextured(0x0A30, 0x14, false),
    untextured(0x0A71, 0x14, false),
    untextured(0x0AB0, 0x14, false),
    untextured(0x0B24, 0x16, true),
    untextured(0x0B65, 0x16, true),
    untextured(0x0B66, 0x16, true),
    untextured(0x0C34, 0x18, true),
    untextured(0x0C38, 0x18, false),
    untextured(0x0C75, 0x18, false),
    untextured(0x0C79, 0x18, false),
    untextured(0x0CB4, 0x18, true),
    untextured(0x0CB8, 0x18, false),
    untextured(0x0F3C, 0x1E, true),
    untextured(0x0F7D, 0x1E, true),
    untextured(0x0FBC, 0x1E, true),
    untextured(0x4920, 0x12, false),
    untextured(0x4961, 0x12, false),
    untextured(0x4B24, 0x16, true),
    untextured(0x4B65, 0x16, true),
    untextured(0x4C34, 0x18, true),
    untextured(0x4C38, 0x18, false),
    untextured(0x4C79, 0x18, true),
    untextured(0x4F3C, 0x1E, true),
    untextured(0x4F7D, 0x1E, true),
    untextured(0x8920, 0x12, false),
    untextured(0x8A30, 0x14, false),
    untextured(0x8B24, 0x16, true),
    untextured(0x8C34, 0x18, true),
    untextured(0x8C38, 0x18, false),
    untextured(0x8F3C, 0x1E, true),
    untextured(0xCB65, 0x16, true),
];

static MEMORY_LAYOUTS: &[FaceLayout] = &[
    textured(0x0920, 0x12, false, 0x0A, 0x0C),
    textured(0x0B24, 0x16, true, 0x0C, 0x0E),
    textured(0x0C38, 0x18, false, 0x10, 0x12),
    textured(0x0C79, 0x18, false, 0x0F, 0x10),
    textured(0x0F3C, 0x1E, true, 0x14, 0x16),
    textured(0x0F7D, 0x1E, true, 0x14, 0x16),
    textured(0x4961, 0x12, false, 0x0A, 0x0C),
    textured(0x4B65, 0x16, true, 0x0C, 0x0E),
    textured(0x8F3C, 0x1E, true, 0x14, 0x16),
];

/// Static mapping from face type tag to record layout.
#[derive(Copy, Clone, Debug)]
pub struct FaceFormatTable {
    layouts: &'static [FaceLayout],
}

impl FaceFormatTable {
    /// Tags found in mesh files extracted from the game archive.
    pub const CONTAINER: Self = Self { layouts: CONTAINER_LAYOUTS };
    /// Tags found in meshes resident in main RAM.
    pub const MEMORY: Self = Self { layouts: MEMORY_LAYOUTS };

    pub fn for_context(context: FormatContext) -> Self {
        match context {
            FormatContext::Container => Self::CONTAINER,
            FormatContext::MemoryDump => Self::MEMORY,
        }
    }

    #[inline]
    pub fn lookup(&self, tag: u16) -> Option<&'static FaceLayout> {
        self.layouts.iter().find(|layout| layout.tag == tag)
    }

    pub fn layouts(&self) -> &'static [FaceLayout] { self.layouts }
}

/// Textured memory-dump faces address one of 32 texture pages.
pub const TEXTURE_PAGE_COUNT: u16 = 32;

#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct FaceRecord {
    pub type_tag: u16,
    pub offset: usize,
    pub vertex_indices: Vec<u16>,
    /// One `(u, v)` pair per vertex index; empty for untextured layouts.
    pub uv_coords: Vec<[u8; 2]>,
    pub texture_page_index: Option<u16>,
    pub byte_size: u32,
}

impl FaceRecord {
    /// A face referencing the same vertex twice is a garbage record.
    pub fn is_degenerate(&self) -> bool {
        let indices = &self.vertex_indices;
        indices.iter().enumerate().any(|(i, index)| indices[i + 1..].contains(index))
    }

    #[inline]
    pub fn first_uv(&self) -> Option<[u8; 2]> { self.uv_coords.first().copied() }
}

/// Decodes the face record at `offset`. The caller advances by `byte_size`.
pub fn decode_face(
    cursor: ByteCursor,
    offset: usize,
    table: &FaceFormatTable,
) -> DecodeResult<FaceRecord> {
    let tag = cursor.read_u16(offset)?;
    let layout = match table.lookup(tag) {
        Some(layout) => layout,
        None => return Err(DecodeError::UnknownFaceType { tag, offset }),
    };
    // The whole record must be present, not just the fields we use.
    cursor.bytes(offset, layout.record_size as usize)?;

    let count = layout.vertex_count();
    let vertex_indices = (0..count)
        .map(|i| cursor.read_u16(offset + 2 + i * 2))
        .collect::<DecodeResult<Vec<_>>>()?;
    let (uv_coords, texture_page_index) = match layout.uv {
        Some(uv) => {
            let base = offset + uv.uv_offset as usize;
            let raw = cursor.bytes(base, count * 2)?;
            let uvs = raw.chunks_exact(2).map(|pair| [pair[0], pair[1]]).collect();
            let page = cursor.read_u16(offset + uv.texture_page_offset as usize)?;
            (uvs, Some(page % TEXTURE_PAGE_COUNT))
        }
        None => (Vec::new(), None),
    };

    Ok(FaceRecord {
        type_tag: tag,
        offset,
        vertex_indices,
        uv_coords,
        texture_page_index,
        byte_size: layout.record_size,
    })
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    fn record(tag: u16, size: usize, indices: &[u16]) -> Vec<u8> {
        let mut out = vec![0u8; size];
        out[0..2].copy_from_slice(&tag.to_le_bytes());
        for (i, index) in indices.iter().enumerate() {
            out[2 + i * 2..4 + i * 2].copy_from_slice(&index.to_le_bytes());
        }
        out
    }

    #[test]
    fn tables_have_unique_tags() {
        for table in [FaceFormatTable::CONTAINER, FaceFormatTable::MEMORY] {
            let layouts = table.layouts();
            for (i, layout) in layouts.iter().enumerate() {
                assert!(layouts[i + 1..].iter().all(|other| other.tag != layout.tag));
            }
        }
    }

    #[test]
    fn uv_fields_fit_inside_records() {
        for layout in FaceFormatTable::MEMORY.layouts() {
            let uv = layout.uv.unwrap();
            let uv_end = uv.uv_offset as usize + layout.vertex_count() * 2;
            assert!(uv_end <= layout.record_size as usize, "tag {:#06X}", layout.tag);
            assert!(uv.texture_page_offset + 2 <= layout.record_size);
        }
    }

    #[test]
    fn decodes_container_triangle() {
        let data = record(0x0920, 0x12, &[0, 1, 2]);
        let face = decode_face(ByteCursor::new(&data), 0, &FaceFormatTable::CONTAINER).unwrap();
        assert_eq!(face.vertex_indices, vec![0, 1, 2]);
        assert_eq!(face.byte_size, 0x12);
        assert!(face.uv_coords.is_empty());
        assert_eq!(face.texture_page_index, None);
    }

    #[test]
    fn decodes_memory_quad_uvs_and_page() {
        let mut data = record(0x0F3C, 0x1E, &[4, 5, 6, 7]);
        data[0x14..0x16].copy_from_slice(&(32u16 + 7).to_le_bytes());
        data[0x16..0x1E].copy_from_slice(&[10, 20, 11, 21, 12, 22, 13, 23]);
        let face = decode_face(ByteCursor::new(&data), 0, &FaceFormatTable::MEMORY).unwrap();
        assert_eq!(face.vertex_indices, vec![4, 5, 6, 7]);
        assert_eq!(face.uv_coords, vec![[10, 20], [11, 21], [12, 22], [13, 23]]);
        assert_eq!(face.texture_page_index, Some(7));
        assert_eq!(face.first_uv(), Some([10, 20]));
    }

    #[test]
    fn tables_are_not_intermixed() {
        // 0x0A30 only exists in container files
        let data = record(0x0A30, 0x14, &[0, 1, 2]);
        let cursor = ByteCursor::new(&data);
        assert!(decode_face(cursor, 0, &FaceFormatTable::CONTAINER).is_ok());
        assert_eq!(
            decode_face(cursor, 0, &FaceFormatTable::MEMORY),
            Err(DecodeError::UnknownFaceType { tag: 0x0A30, offset: 0 })
        );
    }

    #[test]
    fn truncated_record_is_out_of_bounds() {
        let data = record(0x0F3C, 0x1E, &[0, 1, 2, 3]);
        let cursor = ByteCursor::new(&data[..0x1C]);
        assert!(matches!(
            decode_face(cursor, 0, &FaceFormatTable::CONTAINER),
            Err(DecodeError::OutOfBounds { .. })
        ));
    }

    proptest! {
        #[test]
        fn degenerate_means_repeated_index(indices in proptest::collection::vec(0u16..6, 3..=4)) {
            let face = FaceRecord {
                type_tag: 0,
                offset: 0,
                vertex_indices: indices.clone(),
                uv_coords: Vec::new(),
                texture_page_index: None,
                byte_size: 0,
            };
            let mut sorted = indices.clone();
            sorted.sort_unstable();
            sorted.dedup();
            prop_assert_eq!(face.is_degenerate(), sorted.len() != indices.len());
        }
    }
}
