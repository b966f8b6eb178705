use std::ops::Range;

use glam::Vec3;
use serde_derive::Serialize;

use crate::{
    error::DecodeResult,
    format::{
        face::{decode_face, FaceFormatTable, FaceRecord},
        FormatContext,
    },
    util::{
        ptr::{resolve_psx_pointer, resolve_relative_at},
        read::ByteCursor,
    },
};

/// Vertices are 3×i16 followed by 2 bytes of padding.
pub const VERTEX_STRIDE: usize = 8;

/// Stored as i16; widened so that reflecting -32768 stays exact.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Serialize)]
pub struct Vertex {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl Vertex {
    #[inline]
    pub fn to_vec3(self) -> Vec3 { Vec3::new(self.x as f32, self.y as f32, self.z as f32) }

    #[inline]
    pub fn reflected(self, reflection: Reflection) -> Self {
        Self {
            x: self.x * reflection.x as i32,
            y: self.y * reflection.y as i32,
            z: self.z * reflection.z as i32,
        }
    }
}

/// Per-axis sign flip of a model part, each component `1` or `-1`.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize)]
pub struct Reflection {
    pub x: i8,
    pub y: i8,
    pub z: i8,
}

impl Reflection {
    pub const IDENTITY: Self = Self { x: 1, y: 1, z: 1 };

    /// Builds a reflection from the signs of three companion fields.
    pub fn from_signs(x: i16, y: i16, z: i16) -> Self {
        let sign = |v: i16| if v >= 0 { 1 } else { -1 };
        Self { x: sign(x), y: sign(y), z: sign(z) }
    }
}

impl Default for Reflection {
    fn default() -> Self { Self::IDENTITY }
}

#[derive(Copy, Clone, Debug)]
enum PointerKind {
    /// Signed offset from the mesh start.
    Relative,
    /// PSX address into main RAM.
    Psx,
}

/// Field offsets of a mesh header, relative to the mesh start.
#[derive(Copy, Clone, Debug)]
struct MeshHeaderLayout {
    record_size: Option<usize>,
    scale_shift: Option<usize>,
    vertex_count: usize,
    vertices: usize,
    face_count: usize,
    faces: usize,
    pointers: PointerKind,
}

const CONTAINER_HEADER: MeshHeaderLayout = MeshHeaderLayout {
    record_size: Some(0x00),
    scale_shift: Some(0x08),
    vertex_count: 0x0C,
    vertices: 0x10,
    face_count: 0x1C,
    faces: 0x24,
    pointers: PointerKind::Relative,
};

const MEMORY_HEADER: MeshHeaderLayout = MeshHeaderLayout {
    record_size: None,
    scale_shift: None,
    vertex_count: 0x24,
    vertices: 0x28,
    face_count: 0x34,
    faces: 0x3C,
    pointers: PointerKind::Psx,
};

impl MeshHeaderLayout {
    fn for_context(context: FormatContext) -> Self {
        match context {
            FormatContext::Container => CONTAINER_HEADER,
            FormatContext::MemoryDump => MEMORY_HEADER,
        }
    }

    fn pointer(&self, cursor: ByteCursor, mesh: usize, field: usize) -> DecodeResult<usize> {
        match self.pointers {
            PointerKind::Relative => resolve_relative_at(cursor, mesh, field),
            PointerKind::Psx => resolve_psx_pointer(cursor, mesh + field),
        }
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct Mesh {
    pub offset: usize,
    /// Size of the mesh record; container meshes of an object are packed
    /// back to back. Zero for memory-dump meshes.
    pub record_size: u32,
    /// Power-of-two multiplier for this mesh's vertices only.
    pub scale_shift: i8,
    pub vertex_count: usize,
    pub vertices: Vec<Vertex>,
    /// Declared number of face records, including dropped degenerate ones.
    pub face_count: usize,
    pub faces: Vec<FaceRecord>,
    /// Byte range consumed by the face stream.
    pub face_stream: Range<usize>,
}

impl Mesh {
    /// Returns a copy with every vertex reflected; the source mesh is untouched.
    pub fn reflected(&self, reflection: Reflection) -> Mesh {
        if reflection == Reflection::IDENTITY {
            return self.clone();
        }
        Mesh {
            vertices: self.vertices.iter().map(|v| v.reflected(reflection)).collect(),
            ..self.clone()
        }
    }

    /// Multiplier from `scale_shift`. Non-positive shifts leave vertices unscaled.
    #[inline]
    pub fn scale(&self) -> f32 {
        if self.scale_shift > 0 {
            (1u32 << self.scale_shift.min(31)) as f32
        } else {
            1.0
        }
    }
}

/// Decodes the mesh whose header starts at `offset`.
///
/// Degenerate faces are dropped from [`Mesh::faces`]. An unknown face tag
/// aborts the whole mesh.
pub fn decode_mesh(data: &[u8], offset: usize, context: FormatContext) -> DecodeResult<Mesh> {
    let cursor = ByteCursor::new(data);
    let layout = MeshHeaderLayout::for_context(context);
    let table = FaceFormatTable::for_context(context);

    let record_size = match layout.record_size {
        Some(field) => cursor.read_u32(offset + field)?,
        None => 0,
    };
    let scale_shift = match layout.scale_shift {
        Some(field) => cursor.read_i8(offset + field)?,
        None => 0,
    };

    let vertex_count = cursor.read_count(offset + layout.vertex_count)?;
    let vertex_start = layout.pointer(cursor, offset, layout.vertices)?;
    let vertices = decode_vertices(cursor, vertex_start, vertex_count)?;

    let face_count = cursor.read_count(offset + layout.face_count)?;
    let face_start = layout.pointer(cursor, offset, layout.faces)?;
    let mut faces = Vec::new();
    let mut face_offset = face_start;
    for _ in 0..face_count {
        let face = decode_face(cursor, face_offset, &table)?;
        face_offset += face.byte_size as usize;
        if face.is_degenerate() {
            log::trace!("Dropping degenerate face at {:#X}", face.offset);
            continue;
        }
        faces.push(face);
    }

    log::debug!(
        "Decoded {context} mesh at {offset:#X}: {vertex_count} vertices, {} of {face_count} faces",
        faces.len()
    );
    Ok(Mesh {
        offset,
        record_size,
        scale_shift,
        vertex_count,
        vertices,
        face_count,
        faces,
        face_stream: face_start..face_offset,
    })
}

fn decode_vertices(cursor: ByteCursor, start: usize, count: usize) -> DecodeResult<Vec<Vertex>> {
    let len = count.saturating_mul(VERTEX_STRIDE);
    let raw = cursor.bytes(start, len)?;
    let vertices = ByteCursor::new(raw);
    (0..count)
        .map(|i| {
            let base = i * VERTEX_STRIDE;
            Ok(Vertex {
                x: vertices.read_i16(base)?.into(),
                y: vertices.read_i16(base + 2)?.into(),
                z: vertices.read_i16(base + 4)?.into(),
            })
        })
        .collect()
}
