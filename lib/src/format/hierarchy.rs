//! Object hierarchies: rigid sub-parts chained to their parents.
//!
//! Parts live in an index-addressed arena of [`PartTransform`]s. World
//! positions are computed by an explicit, depth-bounded walk up the parent
//! chain. The two source formats compose transforms differently, see
//! [`CompositionStrategy`].

use glam::{Mat3, Vec3};
use serde_derive::Serialize;

use crate::{
    error::{DecodeError, DecodeResult},
    format::{
        mesh::{decode_mesh, Mesh, Reflection},
        model::ModelFile,
        FormatContext,
    },
    util::{ptr::resolve_psx_pointer, read::ByteCursor},
};

/// Fixed-point 1.0 of rotation matrix entries.
pub const FIXED_ONE: f32 = 4096.0;
/// Upper bound on parent-chain length during resolution.
pub const MAX_HIERARCHY_DEPTH: usize = 64;
/// Upper bound on the number of parts in a memory-dump part chain.
pub const MAX_PART_CHAIN: usize = 256;

/// RAM address of the pointer to the selected ship descriptor.
pub const SHIP_POINTER_SLOT: usize = 0x1A75A8;
const SHIP_MODEL: usize = 0x40;
const SHIP_PART_TABLE: usize = 0x60;
const MODEL_FIRST_MESH: usize = 0x58;
const PART_META_STRIDE: usize = 0x60;

const IDENTITY_ROTATION: [[i16; 3]; 3] = [[4096, 0, 0], [0, 4096, 0], [0, 0, 4096]];

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PartTransform {
    /// `None` marks a root: no transform of its own is applied.
    pub parent: Option<usize>,
    /// Row-major rotation, 4096 = 1.0.
    pub rotation: [[i16; 3]; 3],
    pub translation: [i32; 3],
}

impl PartTransform {
    pub fn root() -> Self {
        Self { parent: None, rotation: IDENTITY_ROTATION, translation: [0; 3] }
    }

    pub fn rotation_normalized(&self) -> Mat3 {
        let rows = self.rotation.map(|row| row.map(|v| v as f32 / FIXED_ONE));
        // from_cols_array_2d takes columns
        Mat3::from_cols_array_2d(&rows).transpose()
    }

    #[inline]
    pub fn translation_vec(&self) -> Vec3 {
        Vec3::new(
            self.translation[0] as f32,
            self.translation[1] as f32,
            self.translation[2] as f32,
        )
    }
}

/// How one ancestor's transform is folded into a vertex.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum CompositionStrategy {
    /// `v + t`. Memory-dump hierarchies carry no usable rotation.
    TranslateOnly,
    /// `R * v + t` with `R` normalized from fixed point. Container files.
    RotateTranslate,
}

impl CompositionStrategy {
    pub fn for_context(context: FormatContext) -> Self {
        match context {
            FormatContext::Container => CompositionStrategy::RotateTranslate,
            FormatContext::MemoryDump => CompositionStrategy::TranslateOnly,
        }
    }

    #[inline]
    pub fn apply(self, node: &PartTransform, v: Vec3) -> Vec3 {
        match self {
            CompositionStrategy::TranslateOnly => v + node.translation_vec(),
            CompositionStrategy::RotateTranslate => {
                node.rotation_normalized() * v + node.translation_vec()
            }
        }
    }
}

/// Moves `v` from the space of node `start` into world space.
///
/// Each node with a parent applies its own transform, then the walk moves to
/// the parent. Roots and parents missing from the arena end the walk.
pub fn resolve_vertex(
    nodes: &[PartTransform],
    start: usize,
    v: Vec3,
    strategy: CompositionStrategy,
) -> DecodeResult<Vec3> {
    let mut v = v;
    let mut current = start;
    for _ in 0..=MAX_HIERARCHY_DEPTH {
        let Some(node) = nodes.get(current) else { return Ok(v) };
        let Some(parent) = node.parent else { return Ok(v) };
        v = strategy.apply(node, v);
        current = parent;
    }
    Err(DecodeError::HierarchyTooDeep { part: start, limit: MAX_HIERARCHY_DEPTH })
}

#[derive(Clone, Debug)]
pub struct ObjectPart {
    pub index: u32,
    /// Index of this part's node in the transform arena.
    pub node: usize,
    pub transform: PartTransform,
    pub reflection: Reflection,
    /// Mesh-local geometry, already reflected.
    pub meshes: Vec<Mesh>,
    /// World positions, one list per mesh, aligned with `meshes[i].vertices`.
    pub world_vertices: Vec<Vec<Vec3>>,
}

impl ObjectPart {
    fn resolve(
        index: u32,
        node: usize,
        nodes: &[PartTransform],
        reflection: Reflection,
        meshes: Vec<Mesh>,
        strategy: CompositionStrategy,
    ) -> DecodeResult<Self> {
        let world_vertices = meshes
            .iter()
            .map(|mesh| {
                let scale = mesh.scale();
                mesh.vertices
                    .iter()
                    .map(|v| resolve_vertex(nodes, node, v.to_vec3() * scale, strategy))
                    .collect::<DecodeResult<Vec<_>>>()
            })
            .collect::<DecodeResult<Vec<_>>>()?;
        let transform = nodes.get(node).cloned().unwrap_or_else(PartTransform::root);
        Ok(Self { index, node, transform, reflection, meshes, world_vertices })
    }
}

/// Decodes and resolves an object hierarchy.
///
/// For container files `meta_offset` is the start of the model file inside
/// `data`. For memory dumps it is the RAM address of the selected-ship
/// pointer slot (normally [`SHIP_POINTER_SLOT`]).
pub fn resolve_object_hierarchy(
    data: &[u8],
    meta_offset: usize,
    context: FormatContext,
) -> DecodeResult<Vec<ObjectPart>> {
    match context {
        FormatContext::Container => {
            let model = data.get(meta_offset..).ok_or(DecodeError::OutOfBounds {
                offset: meta_offset as i64,
                width: 0,
                len: data.len(),
            })?;
            resolve_model(&ModelFile::read(model)?)
        }
        FormatContext::MemoryDump => resolve_ship(data, meta_offset),
    }
}

/// Resolves every object of a container model against its metadata table.
pub fn resolve_model(model: &ModelFile) -> DecodeResult<Vec<ObjectPart>> {
    let nodes = model.transforms();
    model
        .objects
        .iter()
        .map(|object| {
            ObjectPart::resolve(
                object.index,
                object.index as usize,
                &nodes,
                Reflection::IDENTITY,
                object.meshes.clone(),
                CompositionStrategy::RotateTranslate,
            )
        })
        .collect()
}

struct ShipPartRecord {
    mesh: Mesh,
    reflection: Reflection,
    transform: PartTransform,
}

/// Walks the selected ship's part chain in a main RAM dump.
pub fn resolve_ship(ram: &[u8], pointer_slot: usize) -> DecodeResult<Vec<ObjectPart>> {
    let cursor = ByteCursor::new(ram);
    let ship = resolve_psx_pointer(cursor, pointer_slot)?;
    let model = resolve_psx_pointer(cursor, ship + SHIP_MODEL)?;
    let part_table = resolve_psx_pointer(cursor, ship + SHIP_PART_TABLE)?;

    let mut records = Vec::new();
    let mut next = resolve_psx_pointer(cursor, model + MODEL_FIRST_MESH)?;
    while next != 0 {
        let index = records.len();
        if index == MAX_PART_CHAIN {
            return Err(DecodeError::HierarchyTooDeep { part: index, limit: MAX_PART_CHAIN });
        }
        let record = read_ship_part(cursor, next, part_table + index * PART_META_STRIDE, index)?;
        log::debug!(
            "Decoded model part {index} at {next:#X}, vertices: {}, faces: {}",
            record.mesh.vertex_count,
            record.mesh.face_count
        );
        records.push(record);
        next = resolve_psx_pointer(cursor, next)?;
    }

    for (index, record) in records.iter().enumerate() {
        if let Some(parent) = record.transform.parent {
            if parent >= records.len() {
                log::warn!("Part {index} references missing parent {parent}");
            }
        }
    }

    let nodes = records.iter().map(|r| r.transform.clone()).collect::<Vec<_>>();
    records
        .into_iter()
        .enumerate()
        .map(|(index, record)| {
            ObjectPart::resolve(
                index as u32,
                index,
                &nodes,
                record.reflection,
                vec![record.mesh.reflected(record.reflection)],
                CompositionStrategy::TranslateOnly,
            )
        })
        .collect()
}

fn read_ship_part(
    cursor: ByteCursor,
    mesh_offset: usize,
    meta: usize,
    index: usize,
) -> DecodeResult<ShipPartRecord> {
    let mesh = decode_mesh(cursor.data(), mesh_offset, FormatContext::MemoryDump)?;
    let (parent, reflection) = if index == 0 {
        (None, Reflection::IDENTITY)
    } else {
        let parent_meta = resolve_psx_pointer(cursor, meta + 0x10)?;
        let parent = usize::try_from(cursor.read_i32(parent_meta + 0x8)?).ok();
        let reflection = Reflection::from_signs(
            cursor.read_i16(meta + 0x1C)?,
            cursor.read_i16(meta + 0x1E)?,
            cursor.read_i16(meta + 0x2C)?,
        );
        (parent, reflection)
    };
    let transform = PartTransform {
        parent,
        rotation: IDENTITY_ROTATION,
        translation: [
            cursor.read_i32(meta + 0x30)?,
            cursor.read_i32(meta + 0x34)?,
            cursor.read_i32(meta + 0x38)?,
        ],
    };
    Ok(ShipPartRecord { mesh, reflection, transform })
}
