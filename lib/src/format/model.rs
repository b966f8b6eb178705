//! Model files from the `models` directory of `GAME.RSC`.
//!
//! # Layout
//! ```text
//! 0x34: object metadata count
//! 0x4C: texture count
//! 0x50: texture list offset (i16 ids, stride 0xC)
//! 0x54: object count
//! 0x58: first object offset (objects are packed back to back)
//! 0x5C: object metadata records (stride 0x2C)
//! ```

use serde_derive::Serialize;

use crate::{
    error::{DecodeError, DecodeResult},
    format::{
        hierarchy::PartTransform,
        mesh::{decode_mesh, Mesh},
        FormatContext,
    },
    util::{ptr::resolve_relative_at, read::ByteCursor},
};

const META_COUNT: usize = 0x34;
const TEXTURE_COUNT: usize = 0x4C;
const TEXTURE_LIST: usize = 0x50;
const OBJECT_COUNT: usize = 0x54;
const FIRST_OBJECT: usize = 0x58;
const META_TABLE: usize = 0x5C;
const META_STRIDE: usize = 0x2C;
const TEXTURE_STRIDE: usize = 0xC;

/// Transform node of a container model. `index` is the object index that
/// selects it.
#[derive(Clone, Debug, Serialize)]
pub struct ObjectMeta {
    pub offset: usize,
    pub parent_index: i32,
    /// Row-major rotation, 4096 = 1.0.
    pub rotation: [[i16; 3]; 3],
    pub translation: [i32; 3],
}

impl ObjectMeta {
    fn read(cursor: ByteCursor, offset: usize) -> DecodeResult<Self> {
        let mut rotation = [[0i16; 3]; 3];
        for (r, row) in rotation.iter_mut().enumerate() {
            for (c, value) in row.iter_mut().enumerate() {
                *value = cursor.read_i16(offset + 0x0C + (r * 3 + c) * 2)?;
            }
        }
        Ok(Self {
            offset,
            parent_index: cursor.read_i32(offset)?,
            rotation,
            translation: [
                cursor.read_i32(offset + 0x20)?,
                cursor.read_i32(offset + 0x24)?,
                cursor.read_i32(offset + 0x28)?,
            ],
        })
    }

    pub fn transform(&self) -> PartTransform {
        PartTransform {
            parent: usize::try_from(self.parent_index).ok(),
            rotation: self.rotation,
            translation: self.translation,
        }
    }
}

/// Size of a packed record. A zero size would decode the same record again.
fn next_record(size: u32, kind: &'static str, offset: usize, more: bool) -> DecodeResult<usize> {
    if size == 0 && more {
        return Err(DecodeError::ZeroSizedRecord { kind, offset });
    }
    Ok(size as usize)
}

#[derive(Clone, Debug, Serialize)]
pub struct ModelObject {
    pub offset: usize,
    pub size: u32,
    pub index: u32,
    pub meshes: Vec<Mesh>,
}

impl ModelObject {
    fn read(cursor: ByteCursor, offset: usize) -> DecodeResult<Self> {
        let size = cursor.read_u32(offset)?;
        let index = cursor.read_u32(offset + 0x04)?;
        let mesh_count = cursor.read_count(offset + 0x08)?;
        let mut mesh_offset = resolve_relative_at(cursor, offset, 0x10)?;
        let mut meshes = Vec::new();
        for i in 0..mesh_count {
            let mesh = decode_mesh(cursor.data(), mesh_offset, FormatContext::Container)?;
            let size = next_record(mesh.record_size, "mesh", mesh_offset, i + 1 < mesh_count)?;
            mesh_offset += size;
            meshes.push(mesh);
        }
        Ok(Self { offset, size, index, meshes })
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct ModelFile {
    pub object_metas: Vec<ObjectMeta>,
    pub texture_ids: Vec<i16>,
    /// Sorted by object index.
    pub objects: Vec<ModelObject>,
}

impl ModelFile {
    pub fn read(data: &[u8]) -> DecodeResult<Self> {
        let cursor = ByteCursor::new(data);

        let meta_count = cursor.read_count(META_COUNT)?;
        let object_metas = (0..meta_count)
            .map(|i| ObjectMeta::read(cursor, META_TABLE + i * META_STRIDE))
            .collect::<DecodeResult<Vec<_>>>()?;

        let texture_count = cursor.read_count(TEXTURE_COUNT)?;
        let texture_list = cursor.read_count(TEXTURE_LIST)?;
        let texture_ids = (0..texture_count)
            .map(|i| cursor.read_i16(texture_list + i * TEXTURE_STRIDE))
            .collect::<DecodeResult<Vec<_>>>()?;

        let object_count = cursor.read_count(OBJECT_COUNT)?;
        let mut object_offset = cursor.read_count(FIRST_OBJECT)?;
        let mut objects = Vec::new();
        for i in 0..object_count {
            let object = ModelObject::read(cursor, object_offset)?;
            let size = next_record(object.size, "object", object_offset, i + 1 < object_count)?;
            object_offset += size;
            objects.push(object);
        }
        objects.sort_by_key(|o| o.index);

        Ok(Self { object_metas, texture_ids, objects })
    }

    /// Transform arena indexed by object index.
    pub fn transforms(&self) -> Vec<PartTransform> {
        self.object_metas.iter().map(ObjectMeta::transform).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn put_i32(data: &mut [u8], at: usize, v: i32) { data[at..at + 4].copy_from_slice(&v.to_le_bytes()) }

    #[test]
    fn reads_metadata_and_texture_ids() {
        let textures = META_TABLE + 3 * META_STRIDE;
        let mut data = vec![0u8; textures + 2 * TEXTURE_STRIDE];
        put_i32(&mut data, META_COUNT, 3);
        put_i32(&mut data, TEXTURE_COUNT, 2);
        put_i32(&mut data, TEXTURE_LIST, textures as i32);
        for (i, parent) in [-1, 0, 7].into_iter().enumerate() {
            let meta = META_TABLE + i * META_STRIDE;
            put_i32(&mut data, meta, parent);
            data[meta + 0x0C..meta + 0x0E].copy_from_slice(&4096i16.to_le_bytes());
            put_i32(&mut data, meta + 0x28, -(i as i32));
        }
        data[textures..textures + 2].copy_from_slice(&3i16.to_le_bytes());
        data[textures + TEXTURE_STRIDE..textures + TEXTURE_STRIDE + 2]
            .copy_from_slice(&(-1i16).to_le_bytes());

        let model = ModelFile::read(&data).unwrap();
        assert!(model.objects.is_empty());
        assert_eq!(model.texture_ids, vec![3, -1]);
        let transforms = model.transforms();
        assert_eq!(transforms.len(), 3);
        assert_eq!(transforms[0].parent, None);
        assert_eq!(transforms[1].parent, Some(0));
        // Out-of-range parents are kept; resolution stops at them.
        assert_eq!(transforms[2].parent, Some(7));
        assert_eq!(transforms[2].translation, [0, 0, -2]);
        assert_eq!(transforms[1].rotation[0][0], 4096);
    }

    /// One object at 0x100 whose first mesh, at 0x120, is all zeroes.
    fn model_with_zero_sized_records(object_count: i32, mesh_count: i32) -> Vec<u8> {
        let mut data = vec![0u8; 0x200];
        put_i32(&mut data, OBJECT_COUNT, object_count);
        put_i32(&mut data, FIRST_OBJECT, 0x100);
        put_i32(&mut data, 0x108, mesh_count);
        put_i32(&mut data, 0x110, 0x20);
        data
    }

    #[test]
    fn zero_sized_records_do_not_repeat() {
        let data = model_with_zero_sized_records(1, 3_000_000);
        assert_eq!(
            ModelFile::read(&data).unwrap_err(),
            DecodeError::ZeroSizedRecord { kind: "mesh", offset: 0x120 }
        );
        let data = model_with_zero_sized_records(2_000_000, 0);
        assert_eq!(
            ModelFile::read(&data).unwrap_err(),
            DecodeError::ZeroSizedRecord { kind: "object", offset: 0x100 }
        );
        // A single trailing record may leave its size unset.
        let model = ModelFile::read(&model_with_zero_sized_records(1, 1)).unwrap();
        assert_eq!(model.objects[0].meshes.len(), 1);
    }

    #[test]
    fn truncated_metadata_is_out_of_bounds() {
        let mut data = vec![0u8; META_TABLE + 4];
        put_i32(&mut data, META_COUNT, 1);
        assert!(matches!(
            ModelFile::read(&data),
            Err(DecodeError::OutOfBounds { .. })
        ));
    }
}
