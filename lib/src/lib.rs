//! Decoders for Colony Wars: Red Sun meshes, object hierarchies and
//! palettized textures, from `GAME.RSC` files or ePSXe save states.

pub mod error;
pub mod format;
pub mod util;

pub use error::{DecodeError, DecodeResult};
pub use format::{
    binder::bind_face_texture, bitmap::decode_bitmap, hierarchy::resolve_object_hierarchy,
    mesh::decode_mesh, vmem::locate_textures, FormatContext,
};
