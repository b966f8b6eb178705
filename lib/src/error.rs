use thiserror::Error;

/// Errors raised while decoding meshes, hierarchies and bitmaps.
///
/// Each error is local to the item being decoded; batch drivers report it
/// and move on to the next item.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("read of {width} bytes at {offset:#X} is out of bounds (buffer size {len:#X})")]
    OutOfBounds { offset: i64, width: usize, len: usize },
    #[error("unknown face type {tag:#06X} at {offset:#X}")]
    UnknownFaceType { tag: u16, offset: usize },
    #[error("malformed bitmap header: {0}")]
    MalformedBitmapHeader(String),
    #[error("no texture region matches face (page {page:?}, uv {uv:?})")]
    AmbiguousTexture { page: Option<u16>, uv: Option<[u8; 2]> },
    #[error("{kind} at {offset:#X} has size 0 but is followed by more records")]
    ZeroSizedRecord { kind: &'static str, offset: usize },
    #[error("object hierarchy exceeds {limit} levels at part {part}")]
    HierarchyTooDeep { part: usize, limit: usize },
}

pub type DecodeResult<T> = Result<T, DecodeError>;
