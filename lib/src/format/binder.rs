//! Binding faces to texture regions by texture page and first-corner UV.

use std::collections::HashMap;

use crate::{
    error::{DecodeError, DecodeResult},
    format::{
        face::FaceRecord,
        vmem::{Placement, TextureRegion},
    },
};

/// Returns the first region, in scan order, whose page matches the face's
/// texture page and whose on-page rectangle contains its first UV.
///
/// Regions with an unrecognized placement flag are never bound.
pub fn bind_face_texture<'a>(
    face: &FaceRecord,
    regions: &'a [TextureRegion],
) -> Option<&'a TextureRegion> {
    let page = face.texture_page_index?;
    let [u, v] = face.first_uv()?;
    regions.iter().find(|region| is_recognized(region) && region.contains(page, u, v))
}

#[inline]
fn is_recognized(region: &TextureRegion) -> bool {
    !matches!(region.placement, Placement::Unrecognized(_))
}

/// A face bound to a region.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Binding {
    /// Index of the region in the binder's region list.
    pub region: usize,
    /// Material slot, numbered by first use.
    pub material: usize,
    /// Whether this face is the first user of the material.
    pub first_use: bool,
}

/// Binds faces to regions, numbering materials by first use.
///
/// Regions are indexed by texture page, and recently bound regions are
/// checked first. When regions overlap, the earliest in scan order still wins.
pub struct FaceTextureBinder<'a> {
    regions: &'a [TextureRegion],
    /// Region indices per texture page, in scan order.
    pages: HashMap<u16, Vec<usize>>,
    /// Region indices in order of first use; position is the material slot.
    used: Vec<usize>,
    /// Bind regions whose placement flag is unrecognized.
    lenient: bool,
}

impl<'a> FaceTextureBinder<'a> {
    pub fn new(regions: &'a [TextureRegion]) -> Self {
        let mut pages: HashMap<u16, Vec<usize>> = HashMap::new();
        for (i, region) in regions.iter().enumerate() {
            pages.entry(region.page_index).or_default().push(i);
        }
        Self { regions, pages, used: Vec::new(), lenient: false }
    }

    /// Also binds regions with unrecognized placement flags, taking their
    /// header fields as stored.
    pub fn lenient(mut self, lenient: bool) -> Self {
        self.lenient = lenient;
        self
    }

    pub fn regions(&self) -> &'a [TextureRegion] { self.regions }

    /// Indices of the regions on `page`, in scan order.
    pub fn regions_on_page(&self, page: u16) -> &[usize] {
        self.pages.get(&page).map(Vec::as_slice).unwrap_or_default()
    }

    /// Regions in material slot order.
    pub fn materials(&self) -> impl Iterator<Item = &'a TextureRegion> + '_ {
        let regions = self.regions;
        self.used.iter().map(move |&i| &regions[i])
    }

    fn usable(&self, region: &TextureRegion) -> bool { self.lenient || is_recognized(region) }

    fn find(&self, page: u16, u: u8, v: u8) -> Option<usize> {
        let candidates = self.regions_on_page(page);
        let matches = |i: usize| {
            let region = &self.regions[i];
            self.usable(region) && region.contains(page, u, v)
        };
        // A recent hit only needs the page's earlier regions rechecked.
        let recent = self.used.iter().rev().copied().find(|&i| matches(i));
        let limit = recent.map_or(candidates.len(), |r| candidates.partition_point(|&i| i < r));
        candidates[..limit].iter().copied().find(|&i| matches(i)).or(recent)
    }

    /// Binds `face`, or fails with [`DecodeError::AmbiguousTexture`] when no
    /// usable region contains it.
    pub fn bind(&mut self, face: &FaceRecord) -> DecodeResult<Binding> {
        let ambiguous =
            || DecodeError::AmbiguousTexture { page: face.texture_page_index, uv: face.first_uv() };
        let page = face.texture_page_index.ok_or_else(ambiguous)?;
        let [u, v] = face.first_uv().ok_or_else(ambiguous)?;
        let region = self.find(page, u, v).ok_or_else(ambiguous)?;
        Ok(match self.used.iter().position(|&i| i == region) {
            Some(material) => Binding { region, material, first_use: false },
            None => {
                self.used.push(region);
                Binding { region, material: self.used.len() - 1, first_use: true }
            }
        })
    }
}
