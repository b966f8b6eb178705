//! Wavefront OBJ/MTL text output.

use std::fmt::Write;

use glam::Vec3;

/// Scale and per-axis sign flips applied to every emitted position.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct AxisPolicy {
    pub scale: f32,
    pub flip: [bool; 3],
}

impl Default for AxisPolicy {
    fn default() -> Self { Self { scale: 1.0, flip: [false; 3] } }
}

impl AxisPolicy {
    /// Container models: Y points down in the source data.
    pub fn container(inverse_axis: bool) -> Self {
        Self { scale: 1.0, flip: [false, inverse_axis, false] }
    }

    /// Memory-dump models: Y and Z are inverted.
    pub fn memory_dump(scale: f32) -> Self { Self { scale, flip: [false, true, true] } }

    pub fn apply(&self, v: Vec3) -> Vec3 {
        let sign = Vec3::from_array(self.flip.map(|f| if f { -1.0 } else { 1.0 }));
        // + 0.0 turns -0.0 into 0.0
        v * self.scale * sign + Vec3::ZERO
    }
}

/// Builds OBJ text. Indices passed to [`ObjBuilder::face`] and returned by
/// the `push_*` methods are 1-based and global to the file.
#[derive(Default)]
pub struct ObjBuilder {
    out: String,
    axis: AxisPolicy,
    vertex_count: usize,
    tex_coord_count: usize,
}

impl ObjBuilder {
    pub fn new(axis: AxisPolicy) -> Self { Self { axis, ..Default::default() } }

    fn line(&mut self, args: std::fmt::Arguments) {
        // Writing to a String cannot fail.
        let _ = self.out.write_fmt(args);
        self.out.push('\n');
    }

    pub fn mtllib(&mut self, name: &str) { self.line(format_args!("mtllib {name}")) }

    pub fn object(&mut self, name: &str) { self.line(format_args!("o {name}")) }

    pub fn usemtl(&mut self, name: &str) { self.line(format_args!("usemtl {name}")) }

    /// Emits a `v` line and returns its index.
    pub fn push_vertex(&mut self, v: Vec3) -> usize {
        let v = self.axis.apply(v);
        self.line(format_args!("v {} {} {}", v.x, v.y, v.z));
        self.vertex_count += 1;
        self.vertex_count
    }

    /// Emits a `vt` line and returns its index.
    pub fn push_tex_coord(&mut self, u: f32, v: f32) -> usize {
        self.line(format_args!("vt {u} {v}"));
        self.tex_coord_count += 1;
        self.tex_coord_count
    }

    /// Index the next pushed vertex will get.
    pub fn next_vertex(&self) -> usize { self.vertex_count + 1 }

    /// Emits `f a b c`, or `f a/t b/t c/t` when texture coordinates are given.
    pub fn face(&mut self, vertices: &[usize], tex_coords: Option<&[usize]>) {
        let mut line = String::from("f");
        match tex_coords {
            Some(tex_coords) => {
                for (v, t) in vertices.iter().zip(tex_coords) {
                    let _ = write!(line, " {v}/{t}");
                }
            }
            None => {
                for v in vertices {
                    let _ = write!(line, " {v}");
                }
            }
        }
        self.line(format_args!("{line}"));
    }

    pub fn finish(self) -> String { self.out }
}

/// A material whose diffuse map is `texture`.
pub struct Material {
    pub name: String,
    pub texture: String,
}

pub fn write_mtl(materials: &[Material]) -> String {
    let mut out = String::new();
    for material in materials {
        let _ = writeln!(out, "newmtl {}", material.name);
        let _ = writeln!(out, "map_Kd {}", material.texture);
    }
    out
}
