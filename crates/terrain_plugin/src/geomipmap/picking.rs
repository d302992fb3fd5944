//! Triangle picking in patch-local space.
//!
//! Coordinates are in samples, relative to the patch's `(0, 0)` sample; the
//! returned vertices are scaled into patch-local mesh space.

use glam::Vec3;

use crate::constants::vertex_index;
use crate::height_grid::HeightGrid;

/// One mesh triangle with its vertex indices.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Triangle {
  pub vertices: [Vec3; 3],
  pub indices: [u32; 3],
}

impl Triangle {
  /// Face normal for counter-clockwise winding seen from +Y.
  pub fn normal(&self) -> Vec3 {
    let [a, b, c] = self.vertices;
    (b - a).cross(c - a).normalize_or_zero()
  }
}

/// Both triangles of the cell containing `(x, z)`.
///
/// `None` when the point lies outside `[0, W-1)` on either axis.
pub fn grid_triangles_at(heights: &HeightGrid, scale: Vec3, x: f32, z: f32) -> Option<[Triangle; 2]> {
  let (cx, cz) = cell_of(heights, x, z)?;
  Some(cell_triangles(heights, scale, cx, cz))
}

/// The triangle under `(x, z)`, following the mesh diagonal of its cell.
pub fn triangle_at(heights: &HeightGrid, scale: Vec3, x: f32, z: f32) -> Option<Triangle> {
  let (cx, cz) = cell_of(heights, x, z)?;
  let [first, second] = cell_triangles(heights, scale, cx, cz);
  let (u, v) = (x - cx as f32, z - cz as f32);
  let in_first = if heights.is_flipped_cell(cx, cz) {
    u < v
  } else {
    u + v <= 1.0
  };
  Some(if in_first { first } else { second })
}

fn cell_of(heights: &HeightGrid, x: f32, z: f32) -> Option<(usize, usize)> {
  let last = (heights.size() - 1) as f32;
  if !(0.0..last).contains(&x) || !(0.0..last).contains(&z) {
    return None;
  }
  Some((x as usize, z as usize))
}

fn cell_triangles(heights: &HeightGrid, scale: Vec3, x: usize, z: usize) -> [Triangle; 2] {
  let w = heights.size();
  let vertex = |vx: usize, vz: usize| {
    let i = vertex_index(vx, vz, w);
    (Vec3::new(vx as f32, heights.samples()[i], vz as f32) * scale, i as u32)
  };
  let tl = vertex(x, z);
  let tr = vertex(x + 1, z);
  let bl = vertex(x, z + 1);
  let br = vertex(x + 1, z + 1);
  let tri = |a: (Vec3, u32), b: (Vec3, u32), c: (Vec3, u32)| Triangle {
    vertices: [a.0, b.0, c.0],
    indices: [a.1, b.1, c.1],
  };

  if heights.is_flipped_cell(x, z) {
    [tri(tl, bl, br), tri(tl, br, tr)]
  } else {
    [tri(tl, bl, tr), tri(tr, bl, br)]
  }
}
