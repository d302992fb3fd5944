//! Core data types shared by mesh generation, the quad tree and the LOD
//! pipeline.

use glam::{Vec2, Vec3};

/// How an edge facing a coarser neighbour is stitched.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum SeamMode {
  /// Any coarser neighbour is assumed to be exactly one level coarser.
  #[default]
  Binary,
  /// The edge is stitched at the exact step ratio between the two levels.
  Proportional,
}

/// Detail steps of the four neighbours of a patch, in seam order.
///
/// A step of 0 means "no neighbour" and is stitched like a same-level edge.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct SeamSteps {
  pub right: u32,
  pub top: u32,
  pub left: u32,
  pub bottom: u32,
}

impl SeamSteps {
  /// All four edges at the same step.
  pub const fn uniform(step: u32) -> Self {
    Self {
      right: step,
      top: step,
      left: step,
      bottom: step,
    }
  }

  /// Convert neighbour detail levels into steps (`1 << lod`). Levels past
  /// the widest representable step saturate at `1 << 31`.
  pub fn from_levels(right: u32, top: u32, left: u32, bottom: u32) -> Self {
    let step = |lod: u32| 1u32 << lod.min(31);
    Self {
      right: step(right),
      top: step(top),
      left: step(left),
      bottom: step(bottom),
    }
  }
}

/// Height edit mode for [`crate::quadtree::TerrainQuad::set_heights`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HeightMode {
  /// Replace the stored height.
  Override,
  /// Add the value to the stored height.
  Add,
}

/// One height edit in world space.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct HeightEdit {
  /// World-space X/Z of the sample to edit.
  pub xz: Vec2,
  /// New height, or delta for [`HeightMode::Add`].
  pub value: f32,
}

impl HeightEdit {
  pub fn new(x: f32, z: f32, value: f32) -> Self {
    Self {
      xz: Vec2::new(x, z),
      value,
    }
  }
}

/// Inclusive sample-space rectangle, used to batch normal recalculation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SampleRegion {
  pub min: [i64; 2],
  pub max: [i64; 2],
}

impl SampleRegion {
  /// Region covering `(x, z)` grown by `radius` samples on every side.
  pub fn around(x: i64, z: i64, radius: i64) -> Self {
    Self {
      min: [x - radius, z - radius],
      max: [x + radius, z + radius],
    }
  }

  /// Grow this region to cover `other`.
  #[inline]
  pub fn encapsulate(&mut self, other: &SampleRegion) {
    for i in 0..2 {
      self.min[i] = self.min[i].min(other.min[i]);
      self.max[i] = self.max[i].max(other.max[i]);
    }
  }

  /// Whether the two regions touch or overlap (edges inclusive).
  #[inline]
  pub fn intersects(&self, other: &SampleRegion) -> bool {
    self.min[0] <= other.max[0]
      && other.min[0] <= self.max[0]
      && self.min[1] <= other.max[1]
      && other.min[1] <= self.max[1]
  }

  #[inline]
  pub fn contains(&self, x: i64, z: i64) -> bool {
    x >= self.min[0] && x <= self.max[0] && z >= self.min[1] && z <= self.max[1]
  }
}

/// Vertex and index buffers of one terrain patch.
///
/// Every attribute is addressed by the row-major vertex index `z * width + x`.
/// `indices` is a single triangle strip; repeated indices are intentional
/// degenerate triangles and must be kept.
#[derive(Clone, Debug, Default)]
pub struct MeshBuffers {
  pub positions: Vec<Vec3>,
  pub normals: Vec<Vec3>,
  pub tangents: Vec<Vec3>,
  pub binormals: Vec<Vec3>,
  pub texcoords: Vec<Vec2>,
  pub indices: Vec<u32>,
}

impl MeshBuffers {
  /// Number of vertices.
  pub fn vertex_count(&self) -> usize {
    self.positions.len()
  }

  /// Number of strip triangles, degenerates included.
  pub fn strip_triangle_count(&self) -> usize {
    self.indices.len().saturating_sub(2)
  }

  /// Positions as a flat `[x, y, z, ...]` array for upload.
  pub fn positions_flat(&self) -> Vec<f32> {
    self.positions.iter().flat_map(|v| v.to_array()).collect()
  }

  /// Normals as a flat `[x, y, z, ...]` array for upload.
  pub fn normals_flat(&self) -> Vec<f32> {
    self.normals.iter().flat_map(|v| v.to_array()).collect()
  }

  /// Texcoords as a flat `[u, v, ...]` array for upload.
  pub fn texcoords_flat(&self) -> Vec<f32> {
    self.texcoords.iter().flat_map(|v| v.to_array()).collect()
  }
}

#[cfg(test)]
#[path = "types_test.rs"]
mod types_test;
