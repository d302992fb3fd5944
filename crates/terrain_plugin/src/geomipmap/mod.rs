//! Geomipmap mesh generation for one square patch.
//!
//! A patch is a `W × W` block of height samples (`W = 2^k + 1`). Vertex
//! attributes are always generated at full resolution; detail levels only
//! change the index strip, which visits every `step`-th sample:
//!
//! ```text
//!   step 1            step 2            step 4
//!   ●─●─●─●─●         ●───●───●         ●───────●
//!   │╱│╱│╱│╱│         │ ╱ │ ╱ │         │     ╱ │
//!   ●─●─●─●─●         │╱  │╱  │         │   ╱   │
//!   │╱│╱│╱│╱│         ●───●───●         │ ╱     │
//!   ●─●─●─●─●   ...   │ ╱ │ ╱ │         │╱      │
//!                     ●───●───●         ●───────●
//! ```
//!
//! Edges shared with a coarser neighbour are stitched down to that
//! neighbour's resolution (see [`strip`]).

pub mod picking;
pub mod strip;

use glam::{Vec2, Vec3};

use crate::constants::vertex_index;
use crate::error::TerrainError;
use crate::height_grid::HeightGrid;
use crate::types::{MeshBuffers, SeamMode, SeamSteps};

pub use picking::{grid_triangles_at, triangle_at, Triangle};
pub use strip::{estimate_index_count, validate_step, write_index_strip, write_index_strip_into};

/// Per-patch mesh parameters.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MeshBuildConfig {
  /// World units per sample step (x, z) and per height unit (y).
  pub scale: Vec3,
  /// Global sample coordinate of the patch's `(0, 0)` sample in its tree.
  pub sample_origin: [usize; 2],
  /// Samples per side of the whole tree. 0 means "this patch only".
  pub total_size: usize,
  /// Texture offset in samples.
  pub tex_offset: Vec2,
  /// Extra texcoord offset applied to both axes.
  pub offset_amount: f32,
  /// Texcoord multiplier.
  pub tex_scale: Vec2,
  pub seam_mode: SeamMode,
}

impl MeshBuildConfig {
  pub const DEFAULT: Self = Self {
    scale: Vec3::ONE,
    sample_origin: [0, 0],
    total_size: 0,
    tex_offset: Vec2::ZERO,
    offset_amount: 0.0,
    tex_scale: Vec2::ONE,
    seam_mode: SeamMode::Binary,
  };

  pub fn with_scale(mut self, scale: Vec3) -> Self {
    self.scale = scale;
    self
  }

  pub fn with_sample_origin(mut self, x: usize, z: usize) -> Self {
    self.sample_origin = [x, z];
    self
  }

  pub fn with_total_size(mut self, total_size: usize) -> Self {
    self.total_size = total_size;
    self
  }

  pub fn with_tex_offset(mut self, offset: Vec2, amount: f32) -> Self {
    self.tex_offset = offset;
    self.offset_amount = amount;
    self
  }

  pub fn with_tex_scale(mut self, tex_scale: Vec2) -> Self {
    self.tex_scale = tex_scale;
    self
  }

  pub fn with_seam_mode(mut self, seam_mode: SeamMode) -> Self {
    self.seam_mode = seam_mode;
    self
  }
}

impl Default for MeshBuildConfig {
  fn default() -> Self {
    Self::DEFAULT
  }
}

/// Builds vertex and index buffers for one height block.
pub struct PatchMeshBuilder<'a> {
  heights: &'a HeightGrid,
  config: &'a MeshBuildConfig,
}

impl<'a> PatchMeshBuilder<'a> {
  pub fn new(heights: &'a HeightGrid, config: &'a MeshBuildConfig) -> Self {
    Self { heights, config }
  }

  /// Samples per side.
  #[inline]
  pub fn width(&self) -> usize {
    self.heights.size()
  }

  /// Full mesh at detail `step` with the given neighbour steps.
  #[cfg_attr(feature = "profiling", tracing::instrument(skip_all, name = "geomipmap::build"))]
  pub fn build(&self, step: u32, seams: SeamSteps) -> Result<MeshBuffers, TerrainError> {
    let indices = self.indices(step, seams)?;
    let normals = self.normals();
    let (tangents, binormals) = tangent_frames(&normals);
    Ok(MeshBuffers {
      positions: self.positions(),
      normals,
      tangents,
      binormals,
      texcoords: self.texcoords(),
      indices,
    })
  }

  /// Strip at detail `step`, stitched with [`MeshBuildConfig::seam_mode`].
  pub fn indices(&self, step: u32, seams: SeamSteps) -> Result<Vec<u32>, TerrainError> {
    write_index_strip(self.width(), step, seams, self.config.seam_mode)
  }

  pub fn positions(&self) -> Vec<Vec3> {
    let w = self.width();
    let mut out = vec![Vec3::ZERO; w * w];
    self.fill_positions(&mut out);
    out
  }

  /// Fill `store` with positions. Fails when it holds fewer than `W*W`.
  pub fn write_positions_into(&self, store: &mut [Vec3]) -> Result<(), TerrainError> {
    let needed = self.width() * self.width();
    if store.len() < needed {
      return Err(TerrainError::BufferTooSmall {
        needed,
        actual: store.len(),
      });
    }
    self.fill_positions(&mut store[..needed]);
    Ok(())
  }

  /// Fill `store` with the strip for `step`. Returns the entries written.
  pub fn write_indices_into(&self, step: u32, seams: SeamSteps, store: &mut [u32]) -> Result<usize, TerrainError> {
    write_index_strip_into(self.width(), step, seams, self.config.seam_mode, store)
  }

  fn fill_positions(&self, out: &mut [Vec3]) {
    let w = self.width();
    let scale = self.config.scale;
    for z in 0..w {
      for x in 0..w {
        let i = vertex_index(x, z, w);
        out[i] = Vec3::new(x as f32, self.heights.samples()[i], z as f32) * scale;
      }
    }
  }

  /// Patch-local vertex normals.
  pub fn normals(&self) -> Vec<Vec3> {
    let w = self.width();
    let scale = self.config.scale;
    let mut out = Vec::with_capacity(w * w);
    for z in 0..w {
      for x in 0..w {
        out.push(self.heights.vertex_normal(x, z, scale));
      }
    }
    out
  }

  pub fn texcoords(&self) -> Vec<Vec2> {
    let w = self.width();
    let cfg = self.config;
    let total = if cfg.total_size == 0 { w } else { cfg.total_size };
    let span = (total - 1).max(1) as f32;
    let last_row = (total - 1) as f32;
    let [ox, oz] = cfg.sample_origin;

    let mut out = Vec::with_capacity(w * w);
    for z in 0..w {
      for x in 0..w {
        let col = (ox + x) as f32;
        let row = (oz + z) as f32;
        let u = (col + cfg.tex_offset.x + cfg.offset_amount) / span;
        let v = (last_row - row - cfg.tex_offset.y + cfg.offset_amount) / span;
        out.push(Vec2::new(u, v) * cfg.tex_scale);
      }
    }
    out
  }
}

/// Tangent and binormal for a vertex normal.
#[inline]
pub fn tangent_frame(normal: Vec3) -> (Vec3, Vec3) {
  (
    normal.cross(Vec3::Z).normalize_or_zero(),
    Vec3::X.cross(normal).normalize_or_zero(),
  )
}

/// Tangents and binormals for a slice of normals.
pub fn tangent_frames(normals: &[Vec3]) -> (Vec<Vec3>, Vec<Vec3>) {
  normals.iter().map(|&n| tangent_frame(n)).unzip()
}

#[cfg(test)]
#[path = "mod_test.rs"]
mod mod_test;
