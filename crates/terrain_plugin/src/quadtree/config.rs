//! Construction parameters for a terrain tree.

use glam::{Vec2, Vec3};

use crate::constants::{is_valid_side, DEFAULT_PATCH_SIZE};
use crate::error::TerrainError;
use crate::types::SeamMode;

/// Terrain tree parameters shared by every patch.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct TerrainConfig {
  /// Samples per patch side (`2^k + 1`, at least 5).
  pub patch_size: usize,
  /// World units per sample step (x, z) and per height unit (y).
  pub step_scale: Vec3,
  /// Texture offset in samples.
  pub tex_offset: Vec2,
  pub offset_amount: f32,
  pub tex_scale: Vec2,
  pub seam_mode: SeamMode,
}

impl TerrainConfig {
  pub const DEFAULT: Self = Self {
    patch_size: DEFAULT_PATCH_SIZE,
    step_scale: Vec3::ONE,
    tex_offset: Vec2::ZERO,
    offset_amount: 0.0,
    tex_scale: Vec2::ONE,
    seam_mode: SeamMode::Binary,
  };

  pub fn with_patch_size(mut self, patch_size: usize) -> Self {
    self.patch_size = patch_size;
    self
  }

  pub fn with_step_scale(mut self, step_scale: Vec3) -> Self {
    self.step_scale = step_scale;
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

  /// Check the patch size against a tree of `total_size` samples per side.
  pub fn validate(&self, total_size: usize) -> Result<(), TerrainError> {
    if !is_valid_side(total_size) {
      return Err(TerrainError::InvalidSize { size: total_size });
    }
    if !is_valid_side(self.patch_size) || self.patch_size < 5 {
      return Err(TerrainError::InvalidSize {
        size: self.patch_size,
      });
    }
    if self.patch_size > total_size {
      return Err(TerrainError::PatchTooLarge {
        patch_size: self.patch_size,
        total_size,
      });
    }
    Ok(())
  }
}

impl Default for TerrainConfig {
  fn default() -> Self {
    Self::DEFAULT
  }
}
