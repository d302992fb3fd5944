//! Persistent description of a terrain tree.
//!
//! The record carries everything needed to rebuild a tree except the height
//! samples, which travel separately (usually as the output of
//! [`TerrainQuad::height_map`]).

use glam::{Vec2, Vec3};

use crate::error::TerrainError;
use crate::height_grid::HeightGrid;
use crate::types::SeamMode;

use super::config::TerrainConfig;
use super::neighbours::TileId;
use super::node::TerrainQuad;
use super::path::Quadrant;

#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct QuadRecord {
  pub tile: TileId,
  /// Samples per side of the recorded block.
  pub size: usize,
  pub total_size: usize,
  pub patch_size: usize,
  pub step_scale: Vec3,
  pub quadrant: Option<Quadrant>,
  pub translation: Vec3,
  pub tex_offset: Vec2,
  pub offset_amount: f32,
  pub tex_scale: Vec2,
  pub seam_mode: SeamMode,
}

impl QuadRecord {
  pub fn config(&self) -> TerrainConfig {
    TerrainConfig::DEFAULT
      .with_patch_size(self.patch_size)
      .with_step_scale(self.step_scale)
      .with_tex_offset(self.tex_offset, self.offset_amount)
      .with_tex_scale(self.tex_scale)
      .with_seam_mode(self.seam_mode)
  }
}

impl TerrainQuad {
  pub fn record(&self) -> QuadRecord {
    let config = &self.config;
    QuadRecord {
      tile: self.tile,
      size: self.root.size(),
      total_size: self.total_size,
      patch_size: config.patch_size,
      step_scale: config.step_scale,
      quadrant: self.quadrant,
      translation: self.translation,
      tex_offset: config.tex_offset,
      offset_amount: config.offset_amount,
      tex_scale: config.tex_scale,
      seam_mode: config.seam_mode,
    }
  }

  /// Rebuild a tree from its record and height samples.
  pub fn from_record(record: &QuadRecord, heights: &HeightGrid) -> Result<Self, TerrainError> {
    if heights.size() != record.total_size {
      return Err(TerrainError::HeightDataMismatch {
        expected: record.total_size * record.total_size,
        actual: heights.samples().len(),
      });
    }
    let mut terrain = TerrainQuad::new_in_tile(record.tile, record.config(), heights)?;
    terrain.quadrant = record.quadrant;
    terrain.translation = record.translation;
    Ok(terrain)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_record_round_trip() {
    let heights = HeightGrid::from_fn(17, |x, z| (x * z) as f32 * 0.05).unwrap();
    let config = TerrainConfig::DEFAULT
      .with_patch_size(5)
      .with_step_scale(Vec3::new(2.0, 0.5, 2.0))
      .with_tex_offset(Vec2::new(1.0, 2.0), 0.5)
      .with_seam_mode(SeamMode::Proportional);
    let mut original = TerrainQuad::new_in_tile(TileId(2), config, &heights).unwrap();
    original.set_translation(Vec3::new(-16.0, 0.0, 16.0));
    original.set_quadrant(Some(Quadrant::BottomLeft));

    let record = original.record();
    assert_eq!(record.size, 17);
    let restored = TerrainQuad::from_record(&record, &original.height_map()).unwrap();

    assert_eq!(restored.record(), record);
    assert_eq!(restored.height_map(), heights);
    assert_eq!(restored.patch_count(), original.patch_count());
    assert_eq!(restored.patches()[3].mesh().texcoords, original.patches()[3].mesh().texcoords);
  }

  #[test]
  fn test_record_rejects_wrong_height_block() {
    let heights = HeightGrid::flat(17, 0.0).unwrap();
    let record = TerrainQuad::new(TerrainConfig::DEFAULT.with_patch_size(5), &heights).unwrap().record();
    let wrong = HeightGrid::flat(9, 0.0).unwrap();
    assert!(matches!(
      TerrainQuad::from_record(&record, &wrong),
      Err(TerrainError::HeightDataMismatch { expected: 289, actual: 81 })
    ));
  }
}
