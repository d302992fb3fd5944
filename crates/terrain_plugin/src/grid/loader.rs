//! Height data source for grid cells.

use glam::IVec2;

use crate::error::TerrainError;
use crate::height_grid::HeightGrid;

/// Supplies the heights of one grid cell.
///
/// Called on the thread that drives [`super::TerrainGrid::update`]. The grid
/// must be `quad_size` samples per side; neighbouring cells share their
/// border samples.
pub trait TileLoader: Send + Sync {
  fn load_tile(&self, cell: IVec2, quad_size: usize) -> Result<HeightGrid, TerrainError>;
}

impl<F> TileLoader for F
where
  F: Fn(IVec2, usize) -> Result<HeightGrid, TerrainError> + Send + Sync,
{
  fn load_tile(&self, cell: IVec2, quad_size: usize) -> Result<HeightGrid, TerrainError> {
    self(cell, quad_size)
  }
}

/// Samples a height function in world sample coordinates, so adjacent cells
/// agree on their shared border.
pub struct FnTileLoader<F> {
  height: F,
}

impl<F> FnTileLoader<F>
where
  F: Fn(f32, f32) -> f32 + Send + Sync,
{
  /// `height(x, z)` receives global sample coordinates.
  pub fn new(height: F) -> Self {
    Self { height }
  }
}

impl<F> TileLoader for FnTileLoader<F>
where
  F: Fn(f32, f32) -> f32 + Send + Sync,
{
  fn load_tile(&self, cell: IVec2, quad_size: usize) -> Result<HeightGrid, TerrainError> {
    let span = quad_size.saturating_sub(1) as i64;
    // Sample (0, 0) of cell c sits at (c - 1) * span.
    let x0 = (cell.x as i64 - 1) * span;
    let z0 = (cell.y as i64 - 1) * span;
    HeightGrid::from_fn(quad_size, |x, z| (self.height)((x0 + x as i64) as f32, (z0 + z as i64) as f32))
  }
}
