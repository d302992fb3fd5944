//! Notifications about grid cell changes.

use glam::{IVec2, Vec3};

use crate::quadtree::TerrainQuad;

/// Observes a [`super::TerrainGrid`].
///
/// Within one move every `tile_detached` comes first, then every
/// `tile_attached`, then a single `grid_moved`. Tiles that only change slot
/// are not reported.
pub trait TerrainGridListener: Send {
  fn tile_attached(&mut self, _cell: IVec2, _tile: &TerrainQuad) {}

  fn tile_detached(&mut self, _cell: IVec2, _tile: &TerrainQuad) {}

  /// `center` is the world position of the corner shared by all four slots.
  fn grid_moved(&mut self, _center: Vec3) {}
}
