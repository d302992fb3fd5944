//! Per-patch result of one LOD cycle.

use crate::error::TerrainError;
use crate::quadtree::{Direction, PatchKey};

/// Level change (or edge refresh) for one patch, produced by the worker and
/// applied once on the main thread.
#[derive(Clone, Debug, PartialEq)]
pub struct UpdatedPatch {
  pub key: PatchKey,
  pub new_lod: u32,
  pub previous_lod: u32,
  /// `[right, top, left, bottom]` levels the strip is stitched against.
  pub neighbour_lods: [u32; 4],
  pub reindex_needed: bool,
  /// A neighbour changed level; the strip must be rebuilt for the new seams.
  pub fix_edges: bool,
  pub indices: Option<Vec<u32>>,
}

impl UpdatedPatch {
  /// Record moving `key` from `previous_lod` to `new_lod`. Reindexing is
  /// needed exactly when the level differs.
  pub fn new(key: PatchKey, new_lod: u32, previous_lod: u32) -> Self {
    Self {
      key,
      new_lod,
      previous_lod,
      neighbour_lods: [new_lod; 4],
      reindex_needed: new_lod != previous_lod,
      fix_edges: false,
      indices: None,
    }
  }

  /// Record explicitly flagged for reindexing. Level 0 is rejected.
  pub fn with_reindex(key: PatchKey, new_lod: u32, previous_lod: u32) -> Result<Self, TerrainError> {
    if new_lod == 0 {
      return Err(TerrainError::ReindexAtFullDetail);
    }
    Ok(Self {
      reindex_needed: true,
      ..Self::new(key, new_lod, previous_lod)
    })
  }

  #[inline]
  pub fn lod_changed(&self) -> bool {
    self.reindex_needed && self.previous_lod != self.new_lod
  }

  #[inline]
  pub fn is_reindex_needed(&self) -> bool {
    self.lod_changed() || self.fix_edges
  }

  #[inline]
  pub fn neighbour_lod(&self, dir: Direction) -> u32 {
    self.neighbour_lods[dir.index()]
  }

  #[inline]
  pub fn set_neighbour_lod(&mut self, dir: Direction, lod: u32) {
    self.neighbour_lods[dir.index()] = lod;
  }
}
