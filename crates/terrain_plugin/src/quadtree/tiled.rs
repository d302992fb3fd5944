//! Several terrain trees stitched together through a [`NeighbourFinder`].

use std::collections::BTreeMap;

use super::neighbours::{NeighbourFinder, PatchKey, TileId};
use super::node::TerrainQuad;
use super::patch::TerrainPatch;

/// Resolve and cache missing neighbours for a set of trees that may border
/// each other.
fn cache_forest_neighbours(trees: &mut [&mut TerrainQuad], finder: &dyn NeighbourFinder) {
  let found: Vec<_> = {
    let view: Vec<&TerrainQuad> = trees.iter().map(|t| &**t).collect();
    let exists = |key: PatchKey| view.iter().any(|t| t.tile() == key.tile && t.patch(key.path).is_some());
    view.iter().map(|t| t.find_missing_neighbours(finder, &exists)).collect()
  };
  for (tree, found) in trees.iter_mut().zip(found) {
    tree.store_neighbours(found);
  }
}

/// Terrain made of independently built trees, linked by a finder.
pub struct TiledTerrain {
  tiles: BTreeMap<TileId, TerrainQuad>,
  finder: Box<dyn NeighbourFinder + Send + Sync>,
  epoch: u64,
}

impl TiledTerrain {
  pub fn new(finder: impl NeighbourFinder + Send + Sync + 'static) -> Self {
    Self {
      tiles: BTreeMap::new(),
      finder: Box::new(finder),
      epoch: 0,
    }
  }

  /// Add a tree under its own tile id, replacing any tree with that id.
  pub fn insert(&mut self, quad: TerrainQuad) -> Option<TerrainQuad> {
    let previous = self.tiles.insert(quad.tile(), quad);
    self.reset_cached_neighbours();
    previous
  }

  pub fn remove(&mut self, tile: TileId) -> Option<TerrainQuad> {
    let removed = self.tiles.remove(&tile);
    if removed.is_some() {
      self.reset_cached_neighbours();
    }
    removed
  }

  pub fn tile(&self, tile: TileId) -> Option<&TerrainQuad> {
    self.tiles.get(&tile)
  }

  pub fn tile_mut(&mut self, tile: TileId) -> Option<&mut TerrainQuad> {
    self.tiles.get_mut(&tile)
  }

  pub fn tiles(&self) -> impl Iterator<Item = &TerrainQuad> {
    self.tiles.values()
  }

  pub fn tiles_mut(&mut self) -> impl Iterator<Item = &mut TerrainQuad> {
    self.tiles.values_mut()
  }

  pub fn len(&self) -> usize {
    self.tiles.len()
  }

  pub fn is_empty(&self) -> bool {
    self.tiles.is_empty()
  }

  pub fn finder(&self) -> &dyn NeighbourFinder {
    self.finder.as_ref()
  }

  pub fn patch(&self, key: PatchKey) -> Option<&TerrainPatch> {
    self.tiles.get(&key.tile)?.patch(key.path)
  }

  pub fn patch_mut(&mut self, key: PatchKey) -> Option<&mut TerrainPatch> {
    self.tiles.get_mut(&key.tile)?.patch_mut(key.path)
  }

  #[inline]
  pub fn epoch(&self) -> u64 {
    self.epoch
  }

  /// Drop every cached neighbour in every tree and bump the epoch.
  pub fn reset_cached_neighbours(&mut self) {
    for quad in self.tiles.values_mut() {
      quad.reset_cached_neighbours();
    }
    self.epoch += 1;
  }

  /// Resolve neighbours across all trees.
  pub fn cache_neighbours(&mut self) {
    let mut trees: Vec<&mut TerrainQuad> = self.tiles.values_mut().collect();
    cache_forest_neighbours(&mut trees, self.finder.as_ref());
  }
}
