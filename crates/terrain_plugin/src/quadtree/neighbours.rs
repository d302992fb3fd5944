//! Patch identity and neighbour lookup across one or more trees.

use std::fmt;

use super::path::{Direction, PathStep, QuadPath};

/// Identifies one tree among the roots a terrain owns.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TileId(pub u32);

impl fmt::Display for TileId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "tile#{}", self.0)
  }
}

/// Stable address of a patch: its tree plus its path inside the tree.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PatchKey {
  pub tile: TileId,
  pub path: QuadPath,
}

impl PatchKey {
  pub const fn new(tile: TileId, path: QuadPath) -> Self {
    Self { tile, path }
  }
}

impl fmt::Display for PatchKey {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}/{}", self.tile, self.path)
  }
}

/// Cached neighbour keys in `[right, top, left, bottom]` order.
pub type PatchNeighbours = [Option<PatchKey>; 4];

/// Links a tree to the trees around it.
///
/// Only consulted when a neighbour walk leaves the tree it started in.
pub trait NeighbourFinder {
  fn right_quad(&self, tile: TileId) -> Option<TileId>;
  fn left_quad(&self, tile: TileId) -> Option<TileId>;
  fn top_quad(&self, tile: TileId) -> Option<TileId>;
  fn down_quad(&self, tile: TileId) -> Option<TileId>;

  fn quad_towards(&self, tile: TileId, dir: Direction) -> Option<TileId> {
    match dir {
      Direction::Right => self.right_quad(tile),
      Direction::Left => self.left_quad(tile),
      Direction::Top => self.top_quad(tile),
      Direction::Bottom => self.down_quad(tile),
    }
  }
}

/// Finder for a tree standing alone.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoNeighbours;

impl NeighbourFinder for NoNeighbours {
  fn right_quad(&self, _: TileId) -> Option<TileId> {
    None
  }
  fn left_quad(&self, _: TileId) -> Option<TileId> {
    None
  }
  fn top_quad(&self, _: TileId) -> Option<TileId> {
    None
  }
  fn down_quad(&self, _: TileId) -> Option<TileId> {
    None
  }
}

/// Candidate key of the equal-size neighbour of `key` towards `dir`.
///
/// The caller still has to check the key exists: trees with a different
/// depth have no patch at the mirrored path.
pub fn neighbour_key(key: PatchKey, dir: Direction, finder: &dyn NeighbourFinder) -> Option<PatchKey> {
  match key.path.neighbour(dir) {
    PathStep::Inside(path) => Some(PatchKey::new(key.tile, path)),
    PathStep::Across(path) => finder.quad_towards(key.tile, dir).map(|tile| PatchKey::new(tile, path)),
  }
}

/// All four neighbours of `key`, filtered through `exists`.
pub fn resolve_neighbours(
  key: PatchKey,
  finder: &dyn NeighbourFinder,
  exists: impl Fn(PatchKey) -> bool,
) -> PatchNeighbours {
  Direction::ALL.map(|dir| neighbour_key(key, dir, finder).filter(|k| exists(*k)))
}
