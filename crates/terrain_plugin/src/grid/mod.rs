//! Paging terrain: a 2×2 window of trees that follows the viewer.
//!
//! Cells are `(Q-1)·s` world units wide, where `Q` is the tree size. The
//! viewer always sits inside the square spanned by the four slot centers:
//!
//! ```text
//!          cam.x      cam.x+1
//!        ┌─────────┬─────────┐
//!  cam.z │ slot 1  │ slot 3  │
//!        ├────────(●)────────┤   ● = cam · (Q-1)·s
//! cam.z+1│ slot 2  │ slot 4  │
//!        └─────────┴─────────┘
//! ```
//!
//! Stepping one cell along an axis keeps the two trees on the trailing side
//! of the move (they change slot, not content) and pages in two new ones.

mod listener;
mod loader;

use std::fmt;
use std::num::NonZeroUsize;

use glam::{IVec2, Vec2, Vec3};
use lru::LruCache;
use smallvec::{smallvec, SmallVec};

use crate::constants::{is_valid_side, vertex_index, DEFAULT_TILE_CACHE_CAPACITY};
use crate::error::TerrainError;
use crate::height_grid::stencil_normal;
use crate::lod::UpdatedPatch;
use crate::pipeline::{LodSnapshot, LodTerrain};
use crate::quadtree::{
  Direction, NeighbourFinder, QuadPath, Quadrant, TerrainConfig, TerrainQuad, TileId, TiledTerrain,
};
use crate::types::{HeightEdit, HeightMode};

pub use listener::TerrainGridListener;
pub use loader::{FnTileLoader, TileLoader};

/// Paging tunables.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct GridConfig {
  /// Detached trees kept around for reuse.
  pub tile_cache_capacity: usize,
}

impl Default for GridConfig {
  fn default() -> Self {
    Self {
      tile_cache_capacity: DEFAULT_TILE_CACHE_CAPACITY,
    }
  }
}

/// What one [`TerrainGrid::update`] changed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct GridMove {
  pub from: Option<IVec2>,
  pub to: IVec2,
  /// Trees that stayed attached but changed slot.
  pub relocated: usize,
  pub attached: usize,
  /// Attached trees that came out of the tile cache.
  pub reused: usize,
  pub detached: usize,
  /// The window was rebuilt from scratch.
  pub teleport: bool,
}

impl GridMove {
  fn merge(self, next: GridMove) -> GridMove {
    GridMove {
      from: self.from,
      to: next.to,
      relocated: self.relocated + next.relocated,
      attached: self.attached + next.attached,
      reused: self.reused + next.reused,
      detached: self.detached + next.detached,
      teleport: self.teleport || next.teleport,
    }
  }
}

/// Links the four slots: tile id `n` is the tree in quadrant `n`.
#[derive(Clone, Copy, Debug, Default)]
pub struct SlotFinder;

impl SlotFinder {
  fn towards(tile: TileId, dir: Direction) -> Option<TileId> {
    let q = Quadrant::from_number(u8::try_from(tile.0).ok()?)?;
    (!q.is_on_edge(dir)).then(|| slot_tile(q.mirrored(dir)))
  }
}

impl NeighbourFinder for SlotFinder {
  fn right_quad(&self, tile: TileId) -> Option<TileId> {
    Self::towards(tile, Direction::Right)
  }
  fn left_quad(&self, tile: TileId) -> Option<TileId> {
    Self::towards(tile, Direction::Left)
  }
  fn top_quad(&self, tile: TileId) -> Option<TileId> {
    Self::towards(tile, Direction::Top)
  }
  fn down_quad(&self, tile: TileId) -> Option<TileId> {
    Self::towards(tile, Direction::Bottom)
  }
}

#[inline]
fn slot_tile(q: Quadrant) -> TileId {
  TileId(u32::from(q.number()))
}

/// Cell shown in slot `q` while the viewer is in `cam`.
#[inline]
pub fn slot_cell(cam: IVec2, q: Quadrant) -> IVec2 {
  let (ox, oz) = q.offset();
  cam + IVec2::new(ox as i32, oz as i32)
}

/// A tree ready to attach during a move.
struct PooledTile {
  cell: IVec2,
  tile: TerrainQuad,
  /// Came out of the cache or the current window rather than the loader.
  reused: bool,
}

/// Four trees around the viewer, paged from a [`TileLoader`].
pub struct TerrainGrid {
  config: TerrainConfig,
  size: usize,
  quad_size: usize,
  loader: Box<dyn TileLoader>,
  tiles: TiledTerrain,
  /// Cell shown in each slot.
  cells: [Option<IVec2>; 4],
  current_cell: Option<IVec2>,
  cache: LruCache<IVec2, TerrainQuad>,
  listeners: Vec<Box<dyn TerrainGridListener>>,
}

impl TerrainGrid {
  /// A grid whose window spans `max_visible_size` samples per side.
  ///
  /// Nothing is loaded until the first [`Self::update`].
  pub fn new(
    config: TerrainConfig,
    max_visible_size: usize,
    loader: impl TileLoader + 'static,
  ) -> Result<Self, TerrainError> {
    if !is_valid_side(max_visible_size) {
      return Err(TerrainError::InvalidSize {
        size: max_visible_size,
      });
    }
    let quad_size = (max_visible_size + 1) >> 1;
    config.validate(quad_size)?;
    Ok(Self {
      config,
      size: max_visible_size,
      quad_size,
      loader: Box::new(loader),
      tiles: TiledTerrain::new(SlotFinder),
      cells: [None; 4],
      current_cell: None,
      cache: LruCache::new(cache_capacity(DEFAULT_TILE_CACHE_CAPACITY)),
      listeners: Vec::new(),
    })
  }

  pub fn with_grid_config(mut self, grid: GridConfig) -> Self {
    self.cache.resize(cache_capacity(grid.tile_cache_capacity));
    self
  }

  pub fn add_listener(&mut self, listener: impl TerrainGridListener + 'static) {
    self.listeners.push(Box::new(listener));
  }

  #[inline]
  pub fn config(&self) -> &TerrainConfig {
    &self.config
  }

  /// Samples per side of the whole window.
  #[inline]
  pub fn size(&self) -> usize {
    self.size
  }

  /// Samples per side of one cell's tree.
  #[inline]
  pub fn quad_size(&self) -> usize {
    self.quad_size
  }

  /// Cell the viewer was in at the last update.
  #[inline]
  pub fn current_cell(&self) -> Option<IVec2> {
    self.current_cell
  }

  pub fn epoch(&self) -> u64 {
    self.tiles.epoch()
  }

  /// The attached trees, keyed by slot.
  pub fn terrain(&self) -> &TiledTerrain {
    &self.tiles
  }

  pub fn tile_in_slot(&self, q: Quadrant) -> Option<&TerrainQuad> {
    self.tiles.tile(slot_tile(q))
  }

  pub fn cell_in_slot(&self, q: Quadrant) -> Option<IVec2> {
    self.cells[q.slot()]
  }

  pub fn tile_at_cell(&self, cell: IVec2) -> Option<&TerrainQuad> {
    let q = Quadrant::ALL.into_iter().find(|q| self.cells[q.slot()] == Some(cell))?;
    self.tile_in_slot(q)
  }

  pub fn cached_tiles(&self) -> usize {
    self.cache.len()
  }

  pub fn is_cached(&self, cell: IVec2) -> bool {
    self.cache.contains(&cell)
  }

  /// World units covered by one cell along x and z.
  fn cell_extent(&self) -> Vec2 {
    let span = (self.quad_size - 1) as f32;
    Vec2::new(span * self.config.step_scale.x, span * self.config.step_scale.z)
  }

  /// Cell whose window would contain `location`.
  pub fn cam_cell(&self, location: Vec3) -> IVec2 {
    let cell = Vec2::new(location.x, location.z) / self.cell_extent() + 0.5;
    cell.floor().as_ivec2()
  }

  /// World translation of the tree shown for `cell`.
  pub fn cell_center(&self, cell: IVec2) -> Vec3 {
    let c = (cell.as_vec2() - 0.5) * self.cell_extent();
    Vec3::new(c.x, 0.0, c.y)
  }

  /// Height under a world position, NaN outside the window.
  pub fn height_at(&self, world_xz: Vec2) -> f32 {
    self
      .tiles
      .tiles()
      .map(|t| t.height_at(world_xz))
      .find(|h| !h.is_nan())
      .unwrap_or(f32::NAN)
  }

  /// Edit heights in world space. Border samples shared by two cells are
  /// written to both.
  pub fn set_heights(&mut self, edits: &[HeightEdit], mode: HeightMode) -> usize {
    self.tiles.tiles_mut().map(|t| t.set_heights(edits, mode)).sum()
  }

  /// Refresh normals after edits, including across the seams between slots.
  pub fn update_normals(&mut self) {
    for tile in self.tiles.tiles_mut() {
      tile.update_normals();
    }
    self.fix_seam_normals();
  }

  /// Follow the first viewer. Returns `None` when the viewer stayed in its
  /// cell.
  ///
  /// Every tree the move needs is loaded before anything changes, so an
  /// error leaves the grid as it was, diagonal moves included.
  #[cfg_attr(feature = "profiling", tracing::instrument(skip_all, name = "grid::update"))]
  pub fn update(&mut self, viewer: Vec3) -> Result<Option<GridMove>, TerrainError> {
    let cam = self.cam_cell(viewer);
    let (steps, teleport): (SmallVec<[IVec2; 2]>, bool) = match self.current_cell {
      Some(current) if current == cam => return Ok(None),
      Some(current) => {
        let delta = cam - current;
        if delta.x.abs() > 1 || delta.y.abs() > 1 {
          (smallvec![cam], true)
        } else if delta.x != 0 && delta.y != 0 {
          // Diagonal: x step, then z step.
          (smallvec![IVec2::new(cam.x, current.y), cam], false)
        } else {
          (smallvec![cam], false)
        }
      }
      None => (smallvec![cam], true),
    };

    let mut pool = self.prepare(&steps)?;
    let mut report: Option<GridMove> = None;
    for (i, &step) in steps.iter().enumerate() {
      let moved = self.shift_to(step, teleport, &mut pool, &steps[i + 1..]);
      report = Some(match report {
        Some(previous) => previous.merge(moved),
        None => moved,
      });
    }
    for PooledTile { cell, tile, .. } in pool {
      self.cache.push(cell, tile);
    }
    self.fix_seam_normals();

    let report = report.unwrap_or_default();
    tracing::debug!(
      from = ?report.from,
      to = ?report.to,
      relocated = report.relocated,
      attached = report.attached,
      reused = report.reused,
      detached = report.detached,
      teleport = report.teleport,
      "grid moved"
    );
    Ok(Some(report))
  }

  /// Drop every attached tree and the cache. The next update reloads.
  pub fn clear(&mut self) {
    for q in Quadrant::ALL {
      self.tiles.remove(slot_tile(q));
    }
    self.cells = [None; 4];
    self.current_cell = None;
    self.cache.clear();
  }

  /// Gather every tree the windows around `steps` need and that is not
  /// attached yet: loaded ones first (the only fallible part), then the ones
  /// claimed from the cache before any detach can evict them.
  fn prepare(&mut self, steps: &[IVec2]) -> Result<Vec<PooledTile>, TerrainError> {
    let mut needed: SmallVec<[IVec2; 8]> = SmallVec::new();
    for &cam in steps {
      for q in Quadrant::ALL {
        let cell = slot_cell(cam, q);
        if !needed.contains(&cell) && !self.cells.contains(&Some(cell)) {
          needed.push(cell);
        }
      }
    }

    let mut pool = Vec::with_capacity(needed.len());
    for &cell in &needed {
      if !self.cache.contains(&cell) {
        pool.push(PooledTile {
          cell,
          tile: self.load(cell)?,
          reused: false,
        });
      }
    }
    for &cell in &needed {
      if let Some(tile) = self.cache.pop(&cell) {
        pool.push(PooledTile {
          cell,
          tile,
          reused: true,
        });
      }
    }
    Ok(pool)
  }

  /// Make the window show the cells around `cam`, drawing new trees from
  /// `pool`. Trees leaving the window go back to `pool` when a `later` step
  /// needs them, to the cache otherwise.
  fn shift_to(&mut self, cam: IVec2, teleport: bool, pool: &mut Vec<PooledTile>, later: &[IVec2]) -> GridMove {
    let targets = Quadrant::ALL.map(|q| slot_cell(cam, q));
    let mut report = GridMove {
      from: self.current_cell,
      to: cam,
      teleport,
      ..Default::default()
    };

    let mut staying: Vec<(IVec2, TerrainQuad)> = Vec::new();
    let mut leaving: Vec<(IVec2, TerrainQuad)> = Vec::new();
    for q in Quadrant::ALL {
      let Some(cell) = self.cells[q.slot()].take() else {
        continue;
      };
      let Some(tile) = self.tiles.remove(slot_tile(q)) else {
        continue;
      };
      if targets.contains(&cell) {
        staying.push((cell, tile));
      } else {
        leaving.push((cell, tile));
      }
    }

    report.detached = leaving.len();
    for (cell, mut tile) in leaving {
      tile.set_quadrant(None);
      for listener in &mut self.listeners {
        listener.tile_detached(cell, &tile);
      }
      let needed_later = later.iter().any(|&c| Quadrant::ALL.iter().any(|&q| slot_cell(c, q) == cell));
      if needed_later {
        pool.push(PooledTile {
          cell,
          tile,
          reused: true,
        });
      } else if let Some((evicted, _)) = self.cache.push(cell, tile) {
        if evicted != cell {
          tracing::trace!(cell = ?evicted, "tile evicted from cache");
        }
      }
    }

    // Each target is either staying or pooled: `prepare` pooled every cell
    // that was not attached, and leaving cells a later step needs are pooled
    // again above.
    let mut attached: Vec<(Quadrant, IVec2)> = Vec::new();
    for q in Quadrant::ALL {
      let cell = targets[q.slot()];
      let mut tile = if let Some(i) = staying.iter().position(|(c, _)| *c == cell) {
        report.relocated += 1;
        staying.swap_remove(i).1
      } else if let Some(i) = pool.iter().position(|p| p.cell == cell) {
        let pooled = pool.swap_remove(i);
        report.reused += usize::from(pooled.reused);
        attached.push((q, cell));
        pooled.tile
      } else {
        tracing::error!(cell = ?cell, "no tree prepared for cell");
        continue;
      };
      self.place(&mut tile, q, cell);
      self.tiles.insert(tile);
      self.cells[q.slot()] = Some(cell);
    }
    report.attached = attached.len();

    for (q, cell) in attached {
      if let Some(tile) = self.tiles.tile(slot_tile(q)) {
        for listener in &mut self.listeners {
          listener.tile_attached(cell, tile);
        }
      }
    }

    self.tiles.reset_cached_neighbours();
    self.current_cell = Some(cam);

    let center = cam.as_vec2() * self.cell_extent();
    for listener in &mut self.listeners {
      listener.grid_moved(Vec3::new(center.x, 0.0, center.y));
    }
    report
  }

  /// Sample `(c, r)` in the tree coordinates of slot `q`. Samples one step
  /// past the tree's border are read from the adjacent slot.
  fn window_sample(&self, q: Quadrant, c: i64, r: i64) -> Option<f32> {
    let last = (self.quad_size - 1) as i64;
    let (dir, dc, dr) = if c < 0 {
      (Direction::Left, last, 0)
    } else if c > last {
      (Direction::Right, -last, 0)
    } else if r < 0 {
      (Direction::Top, 0, last)
    } else if r > last {
      (Direction::Bottom, 0, -last)
    } else {
      return self.tile_in_slot(q)?.global_sample(c, r);
    };
    let neighbour = SlotFinder::towards(slot_tile(q), dir)?;
    self.tiles.tile(neighbour)?.global_sample(c + dc, r + dr)
  }

  /// Recompute the normals along every tree's outer border from samples on
  /// both sides of the seam, so adjacent slots shade a shared vertex alike.
  fn fix_seam_normals(&mut self) {
    let last = self.quad_size - 1;
    let scale = self.config.step_scale;
    let mut fixes: Vec<(TileId, QuadPath, usize, Vec3)> = Vec::new();
    for q in Quadrant::ALL {
      let Some(tile) = self.tile_in_slot(q) else {
        continue;
      };
      for patch in tile.patches() {
        let [ox, oz] = patch.sample_origin();
        let w = patch.size();
        for (x, z) in patch.border_vertices() {
          let (c, r) = (ox + x, oz + z);
          if c != 0 && r != 0 && c != last && r != last {
            continue;
          }
          let (c, r) = (c as i64, r as i64);
          let Some(root) = self.window_sample(q, c, r) else {
            continue;
          };
          let around = [
            self.window_sample(q, c, r - 1),
            self.window_sample(q, c - 1, r),
            self.window_sample(q, c, r + 1),
            self.window_sample(q, c + 1, r),
          ];
          fixes.push((slot_tile(q), patch.path(), vertex_index(x, z, w), stencil_normal(root, around, scale)));
        }
      }
    }
    for (tile, path, index, normal) in fixes {
      if let Some(patch) = self.tiles.tile_mut(tile).and_then(|t| t.patch_mut(path)) {
        patch.set_vertex_normal(index, normal);
      }
    }
  }

  fn place(&self, tile: &mut TerrainQuad, q: Quadrant, cell: IVec2) {
    tile.set_tile(slot_tile(q));
    tile.set_quadrant(Some(q));
    tile.set_translation(self.cell_center(cell));
  }

  fn load(&self, cell: IVec2) -> Result<TerrainQuad, TerrainError> {
    let heights = self.loader.load_tile(cell, self.quad_size)?;
    if heights.size() != self.quad_size {
      return Err(TerrainError::TileLoad {
        x: cell.x,
        z: cell.y,
        reason: format!("expected {} samples per side, got {}", self.quad_size, heights.size()),
      });
    }
    let tile = TerrainQuad::new_in_tile(TileId::default(), self.config.clone(), &heights)?;
    tracing::trace!(cell = ?cell, "tile loaded");
    Ok(tile)
  }
}

impl fmt::Debug for TerrainGrid {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("TerrainGrid")
      .field("size", &self.size)
      .field("quad_size", &self.quad_size)
      .field("current_cell", &self.current_cell)
      .field("cells", &self.cells)
      .field("cached", &self.cache.len())
      .finish_non_exhaustive()
  }
}

fn cache_capacity(capacity: usize) -> NonZeroUsize {
  NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN)
}

impl LodTerrain for TerrainGrid {
  fn lod_epoch(&self) -> u64 {
    self.tiles.lod_epoch()
  }

  fn lod_snapshot(&mut self) -> LodSnapshot {
    self.tiles.lod_snapshot()
  }

  fn apply_lod_update(&mut self, records: Vec<UpdatedPatch>) -> usize {
    self.tiles.apply_lod_update(records)
  }
}

#[cfg(test)]
#[path = "grid_test.rs"]
mod grid_test;
