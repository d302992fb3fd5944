//! TerrainQuad - recursive quadtree of terrain patches.
//!
//! The root block of `T` samples is split in half along both axes until a
//! quarter fits the patch size. Children share their middle row/column:
//!
//! ```text
//!   T = 9, patch = 5                       tree-local space (step scale s)
//!
//!   0 ─ 1 ─ 2 ─ 3 ─ 4 ─ 5 ─ 6 ─ 7 ─ 8        -4s        0        +4s
//!   ├─── q1 ────────┤                           ┌─────────┬─────────┐
//!                   ├─── q3 ────────┤           │ q1      │ q3      │
//!   (q2/q4 likewise on rows 4..8)               │         │         │
//!                                               ├──── center (0,0) ─┤
//!   child side  = (T+1) >> 1                    │ q2      │ q4      │
//!   quad offset = ±(T >> 2)·s                   │         │         │
//!   patch origin = (-(T>>1) | 0)·s              └─────────┴─────────┘
//! ```
//!
//! Sample `(C, R)` of the tree sits at `((C - (T-1)/2)·sx, h·sy,
//! (R - (T-1)/2)·sz)` relative to the tree translation.

use glam::{Vec2, Vec3};

use crate::constants::{max_lod_for, vertex_index};
use crate::error::TerrainError;
use crate::geomipmap::MeshBuildConfig;
use crate::height_grid::{stencil_normal, HeightGrid};
use crate::types::SampleRegion;

use super::config::TerrainConfig;
use super::neighbours::{resolve_neighbours, NeighbourFinder, PatchKey, PatchNeighbours, TileId};
use super::patch::TerrainPatch;
use super::path::{QuadPath, Quadrant};

/// Child of a split block.
#[derive(Clone, Debug)]
pub enum QuadChild {
  Quad(Box<QuadNode>),
  Patch(Box<TerrainPatch>),
}

/// Interior node: always four children in quadrant slot order.
#[derive(Clone, Debug)]
pub struct QuadNode {
  pub(super) path: QuadPath,
  pub(super) quadrant: Option<Quadrant>,
  pub(super) size: usize,
  pub(super) sample_origin: [usize; 2],
  pub(super) center: Vec3,
  pub(super) children: [QuadChild; 4],
}

impl QuadNode {
  #[inline]
  pub fn path(&self) -> QuadPath {
    self.path
  }

  /// `None` at the root.
  #[inline]
  pub fn quadrant(&self) -> Option<Quadrant> {
    self.quadrant
  }

  /// Samples per side of this node's block.
  #[inline]
  pub fn size(&self) -> usize {
    self.size
  }

  #[inline]
  pub fn sample_origin(&self) -> [usize; 2] {
    self.sample_origin
  }

  /// Tree-local center.
  #[inline]
  pub fn center(&self) -> Vec3 {
    self.center
  }

  #[inline]
  pub fn children(&self) -> &[QuadChild; 4] {
    &self.children
  }

  pub fn child(&self, q: Quadrant) -> &QuadChild {
    &self.children[q.slot()]
  }

  /// Child quadrants whose block contains local sample `(x, z)`.
  ///
  /// Samples on the shared middle row/column belong to two or four children.
  pub(super) fn quadrants_containing(&self, x: usize, z: usize) -> impl Iterator<Item = Quadrant> {
    let last = (self.size + 1) / 2 - 1;
    Quadrant::ALL.into_iter().filter(move |q| {
      let (ox, oz) = q.offset();
      let (x0, z0) = (ox * last, oz * last);
      x >= x0 && x <= x0 + last && z >= z0 && z <= z0 + last
    })
  }

  fn collect_patches<'a>(&'a self, out: &mut Vec<&'a TerrainPatch>) {
    for child in &self.children {
      match child {
        QuadChild::Quad(node) => node.collect_patches(out),
        QuadChild::Patch(patch) => out.push(patch),
      }
    }
  }

  fn collect_patches_mut<'a>(&'a mut self, out: &mut Vec<&'a mut TerrainPatch>) {
    for child in &mut self.children {
      match child {
        QuadChild::Quad(node) => node.collect_patches_mut(out),
        QuadChild::Patch(patch) => out.push(patch),
      }
    }
  }
}

/// Shared parameters while splitting.
struct SplitContext<'a> {
  tile: TileId,
  config: &'a TerrainConfig,
  total_size: usize,
  heights: &'a HeightGrid,
}

impl SplitContext<'_> {
  fn split(
    &self,
    path: QuadPath,
    quadrant: Option<Quadrant>,
    size: usize,
    sample_origin: [usize; 2],
    center: Vec3,
  ) -> Result<QuadNode, TerrainError> {
    let scale = self.config.step_scale;
    let child_size = (size + 1) >> 1;
    let half = (size >> 1) as f32;
    let quarter = (size >> 2) as f32;

    let mut children = Vec::with_capacity(4);
    for q in Quadrant::ALL {
      let (ox, oz) = q.offset();
      let child_origin = [
        sample_origin[0] + ox * (child_size - 1),
        sample_origin[1] + oz * (child_size - 1),
      ];
      let child_path = path.child(q).ok_or(TerrainError::InvalidSize { size: self.total_size })?;

      let child = if child_size <= self.config.patch_size {
        let block = self.heights.sub_block(child_origin[0], child_origin[1], child_size);
        let origin = center + Vec3::new((ox as f32 - 1.0) * half * scale.x, 0.0, (oz as f32 - 1.0) * half * scale.z);
        let mesh_config = self.mesh_config(child_origin);
        let patch = TerrainPatch::new(PatchKey::new(self.tile, child_path), q, block, origin, mesh_config)?;
        QuadChild::Patch(Box::new(patch))
      } else {
        let (sx, sz) = q.sign();
        let child_center = center + Vec3::new(sx * quarter * scale.x, 0.0, sz * quarter * scale.z);
        let node = self.split(child_path, Some(q), child_size, child_origin, child_center)?;
        QuadChild::Quad(Box::new(node))
      };
      children.push(child);
    }

    let children: [QuadChild; 4] = children
      .try_into()
      .map_err(|_| TerrainError::InvalidSize { size })?;
    Ok(QuadNode {
      path,
      quadrant,
      size,
      sample_origin,
      center,
      children,
    })
  }

  fn mesh_config(&self, sample_origin: [usize; 2]) -> MeshBuildConfig {
    let config = self.config;
    MeshBuildConfig::DEFAULT
      .with_scale(config.step_scale)
      .with_sample_origin(sample_origin[0], sample_origin[1])
      .with_total_size(self.total_size)
      .with_tex_offset(config.tex_offset, config.offset_amount)
      .with_tex_scale(config.tex_scale)
      .with_seam_mode(config.seam_mode)
  }
}

/// Root of a terrain tree.
#[derive(Clone, Debug)]
pub struct TerrainQuad {
  pub(super) tile: TileId,
  pub(super) quadrant: Option<Quadrant>,
  pub(super) config: TerrainConfig,
  pub(super) total_size: usize,
  pub(super) translation: Vec3,
  pub(super) root: QuadNode,
  pub(super) dirty: Option<SampleRegion>,
  pub(super) epoch: u64,
}

impl TerrainQuad {
  /// Split `heights` into patches of `config.patch_size` samples.
  pub fn new(config: TerrainConfig, heights: &HeightGrid) -> Result<Self, TerrainError> {
    Self::new_in_tile(TileId::default(), config, heights)
  }

  /// Like [`Self::new`], with every patch key tagged with `tile`.
  #[cfg_attr(feature = "profiling", tracing::instrument(skip_all, name = "terrain::new"))]
  pub fn new_in_tile(tile: TileId, config: TerrainConfig, heights: &HeightGrid) -> Result<Self, TerrainError> {
    let total_size = heights.size();
    config.validate(total_size)?;
    let ctx = SplitContext {
      tile,
      config: &config,
      total_size,
      heights,
    };
    let root = ctx.split(QuadPath::ROOT, None, total_size, [0, 0], Vec3::ZERO)?;

    let mut terrain = Self {
      tile,
      quadrant: None,
      config,
      total_size,
      translation: Vec3::ZERO,
      root,
      dirty: None,
      epoch: 0,
    };
    terrain.fix_border_normals(None);
    tracing::debug!(
      %tile,
      total_size,
      patch_size = terrain.config.patch_size,
      patches = terrain.patch_count(),
      "terrain tree built"
    );
    Ok(terrain)
  }

  #[inline]
  pub fn tile(&self) -> TileId {
    self.tile
  }

  /// Retag every patch key with `tile`.
  pub(crate) fn set_tile(&mut self, tile: TileId) {
    self.tile = tile;
    for patch in self.patches_mut() {
      patch.set_tile(tile);
    }
  }

  /// Grid slot this tree occupies, `None` when standing alone.
  #[inline]
  pub fn quadrant(&self) -> Option<Quadrant> {
    self.quadrant
  }

  pub(crate) fn set_quadrant(&mut self, quadrant: Option<Quadrant>) {
    self.quadrant = quadrant;
  }

  #[inline]
  pub fn config(&self) -> &TerrainConfig {
    &self.config
  }

  #[inline]
  pub fn total_size(&self) -> usize {
    self.total_size
  }

  #[inline]
  pub fn patch_size(&self) -> usize {
    self.config.patch_size
  }

  #[inline]
  pub fn step_scale(&self) -> Vec3 {
    self.config.step_scale
  }

  /// World position of the tree center.
  #[inline]
  pub fn translation(&self) -> Vec3 {
    self.translation
  }

  pub fn set_translation(&mut self, translation: Vec3) {
    self.translation = translation;
  }

  /// Structural epoch, bumped whenever cached neighbours are dropped.
  #[inline]
  pub fn epoch(&self) -> u64 {
    self.epoch
  }

  /// Coarsest level any patch may use.
  pub fn max_lod(&self) -> u32 {
    max_lod_for(self.config.patch_size)
  }

  /// Samples still waiting for [`Self::update_normals`].
  #[inline]
  pub fn dirty_region(&self) -> Option<SampleRegion> {
    self.dirty
  }

  #[inline]
  pub fn root(&self) -> &QuadNode {
    &self.root
  }

  // ===========================================================================
  // Addressing
  // ===========================================================================

  /// Node at `path`. The root path returns the root node.
  pub fn node(&self, path: QuadPath) -> Option<&QuadNode> {
    let mut node = &self.root;
    for q in path.iter() {
      match node.child(q) {
        QuadChild::Quad(child) => node = &**child,
        QuadChild::Patch(_) => return None,
      }
    }
    Some(node)
  }

  pub fn patch(&self, path: QuadPath) -> Option<&TerrainPatch> {
    let mut node = &self.root;
    let depth = path.depth();
    for (level, q) in path.iter().enumerate() {
      match node.child(q) {
        QuadChild::Quad(child) => node = &**child,
        QuadChild::Patch(patch) => return (level + 1 == depth).then_some(&**patch),
      }
    }
    None
  }

  pub fn patch_mut(&mut self, path: QuadPath) -> Option<&mut TerrainPatch> {
    let mut node = &mut self.root;
    let depth = path.depth();
    for (level, q) in path.iter().enumerate() {
      match &mut node.children[q.slot()] {
        QuadChild::Quad(child) => node = &mut **child,
        QuadChild::Patch(patch) => return (level + 1 == depth).then_some(&mut **patch),
      }
    }
    None
  }

  /// Every patch, depth-first in quadrant order.
  pub fn patches(&self) -> Vec<&TerrainPatch> {
    let mut out = Vec::new();
    self.root.collect_patches(&mut out);
    out
  }

  pub fn patches_mut(&mut self) -> Vec<&mut TerrainPatch> {
    let mut out = Vec::new();
    self.root.collect_patches_mut(&mut out);
    out
  }

  pub fn patch_count(&self) -> usize {
    self.patches().len()
  }

  // ===========================================================================
  // Neighbours
  // ===========================================================================

  /// Neighbours of every patch whose cache is empty.
  pub fn find_missing_neighbours(
    &self,
    finder: &dyn NeighbourFinder,
    exists: &dyn Fn(PatchKey) -> bool,
  ) -> Vec<(QuadPath, PatchNeighbours)> {
    self
      .patches()
      .into_iter()
      .filter(|p| p.cached_neighbours().is_none())
      .map(|p| (p.path(), resolve_neighbours(p.key(), finder, exists)))
      .collect()
  }

  pub(crate) fn store_neighbours(&mut self, found: Vec<(QuadPath, PatchNeighbours)>) {
    for (path, neighbours) in found {
      if let Some(patch) = self.patch_mut(path) {
        patch.set_cached_neighbours(neighbours);
      }
    }
  }

  /// Resolve and cache neighbours inside this tree, consulting `finder` for
  /// walks that leave it.
  pub fn cache_neighbours(&mut self, finder: &dyn NeighbourFinder) {
    let tile = self.tile;
    let found = {
      let exists = |key: PatchKey| key.tile == tile && self.patch(key.path).is_some();
      self.find_missing_neighbours(finder, &exists)
    };
    self.store_neighbours(found);
  }

  /// Drop every cached neighbour and bump the epoch.
  pub fn reset_cached_neighbours(&mut self) {
    for patch in self.patches_mut() {
      patch.clear_cached_neighbours();
    }
    self.epoch += 1;
  }

  // ===========================================================================
  // Queries
  // ===========================================================================

  /// Fractional tree-sample coordinates of a world position.
  pub fn world_to_sample(&self, world_xz: Vec2) -> Vec2 {
    let half = (self.total_size - 1) as f32 * 0.5;
    let scale = Vec2::new(self.config.step_scale.x, self.config.step_scale.z);
    (world_xz - Vec2::new(self.translation.x, self.translation.z)) / scale + Vec2::splat(half)
  }

  /// Tree-local position of global sample `(c, r)` at height 0.
  pub fn sample_to_local(&self, c: f32, r: f32) -> Vec3 {
    let half = (self.total_size - 1) as f32 * 0.5;
    let s = self.config.step_scale;
    Vec3::new((c - half) * s.x, 0.0, (r - half) * s.z)
  }

  /// Raw sample at global `(c, r)`.
  pub fn global_sample(&self, c: i64, r: i64) -> Option<f32> {
    let last = self.total_size as i64 - 1;
    if c < 0 || r < 0 || c > last || r > last {
      return None;
    }
    let patch = self.patch_at_sample(c as f32, r as f32)?;
    let [ox, oz] = patch.sample_origin();
    patch.heights().get(c - ox as i64, r - oz as i64)
  }

  /// Patch whose block contains global sample coordinates `(fx, fz)`.
  pub fn patch_at_sample(&self, fx: f32, fz: f32) -> Option<&TerrainPatch> {
    let last = (self.total_size - 1) as f32;
    if !(0.0..=last).contains(&fx) || !(0.0..=last).contains(&fz) {
      return None;
    }
    let mut node = &self.root;
    loop {
      let child_last = ((node.size + 1) / 2 - 1) as f32;
      let lx = fx - node.sample_origin[0] as f32;
      let lz = fz - node.sample_origin[1] as f32;
      let q = match (lx >= child_last, lz >= child_last) {
        (false, false) => Quadrant::TopLeft,
        (false, true) => Quadrant::BottomLeft,
        (true, false) => Quadrant::TopRight,
        (true, true) => Quadrant::BottomRight,
      };
      match node.child(q) {
        QuadChild::Quad(child) => node = &**child,
        QuadChild::Patch(patch) => return Some(patch),
      }
    }
  }

  /// Interpolated world height at a world position, NaN outside the tree.
  pub fn height_at(&self, world_xz: Vec2) -> f32 {
    let s = self.world_to_sample(world_xz);
    let Some(patch) = self.patch_at_sample(s.x, s.y) else {
      return f32::NAN;
    };
    let [ox, oz] = patch.sample_origin();
    let h = patch.heights().interpolated_height_at(s.x - ox as f32, s.y - oz as f32);
    h * self.config.step_scale.y + self.translation.y
  }

  /// World height of the nearest sample, NaN outside the tree.
  pub fn height_map_height(&self, world_xz: Vec2) -> f32 {
    let s = self.world_to_sample(world_xz).round();
    match self.global_sample(s.x as i64, s.y as i64) {
      Some(h) => h * self.config.step_scale.y + self.translation.y,
      None => f32::NAN,
    }
  }

  /// Surface normal at a world position, blended from the mesh normals of
  /// the containing cell.
  pub fn normal_at(&self, world_xz: Vec2) -> Option<Vec3> {
    let s = self.world_to_sample(world_xz);
    let patch = self.patch_at_sample(s.x, s.y)?;
    let [ox, oz] = patch.sample_origin();
    let w = patch.size();
    let (lx, lz) = (s.x - ox as f32, s.y - oz as f32);
    let x = (lx.floor() as usize).min(w - 2);
    let z = (lz.floor() as usize).min(w - 2);
    let (u, v) = (lx - x as f32, lz - z as f32);
    let normals = &patch.mesh().normals;
    let n = normals[vertex_index(x, z, w)] * (1.0 - u) * (1.0 - v)
      + normals[vertex_index(x + 1, z, w)] * u * (1.0 - v)
      + normals[vertex_index(x, z + 1, w)] * (1.0 - u) * v
      + normals[vertex_index(x + 1, z + 1, w)] * u * v;
    Some(n.normalize_or_zero())
  }

  /// Tree-wide vertex normal at global sample `(c, r)`.
  pub fn sample_normal(&self, c: i64, r: i64) -> Option<Vec3> {
    let root = self.global_sample(c, r)?;
    Some(stencil_normal(
      root,
      [
        self.global_sample(c, r - 1),
        self.global_sample(c - 1, r),
        self.global_sample(c, r + 1),
        self.global_sample(c + 1, r),
      ],
      self.config.step_scale,
    ))
  }

  /// Reassemble the full height block from the patches.
  pub fn height_map(&self) -> HeightGrid {
    let t = self.total_size;
    let mut samples = vec![0.0; t * t];
    for patch in self.patches() {
      let [ox, oz] = patch.sample_origin();
      let w = patch.size();
      for z in 0..w {
        let src = &patch.heights().samples()[z * w..(z + 1) * w];
        let start = vertex_index(ox, oz + z, t);
        samples[start..start + w].copy_from_slice(src);
      }
    }
    HeightGrid::from_validated(t, samples)
  }
}

#[cfg(test)]
#[path = "node_test.rs"]
mod node_test;
