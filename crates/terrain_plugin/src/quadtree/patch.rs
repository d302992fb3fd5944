//! TerrainPatch - one renderable leaf of a terrain tree.

use glam::Vec3;

use crate::constants::{max_lod_for, vertex_index};
use crate::error::TerrainError;
use crate::geomipmap::{tangent_frame, MeshBuildConfig, PatchMeshBuilder};
use crate::height_grid::HeightGrid;
use crate::lod::UpdatedPatch;
use crate::types::{HeightMode, MeshBuffers, SampleRegion, SeamSteps};

use super::neighbours::{PatchKey, PatchNeighbours, TileId};
use super::path::{Direction, QuadPath, Quadrant};

/// Leaf of a terrain tree: a height block, its mesh and its current level.
///
/// Vertex attributes stay at full resolution; level changes only swap the
/// index strip.
#[derive(Clone, Debug)]
pub struct TerrainPatch {
  key: PatchKey,
  quadrant: Quadrant,
  heights: HeightGrid,
  mesh_config: MeshBuildConfig,
  origin: Vec3,
  mesh: MeshBuffers,
  lod: u32,
  previous_lod: u32,
  neighbour_lods: [u32; 4],
  max_lod: u32,
  neighbours: Option<PatchNeighbours>,
}

impl TerrainPatch {
  /// Build a patch at full detail.
  ///
  /// `origin` is the tree-local position of sample `(0, 0)`.
  pub fn new(
    key: PatchKey,
    quadrant: Quadrant,
    heights: HeightGrid,
    origin: Vec3,
    mesh_config: MeshBuildConfig,
  ) -> Result<Self, TerrainError> {
    let mesh = PatchMeshBuilder::new(&heights, &mesh_config).build(1, SeamSteps::uniform(1))?;
    let max_lod = max_lod_for(heights.size());
    Ok(Self {
      key,
      quadrant,
      heights,
      mesh_config,
      origin,
      mesh,
      lod: 0,
      previous_lod: 0,
      neighbour_lods: [0; 4],
      max_lod,
      neighbours: None,
    })
  }

  #[inline]
  pub fn key(&self) -> PatchKey {
    self.key
  }

  #[inline]
  pub fn path(&self) -> QuadPath {
    self.key.path
  }

  #[inline]
  pub fn quadrant(&self) -> Quadrant {
    self.quadrant
  }

  /// Samples per side.
  #[inline]
  pub fn size(&self) -> usize {
    self.heights.size()
  }

  #[inline]
  pub fn heights(&self) -> &HeightGrid {
    &self.heights
  }

  #[inline]
  pub fn mesh(&self) -> &MeshBuffers {
    &self.mesh
  }

  #[inline]
  pub fn mesh_config(&self) -> &MeshBuildConfig {
    &self.mesh_config
  }

  /// Current detail level (0 = full detail).
  #[inline]
  pub fn lod(&self) -> u32 {
    self.lod
  }

  #[inline]
  pub fn previous_lod(&self) -> u32 {
    self.previous_lod
  }

  #[inline]
  pub fn max_lod(&self) -> u32 {
    self.max_lod
  }

  /// Levels of the neighbours when the current strip was built,
  /// `[right, top, left, bottom]`.
  #[inline]
  pub fn neighbour_lods(&self) -> [u32; 4] {
    self.neighbour_lods
  }

  pub fn neighbour_lod(&self, dir: Direction) -> u32 {
    self.neighbour_lods[dir.index()]
  }

  /// Tree-local position of sample `(0, 0)`.
  #[inline]
  pub fn origin(&self) -> Vec3 {
    self.origin
  }

  /// Global sample coordinate of sample `(0, 0)` inside the tree.
  #[inline]
  pub fn sample_origin(&self) -> [usize; 2] {
    self.mesh_config.sample_origin
  }

  /// Tree-sample rectangle this patch covers, borders included.
  pub fn sample_region(&self) -> SampleRegion {
    let [x, z] = self.sample_origin();
    let last = self.size() as i64 - 1;
    SampleRegion {
      min: [x as i64, z as i64],
      max: [x as i64 + last, z as i64 + last],
    }
  }

  /// Tree-local center of the patch bounds.
  pub fn local_center(&self) -> Vec3 {
    let half = (self.size() - 1) as f32 * 0.5;
    let (lo, hi) = self.heights.min_max();
    let scale = self.mesh_config.scale;
    self.origin + Vec3::new(half * scale.x, (lo + hi) * 0.5 * scale.y, half * scale.z)
  }

  /// Neighbour keys from the last search, `None` if not searched since the
  /// last reset.
  #[inline]
  pub fn cached_neighbours(&self) -> Option<&PatchNeighbours> {
    self.neighbours.as_ref()
  }

  pub(crate) fn set_cached_neighbours(&mut self, neighbours: PatchNeighbours) {
    self.neighbours = Some(neighbours);
  }

  pub(crate) fn set_tile(&mut self, tile: TileId) {
    self.key.tile = tile;
    self.neighbours = None;
  }

  pub(crate) fn clear_cached_neighbours(&mut self) {
    self.neighbours = None;
  }

  /// Apply a published level change and take its index strip.
  pub(crate) fn apply_update(&mut self, record: UpdatedPatch) {
    self.previous_lod = record.previous_lod;
    self.lod = record.new_lod;
    self.neighbour_lods = record.neighbour_lods;
    if let Some(indices) = record.indices {
      self.mesh.indices = indices;
    }
  }

  /// Rebuild the strip for `lod` against the given neighbour levels.
  pub fn reindex(&mut self, lod: u32, neighbour_lods: [u32; 4]) -> Result<(), TerrainError> {
    let lod = lod.min(self.max_lod);
    let neighbour_lods = neighbour_lods.map(|n| n.min(self.max_lod));
    let step = 1u32 << lod;
    let [r, t, l, b] = neighbour_lods;
    let indices = PatchMeshBuilder::new(&self.heights, &self.mesh_config).indices(step, SeamSteps::from_levels(r, t, l, b))?;
    self.previous_lod = self.lod;
    self.lod = lod;
    self.neighbour_lods = neighbour_lods;
    self.mesh.indices = indices;
    Ok(())
  }

  /// Edit one local sample and its vertex position. Returns `false` when out
  /// of range.
  pub(crate) fn edit_height(&mut self, x: usize, z: usize, value: f32, mode: HeightMode) -> bool {
    let changed = match mode {
      HeightMode::Override => self.heights.set(x, z, value),
      HeightMode::Add => self.heights.add(x, z, value),
    };
    if changed {
      let i = vertex_index(x, z, self.size());
      self.mesh.positions[i].y = self.heights.samples()[i] * self.mesh_config.scale.y;
    }
    changed
  }

  /// Recompute every vertex normal and tangent frame from this patch's
  /// samples only.
  pub fn recompute_local_normals(&mut self) {
    let builder = PatchMeshBuilder::new(&self.heights, &self.mesh_config);
    let normals = builder.normals();
    for (i, n) in normals.into_iter().enumerate() {
      self.set_vertex_normal(i, n);
    }
  }

  /// Overwrite one vertex normal and derive its tangent frame.
  pub(crate) fn set_vertex_normal(&mut self, index: usize, normal: Vec3) {
    let (tangent, binormal) = tangent_frame(normal);
    self.mesh.normals[index] = normal;
    self.mesh.tangents[index] = tangent;
    self.mesh.binormals[index] = binormal;
  }

  /// Local coordinates of every border vertex.
  pub fn border_vertices(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
    let last = self.size() - 1;
    (0..=last).flat_map(move |z| {
      (0..=last)
        .filter(move |&x| z == 0 || z == last || x == 0 || x == last)
        .map(move |x| (x, z))
    })
  }
}
