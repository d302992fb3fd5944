//! What the LOD control needs from a terrain.

use crate::lod::{PatchLodInfo, UpdatedPatch};
use crate::quadtree::{NoNeighbours, TerrainPatch, TerrainQuad, TiledTerrain};

use super::stages::LodSnapshot;

/// A terrain the [`super::TerrainLodControl`] can drive.
pub trait LodTerrain {
  /// Bumped on every structural change; updates built against an older epoch
  /// are dropped.
  fn lod_epoch(&self) -> u64;

  /// Resolve missing neighbours and copy out the per-patch LOD inputs.
  fn lod_snapshot(&mut self) -> LodSnapshot;

  /// Apply published records. Returns how many found their patch.
  fn apply_lod_update(&mut self, records: Vec<UpdatedPatch>) -> usize;
}

fn patch_lod_info(quad: &TerrainQuad, patch: &TerrainPatch) -> PatchLodInfo {
  PatchLodInfo {
    key: patch.key(),
    lod: patch.lod(),
    max_lod: patch.max_lod(),
    center: quad.translation() + patch.local_center(),
    size: patch.size(),
    world_scale: quad.step_scale().x,
    neighbours: patch.cached_neighbours().copied().unwrap_or([None; 4]),
  }
}

fn quad_lod_infos(quad: &TerrainQuad) -> impl Iterator<Item = PatchLodInfo> + '_ {
  quad.patches().into_iter().map(move |patch| patch_lod_info(quad, patch))
}

impl LodTerrain for TerrainQuad {
  fn lod_epoch(&self) -> u64 {
    self.epoch()
  }

  fn lod_snapshot(&mut self) -> LodSnapshot {
    self.cache_neighbours(&NoNeighbours);
    LodSnapshot {
      epoch: self.epoch(),
      patches: quad_lod_infos(self).collect(),
    }
  }

  fn apply_lod_update(&mut self, records: Vec<UpdatedPatch>) -> usize {
    let tile = self.tile();
    let mut applied = 0;
    for record in records {
      if record.key.tile != tile {
        continue;
      }
      if let Some(patch) = self.patch_mut(record.key.path) {
        patch.apply_update(record);
        applied += 1;
      }
    }
    applied
  }
}

impl LodTerrain for TiledTerrain {
  fn lod_epoch(&self) -> u64 {
    self.epoch()
  }

  fn lod_snapshot(&mut self) -> LodSnapshot {
    self.cache_neighbours();
    LodSnapshot {
      epoch: self.epoch(),
      patches: self.tiles().flat_map(quad_lod_infos).collect(),
    }
  }

  fn apply_lod_update(&mut self, records: Vec<UpdatedPatch>) -> usize {
    let mut applied = 0;
    for record in records {
      if let Some(patch) = self.patch_mut(record.key) {
        patch.apply_update(record);
        applied += 1;
      }
    }
    applied
  }
}
