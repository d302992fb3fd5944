//! Height edits and normal maintenance on a [`TerrainQuad`].
//!
//! Edits land in every patch whose block contains the sample, so the copies
//! of a shared border sample never diverge. Normals are refreshed lazily:
//! edits only grow a dirty region, [`TerrainQuad::update_normals`] consumes it.

use glam::Vec3;
use smallvec::SmallVec;

use crate::constants::vertex_index;
use crate::types::{HeightEdit, HeightMode, SampleRegion};

use super::node::{QuadChild, QuadNode, TerrainQuad};
use super::path::{QuadPath, Quadrant};

impl TerrainQuad {
  /// Apply world-space height edits. Returns the number of edits that hit the
  /// tree.
  ///
  /// World positions snap to the nearest sample.
  #[cfg_attr(feature = "profiling", tracing::instrument(skip_all, name = "terrain::set_heights"))]
  pub fn set_heights(&mut self, edits: &[HeightEdit], mode: HeightMode) -> usize {
    let last = self.total_size as i64 - 1;
    let mut applied = 0;
    for edit in edits {
      let s = self.world_to_sample(edit.xz).round();
      let (c, r) = (s.x as i64, s.y as i64);
      if c < 0 || r < 0 || c > last || r > last {
        continue;
      }
      edit_node(&mut self.root, c as usize, r as usize, edit.value, mode);
      self.mark_dirty(SampleRegion::around(c, r, 1));
      applied += 1;
    }
    if applied > 0 {
      tracing::trace!(applied, dropped = edits.len() - applied, "height edits applied");
    }
    applied
  }

  /// Grow the region waiting for normal recalculation.
  pub fn mark_dirty(&mut self, region: SampleRegion) {
    match &mut self.dirty {
      Some(dirty) => dirty.encapsulate(&region),
      None => self.dirty = Some(region),
    }
  }

  /// Recompute normals of every patch touching the dirty region, then the
  /// shared border normals of those patches from tree-wide samples.
  #[cfg_attr(feature = "profiling", tracing::instrument(skip_all, name = "terrain::update_normals"))]
  pub fn update_normals(&mut self) {
    let Some(region) = self.dirty.take() else {
      return;
    };
    for patch in self.patches_mut() {
      if patch.sample_region().intersects(&region) {
        patch.recompute_local_normals();
      }
    }
    self.fix_border_normals(Some(region));
  }

  /// Overwrite border vertex normals with the tree-wide stencil, for every
  /// patch touching `region` (all patches when `None`).
  pub(super) fn fix_border_normals(&mut self, region: Option<SampleRegion>) {
    let mut fixes: Vec<(QuadPath, usize, Vec3)> = Vec::new();
    for patch in self.patches() {
      if region.is_some_and(|r| !patch.sample_region().intersects(&r)) {
        continue;
      }
      let [ox, oz] = patch.sample_origin();
      let w = patch.size();
      for (x, z) in patch.border_vertices() {
        if let Some(n) = self.sample_normal((ox + x) as i64, (oz + z) as i64) {
          fixes.push((patch.path(), vertex_index(x, z, w), n));
        }
      }
    }
    for (path, index, normal) in fixes {
      if let Some(patch) = self.patch_mut(path) {
        patch.set_vertex_normal(index, normal);
      }
    }
  }
}

/// Push one edit down every quadrant whose block holds local sample `(x, z)`.
fn edit_node(node: &mut QuadNode, x: usize, z: usize, value: f32, mode: HeightMode) {
  let child_last = (node.size() + 1) / 2 - 1;
  let quadrants: SmallVec<[Quadrant; 4]> = node.quadrants_containing(x, z).collect();
  for q in quadrants {
    let (ox, oz) = q.offset();
    let (lx, lz) = (x - ox * child_last, z - oz * child_last);
    match &mut node.children[q.slot()] {
      QuadChild::Quad(child) => edit_node(child, lx, lz, value, mode),
      QuadChild::Patch(patch) => {
        patch.edit_height(lx, lz, value, mode);
      }
    }
  }
}

#[cfg(test)]
#[path = "edit_test.rs"]
mod edit_test;
