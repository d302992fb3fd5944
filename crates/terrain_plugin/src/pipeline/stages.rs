//! One LOD cycle over an owned snapshot.
//!
//! Every stage finishes for all patches before the next one starts; only
//! Reindexing fans out across the rayon pool.

use std::collections::HashMap;

use glam::Vec3;
use rayon::prelude::*;
use web_time::Instant;

use crate::error::TerrainError;
use crate::geomipmap::write_index_strip;
use crate::lod::{LodCalculator, PatchLodInfo, UpdatedPatch};
use crate::quadtree::{Direction, PatchKey};
use crate::types::SeamSteps;

/// Everything the worker needs to know about a terrain, copied out on the
/// main thread.
#[derive(Clone, Debug, Default)]
pub struct LodSnapshot {
  /// Terrain epoch when the snapshot was taken.
  pub epoch: u64,
  pub patches: Vec<PatchLodInfo>,
}

/// Counters and timings of one cycle.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LodCycleStats {
  pub patches: usize,
  pub level_changes: usize,
  pub edge_fixes: usize,
  pub reindexed: usize,
  pub select_us: u64,
  pub propagate_us: u64,
  pub fix_edges_us: u64,
  pub reindex_us: u64,
}

impl LodCycleStats {
  #[inline]
  pub fn total_us(&self) -> u64 {
    self.select_us + self.propagate_us + self.fix_edges_us + self.reindex_us
  }
}

/// Result of a cycle, waiting in the mailbox to be applied.
#[derive(Clone, Debug)]
pub struct LodUpdate {
  pub epoch: u64,
  /// Only records that carry a new strip.
  pub records: Vec<UpdatedPatch>,
  pub stats: LodCycleStats,
}

/// Run Selecting → Propagating → FixingEdges → Reindexing on `snapshot`.
///
/// Returns `Ok(None)` when no patch changes level. With `lod_off` every patch
/// is pulled back to level 0 regardless of the calculator.
pub fn run_cycle(
  snapshot: &LodSnapshot,
  locations: &[Vec3],
  calculator: &dyn LodCalculator,
  lod_off: bool,
) -> Result<Option<LodUpdate>, TerrainError> {
  let mut stats = LodCycleStats {
    patches: snapshot.patches.len(),
    ..Default::default()
  };

  // Selecting
  let start = Instant::now();
  let mut records = {
    #[cfg(feature = "profiling")]
    let _span = tracing::info_span!("lod::select", patches = snapshot.patches.len()).entered();
    select(snapshot, locations, calculator, lod_off)
  };
  stats.level_changes = records.iter().filter(|r| r.lod_changed()).count();
  stats.select_us = start.elapsed().as_micros() as u64;
  if stats.level_changes == 0 {
    return Ok(None);
  }

  let index: HashMap<PatchKey, usize> = snapshot
    .patches
    .iter()
    .enumerate()
    .map(|(i, info)| (info.key, i))
    .collect();

  // Propagating
  let start = Instant::now();
  {
    #[cfg(feature = "profiling")]
    let _span = tracing::info_span!("lod::propagate").entered();
    propagate(snapshot, &index, &mut records);
  }
  stats.propagate_us = start.elapsed().as_micros() as u64;

  // FixingEdges
  let start = Instant::now();
  {
    #[cfg(feature = "profiling")]
    let _span = tracing::info_span!("lod::fix_edges").entered();
    stats.edge_fixes = fix_edges(snapshot, &index, &mut records);
  }
  stats.fix_edges_us = start.elapsed().as_micros() as u64;

  // Reindexing
  let start = Instant::now();
  {
    #[cfg(feature = "profiling")]
    let _span = tracing::info_span!("lod::reindex").entered();
    reindex(snapshot, calculator, &mut records)?;
  }
  records.retain(UpdatedPatch::is_reindex_needed);
  stats.reindexed = records.len();
  stats.reindex_us = start.elapsed().as_micros() as u64;

  Ok(Some(LodUpdate {
    epoch: snapshot.epoch,
    records,
    stats,
  }))
}

/// One record per patch, in snapshot order.
fn select(
  snapshot: &LodSnapshot,
  locations: &[Vec3],
  calculator: &dyn LodCalculator,
  lod_off: bool,
) -> Vec<UpdatedPatch> {
  snapshot
    .patches
    .iter()
    .map(|info| {
      let level = if lod_off {
        0
      } else {
        calculator
          .select_lod(info, locations)
          .unwrap_or(info.lod)
          .min(info.max_lod)
      };
      UpdatedPatch::new(info.key, level, info.lod)
    })
    .collect()
}

/// Copy every neighbour's new level into the record; missing neighbours
/// count as the patch's own level.
fn propagate(snapshot: &LodSnapshot, index: &HashMap<PatchKey, usize>, records: &mut [UpdatedPatch]) {
  let levels: Vec<u32> = records.iter().map(|r| r.new_lod).collect();
  for (record, info) in records.iter_mut().zip(&snapshot.patches) {
    for dir in Direction::ALL {
      let level = info.neighbours[dir.index()]
        .and_then(|key| index.get(&key))
        .map_or(record.new_lod, |&j| levels[j]);
      record.set_neighbour_lod(dir, level);
    }
  }
}

/// Flag the neighbours of every changed patch. Returns how many records were
/// newly flagged.
fn fix_edges(snapshot: &LodSnapshot, index: &HashMap<PatchKey, usize>, records: &mut [UpdatedPatch]) -> usize {
  let changed: Vec<usize> = (0..records.len()).filter(|&i| records[i].lod_changed()).collect();
  let mut flagged = 0;
  for i in changed {
    for key in snapshot.patches[i].neighbours.iter().flatten() {
      if let Some(&j) = index.get(key) {
        if !records[j].fix_edges {
          records[j].fix_edges = true;
          flagged += 1;
        }
      }
    }
  }
  flagged
}

fn reindex(snapshot: &LodSnapshot, calculator: &dyn LodCalculator, records: &mut [UpdatedPatch]) -> Result<(), TerrainError> {
  let mode = calculator.seam_mode();
  records
    .par_iter_mut()
    .zip(snapshot.patches.par_iter())
    .filter(|(record, _)| record.is_reindex_needed())
    .try_for_each(|(record, info)| {
      let [r, t, l, b] = record.neighbour_lods;
      let strip = write_index_strip(info.size, 1 << record.new_lod, SeamSteps::from_levels(r, t, l, b), mode)?;
      record.indices = Some(strip);
      Ok(())
    })
}
