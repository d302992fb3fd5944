//! Per-frame driver of the background LOD worker.

use std::sync::Arc;
use std::time::Duration;

use glam::Vec3;
use web_time::Instant;

use crate::error::TerrainError;
use crate::lod::{DistanceLodCalculator, LodCalculator, LodSettings};

#[cfg(feature = "metrics")]
use crate::metrics::LodMetrics;

use super::stages::LodCycleStats;
use super::terrain::LodTerrain;
use super::worker::{LodTask, LodWorker};

/// What a call to [`TerrainLodControl::update`] did.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TickStatus {
  /// A cycle is still running; nothing was recorded.
  Busy,
  /// No viewer location was given.
  NoViewer,
  /// Nothing to do: LOD disabled or the viewer did not move.
  Skipped,
  /// A new cycle was handed to the worker.
  Scheduled,
}

/// Report of one [`TerrainLodControl::update`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LodTick {
  pub status: TickStatus,
  /// Records applied from the previous cycle.
  pub applied: usize,
  /// A finished update was dropped because the terrain changed since its
  /// snapshot.
  pub discarded: bool,
}

impl LodTick {
  fn new(status: TickStatus) -> Self {
    Self {
      status,
      applied: 0,
      discarded: false,
    }
  }
}

/// Schedules LOD cycles for one terrain and applies their results.
///
/// Call [`Self::update`] once per frame from the thread that owns the terrain.
pub struct TerrainLodControl {
  calculator: Arc<dyn LodCalculator>,
  worker: Option<LodWorker>,
  last_locations: Option<Vec<Vec3>>,
  enabled: bool,
  /// Run one level-0 cycle after LOD was switched off.
  lod_off_pending: bool,
  force_next: bool,
  last_stats: Option<LodCycleStats>,
  #[cfg(feature = "metrics")]
  metrics: LodMetrics,
}

impl TerrainLodControl {
  pub fn new(calculator: impl LodCalculator + 'static) -> Self {
    Self {
      calculator: Arc::new(calculator),
      worker: None,
      last_locations: None,
      enabled: true,
      lod_off_pending: false,
      force_next: false,
      last_stats: None,
      #[cfg(feature = "metrics")]
      metrics: LodMetrics::new(),
    }
  }

  pub fn with_settings(settings: LodSettings) -> Self {
    Self::new(DistanceLodCalculator::new(settings))
  }

  pub fn calculator(&self) -> &dyn LodCalculator {
    self.calculator.as_ref()
  }

  #[inline]
  pub fn is_enabled(&self) -> bool {
    self.enabled
  }

  /// Switching off pulls the terrain back to full detail once, then the
  /// control stays quiet until re-enabled.
  pub fn set_enabled(&mut self, enabled: bool) {
    if self.enabled == enabled {
      return;
    }
    self.enabled = enabled;
    self.lod_off_pending = !enabled;
    self.force_next = true;
  }

  /// Run the next cycle even if the viewer has not moved.
  pub fn force_update(&mut self) {
    self.force_next = true;
  }

  /// No cycle in flight. Safe to tear the terrain down.
  pub fn is_idle(&self) -> bool {
    self.worker.as_ref().map_or(true, |w| !w.is_running())
  }

  /// Block until the worker is idle or `timeout` passes.
  pub fn wait_idle(&self, timeout: Duration) -> bool {
    let start = Instant::now();
    while !self.is_idle() {
      if start.elapsed() >= timeout {
        return false;
      }
      std::thread::sleep(Duration::from_millis(1));
    }
    true
  }

  /// Stats of the last applied cycle.
  pub fn last_stats(&self) -> Option<LodCycleStats> {
    self.last_stats
  }

  #[cfg(feature = "metrics")]
  pub fn metrics(&self) -> &LodMetrics {
    &self.metrics
  }

  /// Apply any finished cycle, then schedule a new one if needed.
  pub fn update<T: LodTerrain + ?Sized>(&mut self, terrain: &mut T, locations: &[Vec3]) -> Result<LodTick, TerrainError> {
    if !self.is_idle() {
      return Ok(LodTick::new(TickStatus::Busy));
    }

    let (applied, discarded) = self.publish(terrain);
    let tick = |status| LodTick {
      status,
      applied,
      discarded,
    };

    if locations.is_empty() {
      return Ok(tick(TickStatus::NoViewer));
    }
    let lod_off = !self.enabled;
    if lod_off && !self.lod_off_pending {
      return Ok(tick(TickStatus::Skipped));
    }
    let unchanged = self.last_locations.as_deref() == Some(locations);
    if unchanged && !self.force_next && !lod_off {
      return Ok(tick(TickStatus::Skipped));
    }

    let task = LodTask {
      snapshot: terrain.lod_snapshot(),
      locations: locations.to_vec(),
      calculator: Arc::clone(&self.calculator),
      lod_off,
    };
    if !self.worker()?.submit(task) {
      return Ok(tick(TickStatus::Busy));
    }
    self.last_locations = Some(locations.to_vec());
    self.force_next = false;
    self.lod_off_pending = false;
    Ok(tick(TickStatus::Scheduled))
  }

  /// Drain the mailbox into `terrain`. Returns (records applied, stale
  /// update discarded).
  fn publish<T: LodTerrain + ?Sized>(&mut self, terrain: &mut T) -> (usize, bool) {
    let Some(update) = self.worker.as_ref().and_then(LodWorker::take_result) else {
      return (0, false);
    };
    if update.epoch != terrain.lod_epoch() {
      tracing::debug!(
        update_epoch = update.epoch,
        terrain_epoch = terrain.lod_epoch(),
        "discarding stale LOD update"
      );
      self.force_next = true;
      #[cfg(feature = "metrics")]
      self.metrics.record_stale();
      return (0, true);
    }

    #[cfg(feature = "profiling")]
    let _span = tracing::info_span!("lod::publish", records = update.records.len()).entered();
    let applied = terrain.apply_lod_update(update.records);
    #[cfg(feature = "metrics")]
    self.metrics.record_cycle(&update.stats, applied);
    self.last_stats = Some(update.stats);
    (applied, false)
  }

  fn worker(&mut self) -> Result<&LodWorker, TerrainError> {
    if self.worker.is_none() {
      self.worker = Some(LodWorker::spawn()?);
    }
    self
      .worker
      .as_ref()
      .ok_or_else(|| TerrainError::WorkerSpawn(std::io::Error::other("LOD worker missing after spawn")))
  }
}

impl Default for TerrainLodControl {
  fn default() -> Self {
    Self::new(DistanceLodCalculator::default())
  }
}
