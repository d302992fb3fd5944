//! LOD pipeline metrics.
//!
//! Collected by [`crate::pipeline::TerrainLodControl`] when the `metrics`
//! feature is enabled. Collection can also be switched off at runtime through
//! [`COLLECT_METRICS`].

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::pipeline::LodCycleStats;

/// Runtime toggle for metrics collection.
pub static COLLECT_METRICS: AtomicBool = AtomicBool::new(true);

/// Check if metrics collection is enabled.
#[inline]
pub fn is_enabled() -> bool {
  COLLECT_METRICS.load(Ordering::Relaxed)
}

/// Enable or disable metrics collection at runtime.
pub fn set_enabled(enabled: bool) {
  COLLECT_METRICS.store(enabled, Ordering::Relaxed);
}

/// Fixed-capacity window of recent samples, oldest evicted first.
#[derive(Debug, Clone)]
pub struct RollingWindow<T> {
  buffer: VecDeque<T>,
  capacity: usize,
}

impl<T> RollingWindow<T> {
  pub fn new(capacity: usize) -> Self {
    Self {
      buffer: VecDeque::with_capacity(capacity),
      capacity,
    }
  }

  pub fn push(&mut self, value: T) {
    if self.capacity == 0 {
      return;
    }
    if self.buffer.len() == self.capacity {
      self.buffer.pop_front();
    }
    self.buffer.push_back(value);
  }

  pub fn clear(&mut self) {
    self.buffer.clear();
  }

  pub fn len(&self) -> usize {
    self.buffer.len()
  }

  pub fn is_empty(&self) -> bool {
    self.buffer.is_empty()
  }

  pub fn capacity(&self) -> usize {
    self.capacity
  }

  pub fn last(&self) -> Option<&T> {
    self.buffer.back()
  }

  pub fn iter(&self) -> impl Iterator<Item = &T> {
    self.buffer.iter()
  }
}

impl RollingWindow<u64> {
  pub fn sum(&self) -> u64 {
    self.buffer.iter().sum()
  }

  pub fn average(&self) -> f64 {
    if self.buffer.is_empty() {
      0.0
    } else {
      self.sum() as f64 / self.buffer.len() as f64
    }
  }

  pub fn max(&self) -> Option<u64> {
    self.buffer.iter().copied().max()
  }
}

impl Default for RollingWindow<u64> {
  fn default() -> Self {
    Self::new(128)
  }
}

/// Rolling statistics over applied LOD cycles.
#[derive(Debug, Clone, Default)]
pub struct LodMetrics {
  /// Worker time per cycle, all stages.
  pub cycle_timings: RollingWindow<u64>,
  pub reindex_timings: RollingWindow<u64>,
  /// Records applied per cycle.
  pub applied_records: RollingWindow<u64>,
  pub cycles_applied: u64,
  /// Updates thrown away because the terrain changed underneath them.
  pub stale_discarded: u64,
}

impl LodMetrics {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn record_cycle(&mut self, stats: &LodCycleStats, applied: usize) {
    if !is_enabled() {
      return;
    }
    self.cycle_timings.push(stats.total_us());
    self.reindex_timings.push(stats.reindex_us);
    self.applied_records.push(applied as u64);
    self.cycles_applied += 1;
  }

  pub fn record_stale(&mut self) {
    if is_enabled() {
      self.stale_discarded += 1;
    }
  }

  pub fn avg_cycle_us(&self) -> f64 {
    self.cycle_timings.average()
  }

  pub fn reset(&mut self) {
    self.cycle_timings.clear();
    self.reindex_timings.clear();
    self.applied_records.clear();
    // Counters are cumulative
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_window_evicts_oldest_cycle() {
    let mut timings = RollingWindow::new(2);
    assert_eq!(timings.max(), None);
    assert_eq!(timings.average(), 0.0);
    for us in [250u64, 750, 500] {
      timings.push(us);
    }
    assert_eq!(timings.capacity(), 2);
    assert_eq!(timings.iter().copied().collect::<Vec<_>>(), vec![750, 500]);
    assert_eq!(timings.average(), 625.0);
    assert_eq!(timings.max(), Some(750));
    assert_eq!(timings.last(), Some(&500));
  }

  #[test]
  fn test_record_cycle() {
    let mut metrics = LodMetrics::new();
    let stats = LodCycleStats {
      select_us: 100,
      reindex_us: 300,
      ..Default::default()
    };
    metrics.record_cycle(&stats, 4);
    metrics.record_cycle(&stats, 2);
    metrics.record_stale();
    assert_eq!(metrics.cycles_applied, 2);
    assert_eq!(metrics.avg_cycle_us(), 400.0);
    assert_eq!(metrics.applied_records.sum(), 6);
    assert_eq!(metrics.stale_discarded, 1);

    metrics.reset();
    assert!(metrics.cycle_timings.is_empty());
    assert_eq!(metrics.cycles_applied, 2);
  }
}
