//! Error type for terrain construction, mesh generation and paging.

use thiserror::Error;

/// Failures surfaced by the terrain core.
///
/// Construction invariants are rejected up front; out-of-range queries return
/// NaN / `None` instead of an error.
#[derive(Error, Debug)]
pub enum TerrainError {
  #[error("side of {size} samples is not a power of two plus one")]
  InvalidSize { size: usize },

  #[error("height data has {actual} samples, expected {expected}")]
  HeightDataMismatch { expected: usize, actual: usize },

  #[error("patch size {patch_size} does not fit a terrain of size {total_size}")]
  PatchTooLarge { patch_size: usize, total_size: usize },

  #[error("detail step {step} is invalid for a {width}-sample patch")]
  InvalidLod { step: u32, width: usize },

  #[error("destination buffer too small: need {needed}, got {actual}")]
  BufferTooSmall { needed: usize, actual: usize },

  #[error("a record flagged for reindexing must target a level above 0")]
  ReindexAtFullDetail,

  #[error("failed to spawn LOD worker: {0}")]
  WorkerSpawn(#[from] std::io::Error),

  #[error("tile loader failed for cell ({x}, {z}): {reason}")]
  TileLoad { x: i32, z: i32, reason: String },
}
