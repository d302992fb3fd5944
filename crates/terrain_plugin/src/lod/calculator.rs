//! Detail-level selection from viewer distance.
//!
//! ```text
//!   level:     0          1               2                    max
//!   viewer ●───────┼──────────────┼────────────────────┼──────────────►
//!                  t              2t                   3t      distance
//!
//!   t = patch_size · lod_multiplier · world_scale
//! ```

use glam::Vec3;

use crate::constants::DEFAULT_LOD_MULTIPLIER;
use crate::quadtree::{PatchKey, PatchNeighbours};
use crate::types::SeamMode;

/// Per-patch inputs for level selection, captured in a snapshot so the
/// worker never touches the live tree.
#[derive(Clone, Debug, PartialEq)]
pub struct PatchLodInfo {
  pub key: PatchKey,
  /// Current level.
  pub lod: u32,
  pub max_lod: u32,
  /// World-space center of the patch bounds.
  pub center: Vec3,
  /// Samples per side.
  pub size: usize,
  /// World units per sample along x.
  pub world_scale: f32,
  pub neighbours: PatchNeighbours,
}

/// Chooses a detail level for one patch.
///
/// Implementations must be pure: the same inputs always yield the same level.
pub trait LodCalculator: Send + Sync {
  /// New level for `patch`, `None` when there is nothing to measure against.
  fn select_lod(&self, patch: &PatchLodInfo, locations: &[Vec3]) -> Option<u32>;

  /// How edges against coarser neighbours are stitched.
  fn seam_mode(&self) -> SeamMode {
    SeamMode::Binary
  }
}

/// Tunables for [`DistanceLodCalculator`].
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct LodSettings {
  pub lod_multiplier: f32,
  pub seam_mode: SeamMode,
}

impl LodSettings {
  pub const DEFAULT: Self = Self {
    lod_multiplier: DEFAULT_LOD_MULTIPLIER,
    seam_mode: SeamMode::Binary,
  };

  /// Every patch stays at level 0 regardless of distance.
  pub const FULL_DETAIL: Self = Self {
    lod_multiplier: f32::INFINITY,
    seam_mode: SeamMode::Binary,
  };
}

impl Default for LodSettings {
  fn default() -> Self {
    Self::DEFAULT
  }
}

/// Picks coarser levels in equal-width distance bands.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DistanceLodCalculator {
  settings: LodSettings,
}

impl DistanceLodCalculator {
  pub fn new(settings: LodSettings) -> Self {
    Self { settings }
  }

  pub fn with_multiplier(lod_multiplier: f32) -> Self {
    Self::new(LodSettings {
      lod_multiplier,
      ..LodSettings::DEFAULT
    })
  }

  #[inline]
  pub fn settings(&self) -> LodSettings {
    self.settings
  }

  /// Width of the first distance band for a patch of `size` samples.
  #[inline]
  pub fn threshold(&self, size: usize) -> f32 {
    size as f32 * self.settings.lod_multiplier
  }
}

impl Default for DistanceLodCalculator {
  fn default() -> Self {
    Self::new(LodSettings::DEFAULT)
  }
}

impl From<LodSettings> for DistanceLodCalculator {
  fn from(settings: LodSettings) -> Self {
    Self::new(settings)
  }
}

impl LodCalculator for DistanceLodCalculator {
  fn select_lod(&self, patch: &PatchLodInfo, locations: &[Vec3]) -> Option<u32> {
    let viewer = locations.first()?;
    let distance = patch.center.distance(*viewer);
    let threshold = self.threshold(patch.size);
    let level = (0..=patch.max_lod)
      .find(|&i| distance < threshold * (i + 1) as f32 * patch.world_scale)
      .unwrap_or(patch.max_lod);
    Some(level)
  }

  fn seam_mode(&self) -> SeamMode {
    self.settings.seam_mode
  }
}
