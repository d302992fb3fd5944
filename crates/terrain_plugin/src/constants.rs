//! Sizing constants and sample-grid helpers shared by every terrain module.
//!
//! # Sample Layout
//!
//! ```text
//!            x (columns) ──►
//!          0     1     2     3     4
//!     0    ●─────●─────●─────●─────●     row-major:
//!  z  │    │   ╱ │   ╱ │   ╱ │   ╱ │     index = z * width + x
//!  │  1    ●─────●─────●─────●─────●
//!  ▼  │    │   ╱ │   ╱ │   ╱ │   ╱ │     side = 2^k + 1 samples
//!     2    ●─────●─────●─────●─────●     (2^k cells, splits in half)
//! ```
//!
//! Row 0 is the `-z` ("top") border, column 0 the `-x` ("left") border.

/// Default patch side in samples (64 cells).
pub const DEFAULT_PATCH_SIZE: usize = 65;

/// Default distance multiplier for [`crate::lod::DistanceLodCalculator`].
pub const DEFAULT_LOD_MULTIPLIER: f32 = 2.7;

/// Default number of detached grid tiles kept for reuse.
pub const DEFAULT_TILE_CACHE_CAPACITY: usize = 16;

/// Deepest quad path that fits in a [`crate::quadtree::QuadPath`].
pub const MAX_TREE_DEPTH: usize = 31;

/// Row-major vertex index of sample `(x, z)` in a grid of `width` columns.
#[inline(always)]
pub const fn vertex_index(x: usize, z: usize, width: usize) -> usize {
  z * width + x
}

/// Check that `size` is `2^k + 1` with `k >= 1`.
#[inline]
pub const fn is_valid_side(size: usize) -> bool {
  size >= 3 && (size - 1).is_power_of_two()
}

/// Coarsest detail level a patch of `patch_size` samples may use.
///
/// `max(1, log2(patch_size - 1) - 1)`, so the coarsest strip still renders two
/// cells per side.
#[inline]
pub fn max_lod_for(patch_size: usize) -> u32 {
  let cells = patch_size.saturating_sub(1).max(1);
  (cells.ilog2()).saturating_sub(1).max(1)
}
