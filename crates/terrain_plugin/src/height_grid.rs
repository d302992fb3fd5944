//! HeightGrid - square block of height samples with interpolated queries.
//!
//! Interpolation follows the triangulation used by mesh generation so height
//! queries and rendered geometry agree:
//!
//! ```text
//!   corner cells (0,0) and (W-2,W-2)     every other cell
//!
//!        tl ───── tr                      tl ───── tr
//!        │ ╲      │                       │      ╱ │
//!        │   ╲    │                       │    ╱   │
//!        │     ╲  │                       │  ╱     │
//!        bl ───── br                      bl ───── br
//! ```

use glam::Vec3;

use crate::constants::{is_valid_side, vertex_index};
use crate::error::TerrainError;

/// Square, row-major grid of 32-bit height samples (`2^k + 1` per side).
#[derive(Clone, Debug, PartialEq)]
pub struct HeightGrid {
  size: usize,
  samples: Vec<f32>,
}

impl HeightGrid {
  /// Wrap `samples` as a `size × size` grid.
  pub fn new(size: usize, samples: Vec<f32>) -> Result<Self, TerrainError> {
    if !is_valid_side(size) {
      return Err(TerrainError::InvalidSize { size });
    }
    if samples.len() != size * size {
      return Err(TerrainError::HeightDataMismatch {
        expected: size * size,
        actual: samples.len(),
      });
    }
    Ok(Self { size, samples })
  }

  /// Wrap samples of an already validated side.
  pub(crate) fn from_validated(size: usize, samples: Vec<f32>) -> Self {
    debug_assert_eq!(samples.len(), size * size);
    Self { size, samples }
  }

  /// Grid with every sample at `height`.
  pub fn flat(size: usize, height: f32) -> Result<Self, TerrainError> {
    Self::new(size, vec![height; size * size])
  }

  /// Grid sampled from `f(x, z)`.
  pub fn from_fn(size: usize, mut f: impl FnMut(usize, usize) -> f32) -> Result<Self, TerrainError> {
    let mut samples = Vec::with_capacity(size * size);
    for z in 0..size {
      for x in 0..size {
        samples.push(f(x, z));
      }
    }
    Self::new(size, samples)
  }

  /// Samples per side.
  #[inline]
  pub fn size(&self) -> usize {
    self.size
  }

  /// Raw row-major samples.
  #[inline]
  pub fn samples(&self) -> &[f32] {
    &self.samples
  }

  /// Sample at `(x, z)`, `None` outside the grid.
  #[inline]
  pub fn get(&self, x: i64, z: i64) -> Option<f32> {
    let size = self.size as i64;
    if x < 0 || z < 0 || x >= size || z >= size {
      return None;
    }
    Some(self.samples[vertex_index(x as usize, z as usize, self.size)])
  }

  /// Nearest sample at `(x, z)`, NaN outside the grid.
  #[inline]
  pub fn height_at(&self, x: i64, z: i64) -> f32 {
    self.get(x, z).unwrap_or(f32::NAN)
  }

  /// Overwrite one sample. Returns `false` when out of range.
  pub fn set(&mut self, x: usize, z: usize, height: f32) -> bool {
    if x >= self.size || z >= self.size {
      return false;
    }
    self.samples[vertex_index(x, z, self.size)] = height;
    true
  }

  /// Add `delta` to one sample. Returns `false` when out of range.
  pub fn add(&mut self, x: usize, z: usize, delta: f32) -> bool {
    if x >= self.size || z >= self.size {
      return false;
    }
    self.samples[vertex_index(x, z, self.size)] += delta;
    true
  }

  /// Copy the `side × side` block starting at `(x0, z0)`.
  ///
  /// Samples outside this grid are zero-filled.
  pub fn sub_block(&self, x0: usize, z0: usize, side: usize) -> HeightGrid {
    let mut samples = vec![0.0; side * side];
    for z in 0..side {
      for x in 0..side {
        if let Some(h) = self.get((x0 + x) as i64, (z0 + z) as i64) {
          samples[vertex_index(x, z, side)] = h;
        }
      }
    }
    HeightGrid { size: side, samples }
  }

  /// Lowest and highest sample.
  pub fn min_max(&self) -> (f32, f32) {
    self
      .samples
      .iter()
      .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), &h| (lo.min(h), hi.max(h)))
  }

  /// Height at fractional sample coordinates.
  ///
  /// Exact sample coordinates return [`Self::height_at`] unchanged; anything
  /// outside `[0, size-1]` is NaN.
  pub fn interpolated_height_at(&self, fx: f32, fz: f32) -> f32 {
    let last = (self.size - 1) as f32;
    if !(0.0..=last).contains(&fx) || !(0.0..=last).contains(&fz) {
      return f32::NAN;
    }
    if fx.fract() == 0.0 && fz.fract() == 0.0 {
      return self.height_at(fx as i64, fz as i64);
    }
    let x = (fx.floor() as usize).min(self.size - 2);
    let z = (fz.floor() as usize).min(self.size - 2);
    self.cell_height(x, z, fx - x as f32, fz - z as f32)
  }

  /// Height inside cell `(x, z)` at fractions `(u, v)` of the cell.
  pub fn cell_height(&self, x: usize, z: usize, u: f32, v: f32) -> f32 {
    let w = self.size;
    let h1 = self.samples[vertex_index(x, z, w)];
    let h2 = self.samples[vertex_index(x + 1, z, w)];
    let h3 = self.samples[vertex_index(x, z + 1, w)];
    let h4 = self.samples[vertex_index(x + 1, z + 1, w)];

    if self.is_flipped_cell(x, z) {
      // tl-br diagonal
      if u >= v {
        h1 + u * (h2 - h1) + v * (h4 - h2)
      } else {
        h1 + v * (h3 - h1) + u * (h4 - h3)
      }
    } else if 1.0 - u - v >= 0.0 {
      h1 + u * (h2 - h1) + v * (h3 - h1)
    } else {
      h4 + (1.0 - u) * (h3 - h4) + (1.0 - v) * (h2 - h4)
    }
  }

  /// Whether cell `(x, z)` uses the tl-br diagonal.
  #[inline]
  pub fn is_flipped_cell(&self, x: usize, z: usize) -> bool {
    (x == 0 && z == 0) || (x == self.size - 2 && z == self.size - 2)
  }

  /// Vertex normal at sample `(x, z)` from this grid's samples only.
  pub fn vertex_normal(&self, x: usize, z: usize, scale: Vec3) -> Vec3 {
    let (x, z) = (x as i64, z as i64);
    stencil_normal(
      self.height_at(x, z),
      [
        self.get(x, z - 1),
        self.get(x - 1, z),
        self.get(x, z + 1),
        self.get(x + 1, z),
      ],
      scale,
    )
  }

  /// Normal at fractional sample coordinates, blended from the four vertex
  /// normals of the containing cell.
  pub fn normal_at(&self, fx: f32, fz: f32, scale: Vec3) -> Option<Vec3> {
    let last = (self.size - 1) as f32;
    if !(0.0..=last).contains(&fx) || !(0.0..=last).contains(&fz) {
      return None;
    }
    let x = (fx.floor() as usize).min(self.size - 2);
    let z = (fz.floor() as usize).min(self.size - 2);
    let (u, v) = (fx - x as f32, fz - z as f32);

    let n = self.vertex_normal(x, z, scale) * (1.0 - u) * (1.0 - v)
      + self.vertex_normal(x + 1, z, scale) * u * (1.0 - v)
      + self.vertex_normal(x, z + 1, scale) * (1.0 - u) * v
      + self.vertex_normal(x + 1, z + 1, scale) * u * v;
    Some(n.normalize_or_zero())
  }

  /// Blend every sample towards the average of its `radius` neighbourhood.
  ///
  /// `np` is the weight of the neighbourhood average (0 = unchanged, 1 = box
  /// blur). Values outside `[0, 1]` are ignored.
  pub fn smooth(&mut self, np: f32, radius: usize) {
    if !(0.0..=1.0).contains(&np) {
      return;
    }
    let radius = radius.max(1) as i64;
    let source = self.samples.clone();
    let size = self.size as i64;
    for z in 0..size {
      for x in 0..size {
        let mut count = 0u32;
        let mut sum = 0.0f32;
        for dz in -radius..=radius {
          for dx in -radius..=radius {
            let (nx, nz) = (x + dx, z + dz);
            if nx < 0 || nz < 0 || nx >= size || nz >= size {
              continue;
            }
            sum += source[vertex_index(nx as usize, nz as usize, self.size)];
            count += 1;
          }
        }
        let idx = vertex_index(x as usize, z as usize, self.size);
        self.samples[idx] = (sum / count as f32) * np + source[idx] * (1.0 - np);
      }
    }
  }

  /// Linearly remap all samples into `[min, max]`.
  pub fn normalize_range(&mut self, min: f32, max: f32) {
    let (lo, hi) = self.min_max();
    let span = hi - lo;
    if span <= f32::EPSILON {
      self.samples.fill(min);
      return;
    }
    let scale = (max - min) / span;
    for h in &mut self.samples {
      *h = min + (*h - lo) * scale;
    }
  }

  /// Multiply every sample by `factor`.
  pub fn scale_heights(&mut self, factor: f32) {
    for h in &mut self.samples {
      *h *= factor;
    }
  }
}

/// Vertex normal from the root height and its four neighbours
/// `[top, left, bottom, right]` (`None` where the neighbour doesn't exist).
///
/// Sums the normalised cross products of every available adjacent pair in the
/// order (top,left), (left,bottom), (bottom,right), (right,top). Neighbour
/// offsets are unit steps along -z, -x, +z, +x scaled by `scale`.
pub fn stencil_normal(root: f32, neighbours: [Option<f32>; 4], scale: Vec3) -> Vec3 {
  const OFFSETS: [(f32, f32); 4] = [(0.0, -1.0), (-1.0, 0.0), (0.0, 1.0), (1.0, 0.0)];

  let arm = |i: usize| -> Option<Vec3> {
    let h = neighbours[i]?;
    let (dx, dz) = OFFSETS[i];
    Some(Vec3::new(dx, h - root, dz) * scale)
  };

  let mut sum = Vec3::ZERO;
  for i in 0..4 {
    if let (Some(first), Some(second)) = (arm(i), arm((i + 1) % 4)) {
      sum += first.cross(second).normalize_or_zero();
    }
  }

  let normal = sum.normalize_or_zero();
  if normal == Vec3::ZERO {
    Vec3::Y
  } else {
    normal
  }
}

#[cfg(test)]
#[path = "height_grid_test.rs"]
mod height_grid_test;
