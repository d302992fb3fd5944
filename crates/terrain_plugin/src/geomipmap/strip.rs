//! Triangle-strip index generation with LOD seams.
//!
//! One strip covers the whole patch. The interior rows come first, then the
//! four edges counter-clockwise from the bottom-right corner:
//!
//! ```text
//!                    top (3)
//!        0 ◄────────────────────────── W-1
//!        │  ┌──────────────────────┐    ▲
//!        │  │ interior rows        │    │
//! left   │  │ r = step .. W-2*step │    │  right (2)
//!  (4)   │  │ (two indices per col,│    │
//!        │  │  degenerate pair     │    │
//!        ▼  │  between rows)       │    │
//!           └──────────────────────┘    │
//!    W(W-1) ──────────────────────────► W*W-1   (1) start
//!                   bottom (5)
//! ```
//!
//! An edge facing a coarser neighbour is "zippered" against the first inner
//! row/column: the inner vertex advances one fine step at a time while the
//! edge vertex only visits samples the neighbour also renders, so no T-junction
//! is left on the shared border:
//!
//! ```text
//!   neighbour (step 2s)   E(0) ─────────── E(2) ─────────── E(4)
//!                          │ ╲           ╱  │  ╲          ╱
//!   this patch (step s)    │   I(1) ── I(2) ── I(3) ── ...
//! ```
//!
//! Degenerate repeats keep the strip parity, so every real triangle keeps the
//! same winding. The buffer is sized from a closed-form estimate that is an
//! upper bound and padded with `W*W-1`; the padding only adds zero-area
//! triangles.

use crate::error::TerrainError;
use crate::types::{SeamMode, SeamSteps};

/// Upper-bound estimate of the strip length for `step` on a `width` patch.
///
/// Overestimates by a handful of entries; the remainder is padded.
pub fn estimate_index_count(width: usize, step: u32) -> usize {
  let step = step.max(1) as i64;
  let w = width as i64;
  let side = (w - 1) / step + 1 - 2;
  let mut num = side * side * 2;
  num -= 2 * side;
  num += 2 * (side - 2);
  num += (w / step) * 2 * 4;
  num += 1;
  num += 10;
  num.max(0) as usize
}

/// Normalise and validate a detail step for a `width` patch.
///
/// Step 0 means full detail. The step must be a power of two that leaves at
/// least two rendered cells per side.
pub fn validate_step(width: usize, step: u32) -> Result<u32, TerrainError> {
  let step = step.max(1);
  let cells = width.saturating_sub(1);
  let valid = step.is_power_of_two()
    && cells % step as usize == 0
    && cells / step as usize >= 2;
  if valid {
    Ok(step)
  } else {
    Err(TerrainError::InvalidLod { step, width })
  }
}

/// Build the strip for `step` with the given neighbour steps.
#[cfg_attr(feature = "profiling", tracing::instrument(skip_all, name = "geomipmap::write_index_strip"))]
pub fn write_index_strip(
  width: usize,
  step: u32,
  seams: SeamSteps,
  mode: SeamMode,
) -> Result<Vec<u32>, TerrainError> {
  let step = validate_step(width, step)?;
  let mut store = vec![0u32; estimate_index_count(width, step)];
  write_index_strip_into(width, step, seams, mode, &mut store)?;
  Ok(store)
}

/// Build the strip into a caller-supplied buffer.
///
/// The buffer must hold at least [`estimate_index_count`] entries; only that
/// many are written. Returns the number of entries written.
pub fn write_index_strip_into(
  width: usize,
  step: u32,
  seams: SeamSteps,
  mode: SeamMode,
  store: &mut [u32],
) -> Result<usize, TerrainError> {
  let step = validate_step(width, step)?;
  let needed = estimate_index_count(width, step);
  if store.len() < needed {
    return Err(TerrainError::BufferTooSmall {
      needed,
      actual: store.len(),
    });
  }

  let w = width;
  let s = step as usize;
  let cells = (w - 1) / s;
  let ratio = |neighbour: u32| edge_ratio(step, neighbour, cells, mode);
  let (kr, kt, kl, kb) = (
    ratio(seams.right),
    ratio(seams.top),
    ratio(seams.left),
    ratio(seams.bottom),
  );

  let mut strip = StripWriter::new(&mut store[..needed]);

  // Interior rows, minus the edges.
  let mut r = s;
  while r + 2 * s < w {
    let row = r * w;
    let next_row = (r + s) * w;
    let mut c = s;
    while c + s < w {
      strip.put(row + c);
      strip.put(next_row + c);
      c += s;
    }
    if r + 3 * s < w {
      strip.put(next_row + w - s - 1);
      strip.put(next_row + s);
    }
    r += s;
  }

  // Right, walking up from the bottom-right corner.
  let corner = w * w - 1;
  strip.put(w * (w - s) - 1 - s);
  strip.put(corner);
  if kr > 1 {
    strip.zip_down(cells, kr, |i| i * s * w + w - 1 - s, |e| e * s * w + w - 1);
  } else {
    strip.put(corner);
    let mut row = w - s;
    while row > s {
      let idx = row * w - 1;
      strip.put(idx);
      strip.put(idx - s);
      row -= s;
    }
  }
  strip.put(w - 1);

  // Top, walking right to left.
  if kr > 1 {
    strip.put(w - 1);
  }
  if kt > 1 {
    strip.zip_down(cells, kt, |i| s * w + i * s, |e| e * s);
  } else {
    let mut col = w - 1 - s;
    while col > 0 {
      strip.put(col + s * w);
      strip.put(col);
      col -= s;
    }
    strip.put(0);
  }
  strip.put(0);

  // Left, walking down.
  if kl > 1 {
    if kt > 1 {
      strip.put(0);
    }
    strip.zip_up(cells, kl, |i| i * s * w + s, |e| e * s * w);
  } else {
    if kt <= 1 {
      strip.put(0);
    }
    let mut row = s;
    while row + s < w {
      strip.put(row * w);
      strip.put(row * w + s);
      row += s;
    }
  }
  strip.put(w * (w - 1));

  // Bottom, walking left to right.
  if kl > 1 {
    strip.put(w * (w - 1));
  }
  if kb > 1 {
    strip.zip_up(cells, kb, |i| w * (w - 1 - s) + i * s, |e| w * (w - 1) + e * s);
  } else {
    let mut col = s;
    while col + s < w {
      strip.put(w * (w - 1 - s) + col);
      strip.put(w * (w - 1) + col);
      col += s;
    }
  }
  strip.put(corner);

  if strip.dropped > 0 {
    tracing::warn!(
      width,
      step,
      dropped = strip.dropped,
      "index strip exceeded its estimated capacity; tail truncated"
    );
  }
  strip.pad(corner);
  Ok(strip.len)
}

/// Number of fine edge segments per neighbour segment (1 = same level).
fn edge_ratio(own: u32, neighbour: u32, cells: usize, mode: SeamMode) -> usize {
  if neighbour <= own {
    return 1;
  }
  match mode {
    SeamMode::Binary => 2,
    SeamMode::Proportional => {
      let ratio = (neighbour / own) as usize;
      (1usize << ratio.ilog2()).min(cells)
    }
  }
}

/// Capped writer over a pre-sized index buffer.
struct StripWriter<'a> {
  buf: &'a mut [u32],
  len: usize,
  dropped: usize,
}

impl<'a> StripWriter<'a> {
  fn new(buf: &'a mut [u32]) -> Self {
    Self {
      buf,
      len: 0,
      dropped: 0,
    }
  }

  #[inline]
  fn put(&mut self, idx: usize) {
    if self.len < self.buf.len() {
      self.buf[self.len] = idx as u32;
      self.len += 1;
    } else {
      self.dropped += 1;
    }
  }

  fn pad(&mut self, idx: usize) {
    while self.len < self.buf.len() {
      self.put(idx);
    }
  }

  /// Zipper from the far end of an edge back to its start.
  ///
  /// `inner(i)` is the i-th fine vertex of the first inner row/column
  /// (`1..cells-1`), `edge(e)` the e-th fine position on the border, visited
  /// only at multiples of `ratio`. Starts after `(inner(cells-1), edge(cells))`
  /// and ends on `(inner(1), edge(0))`.
  fn zip_down(
    &mut self,
    cells: usize,
    ratio: usize,
    inner: impl Fn(usize) -> usize,
    edge: impl Fn(usize) -> usize,
  ) {
    let (mut i, mut e) = (cells - 1, cells);
    while !(i == 1 && e == 0) {
      if e > i {
        e -= ratio;
      } else if e < i {
        i -= 1;
      } else {
        i -= 1;
        e -= ratio;
      }
      self.put(inner(i));
      self.put(edge(e));
    }
  }

  /// Mirror of [`Self::zip_down`]: starts after `(inner(1), edge(0))` and ends
  /// on `(inner(cells-1), edge(cells))`.
  fn zip_up(
    &mut self,
    cells: usize,
    ratio: usize,
    inner: impl Fn(usize) -> usize,
    edge: impl Fn(usize) -> usize,
  ) {
    let (mut i, mut e) = (1, 0);
    while !(i == cells - 1 && e == cells) {
      if e < i {
        e += ratio;
      } else if e > i {
        i += 1;
      } else {
        i += 1;
        e += ratio;
      }
      self.put(inner(i));
      self.put(edge(e));
    }
  }
}

#[cfg(test)]
#[path = "strip_test.rs"]
mod strip_test;
