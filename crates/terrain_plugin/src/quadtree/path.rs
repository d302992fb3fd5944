//! Quadrant addressing inside a terrain tree.
//!
//! Quadrants are numbered the way the tree splits its block:
//!
//! ```text
//!          -x      +x
//!        ┌──────┬──────┐
//!   -z   │  1   │  3   │      1 = TopLeft      3 = TopRight
//!        ├──────┼──────┤
//!   +z   │  2   │  4   │      2 = BottomLeft   4 = BottomRight
//!        └──────┴──────┘
//! ```
//!
//! A [`QuadPath`] is the root-to-leaf sequence of quadrants, packed two bits
//! per level. Because every branch of a tree splits to the same depth, the
//! equal-size neighbour of a node is found purely from its path.

use std::fmt;

use crate::constants::MAX_TREE_DEPTH;

/// One of the four children of a split block.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum Quadrant {
  TopLeft = 1,
  BottomLeft = 2,
  TopRight = 3,
  BottomRight = 4,
}

impl Quadrant {
  /// In slot order (1, 2, 3, 4).
  pub const ALL: [Quadrant; 4] = [
    Quadrant::TopLeft,
    Quadrant::BottomLeft,
    Quadrant::TopRight,
    Quadrant::BottomRight,
  ];

  /// Quadrant from its number (1-4).
  pub fn from_number(n: u8) -> Option<Self> {
    match n {
      1 => Some(Quadrant::TopLeft),
      2 => Some(Quadrant::BottomLeft),
      3 => Some(Quadrant::TopRight),
      4 => Some(Quadrant::BottomRight),
      _ => None,
    }
  }

  /// Quadrant number (1-4).
  #[inline]
  pub fn number(self) -> u8 {
    self as u8
  }

  /// Zero-based slot (0-3).
  #[inline]
  pub fn slot(self) -> usize {
    self as usize - 1
  }

  #[inline]
  pub fn is_left(self) -> bool {
    matches!(self, Quadrant::TopLeft | Quadrant::BottomLeft)
  }

  #[inline]
  pub fn is_top(self) -> bool {
    matches!(self, Quadrant::TopLeft | Quadrant::TopRight)
  }

  /// `(0|1, 0|1)` block offset along x and z.
  #[inline]
  pub fn offset(self) -> (usize, usize) {
    (usize::from(!self.is_left()), usize::from(!self.is_top()))
  }

  /// `(-1|1, -1|1)` direction from the parent center along x and z.
  #[inline]
  pub fn sign(self) -> (f32, f32) {
    let (ox, oz) = self.offset();
    (ox as f32 * 2.0 - 1.0, oz as f32 * 2.0 - 1.0)
  }

  /// Quadrant across the axis of `dir` (1↔3, 2↔4 horizontally; 1↔2, 3↔4
  /// vertically).
  pub fn mirrored(self, dir: Direction) -> Self {
    use Quadrant::*;
    match (dir.is_horizontal(), self) {
      (true, TopLeft) => TopRight,
      (true, TopRight) => TopLeft,
      (true, BottomLeft) => BottomRight,
      (true, BottomRight) => BottomLeft,
      (false, TopLeft) => BottomLeft,
      (false, BottomLeft) => TopLeft,
      (false, TopRight) => BottomRight,
      (false, BottomRight) => TopRight,
    }
  }

  /// Whether stepping towards `dir` leaves the parent block.
  #[inline]
  pub fn is_on_edge(self, dir: Direction) -> bool {
    match dir {
      Direction::Right => !self.is_left(),
      Direction::Left => self.is_left(),
      Direction::Top => self.is_top(),
      Direction::Bottom => !self.is_top(),
    }
  }
}

/// Neighbour direction in tree-local space. Top is -z.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Direction {
  Right,
  Top,
  Left,
  Bottom,
}

impl Direction {
  /// Seam order used by the index strip.
  pub const ALL: [Direction; 4] = [Direction::Right, Direction::Top, Direction::Left, Direction::Bottom];

  pub fn opposite(self) -> Self {
    match self {
      Direction::Right => Direction::Left,
      Direction::Left => Direction::Right,
      Direction::Top => Direction::Bottom,
      Direction::Bottom => Direction::Top,
    }
  }

  #[inline]
  pub fn is_horizontal(self) -> bool {
    matches!(self, Direction::Right | Direction::Left)
  }

  /// Index into `[right, top, left, bottom]` arrays.
  #[inline]
  pub fn index(self) -> usize {
    self as usize
  }

  /// Unit step in (x, z) sample space.
  #[inline]
  pub fn delta(self) -> (i64, i64) {
    match self {
      Direction::Right => (1, 0),
      Direction::Top => (0, -1),
      Direction::Left => (-1, 0),
      Direction::Bottom => (0, 1),
    }
  }
}

/// Result of moving a path one node sideways.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PathStep {
  /// Neighbour inside the same tree.
  Inside(QuadPath),
  /// The walk crossed the root; the path addresses the adjacent tree.
  Across(QuadPath),
}

/// Packed root-to-node quadrant path (2 bits per level).
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct QuadPath {
  bits: u64,
  depth: u8,
}

impl QuadPath {
  pub const ROOT: QuadPath = QuadPath { bits: 0, depth: 0 };

  /// Path from a root-first quadrant list. `None` past [`MAX_TREE_DEPTH`].
  pub fn from_quadrants(quadrants: &[Quadrant]) -> Option<Self> {
    quadrants.iter().try_fold(Self::ROOT, |path, &q| path.child(q))
  }

  #[inline]
  pub fn depth(self) -> usize {
    self.depth as usize
  }

  #[inline]
  pub fn is_root(self) -> bool {
    self.depth == 0
  }

  /// Path one level deeper.
  pub fn child(self, q: Quadrant) -> Option<Self> {
    if self.depth as usize >= MAX_TREE_DEPTH {
      return None;
    }
    let shift = 2 * self.depth as u64;
    Some(Self {
      bits: self.bits | ((q.slot() as u64) << shift),
      depth: self.depth + 1,
    })
  }

  /// Quadrant at `level` (0 = first split below the root).
  pub fn quadrant_at(self, level: usize) -> Option<Quadrant> {
    if level >= self.depth as usize {
      return None;
    }
    let slot = (self.bits >> (2 * level)) & 0b11;
    Quadrant::from_number(slot as u8 + 1)
  }

  /// Last quadrant of the path, `None` at the root.
  pub fn last(self) -> Option<Quadrant> {
    self.depth().checked_sub(1).and_then(|level| self.quadrant_at(level))
  }

  pub fn parent(self) -> Option<Self> {
    let depth = self.depth.checked_sub(1)?;
    let mask = (1u64 << (2 * depth as u64)) - 1;
    Some(Self {
      bits: self.bits & mask,
      depth,
    })
  }

  /// Root-first quadrants.
  pub fn iter(self) -> impl Iterator<Item = Quadrant> {
    (0..self.depth()).filter_map(move |level| self.quadrant_at(level))
  }

  fn with_quadrant_at(self, level: usize, q: Quadrant) -> Self {
    let shift = 2 * level as u64;
    Self {
      bits: (self.bits & !(0b11 << shift)) | ((q.slot() as u64) << shift),
      depth: self.depth,
    }
  }

  /// Equal-depth neighbour towards `dir`.
  ///
  /// Walks up while the node sits on the `dir` edge of its parent, then
  /// mirrors every visited level back down. Walking past the root mirrors
  /// the whole path, which addresses the matching node of the adjacent tree.
  pub fn neighbour(self, dir: Direction) -> PathStep {
    let mut path = self;
    for level in (0..self.depth()).rev() {
      let Some(q) = self.quadrant_at(level) else {
        break;
      };
      path = path.with_quadrant_at(level, q.mirrored(dir));
      if !q.is_on_edge(dir) {
        return PathStep::Inside(path);
      }
    }
    PathStep::Across(path)
  }
}

impl fmt::Debug for QuadPath {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "QuadPath({self})")
  }
}

impl fmt::Display for QuadPath {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    if self.is_root() {
      return f.write_str("root");
    }
    for (i, q) in self.iter().enumerate() {
      if i > 0 {
        f.write_str("-")?;
      }
      write!(f, "{}", q.number())?;
    }
    Ok(())
  }
}

#[cfg(test)]
#[path = "path_test.rs"]
mod path_test;
