use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use glam::{IVec2, Vec2, Vec3};

use super::*;
use crate::height_grid::HeightGrid;
use crate::lod::DistanceLodCalculator;
use crate::pipeline::{TerrainLodControl, TickStatus};

/// Window of 17 samples: cells of 9 samples, 8 world units wide.
fn grid_with(loads: Arc<AtomicUsize>) -> TerrainGrid {
  let loader = move |cell: IVec2, quad_size: usize| {
    loads.fetch_add(1, Ordering::SeqCst);
    let span = (quad_size - 1) as f32;
    let (x0, z0) = ((cell.x - 1) as f32 * span, (cell.y - 1) as f32 * span);
    HeightGrid::from_fn(quad_size, |x, z| (x0 + x as f32) * 0.5 + (z0 + z as f32))
  };
  TerrainGrid::new(TerrainConfig::DEFAULT.with_patch_size(5), 17, loader).unwrap()
}

fn grid() -> (TerrainGrid, Arc<AtomicUsize>) {
  let loads = Arc::new(AtomicUsize::new(0));
  (grid_with(Arc::clone(&loads)), loads)
}

fn cells(grid: &TerrainGrid) -> Vec<IVec2> {
  let mut cells: Vec<IVec2> = Quadrant::ALL.iter().filter_map(|&q| grid.cell_in_slot(q)).collect();
  cells.sort_by_key(|c| (c.x, c.y));
  cells
}

/// Every slot holds a tree placed on its cell.
fn assert_full_window(grid: &TerrainGrid) {
  assert_eq!(grid.terrain().len(), 4);
  for q in Quadrant::ALL {
    let cell = grid.cell_in_slot(q).unwrap_or_else(|| panic!("{q:?} is empty"));
    let tile = grid.tile_in_slot(q).unwrap_or_else(|| panic!("{q:?} has no tree"));
    assert_eq!(tile.quadrant(), Some(q));
    assert_eq!(tile.translation(), grid.cell_center(cell), "{q:?}");
  }
}

#[derive(Clone, Debug, PartialEq)]
enum Event {
  Detached(IVec2),
  Attached(IVec2),
  Moved(Vec3),
}

#[derive(Clone, Default)]
struct Recorder(Arc<Mutex<Vec<Event>>>);

impl Recorder {
  fn take(&self) -> Vec<Event> {
    std::mem::take(&mut *self.0.lock().unwrap())
  }
}

impl TerrainGridListener for Recorder {
  fn tile_attached(&mut self, cell: IVec2, _: &TerrainQuad) {
    self.0.lock().unwrap().push(Event::Attached(cell));
  }
  fn tile_detached(&mut self, cell: IVec2, _: &TerrainQuad) {
    self.0.lock().unwrap().push(Event::Detached(cell));
  }
  fn grid_moved(&mut self, center: Vec3) {
    self.0.lock().unwrap().push(Event::Moved(center));
  }
}

// =========================================================================
// Construction and placement
// =========================================================================

#[test]
fn test_construction() {
  let (grid, loads) = grid();
  assert_eq!(grid.quad_size(), 9);
  assert_eq!(grid.size(), 17);
  assert_eq!(grid.current_cell(), None);
  assert!(grid.terrain().is_empty());
  assert_eq!(loads.load(Ordering::SeqCst), 0);

  let loader = |_: IVec2, q: usize| HeightGrid::flat(q, 0.0);
  assert!(matches!(
    TerrainGrid::new(TerrainConfig::DEFAULT.with_patch_size(5), 16, loader),
    Err(TerrainError::InvalidSize { size: 16 })
  ));
  assert!(matches!(
    TerrainGrid::new(TerrainConfig::DEFAULT.with_patch_size(17), 17, loader),
    Err(TerrainError::PatchTooLarge { .. })
  ));
}

#[test]
fn test_cam_cell_and_centers() {
  let (grid, _) = grid();
  assert_eq!(grid.cam_cell(Vec3::ZERO), IVec2::ZERO);
  assert_eq!(grid.cam_cell(Vec3::new(3.9, 0.0, -3.9)), IVec2::ZERO);
  assert_eq!(grid.cam_cell(Vec3::new(4.0, 0.0, 0.0)), IVec2::new(1, 0));
  assert_eq!(grid.cam_cell(Vec3::new(-4.1, 0.0, 12.0)), IVec2::new(-1, 2));
  assert_eq!(grid.cell_center(IVec2::ZERO), Vec3::new(-4.0, 0.0, -4.0));
  assert_eq!(grid.cell_center(IVec2::new(1, 1)), Vec3::new(4.0, 0.0, 4.0));
}

#[test]
fn test_first_update_loads_window() {
  let (mut grid, loads) = grid();
  let report = grid.update(Vec3::ZERO).unwrap().unwrap();
  assert!(report.teleport);
  assert_eq!(report.attached, 4);
  assert_eq!(report.from, None);
  assert_eq!(report.to, IVec2::ZERO);
  assert_eq!(loads.load(Ordering::SeqCst), 4);
  assert_eq!(grid.current_cell(), Some(IVec2::ZERO));

  for q in Quadrant::ALL {
    let cell = grid.cell_in_slot(q).unwrap();
    assert_eq!(cell, slot_cell(IVec2::ZERO, q));
    let tile = grid.tile_in_slot(q).unwrap();
    assert_eq!(tile.quadrant(), Some(q));
    assert_eq!(tile.translation(), grid.cell_center(cell));
  }
  assert!(grid.update(Vec3::new(1.0, 0.0, -2.0)).unwrap().is_none());
}

#[test]
fn test_heights_continue_across_cells() {
  let (mut grid, _) = grid();
  grid.update(Vec3::ZERO).unwrap();
  for (x, z) in [(-8.0, -8.0), (-3.0, 5.0), (0.0, 0.0), (0.0, 7.0), (6.0, -2.0), (8.0, 8.0)] {
    let expected = x * 0.5 + z;
    assert!((grid.height_at(Vec2::new(x, z)) - expected).abs() < 1e-4, "({x}, {z})");
  }
  assert!(grid.height_at(Vec2::new(8.5, 0.0)).is_nan());
}

#[test]
fn test_slot_finder_links_adjacent_slots() {
  let finder = SlotFinder;
  let id = |q: Quadrant| TileId(u32::from(q.number()));
  assert_eq!(finder.right_quad(id(Quadrant::TopLeft)), Some(id(Quadrant::TopRight)));
  assert_eq!(finder.down_quad(id(Quadrant::TopLeft)), Some(id(Quadrant::BottomLeft)));
  assert_eq!(finder.left_quad(id(Quadrant::BottomRight)), Some(id(Quadrant::BottomLeft)));
  assert_eq!(finder.top_quad(id(Quadrant::BottomRight)), Some(id(Quadrant::TopRight)));
  assert_eq!(finder.left_quad(id(Quadrant::TopLeft)), None);
  assert_eq!(finder.top_quad(id(Quadrant::TopRight)), None);
  assert_eq!(finder.right_quad(TileId(0)), None);
  assert_eq!(finder.right_quad(TileId(9)), None);
}

#[test]
fn test_patches_link_across_slots() {
  let (mut grid, _) = grid();
  grid.update(Vec3::ZERO).unwrap();
  let snapshot = grid.lod_snapshot();
  assert_eq!(snapshot.patches.len(), 16);
  let crossing = snapshot
    .patches
    .iter()
    .filter(|p| p.key.tile == TileId(1))
    .filter_map(|p| p.neighbours[Direction::Right.index()])
    .filter(|k| k.tile == TileId(3))
    .count();
  assert_eq!(crossing, 2);
}

// =========================================================================
// Moves
// =========================================================================

#[test]
fn test_one_cell_move_relocates_two() {
  let (mut grid, loads) = grid();
  grid.update(Vec3::ZERO).unwrap();
  let epoch = grid.epoch();

  let report = grid.update(Vec3::new(8.0, 0.0, 0.0)).unwrap().unwrap();
  assert!(!report.teleport);
  assert_eq!(report.relocated, 2);
  assert_eq!(report.attached, 2);
  assert_eq!(report.detached, 2);
  assert_eq!(grid.current_cell(), Some(IVec2::new(1, 0)));
  assert_eq!(loads.load(Ordering::SeqCst), 6);
  assert!(grid.epoch() > epoch);
  assert_full_window(&grid);

  assert_eq!(
    cells(&grid),
    vec![IVec2::new(1, 0), IVec2::new(1, 1), IVec2::new(2, 0), IVec2::new(2, 1)]
  );
  // The surviving column moved into the left slots.
  assert_eq!(grid.cell_in_slot(Quadrant::TopLeft), Some(IVec2::new(1, 0)));
  assert_eq!(grid.cell_in_slot(Quadrant::BottomLeft), Some(IVec2::new(1, 1)));
  let moved = grid.tile_at_cell(IVec2::new(1, 0)).unwrap();
  assert_eq!(moved.quadrant(), Some(Quadrant::TopLeft));
  assert_eq!(moved.tile(), TileId(1));
  assert_eq!(moved.translation(), Vec3::new(4.0, 0.0, -4.0));
  assert!(grid.is_cached(IVec2::new(0, 0)));
  assert!(grid.is_cached(IVec2::new(0, 1)));
}

#[test]
fn test_teleport_reloads_everything() {
  let (mut grid, loads) = grid();
  grid.update(Vec3::ZERO).unwrap();
  let report = grid.update(Vec3::new(100.0, 0.0, 0.0)).unwrap().unwrap();
  assert!(report.teleport);
  assert_eq!(report.relocated, 0);
  assert_eq!(report.attached, 4);
  assert_eq!(report.detached, 4);
  assert_eq!(grid.current_cell(), Some(IVec2::new(13, 0)));
  assert_eq!(loads.load(Ordering::SeqCst), 8);
  assert_eq!(grid.cached_tiles(), 4);
  assert_full_window(&grid);
}

#[test]
fn test_diagonal_move_runs_as_two_steps() {
  let (mut grid, loads) = grid();
  grid.update(Vec3::ZERO).unwrap();
  let report = grid.update(Vec3::new(8.0, 0.0, 8.0)).unwrap().unwrap();
  assert!(!report.teleport);
  assert_eq!(report.from, Some(IVec2::ZERO));
  assert_eq!(report.to, IVec2::new(1, 1));
  assert_eq!(report.relocated, 4);
  assert_eq!(report.attached, 4);
  assert_eq!(report.detached, 4);
  assert_eq!(loads.load(Ordering::SeqCst), 8);
  assert_eq!(
    cells(&grid),
    vec![IVec2::new(1, 1), IVec2::new(1, 2), IVec2::new(2, 1), IVec2::new(2, 2)]
  );
  assert_full_window(&grid);
}

#[test]
fn test_moving_back_reuses_cached_tiles() {
  let (mut grid, loads) = grid();
  grid.update(Vec3::ZERO).unwrap();
  grid.update(Vec3::new(8.0, 0.0, 0.0)).unwrap();
  let report = grid.update(Vec3::ZERO).unwrap().unwrap();
  assert_eq!(report.attached, 2);
  assert_eq!(report.reused, 2);
  assert_eq!(loads.load(Ordering::SeqCst), 6);
  assert_eq!(grid.cell_in_slot(Quadrant::TopLeft), Some(IVec2::ZERO));
  assert!(grid.is_cached(IVec2::new(2, 0)));
  assert!(!grid.is_cached(IVec2::ZERO));
  assert_full_window(&grid);
}

#[test]
fn test_cache_capacity_bounds_reuse() {
  let loads = Arc::new(AtomicUsize::new(0));
  let mut grid = grid_with(Arc::clone(&loads)).with_grid_config(GridConfig {
    tile_cache_capacity: 1,
  });
  grid.update(Vec3::ZERO).unwrap();
  grid.update(Vec3::new(8.0, 0.0, 0.0)).unwrap();
  assert_eq!(grid.cached_tiles(), 1);
  assert_full_window(&grid);
  let report = grid.update(Vec3::ZERO).unwrap().unwrap();
  assert_eq!(report.reused, 1);
  assert_eq!(loads.load(Ordering::SeqCst), 7);
  assert_full_window(&grid);
}

#[test]
fn test_tiny_cache_keeps_window_full_while_walking() {
  let loads = Arc::new(AtomicUsize::new(0));
  let mut grid = grid_with(Arc::clone(&loads)).with_grid_config(GridConfig {
    tile_cache_capacity: 1,
  });
  let walk = [
    (0.0, 0.0),
    (8.0, 0.0),
    (0.0, 0.0),
    (8.0, 8.0),
    (0.0, 0.0),
    (-8.0, 8.0),
    (-8.0, 0.0),
    (0.0, -8.0),
    (100.0, 100.0),
    (92.0, 100.0),
  ];
  for (x, z) in walk {
    grid.update(Vec3::new(x, 0.0, z)).unwrap();
    assert_full_window(&grid);
    assert!(grid.cached_tiles() <= 1);
    assert!((grid.height_at(Vec2::new(x, z)) - (x * 0.5 + z)).abs() < 1e-4, "({x}, {z})");
  }
}

#[test]
fn test_listener_order() {
  let (mut grid, _) = grid();
  let recorder = Recorder::default();
  grid.add_listener(recorder.clone());

  grid.update(Vec3::ZERO).unwrap();
  let first = recorder.take();
  assert_eq!(first.len(), 5);
  assert!(first[..4].iter().all(|e| matches!(e, Event::Attached(_))));
  assert_eq!(first[4], Event::Moved(Vec3::ZERO));

  grid.update(Vec3::new(8.0, 0.0, 0.0)).unwrap();
  assert_eq!(
    recorder.take(),
    vec![
      Event::Detached(IVec2::new(0, 0)),
      Event::Detached(IVec2::new(0, 1)),
      Event::Attached(IVec2::new(2, 0)),
      Event::Attached(IVec2::new(2, 1)),
      Event::Moved(Vec3::new(8.0, 0.0, 0.0)),
    ]
  );
}

#[test]
fn test_failed_load_leaves_grid_untouched() {
  let loader = |cell: IVec2, quad_size: usize| {
    if cell.x >= 2 {
      return Err(TerrainError::TileLoad {
        x: cell.x,
        z: cell.y,
        reason: "out of world".into(),
      });
    }
    HeightGrid::flat(quad_size, 0.0)
  };
  let mut grid = TerrainGrid::new(TerrainConfig::DEFAULT.with_patch_size(5), 17, loader).unwrap();
  grid.update(Vec3::ZERO).unwrap();
  let epoch = grid.epoch();

  assert!(matches!(
    grid.update(Vec3::new(8.0, 0.0, 0.0)),
    Err(TerrainError::TileLoad { x: 2, .. })
  ));
  assert_eq!(grid.current_cell(), Some(IVec2::ZERO));
  assert_eq!(grid.terrain().len(), 4);
  assert_eq!(grid.epoch(), epoch);
  assert_eq!(grid.cached_tiles(), 0);
}

#[test]
fn test_failed_diagonal_second_step_leaves_grid_untouched() {
  let loader = |cell: IVec2, quad_size: usize| {
    if cell.y >= 2 {
      return Err(TerrainError::TileLoad {
        x: cell.x,
        z: cell.y,
        reason: "out of world".into(),
      });
    }
    HeightGrid::flat(quad_size, 0.0)
  };
  let mut grid = TerrainGrid::new(TerrainConfig::DEFAULT.with_patch_size(5), 17, loader).unwrap();
  grid.update(Vec3::ZERO).unwrap();
  let epoch = grid.epoch();

  assert!(matches!(
    grid.update(Vec3::new(8.0, 0.0, 8.0)),
    Err(TerrainError::TileLoad { z: 2, .. })
  ));
  assert_eq!(grid.current_cell(), Some(IVec2::ZERO));
  assert_eq!(cells(&grid), vec![IVec2::new(0, 0), IVec2::new(0, 1), IVec2::new(1, 0), IVec2::new(1, 1)]);
  assert_eq!(grid.epoch(), epoch);
  assert_eq!(grid.cached_tiles(), 0);
  assert_full_window(&grid);

  // The x step alone is still reachable.
  grid.update(Vec3::new(8.0, 0.0, 0.0)).unwrap();
  assert_eq!(grid.current_cell(), Some(IVec2::new(1, 0)));
  assert_full_window(&grid);
}

#[test]
fn test_wrong_tile_size_is_rejected() {
  let loader = |_: IVec2, _: usize| HeightGrid::flat(5, 0.0);
  let mut grid = TerrainGrid::new(TerrainConfig::DEFAULT.with_patch_size(5), 17, loader).unwrap();
  assert!(matches!(grid.update(Vec3::ZERO), Err(TerrainError::TileLoad { .. })));
  assert_eq!(grid.current_cell(), None);
}

// =========================================================================
// Edits and LOD
// =========================================================================

#[test]
fn test_edit_on_cell_border_reaches_both_tiles() {
  let (mut grid, _) = grid();
  grid.update(Vec3::ZERO).unwrap();
  let applied = grid.set_heights(&[HeightEdit::new(0.0, -4.0, 50.0)], HeightMode::Override);
  assert_eq!(applied, 2);
  grid.update_normals();
  assert_eq!(grid.height_at(Vec2::new(0.0, -4.0)), 50.0);
  for q in [Quadrant::TopLeft, Quadrant::TopRight] {
    let tile = grid.tile_in_slot(q).unwrap();
    assert_eq!(tile.height_at(Vec2::new(0.0, -4.0)), 50.0, "{q:?}");
  }
}

fn wavy(x: f32, z: f32) -> f32 {
  (0.7 * x).sin() * 4.0 + (0.5 * z).cos() * 3.0
}

#[test]
fn test_normals_agree_across_slot_seams() {
  let loader = FnTileLoader::new(wavy);
  let mut grid = TerrainGrid::new(TerrainConfig::DEFAULT.with_patch_size(5), 17, loader).unwrap();
  grid.update(Vec3::new(9.0, 0.0, 0.0)).unwrap();
  assert_eq!(grid.current_cell(), Some(IVec2::new(1, 0)));

  let seam = |grid: &TerrainGrid| {
    let left = grid.tile_in_slot(Quadrant::TopLeft).unwrap().normal_at(Vec2::new(8.0, -3.0)).unwrap();
    let right = grid.tile_in_slot(Quadrant::TopRight).unwrap().normal_at(Vec2::new(8.0, -3.0)).unwrap();
    (left, right)
  };

  let (left, right) = seam(&grid);
  assert!(left.dot(right) > 0.9999, "{left} vs {right}");
  let expected = stencil_normal(
    wavy(8.0, -3.0),
    [Some(wavy(8.0, -4.0)), Some(wavy(7.0, -3.0)), Some(wavy(8.0, -2.0)), Some(wavy(9.0, -3.0))],
    Vec3::ONE,
  );
  assert!(left.dot(expected) > 0.9999, "{left} vs {expected}");

  // Top and bottom slots share the z seam too.
  let top = grid.tile_in_slot(Quadrant::TopRight).unwrap().normal_at(Vec2::new(11.0, 0.0)).unwrap();
  let bottom = grid.tile_in_slot(Quadrant::BottomRight).unwrap().normal_at(Vec2::new(11.0, 0.0)).unwrap();
  assert!(top.dot(bottom) > 0.9999, "{top} vs {bottom}");

  // Raising a sample that only the right tree holds tilts the left tree's
  // border normal as well.
  grid.set_heights(&[HeightEdit::new(9.0, -3.0, 6.0)], HeightMode::Add);
  grid.update_normals();
  let (edited_left, edited_right) = seam(&grid);
  assert!(edited_left.dot(edited_right) > 0.9999, "{edited_left} vs {edited_right}");
  assert!(edited_left.dot(left) < 0.999);
}

#[test]
fn test_lod_control_drives_grid_and_drops_stale_updates() {
  let (mut grid, _) = grid();
  grid.update(Vec3::ZERO).unwrap();
  let mut control = TerrainLodControl::new(DistanceLodCalculator::with_multiplier(1.0));
  let far = Vec3::new(3.0, 0.0, 500.0);

  assert_eq!(control.update(&mut grid, &[far]).unwrap().status, TickStatus::Scheduled);
  assert!(control.wait_idle(Duration::from_secs(10)));
  let tick = control.update(&mut grid, &[far]).unwrap();
  assert_eq!(tick.applied, 16);

  control.force_update();
  control.update(&mut grid, &[Vec3::ZERO]).unwrap();
  assert!(control.wait_idle(Duration::from_secs(10)));
  grid.update(Vec3::new(8.0, 0.0, 0.0)).unwrap();
  let tick = control.update(&mut grid, &[Vec3::ZERO]).unwrap();
  assert!(tick.discarded);
  assert_eq!(tick.status, TickStatus::Scheduled);
  assert!(control.wait_idle(Duration::from_secs(10)));
}
