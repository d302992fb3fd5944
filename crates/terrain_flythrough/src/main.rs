//! Headless terrain flythrough.
//!
//! Flies a viewer around a loop of waypoints over procedural terrain, driving
//! background LOD updates every frame and, in grid mode, paging trees in and
//! out as the viewer crosses cells. Periodically digs a crater under the
//! viewer to exercise height edits. Logs a summary at the end.
//!
//! ```text
//! RUST_LOG=terrain_plugin=debug terrain_flythrough --config flythrough.toml
//! ```

mod config;
mod flight;

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use glam::{IVec2, Vec2, Vec3};
use terrain_plugin::grid::FnTileLoader;
use terrain_plugin::{
  HeightEdit, HeightGrid, HeightMode, LodTerrain, TerrainGrid, TerrainGridListener, TerrainLodControl, TerrainQuad,
  TickStatus,
};
use tracing_subscriber::EnvFilter;

use config::{Config, Mode};
use flight::FlightPath;

/// Geomipmap terrain flythrough.
#[derive(Parser, Debug)]
#[command(name = "terrain_flythrough")]
#[command(about = "Flies a viewer over paged geomipmap terrain and reports LOD statistics")]
struct Args {
  /// Path to configuration TOML file (defaults are used when omitted).
  #[arg(short, long)]
  config: Option<PathBuf>,

  /// Override the number of frames to fly.
  #[arg(short, long)]
  frames: Option<usize>,
}

const CRATER_RADIUS: f32 = 6.0;
const CRATER_DEPTH: f32 = 4.0;

/// The terrain being flown over.
enum Scene {
  Single(TerrainQuad),
  Grid(TerrainGrid),
}

impl Scene {
  fn build(config: &Config) -> Result<Self> {
    let heights = config.heights.clone();
    match config.mode {
      Mode::Single => {
        let grid = HeightGrid::from_fn(config.size, |x, z| flight::height(&heights, x as f32, z as f32))?;
        // Centre the tree on sample (0, 0) of the height function.
        let half = (config.size - 1) as f32 * 0.5;
        let mut quad = TerrainQuad::new(config.terrain.clone(), &grid)?;
        quad.set_translation(Vec3::new(half, 0.0, half) * config.terrain.step_scale);
        Ok(Scene::Single(quad))
      }
      Mode::Grid => {
        let loader = FnTileLoader::new(move |x, z| flight::height(&heights, x, z));
        let mut grid =
          TerrainGrid::new(config.terrain.clone(), config.size, loader)?.with_grid_config(config.grid);
        grid.add_listener(PagingLog);
        Ok(Scene::Grid(grid))
      }
    }
  }

  fn ground(&self, xz: Vec2) -> f32 {
    match self {
      Scene::Single(quad) => quad.height_at(xz),
      Scene::Grid(grid) => grid.height_at(xz),
    }
  }

  /// Page the grid towards the viewer. No-op for a single tree.
  fn follow(&mut self, viewer: Vec3) -> Result<()> {
    if let Scene::Grid(grid) = self {
      if let Some(moved) = grid.update(viewer)? {
        tracing::info!(
          from = ?moved.from,
          to = ?moved.to,
          attached = moved.attached,
          reused = moved.reused,
          teleport = moved.teleport,
          "grid moved"
        );
      }
    }
    Ok(())
  }

  fn lod_terrain(&mut self) -> &mut dyn LodTerrain {
    match self {
      Scene::Single(quad) => quad,
      Scene::Grid(grid) => grid,
    }
  }

  fn dig(&mut self, center: Vec2, spacing: f32) -> usize {
    let edits = crater(center, spacing);
    match self {
      Scene::Single(quad) => {
        let changed = quad.set_heights(&edits, HeightMode::Add);
        quad.update_normals();
        changed
      }
      Scene::Grid(grid) => {
        let changed = grid.set_heights(&edits, HeightMode::Add);
        grid.update_normals();
        changed
      }
    }
  }

  /// (patches, triangles, patches per level)
  fn summary(&self) -> (usize, usize, Vec<usize>) {
    let quads: Vec<&TerrainQuad> = match self {
      Scene::Single(quad) => vec![quad],
      Scene::Grid(grid) => grid.terrain().tiles().collect(),
    };
    let mut patches = 0;
    let mut triangles = 0;
    let mut levels = Vec::new();
    for patch in quads.iter().flat_map(|q| q.patches()) {
      patches += 1;
      triangles += patch.mesh().strip_triangle_count();
      let lod = patch.lod() as usize;
      if levels.len() <= lod {
        levels.resize(lod + 1, 0);
      }
      levels[lod] += 1;
    }
    (patches, triangles, levels)
  }
}

/// Edits lowering a cone around `center`.
fn crater(center: Vec2, spacing: f32) -> Vec<HeightEdit> {
  let reach = (CRATER_RADIUS / spacing).ceil() as i32;
  let mut edits = Vec::new();
  for dz in -reach..=reach {
    for dx in -reach..=reach {
      let offset = Vec2::new(dx as f32, dz as f32) * spacing;
      let falloff = 1.0 - offset.length() / CRATER_RADIUS;
      if falloff > 0.0 {
        let p = center + offset;
        edits.push(HeightEdit::new(p.x, p.y, -CRATER_DEPTH * falloff));
      }
    }
  }
  edits
}

/// Logs tiles entering and leaving the window.
struct PagingLog;

impl TerrainGridListener for PagingLog {
  fn tile_attached(&mut self, cell: IVec2, tile: &TerrainQuad) {
    tracing::debug!(?cell, slot = ?tile.quadrant(), "tile attached");
  }

  fn tile_detached(&mut self, cell: IVec2, _tile: &TerrainQuad) {
    tracing::debug!(?cell, "tile detached");
  }
}

fn main() -> Result<()> {
  let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
  tracing_subscriber::fmt().with_env_filter(filter).init();

  let args = Args::parse();
  let mut config = match &args.config {
    Some(path) => {
      tracing::info!("Loading config from: {}", path.display());
      Config::load(path)?
    }
    None => {
      let config = Config::default();
      config.validate()?;
      config
    }
  };
  if let Some(frames) = args.frames {
    config.flight.frames = frames;
  }

  tracing::info!(
    mode = ?config.mode,
    size = config.size,
    patch_size = config.terrain.patch_size,
    frames = config.flight.frames,
    "starting flythrough"
  );

  let mut scene = Scene::build(&config).context("Failed to build terrain")?;
  let mut control = TerrainLodControl::with_settings(config.lod);
  let path = FlightPath::new(&config.flight);
  let spacing = config.terrain.step_scale.x;
  let frame_time = Duration::from_millis(config.flight.frame_ms);

  let mut scheduled = 0usize;
  let mut applied = 0usize;
  let mut busy = 0usize;
  let mut discarded = 0usize;

  for frame in 0..config.flight.frames {
    // Page first so the ground query sees the tiles around the new position.
    let ground_xz = path.position(frame);
    scene.follow(Vec3::new(ground_xz.x, 0.0, ground_xz.y))?;
    let viewer = path.viewer(frame, |xz| scene.ground(xz));

    if config.flight.edit_every > 0 && frame > 0 && frame % config.flight.edit_every == 0 {
      let changed = scene.dig(ground_xz, spacing);
      tracing::info!(frame, changed, "dug crater");
    }

    let tick = control
      .update(scene.lod_terrain(), &[viewer])
      .with_context(|| format!("LOD update failed at frame {frame}"))?;
    applied += tick.applied;
    discarded += usize::from(tick.discarded);
    match tick.status {
      TickStatus::Scheduled => scheduled += 1,
      TickStatus::Busy => busy += 1,
      TickStatus::NoViewer | TickStatus::Skipped => {}
    }

    std::thread::sleep(frame_time);
  }

  // Apply whatever is still in flight before reporting.
  if control.wait_idle(Duration::from_secs(5)) {
    let tick = control.update(scene.lod_terrain(), &[])?;
    applied += tick.applied;
    discarded += usize::from(tick.discarded);
  } else {
    tracing::warn!("LOD worker still busy at exit");
  }

  let (patches, triangles, levels) = scene.summary();
  tracing::info!(scheduled, busy, applied, discarded, "LOD cycles");
  tracing::info!(patches, triangles, ?levels, "final mesh");
  if let Some(stats) = control.last_stats() {
    tracing::info!(
      select_us = stats.select_us,
      propagate_us = stats.propagate_us,
      fix_edges_us = stats.fix_edges_us,
      reindex_us = stats.reindex_us,
      "last cycle"
    );
  }
  let metrics = control.metrics();
  tracing::info!(
    cycles = metrics.cycles_applied,
    avg_cycle_us = metrics.avg_cycle_us(),
    stale = metrics.stale_discarded,
    "metrics"
  );

  Ok(())
}
