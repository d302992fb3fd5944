//! Flythrough configuration, read from TOML.

use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;
use terrain_plugin::{is_valid_side, GridConfig, LodSettings, TerrainConfig};

/// Root configuration.
///
/// Every section is optional; missing values fall back to the defaults below.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Config {
  pub mode: Mode,
  /// Samples per side: the whole tree in `single` mode, the visible window
  /// in `grid` mode.
  pub size: usize,
  pub terrain: TerrainConfig,
  pub lod: LodSettings,
  pub grid: GridConfig,
  pub heights: HeightsConfig,
  pub flight: FlightConfig,
}

/// Which terrain the flythrough drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
  /// One tree of `size` samples.
  Single,
  /// A paging window of `size` samples.
  Grid,
}

/// Procedural height function: a sum of sine octaves.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HeightsConfig {
  pub amplitude: f32,
  /// Cycles per sample of the first octave.
  pub frequency: f32,
  pub octaves: u32,
  /// Amplitude falloff per octave.
  pub persistence: f32,
  pub seed: u32,
}

/// Viewer path and frame loop.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FlightConfig {
  pub frames: usize,
  /// World units per frame.
  pub speed: f32,
  /// Height above ground.
  pub altitude: f32,
  /// Closed loop of `[x, z]` world positions.
  pub waypoints: Vec<[f32; 2]>,
  /// Simulated frame time in milliseconds.
  pub frame_ms: u64,
  /// Dig a crater under the viewer every this many frames (0 = never).
  pub edit_every: usize,
}

impl Default for Config {
  fn default() -> Self {
    Self {
      mode: Mode::Grid,
      size: 257,
      terrain: TerrainConfig::DEFAULT.with_patch_size(33),
      lod: LodSettings::DEFAULT,
      grid: GridConfig::default(),
      heights: HeightsConfig::default(),
      flight: FlightConfig::default(),
    }
  }
}

impl Default for HeightsConfig {
  fn default() -> Self {
    Self {
      amplitude: 40.0,
      frequency: 0.004,
      octaves: 4,
      persistence: 0.5,
      seed: 7,
    }
  }
}

impl Default for FlightConfig {
  fn default() -> Self {
    Self {
      frames: 600,
      speed: 2.0,
      altitude: 12.0,
      waypoints: vec![[0.0, 0.0], [300.0, 40.0], [320.0, 360.0], [-80.0, 300.0]],
      frame_ms: 4,
      edit_every: 150,
    }
  }
}

impl Config {
  /// Load configuration from a TOML file.
  pub fn load(path: &Path) -> Result<Self> {
    let content =
      std::fs::read_to_string(path).with_context(|| format!("Failed to read config file: {}", path.display()))?;
    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config TOML")?;
    config.validate()?;
    Ok(config)
  }

  pub fn validate(&self) -> Result<()> {
    if !is_valid_side(self.size) {
      anyhow::bail!("size must be 2^k + 1, got {}", self.size);
    }
    let tree_size = match self.mode {
      Mode::Single => self.size,
      Mode::Grid => (self.size + 1) >> 1,
    };
    self
      .terrain
      .validate(tree_size)
      .with_context(|| format!("Invalid terrain settings for trees of {tree_size} samples"))?;
    if self.flight.waypoints.is_empty() {
      anyhow::bail!("flight.waypoints must hold at least one position");
    }
    if !(self.flight.speed >= 0.0) {
      anyhow::bail!("flight.speed must be non-negative, got {}", self.flight.speed);
    }
    Ok(())
  }
}
