//! Procedural heights and the viewer's path.

use glam::{Vec2, Vec3};

use crate::config::{FlightConfig, HeightsConfig};

/// Height at global sample `(x, z)`.
pub fn height(cfg: &HeightsConfig, x: f32, z: f32) -> f32 {
  let phase = cfg.seed as f32 * 1.618;
  let mut amplitude = cfg.amplitude;
  let mut frequency = cfg.frequency * std::f32::consts::TAU;
  let mut sum = 0.0;
  for octave in 0..cfg.octaves {
    let o = octave as f32;
    sum += amplitude * ((x * frequency + phase + o).sin() * (z * frequency * 0.87 - phase * 0.5 + o * 1.3).cos());
    amplitude *= cfg.persistence;
    frequency *= 2.03;
  }
  sum
}

/// Constant-speed walk around a closed loop of waypoints.
pub struct FlightPath {
  points: Vec<Vec2>,
  lengths: Vec<f32>,
  total: f32,
  speed: f32,
  altitude: f32,
}

impl FlightPath {
  pub fn new(cfg: &FlightConfig) -> Self {
    let points: Vec<Vec2> = cfg.waypoints.iter().map(|&[x, z]| Vec2::new(x, z)).collect();
    let lengths: Vec<f32> = (0..points.len())
      .map(|i| points[i].distance(points[(i + 1) % points.len()]))
      .collect();
    let total = lengths.iter().sum();
    Self {
      points,
      lengths,
      total,
      speed: cfg.speed,
      altitude: cfg.altitude,
    }
  }

  /// Ground position after `frame` frames.
  pub fn position(&self, frame: usize) -> Vec2 {
    let Some(&first) = self.points.first() else {
      return Vec2::ZERO;
    };
    if self.total <= 0.0 {
      return first;
    }
    let mut travelled = (frame as f32 * self.speed) % self.total;
    for (i, &len) in self.lengths.iter().enumerate() {
      if travelled <= len && len > 0.0 {
        let next = self.points[(i + 1) % self.points.len()];
        return self.points[i].lerp(next, travelled / len);
      }
      travelled -= len;
    }
    first
  }

  /// Viewer position after `frame` frames, `altitude` above `ground`.
  pub fn viewer(&self, frame: usize, ground: impl Fn(Vec2) -> f32) -> Vec3 {
    let p = self.position(frame);
    let h = ground(p);
    let y = if h.is_nan() { 0.0 } else { h } + self.altitude;
    Vec3::new(p.x, y, p.y)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn square() -> FlightPath {
    FlightPath::new(&FlightConfig {
      speed: 5.0,
      altitude: 2.0,
      waypoints: vec![[0.0, 0.0], [10.0, 0.0], [10.0, 10.0], [0.0, 10.0]],
      ..FlightConfig::default()
    })
  }

  #[test]
  fn test_walks_the_loop() {
    let path = square();
    assert_eq!(path.position(0), Vec2::ZERO);
    assert_eq!(path.position(1), Vec2::new(5.0, 0.0));
    assert_eq!(path.position(3), Vec2::new(10.0, 5.0));
    assert_eq!(path.position(8), Vec2::ZERO);
  }

  #[test]
  fn test_viewer_rides_above_ground() {
    let path = square();
    assert_eq!(path.viewer(1, |_| 3.0), Vec3::new(5.0, 5.0, 0.0));
    assert_eq!(path.viewer(1, |_| f32::NAN).y, 2.0);
  }

  #[test]
  fn test_heights_are_deterministic_and_bounded() {
    let cfg = HeightsConfig::default();
    let bound: f32 = (0..cfg.octaves).map(|o| cfg.amplitude * cfg.persistence.powi(o as i32)).sum();
    for (x, z) in [(0.0, 0.0), (13.0, -7.5), (1000.0, 250.0)] {
      let h = height(&cfg, x, z);
      assert_eq!(h, height(&cfg, x, z));
      assert!(h.abs() <= bound + 1e-3);
    }
  }
}
