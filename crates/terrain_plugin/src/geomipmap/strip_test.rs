use std::collections::HashSet;

use super::*;

/// Non-degenerate triangles of a strip with their doubled signed xz area.
fn triangles(width: usize, strip: &[u32]) -> Vec<([u32; 3], i64)> {
  let mut out = Vec::new();
  for k in 0..strip.len().saturating_sub(2) {
    let (mut a, mut b, c) = (strip[k], strip[k + 1], strip[k + 2]);
    if a == b || b == c || a == c {
      continue;
    }
    if k % 2 == 1 {
      std::mem::swap(&mut a, &mut b);
    }
    let p = |i: u32| ((i as usize % width) as i64, (i as usize / width) as i64);
    let (pa, pb, pc) = (p(a), p(b), p(c));
    let area = (pb.0 - pa.0) * (pc.1 - pa.1) - (pb.1 - pa.1) * (pc.0 - pa.0);
    out.push(([a, b, c], area));
  }
  out
}

/// Checks the strip tiles the patch exactly once with one winding and no
/// vertex on a coarse edge that the neighbour doesn't render.
fn assert_watertight(width: usize, step: u32, ratios: [usize; 4], strip: &[u32]) {
  let s = step as usize;
  let [kr, kt, kl, kb] = ratios;
  let ctx = format!("width {width} step {step} ratios {ratios:?}");

  assert!(strip.iter().all(|&i| (i as usize) < width * width), "{ctx}: index out of range");

  let tris = triangles(width, strip);
  let mut total = 0i64;
  let mut used = HashSet::new();
  for (verts, area) in &tris {
    if *area == 0 {
      continue;
    }
    assert!(*area < 0, "{ctx}: triangle {verts:?} wound the wrong way");
    total -= area;
    for &v in verts {
      let (c, r) = (v as usize % width, v as usize / width);
      assert!(r % s == 0 && c % s == 0, "{ctx}: {v} is off the lattice");
      assert!(!(c == width - 1 && (r / s) % kr != 0), "{ctx}: dangling right vertex {v}");
      assert!(!(r == 0 && (c / s) % kt != 0), "{ctx}: dangling top vertex {v}");
      assert!(!(c == 0 && (r / s) % kl != 0), "{ctx}: dangling left vertex {v}");
      assert!(!(r == width - 1 && (c / s) % kb != 0), "{ctx}: dangling bottom vertex {v}");
      used.insert(v);
    }
  }
  let cells = (width - 1) as i64;
  assert_eq!(total, 2 * cells * cells, "{ctx}: coverage gap or overlap");

  // Every lattice vertex the seams keep must be referenced.
  for r in (0..width).step_by(s) {
    for c in (0..width).step_by(s) {
      let skipped = (c == width - 1 && (r / s) % kr != 0)
        || (r == 0 && (c / s) % kt != 0)
        || (c == 0 && (r / s) % kl != 0)
        || (r == width - 1 && (c / s) % kb != 0);
      if !skipped {
        assert!(used.contains(&((r * width + c) as u32)), "{ctx}: ({c}, {r}) unused");
      }
    }
  }
}

// =========================================================================
// Basic shape
// =========================================================================

#[test]
fn test_five_by_five_full_detail_strip() {
  let strip = write_index_strip(5, 1, SeamSteps::uniform(1), SeamMode::Binary).unwrap();
  let expected: Vec<u32> = vec![
    6, 11, 7, 12, 8, 13, 13, 11, 11, 16, 12, 17, 13, 18, 18, 24, 24, 19, 18, 14, 13, 9, 8, 4, 8, 3,
    7, 2, 6, 1, 0, 0, 0, 5, 6, 10, 11, 15, 16, 20, 16, 21, 17, 22, 18, 23, 24,
  ];
  assert_eq!(&strip[..expected.len()], expected.as_slice());
  assert!(strip[expected.len()..].iter().all(|&i| i == 24));
  assert_eq!(strip.len(), estimate_index_count(5, 1));
}

#[test]
fn test_step_zero_is_full_detail() {
  let a = write_index_strip(9, 0, SeamSteps::uniform(1), SeamMode::Binary).unwrap();
  let b = write_index_strip(9, 1, SeamSteps::uniform(1), SeamMode::Binary).unwrap();
  assert_eq!(a, b);
}

#[test]
fn test_same_level_strips_are_watertight() {
  for width in [5usize, 9, 17, 33, 65] {
    let mut step = 1u32;
    while (width - 1) / step as usize >= 2 {
      let strip = write_index_strip(width, step, SeamSteps::uniform(step), SeamMode::Binary).unwrap();
      assert_eq!(strip.len(), estimate_index_count(width, step));
      assert_watertight(width, step, [1; 4], &strip);
      step *= 2;
    }
  }
}

// =========================================================================
// Seams
// =========================================================================

#[test]
fn test_binary_seams_are_watertight() {
  for width in [5usize, 9, 17, 33] {
    let mut step = 1u32;
    while (width - 1) / step as usize >= 2 {
      for mask in 0..16u32 {
        let side = |bit: u32| if mask & (1 << bit) != 0 { step * 2 } else { step };
        let seams = SeamSteps {
          right: side(0),
          top: side(1),
          left: side(2),
          bottom: side(3),
        };
        let ratios = [0, 1, 2, 3].map(|bit| if mask & (1 << bit) != 0 { 2 } else { 1 });
        let strip = write_index_strip(width, step, seams, SeamMode::Binary).unwrap();
        assert_watertight(width, step, ratios, &strip);
      }
      step *= 2;
    }
  }
}

#[test]
fn test_proportional_seams_are_watertight() {
  let width = 17usize;
  let mut step = 1u32;
  while (width - 1) / step as usize >= 2 {
    let cells = (width - 1) / step as usize;
    let ratios: Vec<usize> = [1usize, 2, 4, 8].into_iter().filter(|&k| k <= cells).collect();
    for &kr in &ratios {
      for &kt in &ratios {
        for &kl in &ratios {
          for &kb in &ratios {
            let seams = SeamSteps {
              right: step * kr as u32,
              top: step * kt as u32,
              left: step * kl as u32,
              bottom: step * kb as u32,
            };
            let strip = write_index_strip(width, step, seams, SeamMode::Proportional).unwrap();
            assert_watertight(width, step, [kr, kt, kl, kb], &strip);
          }
        }
      }
    }
    step *= 2;
  }
}

#[test]
fn test_proportional_matches_binary_for_one_level_difference() {
  let seams = SeamSteps {
    right: 4,
    top: 2,
    left: 4,
    bottom: 2,
  };
  let binary = write_index_strip(33, 2, seams, SeamMode::Binary).unwrap();
  let proportional = write_index_strip(33, 2, seams, SeamMode::Proportional).unwrap();
  assert_eq!(binary, proportional);
}

#[test]
fn test_binary_treats_any_coarser_neighbour_as_one_level() {
  let two = write_index_strip(17, 1, SeamSteps { right: 2, ..SeamSteps::uniform(1) }, SeamMode::Binary).unwrap();
  let eight = write_index_strip(17, 1, SeamSteps { right: 8, ..SeamSteps::uniform(1) }, SeamMode::Binary).unwrap();
  assert_eq!(two, eight);
}

#[test]
fn test_proportional_clamps_ratio_to_patch_cells() {
  // Neighbour 16x coarser on a 4-cell patch collapses the edge to one segment.
  let seams = SeamSteps {
    top: 16,
    ..SeamSteps::uniform(1)
  };
  let strip = write_index_strip(5, 1, seams, SeamMode::Proportional).unwrap();
  assert_watertight(5, 1, [1, 4, 1, 1], &strip);
}

#[test]
fn test_finer_or_missing_neighbours_stitch_as_same_level() {
  let same = write_index_strip(9, 2, SeamSteps::uniform(2), SeamMode::Binary).unwrap();
  let finer = write_index_strip(9, 2, SeamSteps::uniform(1), SeamMode::Binary).unwrap();
  let missing = write_index_strip(9, 2, SeamSteps::uniform(0), SeamMode::Binary).unwrap();
  assert_eq!(same, finer);
  assert_eq!(same, missing);
}

// =========================================================================
// Errors
// =========================================================================

#[test]
fn test_rejects_steps_without_two_cells() {
  assert!(matches!(
    write_index_strip(9, 8, SeamSteps::uniform(8), SeamMode::Binary),
    Err(TerrainError::InvalidLod { step: 8, width: 9 })
  ));
  assert!(write_index_strip(9, 3, SeamSteps::uniform(3), SeamMode::Binary).is_err());
}

#[test]
fn test_into_rejects_short_buffer() {
  let mut store = vec![0u32; 10];
  let err = write_index_strip_into(9, 1, SeamSteps::uniform(1), SeamMode::Binary, &mut store).unwrap_err();
  assert!(matches!(err, TerrainError::BufferTooSmall { actual: 10, .. }));
}

#[test]
fn test_into_writes_only_the_estimate() {
  let needed = estimate_index_count(9, 2);
  let mut store = vec![u32::MAX; needed + 8];
  let written = write_index_strip_into(9, 2, SeamSteps::uniform(2), SeamMode::Binary, &mut store).unwrap();
  assert_eq!(written, needed);
  assert!(store[needed..].iter().all(|&i| i == u32::MAX));
}
