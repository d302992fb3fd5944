use glam::{Vec2, Vec3};

use super::*;

fn hills(size: usize) -> HeightGrid {
  HeightGrid::from_fn(size, |x, z| ((x as f32) * 0.7).sin() * 3.0 + ((z as f32) * 0.4).cos() * 2.0).unwrap()
}

// =========================================================================
// Vertex attributes
// =========================================================================

#[test]
fn test_positions_are_scaled_row_major() {
  let grid = hills(9);
  let config = MeshBuildConfig::DEFAULT.with_scale(Vec3::new(2.0, 0.5, 3.0));
  let positions = PatchMeshBuilder::new(&grid, &config).positions();
  assert_eq!(positions.len(), 81);
  let p = positions[vertex_index(3, 5, 9)];
  assert_eq!(p, Vec3::new(6.0, grid.height_at(3, 5) * 0.5, 15.0));
}

#[test]
fn test_flat_patch_has_up_normals_and_axis_tangents() {
  let grid = HeightGrid::flat(5, 4.0).unwrap();
  let config = MeshBuildConfig::default();
  let mesh = PatchMeshBuilder::new(&grid, &config).build(1, SeamSteps::uniform(1)).unwrap();
  assert!(mesh.normals.iter().all(|&n| n == Vec3::Y));
  assert!(mesh.tangents.iter().all(|&t| t == Vec3::X));
  assert!(mesh.binormals.iter().all(|&b| b == Vec3::Z));
}

#[test]
fn test_tangent_frame_is_orthogonal_to_normal() {
  let grid = hills(17);
  let config = MeshBuildConfig::default();
  let builder = PatchMeshBuilder::new(&grid, &config);
  let normals = builder.normals();
  let (tangents, binormals) = tangent_frames(&normals);
  for ((n, t), b) in normals.iter().zip(&tangents).zip(&binormals) {
    assert!(n.dot(*t).abs() < 1e-5);
    assert!(n.dot(*b).abs() < 1e-5);
    assert!((t.length() - 1.0).abs() < 1e-5);
  }
}

#[test]
fn test_texcoords_span_the_whole_tree() {
  // Patch covering the bottom-right quarter of a 9-sample tree.
  let grid = hills(5);
  let config = MeshBuildConfig::DEFAULT.with_total_size(9).with_sample_origin(4, 4);
  let uv = PatchMeshBuilder::new(&grid, &config).texcoords();
  assert_eq!(uv[vertex_index(0, 0, 5)], Vec2::new(0.5, 0.5));
  assert_eq!(uv[vertex_index(4, 4, 5)], Vec2::new(1.0, 0.0));
  assert_eq!(uv[vertex_index(4, 0, 5)], Vec2::new(1.0, 0.5));
}

#[test]
fn test_texcoords_apply_offset_and_scale() {
  let grid = hills(5);
  let config = MeshBuildConfig::DEFAULT
    .with_tex_offset(Vec2::new(2.0, 1.0), 0.5)
    .with_tex_scale(Vec2::splat(2.0));
  let uv = PatchMeshBuilder::new(&grid, &config).texcoords();
  // u = (0 + 2 + 0.5) / 4 * 2, v = (4 - 0 - 1 + 0.5) / 4 * 2
  assert_eq!(uv[0], Vec2::new(1.25, 1.75));
}

// =========================================================================
// Buffers
// =========================================================================

#[test]
fn test_build_uses_configured_seam_mode() {
  let grid = hills(17);
  let seams = SeamSteps {
    left: 8,
    ..SeamSteps::uniform(1)
  };
  let binary = MeshBuildConfig::default();
  let proportional = MeshBuildConfig::DEFAULT.with_seam_mode(SeamMode::Proportional);
  let a = PatchMeshBuilder::new(&grid, &binary).build(1, seams).unwrap();
  let b = PatchMeshBuilder::new(&grid, &proportional).build(1, seams).unwrap();
  assert_eq!(a.positions, b.positions);
  assert_ne!(a.indices, b.indices);
}

#[test]
fn test_write_positions_into_rejects_short_buffer() {
  let grid = hills(9);
  let config = MeshBuildConfig::default();
  let builder = PatchMeshBuilder::new(&grid, &config);
  let mut short = vec![Vec3::ZERO; 80];
  assert!(matches!(
    builder.write_positions_into(&mut short),
    Err(TerrainError::BufferTooSmall { needed: 81, actual: 80 })
  ));

  let mut exact = vec![Vec3::ZERO; 81];
  builder.write_positions_into(&mut exact).unwrap();
  assert_eq!(exact, builder.positions());
}

#[test]
fn test_write_indices_into_matches_allocating_variant() {
  let grid = hills(9);
  let config = MeshBuildConfig::default();
  let builder = PatchMeshBuilder::new(&grid, &config);
  let seams = SeamSteps::from_levels(2, 1, 1, 1);
  let expected = builder.indices(2, seams).unwrap();
  let mut store = vec![0u32; expected.len()];
  let written = builder.write_indices_into(2, seams, &mut store).unwrap();
  assert_eq!(written, expected.len());
  assert_eq!(store, expected);
}

#[test]
fn test_build_rejects_invalid_step() {
  let grid = hills(5);
  let config = MeshBuildConfig::default();
  assert!(matches!(
    PatchMeshBuilder::new(&grid, &config).build(4, SeamSteps::uniform(4)),
    Err(TerrainError::InvalidLod { step: 4, width: 5 })
  ));
}
