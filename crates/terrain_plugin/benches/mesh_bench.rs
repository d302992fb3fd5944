//! Strip generation, patch builds and full LOD cycles.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use glam::Vec3;
use terrain_plugin::geomipmap::write_index_strip;
use terrain_plugin::pipeline::run_cycle;
use terrain_plugin::{
  DistanceLodCalculator, HeightGrid, LodTerrain, MeshBuildConfig, PatchMeshBuilder, SeamMode, SeamSteps,
  TerrainConfig, TerrainQuad,
};

fn hills(size: usize) -> HeightGrid {
  HeightGrid::from_fn(size, |x, z| {
    let (x, z) = (x as f32, z as f32);
    (x * 0.07).sin() * 12.0 + (z * 0.05).cos() * 9.0 + ((x + z) * 0.013).sin() * 30.0
  })
  .expect("valid size")
}

/// Strips for every level of a 65-sample patch, with and without coarser
/// neighbours.
fn bench_strips(c: &mut Criterion) {
  let mut group = c.benchmark_group("write_index_strip (65)");
  for step in [1u32, 2, 4, 8, 16] {
    group.bench_with_input(BenchmarkId::new("uniform", step), &step, |b, &step| {
      b.iter(|| write_index_strip(65, black_box(step), SeamSteps::uniform(step), SeamMode::Binary))
    });
    let coarse = SeamSteps {
      right: step * 2,
      top: step * 4,
      left: step,
      bottom: step * 2,
    };
    group.bench_with_input(BenchmarkId::new("proportional", step), &step, |b, &step| {
      b.iter(|| write_index_strip(65, black_box(step), coarse, SeamMode::Proportional))
    });
  }
  group.finish();
}

fn bench_patch_build(c: &mut Criterion) {
  let heights = hills(65);
  let config = MeshBuildConfig::DEFAULT.with_scale(Vec3::new(2.0, 1.0, 2.0));
  c.bench_function("PatchMeshBuilder::build (65)", |b| {
    b.iter(|| {
      let mesh = PatchMeshBuilder::new(black_box(&heights), &config).build(1, SeamSteps::uniform(1));
      black_box(mesh)
    })
  });
}

fn bench_tree(c: &mut Criterion) {
  let heights = hills(513);
  let config = TerrainConfig::DEFAULT;

  c.bench_function("TerrainQuad::new (513 / 65)", |b| {
    b.iter(|| black_box(TerrainQuad::new(config.clone(), black_box(&heights))))
  });

  let mut terrain = TerrainQuad::new(config, &heights).expect("valid terrain");
  let snapshot = terrain.lod_snapshot();
  let calculator = DistanceLodCalculator::default();
  c.bench_function("run_cycle (513 / 65, corner viewer)", |b| {
    b.iter(|| run_cycle(black_box(&snapshot), &[Vec3::new(-256.0, 0.0, -256.0)], &calculator, false))
  });
}

criterion_group!(benches, bench_strips, bench_patch_build, bench_tree);
criterion_main!(benches);
