//! terrain_plugin - Framework/engine independent geomipmap terrain
//!
//! This crate turns square height maps into a quad tree of mesh patches whose
//! detail follows the viewer. Each patch keeps its full-resolution vertices;
//! levels of detail only swap the index strip, stitched against coarser
//! neighbours so the surface never cracks.
//!
//! # Features
//!
//! - **Geomipmapping**: one triangle strip per patch, every `2^lod`-th sample
//! - **Seam stitching**: binary or proportional zippers against coarser
//!   neighbours
//! - **Background LOD**: level selection and reindexing on a worker thread,
//!   applied on the caller's thread through a single-slot mailbox
//! - **Paging**: a 2×2 window of trees that follows the viewer, with a tile
//!   cache
//! - **Height edits**: batched edits with localized normal updates
//!
//! # Example
//!
//! ```ignore
//! use terrain_plugin::{HeightGrid, TerrainConfig, TerrainLodControl, TerrainQuad};
//!
//! let heights = HeightGrid::from_fn(513, |x, z| ((x + z) as f32 * 0.05).sin() * 8.0)?;
//! let mut terrain = TerrainQuad::new(TerrainConfig::default(), &heights)?;
//! let mut lod = TerrainLodControl::default();
//!
//! // Once per frame
//! lod.update(&mut terrain, &[camera_position])?;
//! for patch in terrain.patches() {
//!   draw(patch.mesh());
//! }
//! ```

pub mod constants;
pub mod error;
pub mod types;

pub use constants::{is_valid_side, max_lod_for, vertex_index, DEFAULT_LOD_MULTIPLIER, DEFAULT_PATCH_SIZE};
pub use error::TerrainError;
pub use types::{HeightEdit, HeightMode, MeshBuffers, SampleRegion, SeamMode, SeamSteps};

// Height samples and interpolated queries
pub mod height_grid;
pub use height_grid::HeightGrid;

// Patch mesh generation and index strips
pub mod geomipmap;
pub use geomipmap::{MeshBuildConfig, PatchMeshBuilder};

// Quad tree of patches
pub mod quadtree;
pub use quadtree::{
  NeighbourFinder, PatchKey, QuadPath, QuadRecord, Quadrant, TerrainConfig, TerrainPatch, TerrainQuad, TileId,
  TiledTerrain,
};

// Level selection
pub mod lod;
pub use lod::{DistanceLodCalculator, LodCalculator, LodSettings, PatchLodInfo, UpdatedPatch};

// Background LOD updates
pub mod pipeline;
pub use pipeline::{LodTerrain, LodTick, TerrainLodControl, TickStatus};

// Paging window
pub mod grid;
pub use grid::{GridConfig, GridMove, TerrainGrid, TerrainGridListener, TileLoader};

#[cfg(feature = "metrics")]
pub mod metrics;
