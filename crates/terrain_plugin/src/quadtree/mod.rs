//! Terrain trees: patches, quad nodes, addressing and edits.

mod config;
mod edit;
mod neighbours;
mod node;
mod patch;
mod path;
mod record;
mod tiled;

pub use config::TerrainConfig;
pub use neighbours::{neighbour_key, resolve_neighbours, NeighbourFinder, NoNeighbours, PatchKey, PatchNeighbours, TileId};
pub use node::{QuadChild, QuadNode, TerrainQuad};
pub use patch::TerrainPatch;
pub use path::{Direction, PathStep, QuadPath, Quadrant};
pub use record::QuadRecord;
pub use tiled::TiledTerrain;
