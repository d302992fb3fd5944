//! Asynchronous LOD updates.
//!
//! ```text
//! Main thread                                  terrain-lod thread
//! ───────────                                  ──────────────────
//! TerrainLodControl::update(terrain, viewers)
//!   │
//!   ├─ running? ──────────────► Busy
//!   │
//!   ├─ Mailbox::take ─► epoch matches? ─► apply records (Publishing)
//!   │                         └ no ────► discard, force next cycle
//!   │
//!   ├─ no viewer / unchanged / disabled ─► NoViewer / Skipped
//!   │
//!   └─ snapshot (cache neighbours) ─► LodTask ──bounded(1)──► run_cycle
//!                                                               │
//!                                       Selecting   (abort if no change)
//!                                       Propagating (neighbour levels)
//!                                       FixingEdges (flag neighbours)
//!                                       Reindexing  (rayon)
//!                                                               │
//!   Mailbox ◄──────────────────────────────── post ─────────────┘
//! ```
//!
//! The worker only ever sees the owned snapshot; height data stays on the
//! main thread.

mod control;
mod mailbox;
mod stages;
mod terrain;
mod worker;

pub use control::{LodTick, TerrainLodControl, TickStatus};
pub use mailbox::Mailbox;
pub use stages::{run_cycle, LodCycleStats, LodSnapshot, LodUpdate};
pub use terrain::LodTerrain;
pub use worker::{LodTask, LodWorker};
