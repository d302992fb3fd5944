//! Level-of-detail selection and per-patch update records.

mod calculator;
mod update;

pub use calculator::{DistanceLodCalculator, LodCalculator, LodSettings, PatchLodInfo};
pub use update::UpdatedPatch;
