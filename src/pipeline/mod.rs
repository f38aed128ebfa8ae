//! Pipeline entry points for harvester operations.
//!
//! - `run_harvest`: Fetch, map and shard everything modified since the last
//!   committed checkpoint

pub mod harvest;

pub use harvest::{HarvestContext, HarvestReport, RunOptions, RunStatus, run_harvest};
