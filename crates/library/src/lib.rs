//! Builds the deduplicated compendium cache.
//!
//! Sources (modules and systems of a Foundry data directory) are discovered,
//! their packs are read and stored by a pool of workers, and a final pass
//! marks exactly one primary item per `(name, type, system)`.

mod collisions;
mod discover;
pub mod error;
mod pipeline;
mod progress;
mod report;
mod resolve;
mod sources;

pub use crate::collisions::{CollisionLog, HEADER as COLLISION_LOG_HEADER};
pub use crate::discover::discover_packs;
pub use crate::pipeline::{
    BuildOptions, DEFAULT_CACHE_PATH, DEFAULT_COLLISION_LOG, DEFAULT_WORKERS, Pipeline, PlannedPack,
};
pub use crate::progress::{BuildEvent, PackResult, Progress, ProgressUpdate};
pub use crate::report::BuildReport;
pub use crate::resolve::{DEFAULT_PRIORITIES, Finalized, Priorities, choose_winner, finalize, finalize_to};
pub use crate::sources::{MODULE_WHITELIST, SYSTEM_WHITELIST, discover_sources, order_sources};
