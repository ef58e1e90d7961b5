//! SQLite cache of compendium items.
//!
//! The cache is rebuilt from scratch on every build and is never the source
//! of truth: the packs on disk are. If the database is deleted, it can be
//! rebuilt by running the pipeline again.
//!
//! # Architecture
//! A single table holds every item loaded from every pack, duplicates
//! included. After ingestion exactly one item per `(name, type, system)`
//! identity is flagged primary, which is what the query API serves by
//! default; the others remain available through
//! [`Repository::find_all_candidates`].

mod db;
pub mod error;
mod models;
mod repo;

pub use crate::db::Database;
pub use crate::models::{Candidate, TypeCount};
pub use crate::repo::{Repository, Session};
