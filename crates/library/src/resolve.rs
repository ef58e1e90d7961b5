//! Conflict resolution and cache finalisation.
//!
//! Runs once, after every pack has been stored: items sharing
//! `(name, type, system)` form a group, one member of each group is chosen by
//! source-name priority and marked primary, and every other member is logged
//! as a collision.

use crate::collisions::CollisionLog;
use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use grimoire_cache::{Candidate, Repository};
use std::io::Write;
use std::path::Path;
use tracing::instrument;

/// Source-name prefixes, highest priority first. The trailing empty prefix
/// matches every source.
pub const DEFAULT_PRIORITIES: [&str; 8] = [
    "dnd5e",
    "pf2e",
    "pf1",
    "dnd-players-handbook",
    "dnd-dungeon-masters-guide",
    "dnd-monsters-manual",
    "dnd-",
    "",
];

/// Ordered source-name prefixes used to pick a group's winner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Priorities(Vec<String>);
impl Priorities {
    pub fn new(prefixes: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self(prefixes.into_iter().map(|p| p.into().to_lowercase()).collect())
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
impl Default for Priorities {
    fn default() -> Self {
        Self::new(DEFAULT_PRIORITIES)
    }
}

/// Pick the winner of a group by walking the priorities in order. At each
/// entry a source named exactly like it beats sources that merely start with
/// it, so `pf1` wins over `pf1-statblock-converter`; otherwise the first
/// candidate (in discovery order) with the prefix wins. When nothing matches,
/// the first candidate wins.
pub fn choose_winner<'a>(candidates: &'a [Candidate], priorities: &Priorities) -> Option<&'a Candidate> {
    let lowered: Vec<String> = candidates.iter().map(|c| c.source_name.to_lowercase()).collect();
    priorities
        .iter()
        .find_map(|prefix| {
            lowered
                .iter()
                .position(|source| !prefix.is_empty() && source == prefix)
                .or_else(|| lowered.iter().position(|source| source.starts_with(prefix)))
        })
        .and_then(|index| candidates.get(index))
        .or_else(|| candidates.first())
}

/// What finalisation did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Finalized {
    pub groups: u64,
    pub collisions: u64,
}

/// Mark exactly one primary item per identity and log the rest.
#[instrument(skip_all)]
pub async fn finalize<W: Write>(
    repo: &Repository,
    priorities: &Priorities,
    mut log: Option<CollisionLog<W>>,
) -> Result<Finalized> {
    let candidates = repo.candidates().await.or_raise(|| ErrorKind::Cache)?;
    let mut primaries = Vec::new();
    let mut collisions = 0;
    for group in candidates.chunk_by(|a, b| a.identity() == b.identity()) {
        let Some(winner) = choose_winner(group, priorities) else { continue };
        primaries.push(winner.id.clone());
        for loser in group.iter().filter(|c| c.id != winner.id) {
            collisions += 1;
            tracing::debug!(
                name = %winner.name,
                item_type = %winner.item_type,
                winner = %winner.source_name,
                loser = %loser.source_name,
                "Resolved duplicate item",
            );
            if let Some(log) = log.as_mut() {
                log.record(winner, loser)?;
            }
        }
    }
    repo.set_primaries(&primaries).await.or_raise(|| ErrorKind::Cache)?;
    if let Some(log) = log {
        let path = log.path().to_path_buf();
        let written = log.finish()?;
        tracing::info!(path = %path.display(), records = written, "Wrote collision log");
    }
    let finalized = Finalized { groups: primaries.len() as u64, collisions };
    tracing::info!(groups = finalized.groups, collisions = finalized.collisions, "Finalised compendium cache");
    Ok(finalized)
}

/// Finalise, logging collisions to a file when a path is given.
pub async fn finalize_to(repo: &Repository, priorities: &Priorities, log_path: Option<&Path>) -> Result<Finalized> {
    match log_path {
        Some(path) => finalize(repo, priorities, Some(CollisionLog::create(path)?)).await,
        None => finalize::<std::io::Sink>(repo, priorities, None).await,
    }
}
