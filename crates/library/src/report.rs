use crate::progress::PackResult;

/// Aggregate outcome of a build.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildReport {
    /// One result per discovered pack, in discovery order.
    pub packs: Vec<PackResult>,
    /// Items written to the cache.
    pub items: u64,
    /// Distinct `(name, type, system)` identities, i.e. primary items.
    pub groups: u64,
    /// Items that lost conflict resolution.
    pub collisions: u64,
}
impl BuildReport {
    pub fn succeeded(&self) -> impl Iterator<Item = &PackResult> {
        self.packs.iter().filter(|p| p.success)
    }

    pub fn failed(&self) -> impl Iterator<Item = &PackResult> {
        self.packs.iter().filter(|p| !p.success)
    }

    /// A build is only a failure when not a single pack could be loaded.
    pub fn is_success(&self) -> bool {
        self.succeeded().next().is_some()
    }
}
