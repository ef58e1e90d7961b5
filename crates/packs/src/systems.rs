//! Game-system detection and the target-system whitelist.

use std::collections::HashMap;

/// Source-level label for modules that bundle packs for several systems.
pub const MULTI_SYSTEM: &str = "Multi-System";

/// Systems whose content is cached unless configured otherwise.
pub const DEFAULT_TARGET_SYSTEMS: [&str; 3] = ["dnd5e", "pf2e", "pf1"];

/// Display label for a platform system id. Unknown ids pass through untouched.
pub fn system_label(id: &str) -> String {
    match id {
        "pf1" => "Pathfinder 1e".to_string(),
        "pf2e" => "Pathfinder 2e".to_string(),
        "dnd5e" => "D&D 5e".to_string(),
        other => other.to_string(),
    }
}

/// The whitelist of system ids content is cached for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetSystems(Vec<String>);
impl TargetSystems {
    pub fn new(ids: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self(ids.into_iter().map(Into::into).collect())
    }

    pub fn contains(&self, id: &str) -> bool {
        self.0.iter().any(|target| target.eq_ignore_ascii_case(id))
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}
impl Default for TargetSystems {
    fn default() -> Self {
        Self::new(DEFAULT_TARGET_SYSTEMS)
    }
}
impl From<Vec<String>> for TargetSystems {
    fn from(ids: Vec<String>) -> Self {
        Self(ids)
    }
}

/// Systems detected while reading manifests, scoped to a single build.
///
/// Pack-level entries win over source-level ones: a multi-system module is
/// recorded as [`MULTI_SYSTEM`] at source level and each of its packs carries
/// its own label.
#[derive(Debug, Clone, Default)]
pub struct SystemDetectionMap {
    sources: HashMap<String, String>,
    // Keyed by (source, pack) since pack names such as "spells" recur across modules.
    packs: HashMap<(String, String), String>,
}
impl SystemDetectionMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_source(&mut self, source: impl Into<String>, label: impl Into<String>) {
        let (source, label) = (source.into(), label.into());
        tracing::debug!(source = %source, system = %label, "Recorded source system");
        self.sources.insert(source, label);
    }

    pub fn record_pack(&mut self, source: impl Into<String>, pack: impl Into<String>, label: impl Into<String>) {
        let (source, pack, label) = (source.into(), pack.into(), label.into());
        tracing::debug!(source = %source, pack = %pack, system = %label, "Recorded pack system");
        self.packs.insert((source, pack), label);
    }

    pub fn source(&self, source: &str) -> Option<&str> {
        self.sources.get(source).map(String::as_str)
    }

    pub fn pack(&self, source: &str, pack: &str) -> Option<&str> {
        self.packs.get(&(source.to_string(), pack.to_string())).map(String::as_str)
    }

    /// System label for a pack: its own entry first, then its source's.
    pub fn resolve(&self, source: &str, pack: &str) -> Option<&str> {
        self.pack(source, pack).or_else(|| self.source(source))
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty() && self.packs.is_empty()
    }
}
