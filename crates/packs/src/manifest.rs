//! Package manifests (`system.json` / `module.json`).
//!
//! A manifest tells us which packs a source directory ships, what document
//! type each pack holds and which game system(s) the content is written for.
//! Property names are matched case-insensitively.

use crate::error::{ErrorKind, Result};
use crate::models::DocumentType;
use crate::systems::{MULTI_SYSTEM, SystemDetectionMap, TargetSystems, system_label};
use exn::ResultExt;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};

/// Whether a source directory is a game system or a module.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManifestKind {
    System,
    Module,
}
impl ManifestKind {
    pub fn file_name(&self) -> &'static str {
        match self {
            Self::System => "system.json",
            Self::Module => "module.json",
        }
    }
}

/// Parsed package manifest.
#[derive(Debug, Clone, Deserialize)]
pub struct SourceManifest {
    #[serde(skip, default = "default_kind")]
    pub kind: ManifestKind,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub packs: Vec<ManifestPack>,
    #[serde(default)]
    pub relationships: Option<Relationships>,
}

fn default_kind() -> ManifestKind {
    ManifestKind::Module
}

/// One pack declaration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ManifestPack {
    pub name: String,
    #[serde(default)]
    pub label: String,
    /// Relative to the source directory. Newer manifests may leave it out.
    #[serde(default)]
    pub path: String,
    #[serde(rename = "type", default)]
    pub pack_type: String,
    #[serde(default)]
    pub system: Option<String>,
    #[serde(default)]
    pub systems: Option<Vec<String>>,
}
impl ManifestPack {
    /// The declared relative path, or `packs/<name>` when none is given.
    pub fn relative_path(&self) -> PathBuf {
        if self.path.trim().is_empty() {
            PathBuf::from("packs").join(&self.name)
        } else {
            PathBuf::from(self.path.trim())
        }
    }

    pub fn document_type(&self) -> Option<DocumentType> {
        DocumentType::parse(&self.pack_type)
    }

    fn system(&self) -> Option<&str> {
        self.system.as_deref().map(str::trim).filter(|s| !s.is_empty())
    }

    fn systems(&self) -> &[String] {
        self.systems.as_deref().unwrap_or_default()
    }

    /// Whether the pack names any system at all.
    pub fn is_system_specific(&self) -> bool {
        self.system().is_some() || !self.systems().is_empty()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Relationships {
    #[serde(default)]
    pub systems: Vec<SystemRelationship>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SystemRelationship {
    pub id: String,
}

impl SourceManifest {
    /// Locate the manifest of a source directory. A `system.json` wins over a
    /// `module.json`.
    pub fn locate(source_dir: &Path) -> Option<(PathBuf, ManifestKind)> {
        [ManifestKind::System, ManifestKind::Module].into_iter().find_map(|kind| {
            let path = source_dir.join(kind.file_name());
            path.is_file().then_some((path, kind))
        })
    }

    /// Read the manifest of a source directory, if it has one.
    pub fn load(source_dir: &Path) -> Result<Option<Self>> {
        let Some((path, kind)) = Self::locate(source_dir) else {
            return Ok(None);
        };
        let json = std::fs::read_to_string(&path).or_raise(|| ErrorKind::Io(path.clone()))?;
        Self::parse(&json, kind).or_raise(|| ErrorKind::InvalidManifest(path)).map(Some)
    }

    pub fn parse(json: &str, kind: ManifestKind) -> Result<Self> {
        let value: Value =
            serde_json::from_str(json).or_raise(|| ErrorKind::InvalidManifest(PathBuf::from(kind.file_name())))?;
        let mut manifest: Self = serde_json::from_value(normalize_keys(value))
            .or_raise(|| ErrorKind::InvalidManifest(PathBuf::from(kind.file_name())))?;
        manifest.kind = kind;
        Ok(manifest)
    }

    pub fn system_ids(&self) -> Vec<&str> {
        self.relationships
            .as_ref()
            .map(|r| r.systems.iter().map(|s| s.id.as_str()).filter(|id| !id.is_empty()).collect())
            .unwrap_or_default()
    }

    /// Source-level system label from `relationships.systems`.
    pub fn detected_system(&self) -> Option<String> {
        match self.system_ids().as_slice() {
            [] => None,
            [single] => Some(system_label(single)),
            _ => Some(MULTI_SYSTEM.to_string()),
        }
    }

    /// Declared packs relevant to the target systems.
    ///
    /// A pack is kept when its `system` is a target, when its `systems` list
    /// names a target, or when it has neither field and either this is a
    /// system manifest or no pack in the manifest is system-specific. A
    /// present but empty `systems` list matches nothing. A module that
    /// partitions some packs by system is assumed to partition all of them.
    pub fn in_scope_packs(&self, targets: &TargetSystems) -> Vec<&ManifestPack> {
        let partitioned = self.packs.iter().any(ManifestPack::is_system_specific);
        self.packs
            .iter()
            .filter(|pack| {
                let keep = match (pack.system(), pack.systems.as_deref()) {
                    (Some(system), _) => targets.contains(system),
                    (None, Some(listed)) => listed.iter().any(|s| targets.contains(s)),
                    (None, None) => self.kind == ManifestKind::System || !partitioned,
                };
                tracing::trace!(pack = %pack.name, pack_type = %pack.pack_type, keep, "Filtered manifest pack");
                keep
            })
            .collect()
    }

    /// Record source- and pack-level systems for `source` into `systems`.
    pub fn record_systems<'a>(
        &self,
        source: &str,
        packs: impl IntoIterator<Item = &'a ManifestPack>,
        systems: &mut SystemDetectionMap,
    ) {
        if let Some(label) = self.detected_system() {
            systems.record_source(source, label);
        }
        for pack in packs {
            let Some(id) = pack.system() else { continue };
            let label = system_label(id);
            // Manifest names and on-disk names can differ, so alias the latter.
            let relative = pack.relative_path();
            let aliases = [relative.file_name(), relative.file_stem()];
            for alias in aliases.into_iter().flatten() {
                let alias = alias.to_string_lossy().into_owned();
                if alias != pack.name {
                    systems.record_pack(source, alias, label.as_str());
                }
            }
            systems.record_pack(source, pack.name.as_str(), label);
        }
    }
}

/// Read the manifest of `source_dir` and return its in-scope pack declarations.
///
/// A missing or unparseable manifest yields an empty list: callers fall back
/// to enumerating the `packs` directory instead.
pub fn read_manifest(
    source_dir: &Path,
    targets: &TargetSystems,
    systems: &mut SystemDetectionMap,
) -> Vec<ManifestPack> {
    let manifest = match SourceManifest::load(source_dir) {
        Ok(Some(manifest)) => manifest,
        Ok(None) => {
            tracing::debug!(source = %source_dir.display(), "No manifest found");
            return Vec::new();
        },
        Err(e) => {
            tracing::warn!(source = %source_dir.display(), error = %*e, "Failed to parse manifest");
            return Vec::new();
        },
    };
    let source = source_name(source_dir);
    let packs: Vec<ManifestPack> = manifest.in_scope_packs(targets).into_iter().cloned().collect();
    manifest.record_systems(&source, &packs, systems);
    tracing::info!(
        source = %source,
        manifest = manifest.kind.file_name(),
        total = manifest.packs.len(),
        relevant = packs.len(),
        "Read manifest",
    );
    packs
}

/// Name a source directory is known by (its final path component).
pub fn source_name(source_dir: &Path) -> String {
    source_dir
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| source_dir.to_string_lossy().into_owned())
}

/// Lowercase the property names a manifest is read by: the top level, pack
/// entries and `relationships.systems` entries. Nested payloads such as pack
/// `flags` keep their case.
fn normalize_keys(value: Value) -> Value {
    lowercase_object(value, |key, value| match key {
        "packs" => lowercase_entries(value),
        "relationships" => lowercase_object(value, |key, value| match key {
            "systems" => lowercase_entries(value),
            _ => value,
        }),
        _ => value,
    })
}

fn lowercase_object(value: Value, nested: impl Fn(&str, Value) -> Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.into_iter()
                .map(|(key, value)| {
                    let key = key.to_lowercase();
                    let value = nested(&key, value);
                    (key, value)
                })
                .collect::<Map<_, _>>(),
        ),
        other => other,
    }
}

fn lowercase_entries(value: Value) -> Value {
    match value {
        Value::Array(values) => Value::Array(values.into_iter().map(|v| lowercase_object(v, |_, v| v)).collect()),
        other => other,
    }
}
