//! Turning a source directory into the packs to load from it.

use grimoire_packs::{
    DocumentType, PackDescriptor, PackFormat, SystemDetectionMap, TargetSystems, detect_format, read_manifest,
    source_name,
};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

struct Candidate {
    path: PathBuf,
    format: PackFormat,
    declared_type: Option<DocumentType>,
}

/// Packs of one source directory, ordered by pack name.
///
/// Declared packs are taken from the manifest. Without one, every directory
/// and `.db` file in `packs/` is a pack named after its file stem. When a name
/// has several candidates, LevelDB beats NeDB: the binary copy is the
/// platform's current one. Unknown formats are skipped with a warning.
pub fn discover_packs(
    source_dir: &Path,
    targets: &TargetSystems,
    systems: &mut SystemDetectionMap,
) -> Vec<PackDescriptor> {
    let packs_dir = source_dir.join("packs");
    if !packs_dir.is_dir() {
        tracing::debug!(source = %source_dir.display(), "No packs directory; skipping source");
        return Vec::new();
    }
    let source = source_name(source_dir);
    let declared = read_manifest(source_dir, targets, systems);

    let mut candidates: BTreeMap<String, Vec<Candidate>> = BTreeMap::new();
    if declared.is_empty() {
        for path in filesystem_entries(&packs_dir) {
            let Some(name) = path.file_stem().map(|s| s.to_string_lossy().into_owned()) else { continue };
            let candidate = Candidate { format: detect_format(&path), path, declared_type: None };
            candidates.entry(name).or_default().push(candidate);
        }
    } else {
        for pack in &declared {
            let Some(path) = declared_path(source_dir, &pack.relative_path()) else {
                tracing::debug!(source = %source, pack = %pack.name, "Declared pack not found on disk");
                continue;
            };
            let candidate = Candidate { format: detect_format(&path), path, declared_type: pack.document_type() };
            candidates.entry(pack.name.clone()).or_default().push(candidate);
        }
    }

    let mut packs = Vec::new();
    for (name, mut found) in candidates {
        found.sort_by_key(|c| match c.format {
            PackFormat::LevelDb => 0,
            PackFormat::NeDb => 1,
            PackFormat::PlutoniumJson => 2,
            PackFormat::Unknown => 3,
        });
        let Some(chosen) = found.into_iter().next() else { continue };
        if chosen.format == PackFormat::Unknown {
            tracing::warn!(source = %source, pack = %name, path = %chosen.path.display(), "Unknown pack format; skipping");
            continue;
        }
        let mut pack = PackDescriptor {
            name,
            path: chosen.path,
            format: chosen.format,
            declared_type: chosen.declared_type,
            system: None,
            source_name: source.clone(),
        };
        pack.system = systems
            .resolve(&source, &pack.name)
            .or_else(|| systems.resolve(&source, &pack.filesystem_name()))
            .map(str::to_string);
        tracing::debug!(
            source = %source,
            pack = %pack.name,
            format = %pack.format,
            system = pack.system.as_deref().unwrap_or("-"),
            "Discovered pack",
        );
        packs.push(pack);
    }
    packs
}

/// Resolve a manifest path. A missing `.db` path may really be a LevelDB
/// directory of the same name without the extension.
fn declared_path(source_dir: &Path, relative: &Path) -> Option<PathBuf> {
    let path = source_dir.join(relative);
    if path.exists() {
        return Some(path);
    }
    let is_db = path.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("db"));
    let stripped = path.with_extension("");
    (is_db && stripped.exists()).then_some(stripped)
}

fn filesystem_entries(packs_dir: &Path) -> Vec<PathBuf> {
    let mut entries: Vec<PathBuf> = match std::fs::read_dir(packs_dir) {
        Ok(entries) => entries
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| p.is_dir() || p.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("db")))
            .collect(),
        Err(e) => {
            tracing::warn!(dir = %packs_dir.display(), error = %e, "Unable to list packs directory");
            Vec::new()
        },
    };
    entries.sort();
    entries
}
