//! Which module and system directories of a Foundry data directory to read.

use std::path::{Path, PathBuf};

/// Game systems read from `systems/`.
pub const SYSTEM_WHITELIST: [&str; 3] = ["dnd5e", "pf2e", "pf1"];

/// Modules read from `modules/`, in addition to any Battlezoo module.
pub const MODULE_WHITELIST: [&str; 6] = [
    "dnd-dungeon-masters-guide",
    "dnd-players-handbook",
    "pf1-statblock-converter",
    "statblock-library",
    "pf-content",
    "plutonium",
];

fn is_wanted_module(name: &str) -> bool {
    MODULE_WHITELIST.contains(&name) || name.to_ascii_lowercase().contains("battlezoo")
}

fn subdirectories(dir: &Path) -> Vec<PathBuf> {
    match std::fs::read_dir(dir) {
        Ok(entries) => entries.filter_map(|e| e.ok()).map(|e| e.path()).filter(|p| p.is_dir()).collect(),
        Err(e) => {
            tracing::debug!(dir = %dir.display(), error = %e, "Unable to list directory");
            Vec::new()
        },
    }
}

/// Put game systems ahead of modules, each group sorted by path, and drop
/// duplicates.
pub fn order_sources(sources: &mut Vec<PathBuf>) {
    let is_system = |p: &Path| p.parent().and_then(Path::file_name).is_some_and(|n| n == "systems");
    sources.sort_by(|a, b| is_system(b).cmp(&is_system(a)).then_with(|| a.cmp(b)));
    sources.dedup();
}

/// Source directories under a Foundry data directory: systems first, then
/// modules, each sorted by path.
///
/// With `only`, just that module (or, failing that, that system) is returned,
/// whether or not it is whitelisted.
pub fn discover_sources(data_path: &Path, only: Option<&str>) -> Vec<PathBuf> {
    let modules = data_path.join("modules");
    let systems = data_path.join("systems");

    if let Some(only) = only {
        let found = [modules.join(only), systems.join(only)].into_iter().find(|p| p.is_dir());
        if found.is_none() {
            tracing::warn!(source = only, data_path = %data_path.display(), "Requested source not found");
        }
        return found.into_iter().collect();
    }

    let name_of = |p: &PathBuf| p.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
    let mut sources: Vec<PathBuf> = subdirectories(&systems)
        .into_iter()
        .filter(|p| SYSTEM_WHITELIST.contains(&name_of(p).as_str()))
        .chain(subdirectories(&modules).into_iter().filter(|p| is_wanted_module(&name_of(p))))
        .collect();
    order_sources(&mut sources);
    tracing::info!(data_path = %data_path.display(), sources = sources.len(), "Discovered compendium sources");
    sources
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn data_dir(dirs: &[&str]) -> TempDir {
        let dir = TempDir::new().unwrap();
        for d in dirs {
            std::fs::create_dir_all(dir.path().join(d)).unwrap();
        }
        dir
    }

    #[test]
    fn whitelisted_sources_systems_first() {
        let dir = data_dir(&[
            "systems/pf2e",
            "systems/dnd5e",
            "systems/swade",
            "modules/plutonium",
            "modules/BattleZoo-bestiary",
            "modules/random-homebrew",
            "modules/dnd-players-handbook",
        ]);
        let names: Vec<_> = discover_sources(dir.path(), None)
            .iter()
            .map(|p| p.strip_prefix(dir.path()).unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(
            names,
            vec![
                "systems/dnd5e",
                "systems/pf2e",
                "modules/BattleZoo-bestiary",
                "modules/dnd-players-handbook",
                "modules/plutonium",
            ]
        );
    }

    #[test]
    fn only_prefers_modules_then_systems() {
        let dir = data_dir(&["systems/pf1", "modules/random-homebrew"]);
        assert_eq!(discover_sources(dir.path(), Some("random-homebrew")), vec![dir.path().join("modules/random-homebrew")]);
        assert_eq!(discover_sources(dir.path(), Some("pf1")), vec![dir.path().join("systems/pf1")]);
        assert!(discover_sources(dir.path(), Some("missing")).is_empty());
    }

    #[test]
    fn systems_come_before_modules_sharing_a_prefix() {
        let dir = data_dir(&["systems/pf1", "modules/pf1-statblock-converter", "modules/pf-content"]);
        assert_eq!(
            discover_sources(dir.path(), None),
            vec![
                dir.path().join("systems/pf1"),
                dir.path().join("modules/pf-content"),
                dir.path().join("modules/pf1-statblock-converter"),
            ]
        );
    }

    #[test]
    fn ordering_drops_duplicates() {
        let mut sources = vec![
            PathBuf::from("/data/modules/plutonium"),
            PathBuf::from("/data/systems/pf2e"),
            PathBuf::from("/data/modules/plutonium"),
            PathBuf::from("/data/systems/dnd5e"),
        ];
        order_sources(&mut sources);
        assert_eq!(
            sources,
            vec![
                PathBuf::from("/data/systems/dnd5e"),
                PathBuf::from("/data/systems/pf2e"),
                PathBuf::from("/data/modules/plutonium"),
            ]
        );
    }

    #[test]
    fn missing_data_directory_has_no_sources() {
        let dir = TempDir::new().unwrap();
        assert!(discover_sources(&dir.path().join("nope"), None).is_empty());
    }
}
