use crate::models::PackFormat;
use std::path::Path;

/// Files whose joint presence marks a LevelDB pack directory.
pub const LEVELDB_SENTINELS: [&str; 2] = ["CURRENT", "LOCK"];

/// Export files that mark a Plutonium data directory.
pub const PLUTONIUM_FILES: [&str; 8] = [
    "backgrounds.json",
    "feats.json",
    "spells.json",
    "items.json",
    "races.json",
    "classes.json",
    "monsters.json",
    "conditions.json",
];

/// Classify a pack path by its on-disk layout.
///
/// Checks run in order (LevelDB, Plutonium, NeDB) and the first match wins.
/// Paths that do not exist are [`PackFormat::Unknown`].
pub fn detect_format(path: &Path) -> PackFormat {
    if path.is_dir() {
        if LEVELDB_SENTINELS.iter().all(|sentinel| path.join(sentinel).is_file()) {
            return PackFormat::LevelDb;
        }
        if PLUTONIUM_FILES.iter().any(|file| path.join(file).is_file()) {
            return PackFormat::PlutoniumJson;
        }
        return PackFormat::Unknown;
    }
    let is_db = path.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("db"));
    if is_db && path.is_file() { PackFormat::NeDb } else { PackFormat::Unknown }
}
