//! Compendium packs as they ship on disk.
//!
//! Everything needed to go from a module or system directory to a list of
//! [`CompendiumItem`]s without touching the cache: manifest parsing and
//! filtering, game-system detection, format detection and the in-process
//! readers. LevelDB packs need the extraction helper first; their output is
//! read with [`ExtractedReader`].

mod detect;
pub mod error;
pub mod manifest;
pub mod models;
pub mod reader;
mod systems;

pub use crate::detect::{LEVELDB_SENTINELS, PLUTONIUM_FILES, detect_format};
pub use crate::manifest::{ManifestKind, ManifestPack, SourceManifest, read_manifest, source_name};
pub use crate::models::{CompendiumItem, DocumentType, LoadedPack, PackDescriptor, PackFormat, RawData, Rejected};
pub use crate::reader::{ExtractedReader, NeDbReader, PackReader, PlutoniumReader, Reader, load_pack};
pub use crate::systems::{DEFAULT_TARGET_SYSTEMS, MULTI_SYSTEM, SystemDetectionMap, TargetSystems, system_label};
