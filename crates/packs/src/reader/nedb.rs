use super::{PackReader, location};
use crate::error::{ErrorKind, Result};
use crate::models::{CompendiumItem, LoadedPack, PackFormat};
use exn::ResultExt;
use serde_json::Value;
use std::path::Path;
use tracing::instrument;

/// Legacy JSON-Lines packs: one document per line.
#[derive(Debug, Clone, Copy, Default)]
pub struct NeDbReader;

impl NeDbReader {
    /// Parse already-read file contents. Line numbers are 1-based and count
    /// blank lines, so they match what an editor shows.
    pub fn parse(contents: &str, path: &Path, source_name: &str) -> LoadedPack {
        let mut pack = LoadedPack::default();
        for (index, line) in contents.lines().enumerate() {
            let number = index + 1;
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let document = match serde_json::from_str::<Value>(line) {
                Ok(document @ Value::Object(_)) => document,
                Ok(_) => {
                    pack.reject(location(path, Some(number)), "not a JSON object");
                    continue;
                },
                Err(e) => {
                    pack.reject(location(path, Some(number)), e);
                    continue;
                },
            };
            let text = |key: &str| document.get(key).and_then(Value::as_str).filter(|s| !s.is_empty());
            let id = text("_id").map(str::to_string).unwrap_or_else(|| format!("item_{number}"));
            let name = text("name").unwrap_or("Unknown").to_string();
            let item_type = text("type").unwrap_or("unknown").to_string();
            pack.items.push(CompendiumItem::new(id, name, item_type, document, PackFormat::NeDb, source_name));
        }
        pack
    }
}

impl PackReader for NeDbReader {
    #[instrument(skip(self), fields(path = %path.display()))]
    fn load_pack(&self, path: &Path, source_name: &str) -> Result<LoadedPack> {
        let bytes = std::fs::read(path).or_raise(|| ErrorKind::Io(path.to_path_buf()))?;
        // A stray invalid byte should cost one record, not the whole pack.
        let contents = String::from_utf8_lossy(&bytes);
        let pack = Self::parse(&contents, path, source_name);
        tracing::debug!(items = pack.len(), rejected = pack.rejected.len(), "Read NeDB pack");
        Ok(pack)
    }
}
