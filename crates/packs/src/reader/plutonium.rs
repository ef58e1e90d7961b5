use super::{PackReader, location};
use crate::error::{ErrorKind, Result};
use crate::models::{CompendiumItem, LoadedPack, PackFormat};
use exn::ResultExt;
use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::instrument;

const DEFAULT_SOURCE: &str = "Plutonium";

/// Directory of flat JSON exports, each `{"<entityType>": [ ... ]}`.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlutoniumReader;

/// Singular item type for an export's entity-type hint.
pub fn entity_type(hint: &str) -> String {
    match hint.to_ascii_lowercase().as_str() {
        "backgrounds" => "background".to_string(),
        "feats" => "feat".to_string(),
        "spells" => "spell".to_string(),
        "items" => "item".to_string(),
        "races" => "race".to_string(),
        "classes" => "class".to_string(),
        "monsters" => "npc".to_string(),
        "conditions" => "condition".to_string(),
        _ => hint.to_string(),
    }
}

/// Stable id derived from a name: lower-cased with everything but letters and
/// digits removed, so re-reading the same export yields the same ids.
pub fn name_id(name: &str) -> String {
    name.chars().filter(|c| c.is_alphanumeric()).flat_map(char::to_lowercase).collect()
}

impl PlutoniumReader {
    /// Parse a single export file's contents.
    pub fn parse_file(contents: &str, path: &Path, source_name: &str, pack: &mut LoadedPack) {
        let root = match serde_json::from_str::<Value>(contents) {
            Ok(root) => root,
            Err(e) => return pack.reject(location(path, None), e),
        };
        let Some((hint, entries)) =
            root.as_object().and_then(|o| o.iter().find_map(|(k, v)| v.as_array().map(|a| (k.as_str(), a))))
        else {
            return pack.reject(location(path, None), "no array-valued property at the root");
        };

        let fallback_type = entity_type(hint);
        for (index, entry) in entries.iter().enumerate() {
            let Some(fields) = entry.as_object() else {
                pack.reject(format!("{}[{index}]", location(path, None)), "not a JSON object");
                continue;
            };
            let text = |key: &str| fields.get(key).and_then(Value::as_str).filter(|s| !s.is_empty());
            let Some(name) = text("name") else {
                pack.reject(format!("{}[{index}]", location(path, None)), "entry has no name");
                continue;
            };
            let id = text("_id").map(str::to_string).unwrap_or_else(|| name_id(name));
            let item_type = text("type").map(str::to_string).unwrap_or_else(|| fallback_type.clone());
            let mut item =
                CompendiumItem::new(id, name, item_type, entry.clone(), PackFormat::PlutoniumJson, source_name);
            item.description = description(entry);
            item.rarity = text("rarity").or_else(|| text("tier")).map(str::to_string);
            item.source = Some(text("source").unwrap_or(DEFAULT_SOURCE).to_string());
            pack.items.push(item);
        }
    }
}

impl PackReader for PlutoniumReader {
    #[instrument(skip(self), fields(path = %path.display()))]
    fn load_pack(&self, path: &Path, source_name: &str) -> Result<LoadedPack> {
        let mut pack = LoadedPack::default();
        for file in json_files(path, true)? {
            match std::fs::read_to_string(&file) {
                Ok(contents) => Self::parse_file(&contents, &file, source_name, &mut pack),
                Err(e) => pack.reject(location(&file, None), e),
            }
            tracing::trace!(file = %file.display(), items = pack.len(), "Read Plutonium export");
        }
        tracing::debug!(items = pack.len(), rejected = pack.rejected.len(), "Read Plutonium pack");
        Ok(pack)
    }
}

fn description(entry: &Value) -> Option<String> {
    ["entries", "description", "desc", "text"].into_iter().find_map(|key| match entry.get(key)? {
        Value::String(text) if !text.is_empty() => Some(text.clone()),
        Value::Array(parts) => {
            let parts: Vec<&str> = parts.iter().filter_map(Value::as_str).collect();
            (!parts.is_empty()).then(|| parts.join("\n"))
        },
        _ => None,
    })
}

/// Every `*.json` file directly in `dir`, or anywhere below it when
/// `recursive`, in a stable order.
pub(crate) fn json_files(dir: &Path, recursive: bool) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    let mut pending = vec![dir.to_path_buf()];
    while let Some(current) = pending.pop() {
        let entries = std::fs::read_dir(&current).or_raise(|| ErrorKind::Io(current.clone()))?;
        for entry in entries {
            let path = entry.or_raise(|| ErrorKind::Io(current.clone()))?.path();
            if path.is_dir() {
                if recursive {
                    pending.push(path);
                }
            } else if path.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("json")) {
                files.push(path);
            }
        }
    }
    files.sort();
    Ok(files)
}
