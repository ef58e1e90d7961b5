use super::plutonium::json_files;
use super::{PackReader, location};
use crate::error::Result;
use crate::models::{CompendiumItem, DocumentType, LoadedPack, PackFormat};
use serde_json::Value;
use std::path::Path;
use tracing::instrument;

/// Reads the directory of per-document JSON files the extraction helper writes
/// for a LevelDB pack. Each file is one item and its file stem is the item id.
#[derive(Debug, Clone, Default)]
pub struct ExtractedReader {
    declared_type: Option<DocumentType>,
    pack_name: String,
}

impl ExtractedReader {
    pub fn new(declared_type: Option<DocumentType>, pack_name: impl Into<String>) -> Self {
        Self { declared_type, pack_name: pack_name.into() }
    }

    /// Item type for a document: its own `type`, then the pack's declared
    /// document type, then keywords in the pack name, then `system.type`.
    pub fn infer_type(&self, document: &Value) -> String {
        let own = document.get("type").and_then(Value::as_str).filter(|t| !t.is_empty() && *t != "unknown");
        if let Some(own) = own {
            return own.to_string();
        }
        if let Some(declared) = &self.declared_type {
            return declared.fallback_item_type();
        }
        if let Some(keyword) = pack_name_type(&self.pack_name) {
            return keyword.to_string();
        }
        ["system", "data"]
            .into_iter()
            .find_map(|key| document.get(key)?.get("type")?.as_str().filter(|t| !t.is_empty()))
            .map(str::to_string)
            .unwrap_or_else(|| "unknown".to_string())
    }
}

fn pack_name_type(pack_name: &str) -> Option<&'static str> {
    let name = pack_name.to_ascii_lowercase();
    if name.contains("journal") {
        Some("journal")
    } else if name.contains("scene") {
        Some("scene")
    } else if name.contains("rolltable") || name.contains("table") {
        Some("rolltable")
    } else {
        None
    }
}

impl PackReader for ExtractedReader {
    #[instrument(skip(self), fields(path = %path.display(), pack = %self.pack_name))]
    fn load_pack(&self, path: &Path, source_name: &str) -> Result<LoadedPack> {
        let mut pack = LoadedPack::default();
        for file in json_files(path, false)? {
            let document = match std::fs::read_to_string(&file).map(|s| serde_json::from_str::<Value>(&s)) {
                Ok(Ok(document @ Value::Object(_))) => document,
                Ok(Ok(_)) => {
                    pack.reject(location(&file, None), "not a JSON object");
                    continue;
                },
                Ok(Err(e)) => {
                    pack.reject(location(&file, None), e);
                    continue;
                },
                Err(e) => {
                    pack.reject(location(&file, None), e);
                    continue;
                },
            };
            let stem = file.file_stem().map(|s| s.to_string_lossy().into_owned()).unwrap_or_default();
            let name = document.get("name").and_then(Value::as_str).filter(|n| !n.is_empty()).unwrap_or(&stem);
            let name = name.to_string();
            let item_type = self.infer_type(&document);
            pack.items.push(CompendiumItem::new(stem, name, item_type, document, PackFormat::LevelDb, source_name));
        }
        tracing::debug!(items = pack.len(), rejected = pack.rejected.len(), "Read extracted pack");
        Ok(pack)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use serde_json::json;
    use tempfile::TempDir;

    #[rstest]
    #[case(json!({"type": "weapon"}), Some(DocumentType::Actor), "monsters", "weapon")]
    #[case(json!({"type": "unknown"}), Some(DocumentType::Actor), "monsters", "npc")]
    #[case(json!({}), Some(DocumentType::JournalEntry), "rules", "journal")]
    #[case(json!({}), None, "srd-journals", "journal")]
    #[case(json!({}), None, "loot-tables", "rolltable")]
    #[case(json!({"system": {"type": "feat"}}), None, "features", "feat")]
    #[case(json!({}), None, "features", "unknown")]
    fn type_inference(
        #[case] document: Value,
        #[case] declared: Option<DocumentType>,
        #[case] pack: &str,
        #[case] expected: &str,
    ) {
        assert_eq!(ExtractedReader::new(declared, pack).infer_type(&document), expected);
    }

    #[test]
    fn file_stem_is_the_id() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("Goblin_abc123.json"), r#"{"name": "Goblin"}"#).unwrap();
        std::fs::write(dir.path().join("nameless.json"), r#"{"type": "loot"}"#).unwrap();
        std::fs::write(dir.path().join("broken.json"), "{").unwrap();

        let reader = ExtractedReader::new(Some(DocumentType::Actor), "monsters");
        let pack = reader.load_pack(dir.path(), "dnd-monsters-manual").unwrap();
        assert_eq!(pack.rejected.len(), 1);
        assert_eq!(pack.len(), 2);

        let goblin = &pack.items[0];
        assert_eq!(goblin.source_id, "Goblin_abc123");
        assert_eq!(goblin.name, "Goblin");
        assert_eq!(goblin.item_type, "npc");
        assert_eq!(goblin.source_format, PackFormat::LevelDb);

        let nameless = &pack.items[1];
        assert_eq!(nameless.name, "nameless");
        assert_eq!(nameless.item_type, "loot");
    }

    #[test]
    fn nested_directories_are_not_items() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("Wolf_1.json"), r#"{"name": "Wolf"}"#).unwrap();
        std::fs::create_dir(dir.path().join("_meta")).unwrap();
        std::fs::write(dir.path().join("_meta/folders.json"), r#"{"name": "Beasts"}"#).unwrap();

        let pack = ExtractedReader::new(Some(DocumentType::Actor), "monsters").load_pack(dir.path(), "pf2e").unwrap();
        let names: Vec<_> = pack.items.iter().map(|i| i.name.as_str()).collect();
        assert_eq!(names, vec!["Wolf"]);
    }
}
