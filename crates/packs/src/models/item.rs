use crate::models::PackFormat;
use serde_json::Value;
use time::UtcDateTime;

/// Opaque entity body, stored verbatim.
///
/// Compendium documents are deliberately never mapped onto a typed schema;
/// only the handful of fields the engine itself needs have accessors.
#[derive(Debug, Clone, PartialEq)]
pub struct RawData(Value);
impl RawData {
    pub fn new(value: Value) -> Self {
        Self(value)
    }

    /// Top-level string property, if present and non-empty.
    pub fn str_field(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str).filter(|s| !s.is_empty())
    }

    pub fn name(&self) -> Option<&str> {
        self.str_field("name")
    }

    pub fn item_type(&self) -> Option<&str> {
        self.str_field("type")
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn as_value(&self) -> &Value {
        &self.0
    }

    pub fn into_value(self) -> Value {
        self.0
    }

    pub fn to_json(&self) -> String {
        // Serializing a `Value` cannot fail: all map keys are strings.
        serde_json::to_string(&self.0).unwrap_or_default()
    }

    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json).map(Self)
    }
}
impl From<Value> for RawData {
    fn from(value: Value) -> Self {
        Self(value)
    }
}

/// The unit of cached content.
///
/// Items are created by a pack reader, tagged with their game system and
/// discovery position by the pipeline, and have [`is_primary`](Self::is_primary)
/// set exactly once, by the cache finalizer.
#[derive(Debug, Clone, PartialEq)]
pub struct CompendiumItem {
    /// Cache identifier. Readers fill it with [`source_id`](Self::source_id);
    /// the pipeline replaces it with a fresh UUID before persisting, because
    /// source ids recur across unrelated packs.
    pub id: String,
    /// Identifier derived from the source data (`_id`, name slug or file stem).
    pub source_id: String,
    pub name: String,
    pub item_type: String,
    pub data: RawData,
    pub source_format: PackFormat,
    /// Directory name of the module or system the item came from.
    pub source_name: String,
    /// Display label of the detected game system (e.g. `D&D 5e`).
    pub system: Option<String>,
    pub is_primary: bool,
    pub loaded_at: UtcDateTime,
    pub description: Option<String>,
    pub source: Option<String>,
    pub rarity: Option<String>,
    /// Position of the originating pack in discovery order.
    pub pack_seq: u32,
    /// Position of the item within its pack.
    pub item_seq: u32,
}
impl CompendiumItem {
    pub fn new(
        source_id: impl Into<String>,
        name: impl Into<String>,
        item_type: impl Into<String>,
        data: impl Into<RawData>,
        source_format: PackFormat,
        source_name: impl Into<String>,
    ) -> Self {
        let source_id = source_id.into();
        Self {
            id: source_id.clone(),
            source_id,
            name: name.into(),
            item_type: item_type.into(),
            data: data.into(),
            source_format,
            source_name: source_name.into(),
            system: None,
            is_primary: false,
            loaded_at: UtcDateTime::now(),
            description: None,
            source: None,
            rarity: None,
            pack_seq: 0,
            item_seq: 0,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_system(mut self, system: Option<impl Into<String>>) -> Self {
        self.system = system.map(Into::into);
        self
    }

    pub fn with_position(mut self, pack_seq: u32, item_seq: u32) -> Self {
        self.pack_seq = pack_seq;
        self.item_seq = item_seq;
        self
    }

    /// The `(name, type, system)` triple that identifies duplicates.
    pub fn identity(&self) -> (&str, &str, Option<&str>) {
        (&self.name, &self.item_type, self.system.as_deref())
    }
}

/// A record a reader could not turn into an item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rejected {
    /// Where the record lives, e.g. `spells.db:12` or `monsters.json`.
    pub location: String,
    pub reason: String,
}
impl Rejected {
    pub fn new(location: impl Into<String>, reason: impl ToString) -> Self {
        Self { location: location.into(), reason: reason.to_string() }
    }
}

/// Everything a reader got out of one pack.
#[derive(Debug, Clone, Default)]
pub struct LoadedPack {
    /// Items in source order.
    pub items: Vec<CompendiumItem>,
    pub rejected: Vec<Rejected>,
}
impl LoadedPack {
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub(crate) fn reject(&mut self, location: impl Into<String>, reason: impl ToString) {
        let rejected = Rejected::new(location, reason);
        tracing::warn!(location = %rejected.location, reason = %rejected.reason, "Skipping unreadable compendium record");
        self.rejected.push(rejected);
    }
}
