use std::fmt::{Display, Formatter, Result as FmtResult};

/// The document type a manifest declares for a pack.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum DocumentType {
    Actor,
    Item,
    JournalEntry,
    RollTable,
    Scene,
    /// Anything else the platform supports (`Adventure`, `Macro`, `Cards`, ...).
    Other(String),
}
impl DocumentType {
    /// Parse a manifest `type` value. Empty values declare nothing.
    pub fn parse(declared: &str) -> Option<Self> {
        let declared = declared.trim();
        if declared.is_empty() {
            return None;
        }
        Some(match declared.to_ascii_lowercase().as_str() {
            "actor" => Self::Actor,
            "item" => Self::Item,
            "journalentry" => Self::JournalEntry,
            "rolltable" => Self::RollTable,
            "scene" => Self::Scene,
            _ => Self::Other(declared.to_string()),
        })
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Actor => "Actor",
            Self::Item => "Item",
            Self::JournalEntry => "JournalEntry",
            Self::RollTable => "RollTable",
            Self::Scene => "Scene",
            Self::Other(other) => other,
        }
    }

    /// Item type to assume for entries whose own data carries no usable type.
    pub fn fallback_item_type(&self) -> String {
        match self {
            Self::Actor => "npc".to_string(),
            Self::Item => "item".to_string(),
            Self::JournalEntry => "journal".to_string(),
            Self::RollTable => "rolltable".to_string(),
            Self::Scene => "scene".to_string(),
            Self::Other(other) => other.to_lowercase(),
        }
    }
}

impl Display for DocumentType {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}", self.as_str())
    }
}
