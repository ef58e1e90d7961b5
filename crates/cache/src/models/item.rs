use crate::error::{Error, ErrorKind};
use exn::ResultExt;
use grimoire_packs::{CompendiumItem, PackFormat, RawData};
use time::UtcDateTime;

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct ItemRow {
    pub(crate) id: String,
    pub(crate) source_id: String,
    pub(crate) name: String,
    #[sqlx(rename = "type")]
    pub(crate) item_type: String,
    pub(crate) system: Option<String>,
    pub(crate) raw_data: String,
    pub(crate) source_format: String,
    pub(crate) source_name: String,
    pub(crate) is_primary: bool,
    pub(crate) loaded_at: i64,
    pub(crate) description: Option<String>,
    pub(crate) source: Option<String>,
    pub(crate) rarity: Option<String>,
    pub(crate) pack_seq: i64,
    pub(crate) item_seq: i64,
}
impl From<&CompendiumItem> for ItemRow {
    fn from(item: &CompendiumItem) -> Self {
        Self {
            id: item.id.clone(),
            source_id: item.source_id.clone(),
            name: item.name.clone(),
            item_type: item.item_type.clone(),
            system: item.system.clone(),
            raw_data: item.data.to_json(),
            source_format: item.source_format.as_str().to_string(),
            source_name: item.source_name.clone(),
            is_primary: item.is_primary,
            loaded_at: item.loaded_at.unix_timestamp(),
            description: item.description.clone(),
            source: item.source.clone(),
            rarity: item.rarity.clone(),
            pack_seq: i64::from(item.pack_seq),
            item_seq: i64::from(item.item_seq),
        }
    }
}
impl TryFrom<ItemRow> for CompendiumItem {
    type Error = Error;
    fn try_from(row: ItemRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            source_id: row.source_id,
            name: row.name,
            item_type: row.item_type,
            data: RawData::from_json(&row.raw_data).or_raise(|| ErrorKind::InvalidData("raw data"))?,
            source_format: row.source_format.parse::<PackFormat>().unwrap_or_default(),
            source_name: row.source_name,
            system: row.system,
            is_primary: row.is_primary,
            loaded_at: UtcDateTime::from_unix_timestamp(row.loaded_at)
                .or_raise(|| ErrorKind::InvalidData("loaded at"))?,
            description: row.description,
            source: row.source,
            rarity: row.rarity,
            pack_seq: u32::try_from(row.pack_seq).or_raise(|| ErrorKind::InvalidData("pack sequence"))?,
            item_seq: u32::try_from(row.item_seq).or_raise(|| ErrorKind::InvalidData("item sequence"))?,
        })
    }
}

/// The columns of an item that conflict resolution looks at.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct Candidate {
    pub id: String,
    pub name: String,
    #[sqlx(rename = "type")]
    pub item_type: String,
    pub system: Option<String>,
    pub source_name: String,
    #[sqlx(try_from = "i64")]
    pub pack_seq: u32,
    #[sqlx(try_from = "i64")]
    pub item_seq: u32,
}
impl Candidate {
    pub fn identity(&self) -> (&str, &str, Option<&str>) {
        (&self.name, &self.item_type, self.system.as_deref())
    }
}

/// Number of primary items of one type within one system.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeCount {
    pub system: Option<String>,
    pub item_type: String,
    pub count: u64,
}
