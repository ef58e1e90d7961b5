//! Reading and writing compendium items.
//!
//! Writes during a build go through [`Session`]s, one per worker, each owning
//! a pooled connection. Everything else (finalisation and the query API used
//! by the mapping layer) goes through the [`Repository`].

use crate::Database;
use crate::error::{ErrorKind, Result};
use crate::models::{Candidate, ItemRow, TypeCount};
use exn::ResultExt;
use grimoire_packs::CompendiumItem;
use sqlx::pool::PoolConnection;
use sqlx::{Acquire, Sqlite, SqliteConnection, SqlitePool};
use tracing::instrument;

async fn insert_all(conn: &mut SqliteConnection, items: &[CompendiumItem]) -> Result<u64> {
    let mut tx = conn.begin().await.or_raise(|| ErrorKind::Database)?;
    let mut inserted = 0;
    for item in items {
        let row = ItemRow::from(item);
        inserted += sqlx::query(include_str!("../queries/insert_item.sql"))
            .bind(row.id)
            .bind(row.source_id)
            .bind(row.name)
            .bind(row.item_type)
            .bind(row.system)
            .bind(row.raw_data)
            .bind(row.source_format)
            .bind(row.source_name)
            .bind(row.is_primary)
            .bind(row.loaded_at)
            .bind(row.description)
            .bind(row.source)
            .bind(row.rarity)
            .bind(row.pack_seq)
            .bind(row.item_seq)
            .execute(&mut *tx)
            .await
            .or_raise(|| ErrorKind::Database)?
            .rows_affected();
    }
    tx.commit().await.or_raise(|| ErrorKind::Database)?;
    Ok(inserted)
}

/// A worker's own connection to the cache.
#[derive(Debug)]
pub struct Session {
    conn: PoolConnection<Sqlite>,
}
impl Session {
    pub(crate) fn new(conn: PoolConnection<Sqlite>) -> Self {
        Self { conn }
    }

    /// Append one pack's items in a single transaction. Either every item is
    /// stored or none is.
    #[instrument(skip_all, fields(items = items.len()))]
    pub async fn insert_items(&mut self, items: &[CompendiumItem]) -> Result<u64> {
        insert_all(&mut self.conn, items).await
    }
}

/// Repository for compendium items in the cache database.
#[derive(Debug, Clone)]
pub struct Repository {
    pool: SqlitePool,
}
impl From<&Database> for Repository {
    fn from(db: &Database) -> Self {
        Self { pool: db.pool().clone() }
    }
}
impl Repository {
    /// Create a new repository with the given connection pool.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    // =========================================================================
    // Insert
    // =========================================================================

    /// Append items in a single transaction.
    pub async fn insert_items(&self, items: &[CompendiumItem]) -> Result<u64> {
        let mut conn = self.pool.acquire().await.or_raise(|| ErrorKind::Database)?;
        insert_all(&mut conn, items).await
    }

    // =========================================================================
    // Finalisation
    // =========================================================================

    /// Every item's identity and provenance, ordered so that items sharing
    /// `(name, type, system)` are adjacent and in discovery order.
    pub async fn candidates(&self) -> Result<Vec<Candidate>> {
        sqlx::query_as(include_str!("../queries/list_candidates.sql"))
            .fetch_all(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)
    }

    /// Make exactly the given items primary, in one transaction.
    #[instrument(skip_all, fields(primaries = ids.len()))]
    pub async fn set_primaries(&self, ids: &[String]) -> Result<()> {
        let mut tx = self.pool.begin().await.or_raise(|| ErrorKind::Database)?;
        sqlx::query(include_str!("../queries/reset_primary.sql"))
            .execute(&mut *tx)
            .await
            .or_raise(|| ErrorKind::Database)?;
        for id in ids {
            sqlx::query(include_str!("../queries/mark_primary.sql"))
                .bind(id)
                .execute(&mut *tx)
                .await
                .or_raise(|| ErrorKind::Database)?;
        }
        tx.commit().await.or_raise(|| ErrorKind::Database)?;
        Ok(())
    }

    // =========================================================================
    // Query
    // =========================================================================

    /// The primary item for an identity. Without a system, the primary of
    /// whichever system was discovered first is returned.
    pub async fn find_primary(
        &self,
        item_type: impl AsRef<str>,
        name: impl AsRef<str>,
        system: Option<&str>,
    ) -> Result<Option<CompendiumItem>> {
        let row: Option<ItemRow> = sqlx::query_as(include_str!("../queries/find_primary.sql"))
            .bind(item_type.as_ref())
            .bind(name.as_ref())
            .bind(system)
            .fetch_optional(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        row.map(CompendiumItem::try_from).transpose()
    }

    /// Every item sharing an identity, primary first, then in discovery order.
    pub async fn find_all_candidates(
        &self,
        item_type: impl AsRef<str>,
        name: impl AsRef<str>,
        system: Option<&str>,
    ) -> Result<Vec<CompendiumItem>> {
        let rows: Vec<ItemRow> = sqlx::query_as(include_str!("../queries/find_all_candidates.sql"))
            .bind(item_type.as_ref())
            .bind(name.as_ref())
            .bind(system)
            .fetch_all(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        rows.into_iter().map(CompendiumItem::try_from).collect()
    }

    /// Primary items of one type, ordered by name.
    pub async fn list_by_type(&self, item_type: impl AsRef<str>) -> Result<Vec<CompendiumItem>> {
        let rows: Vec<ItemRow> = sqlx::query_as(include_str!("../queries/list_by_type.sql"))
            .bind(item_type.as_ref())
            .fetch_all(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        rows.into_iter().map(CompendiumItem::try_from).collect()
    }

    // =========================================================================
    // Counts
    // =========================================================================

    /// Total number of items, primary or not.
    pub async fn count(&self) -> Result<u64> {
        let count: i64 = sqlx::query_scalar(include_str!("../queries/count_items.sql"))
            .fetch_one(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        u64::try_from(count).or_raise(|| ErrorKind::InvalidData("count"))
    }

    /// Primary items per system and type, largest first.
    pub async fn stats(&self) -> Result<Vec<TypeCount>> {
        let rows: Vec<(Option<String>, String, i64)> = sqlx::query_as(include_str!("../queries/stats.sql"))
            .fetch_all(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        rows.into_iter()
            .map(|(system, item_type, count)| {
                let count = u64::try_from(count).or_raise(|| ErrorKind::InvalidData("count"))?;
                Ok(TypeCount { system, item_type, count })
            })
            .collect()
    }
}
