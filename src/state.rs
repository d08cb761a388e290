//! Migration history state
//!
//! Reads and writes the history table that records every apply and rollback
//! event. The table is append-only from the engine's perspective: the current
//! state of a version is decided by its most recent record, so the scans here
//! walk rows in descending id order and skip versions whose latest event is a
//! rollback.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use sqlx::postgres::PgRow;
use sqlx::{PgPool, Postgres, Row, Transaction};

use crate::dialect::Dialect;
use crate::error::{MigrationError, MigrationResult};
use crate::migration::MigrationRecord;

/// Reads and writes the migration history table
pub struct HistoryStore {
    pub(crate) pool: PgPool,
    pub(crate) dialect: Arc<dyn Dialect>,
    pub(crate) table: String,
}

impl HistoryStore {
    /// Create a store for the given history table.
    pub fn new(pool: PgPool, dialect: Arc<dyn Dialect>, table: impl Into<String>) -> Self {
        Self {
            pool,
            dialect,
            table: table.into(),
        }
    }

    /// The underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// The current database version, creating the history table on first
    /// contact.
    ///
    /// A database whose history table is missing is initialized with a
    /// (version 0, applied) seed record and reported as version 0. A history
    /// table holding no applied record at all yields
    /// [`MigrationError::NoCurrentVersion`].
    pub async fn ensure_version(&self) -> MigrationResult<i64> {
        let rows = match self.fetch_records().await {
            Ok(rows) => rows,
            Err(_) => {
                self.create_version_table().await?;
                return Ok(0);
            }
        };
        current_version_in(&rows)
    }

    /// Every version whose most recent record is an apply event.
    ///
    /// Versions whose latest record is a rollback are absent from the map
    /// rather than present as false.
    pub async fn applied_versions(&self) -> MigrationResult<HashMap<i64, bool>> {
        let rows = match self.fetch_records().await {
            Ok(rows) => rows,
            Err(_) => {
                self.create_version_table().await?;
                return Ok(HashMap::new());
            }
        };
        Ok(applied_versions_in(&rows))
    }

    /// Full history ordered descending by row id.
    pub async fn fetch_records(&self) -> MigrationResult<Vec<MigrationRecord>> {
        let sql = self.dialect.version_query_sql(&self.table);
        let rows = sqlx::query(&sql).fetch_all(&self.pool).await?;
        rows.iter().map(record_from_row).collect()
    }

    /// Insert an apply or rollback event within the caller's transaction.
    pub async fn insert_record(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        version: i64,
        applied: bool,
    ) -> MigrationResult<()> {
        let sql = self.dialect.insert_version_sql(&self.table);
        sqlx::query(&sql)
            .bind(version)
            .bind(applied)
            .execute(&mut **tx)
            .await?;
        Ok(())
    }

    /// Delete every event for a version within the caller's transaction.
    pub async fn delete_record(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        version: i64,
    ) -> MigrationResult<()> {
        let sql = self.dialect.delete_version_sql(&self.table);
        sqlx::query(&sql).bind(version).execute(&mut **tx).await?;
        Ok(())
    }

    async fn create_version_table(&self) -> MigrationResult<()> {
        let mut tx = self.pool.begin().await?;

        let create = self.dialect.create_version_table_sql(&self.table);
        sqlx::query(&create).execute(&mut *tx).await?;

        let seed = self.dialect.insert_version_sql(&self.table);
        sqlx::query(&seed)
            .bind(0_i64)
            .bind(true)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        tracing::debug!(table = %self.table, "created migration history table");
        Ok(())
    }
}

fn record_from_row(row: &PgRow) -> MigrationResult<MigrationRecord> {
    Ok(MigrationRecord {
        id: row.try_get("id")?,
        version: row.try_get("version_id")?,
        is_applied: row.try_get("is_applied")?,
        tstamp: row.try_get("tstamp")?,
    })
}

/// Resolve the current version from rows ordered descending by id: the first
/// version whose latest record is an apply event, skipping versions whose
/// latest record is a rollback.
pub(crate) fn current_version_in(rows: &[MigrationRecord]) -> MigrationResult<i64> {
    let mut to_skip: Vec<i64> = Vec::new();

    for row in rows {
        if to_skip.contains(&row.version) {
            continue;
        }
        if row.is_applied {
            return Ok(row.version);
        }
        // latest event for this version was a rollback
        to_skip.push(row.version);
    }

    Err(MigrationError::NoCurrentVersion)
}

/// Build the applied-version map from rows ordered descending by id. A stale
/// apply event shadowed by a later rollback never counts as applied.
pub(crate) fn applied_versions_in(rows: &[MigrationRecord]) -> HashMap<i64, bool> {
    let mut applied = HashMap::new();
    let mut failed: HashSet<i64> = HashSet::new();

    for row in rows {
        if row.is_applied && !failed.contains(&row.version) {
            applied.insert(row.version, true);
        } else {
            failed.insert(row.version);
        }
    }

    applied
}
