//! History repair
//!
//! A reconciling bulk-apply inserts history rows in traversal order, which
//! can leave row ids disagreeing with version order (an applied migration
//! with a small version gets a late row id). The repair pass swaps the
//! version/applied/timestamp payloads between offending adjacent rows so id
//! order and version order agree again. Row ids themselves never change and
//! no version's applied state changes; this is purely an ordering repair.

use crate::error::{MigrationError, MigrationResult};
use crate::migration::MigrationRecord;
use crate::state::HistoryStore;

impl HistoryStore {
    /// Repair row-id/version ordering inconsistencies in the history table.
    ///
    /// Runs in its own transaction; any write failure aborts the whole
    /// repair.
    pub async fn repair(&self) -> MigrationResult<()> {
        let rows = self.fetch_records().await?;
        let updates = repair_plan(&rows);
        if updates.is_empty() {
            return Ok(());
        }

        let sql = format!(
            "UPDATE {} SET version_id = $1, is_applied = $2, tstamp = $3 WHERE id = $4",
            self.table
        );

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(MigrationError::RepairFailed)?;

        for record in &updates {
            sqlx::query(&sql)
                .bind(record.version)
                .bind(record.is_applied)
                .bind(record.tstamp)
                .bind(record.id)
                .execute(&mut *tx)
                .await
                .map_err(MigrationError::RepairFailed)?;
        }

        tx.commit().await.map_err(MigrationError::RepairFailed)?;
        tracing::debug!(rows = updates.len(), "repaired history row ordering");
        Ok(())
    }
}

/// Compute the row updates that reconcile id order with version order.
///
/// `rows` must be ordered descending by id. Walks adjacent pairs; whenever
/// the id order contradicts the version order the two payloads trade ids.
/// After a swap against a descending neighbor the displaced payload keeps
/// bubbling toward its place, so one pass is enough for the patterns a
/// reconciling apply produces. Later updates for the same id supersede
/// earlier ones when applied in order.
pub(crate) fn repair_plan(rows: &[MigrationRecord]) -> Vec<MigrationRecord> {
    let mut updates = Vec::new();
    let mut prev: Option<MigrationRecord> = None;

    for row in rows {
        let mut row = row.clone();
        let Some(mut p) = prev.take() else {
            prev = Some(row);
            continue;
        };

        if p.id > row.id && p.version < row.version {
            std::mem::swap(&mut p.id, &mut row.id);
            updates.push(p.clone());
            updates.push(row);
            prev = Some(p);
        } else if p.id < row.id && p.version > row.version {
            std::mem::swap(&mut p.id, &mut row.id);
            updates.push(p);
            updates.push(row.clone());
            prev = Some(row);
        } else {
            prev = Some(row);
        }
    }

    updates
}
