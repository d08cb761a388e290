//! Migration definitions and single-step execution
//!
//! A migration is either an SQL script on disk or a Rust action registered
//! in-process. Both kinds are identified by a positive version number parsed
//! from their name and carry a forward and a backward action. Executing a
//! step always commits the schema change together with its history record.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{Postgres, Transaction};

use crate::error::{MigrationError, MigrationResult};
use crate::script::ScriptRunner;
use crate::state::HistoryStore;

/// Direction a migration is executed in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Apply the migration
    Up,
    /// Roll the migration back
    Down,
}

impl Direction {
    /// Lowercase name for logging.
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Up => "up",
            Direction::Down => "down",
        }
    }
}

/// A migration written in Rust and compiled into the binary.
///
/// Both procedures run inside the step transaction that also writes the
/// history record, so a failing action leaves no trace in the database.
#[async_trait]
pub trait RustMigration: Send + Sync {
    /// Forward schema or data change.
    async fn up(&self, tx: &mut Transaction<'_, Postgres>) -> MigrationResult<()>;

    /// Backward change reversing [`RustMigration::up`].
    async fn down(&self, tx: &mut Transaction<'_, Postgres>) -> MigrationResult<()>;
}

/// The two kinds of migration sources
#[derive(Clone)]
pub enum MigrationKind {
    /// SQL script on disk, executed by the script runner
    Sql { path: PathBuf },
    /// Rust migration; `action` is `None` when the file was discovered on
    /// disk but never registered in-process
    Rust {
        action: Option<Arc<dyn RustMigration>>,
    },
}

impl std::fmt::Debug for MigrationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MigrationKind::Sql { path } => f.debug_struct("Sql").field("path", path).finish(),
            MigrationKind::Rust { action } => f
                .debug_struct("Rust")
                .field("registered", &action.is_some())
                .finish(),
        }
    }
}

/// A single discovered migration
#[derive(Debug, Clone)]
pub struct Migration {
    /// Unique version number
    pub version: i64,
    /// Identifying path or registration name
    pub source: String,
    /// Script or Rust action
    pub kind: MigrationKind,
    /// Arena index of the successor in the resolved order
    pub(crate) next: Option<usize>,
    /// Arena index of the predecessor in the resolved order
    pub(crate) previous: Option<usize>,
}

impl Migration {
    /// Create an SQL script migration.
    pub fn sql(version: i64, path: PathBuf) -> Self {
        Self {
            version,
            source: path.display().to_string(),
            kind: MigrationKind::Sql { path },
            next: None,
            previous: None,
        }
    }

    /// Create a Rust migration; pass `None` for a discovered but
    /// unregistered file.
    pub fn rust(version: i64, source: String, action: Option<Arc<dyn RustMigration>>) -> Self {
        Self {
            version,
            source,
            kind: MigrationKind::Rust { action },
            next: None,
            previous: None,
        }
    }

    /// Base name of the migration source, for log lines.
    pub fn name(&self) -> &str {
        Path::new(&self.source)
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or(&self.source)
    }

    /// Execute this migration in the given direction.
    ///
    /// SQL scripts are handed to the script runner, which owns their
    /// transaction. Rust migrations run their action and the matching
    /// history write (insert going up, delete going down) in one
    /// transaction opened here; any failure rolls the whole step back.
    pub async fn execute(
        &self,
        store: &HistoryStore,
        runner: &dyn ScriptRunner,
        direction: Direction,
    ) -> MigrationResult<()> {
        match &self.kind {
            MigrationKind::Sql { path } => {
                runner
                    .run(path, self.version, direction)
                    .await
                    .map_err(|e| MigrationError::execution(self.name(), e))?;
            }
            MigrationKind::Rust { action } => {
                let action = action
                    .as_ref()
                    .ok_or_else(|| MigrationError::Unregistered(self.source.clone()))?;

                let mut tx = store.pool().begin().await?;

                let run = match direction {
                    Direction::Up => action.up(&mut tx).await,
                    Direction::Down => action.down(&mut tx).await,
                };
                // Dropping the transaction rolls it back.
                run.map_err(|e| MigrationError::execution(self.name(), e))?;

                let record = match direction {
                    Direction::Up => store.insert_record(&mut tx, self.version, true).await,
                    Direction::Down => store.delete_record(&mut tx, self.version).await,
                };
                record.map_err(|e| MigrationError::execution(self.name(), e))?;

                tx.commit()
                    .await
                    .map_err(|e| MigrationError::execution(self.name(), e.into()))?;
            }
        }

        tracing::info!("OK    {} ({})", self.name(), direction.as_str());
        Ok(())
    }
}

/// One row of the migration history table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MigrationRecord {
    /// Row identifier, monotonically assigned on insert
    pub id: i64,
    /// Migration version the event belongs to
    pub version: i64,
    /// True for an apply event, false for a rollback event
    pub is_applied: bool,
    /// When the event was recorded
    pub tstamp: DateTime<Utc>,
}
