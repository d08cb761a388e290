//! Migration applier
//!
//! The `Migrator` is the engine's front door: it collects migrations, asks
//! the resolved sequence for the step after the current database version and
//! executes one step at a time until nothing is left. The current version is
//! re-read from the database before every step, so a partial earlier run or
//! an externally advanced database is always respected.

use std::path::PathBuf;
use std::sync::Arc;

use sqlx::PgPool;

use crate::collect::{collect_all_migrations, collect_migrations};
use crate::dialect::{Dialect, PostgresDialect};
use crate::error::{MigrationError, MigrationResult};
use crate::migration::{Direction, Migration};
use crate::registry::Registry;
use crate::script::{ScriptRunner, SqlScriptRunner};
use crate::sequence::MigrationSet;
use crate::state::HistoryStore;

/// Lowest version bound; version 0 is the seed record of a fresh database.
pub const MIN_VERSION: i64 = 0;

/// Highest version bound, used when applying everything pending.
pub const MAX_VERSION: i64 = i64::MAX;

/// Configuration for the migration engine
#[derive(Debug, Clone)]
pub struct MigratorConfig {
    /// Directory holding migration files
    pub dir: PathBuf,
    /// Name of the history table
    pub table: String,
}

impl Default for MigratorConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("migrations"),
            table: "drover_db_version".to_string(),
        }
    }
}

/// Applies migrations against a PostgreSQL database
pub struct Migrator {
    config: MigratorConfig,
    registry: Registry,
    store: HistoryStore,
    runner: Arc<dyn ScriptRunner>,
}

impl Migrator {
    /// Create a migrator with the default PostgreSQL dialect and script
    /// runner.
    pub fn new(pool: PgPool, config: MigratorConfig, registry: Registry) -> Self {
        Self::with_dialect(pool, config, registry, Arc::new(PostgresDialect))
    }

    /// Create a migrator with a custom dialect.
    pub fn with_dialect(
        pool: PgPool,
        config: MigratorConfig,
        registry: Registry,
        dialect: Arc<dyn Dialect>,
    ) -> Self {
        let store = HistoryStore::new(pool.clone(), dialect.clone(), config.table.clone());
        let runner = Arc::new(SqlScriptRunner::new(pool, dialect, config.table.clone()));
        Self {
            config,
            registry,
            store,
            runner,
        }
    }

    /// Replace the script runner.
    pub fn with_script_runner(mut self, runner: Arc<dyn ScriptRunner>) -> Self {
        self.runner = runner;
        self
    }

    /// The configuration in use.
    pub fn config(&self) -> &MigratorConfig {
        &self.config
    }

    /// The history store in use.
    pub fn store(&self) -> &HistoryStore {
        &self.store
    }

    /// Apply migrations forward until the database reaches `target`.
    pub async fn up_to(&self, target: i64) -> MigrationResult<()> {
        let migrations =
            collect_migrations(&self.config.dir, &self.registry, MIN_VERSION, target)?;
        self.apply_forward(&migrations).await
    }

    /// Apply every pending migration above the current version.
    pub async fn up(&self) -> MigrationResult<()> {
        self.up_to(MAX_VERSION).await
    }

    /// Apply exactly one pending migration.
    ///
    /// Returns [`MigrationError::NoNextVersion`] when the database is
    /// already at the last known migration, so callers can tell "nothing to
    /// do" apart from a real failure.
    pub async fn up_by_one(&self) -> MigrationResult<()> {
        let migrations =
            collect_migrations(&self.config.dir, &self.registry, MIN_VERSION, MAX_VERSION)?;
        let current = self.store.ensure_version().await?;

        match migrations.next_after(current) {
            Ok(next) => {
                next.execute(&self.store, self.runner.as_ref(), Direction::Up)
                    .await
            }
            Err(MigrationError::NoNextVersion) => {
                tracing::info!(current, "no migrations to run");
                Err(MigrationError::NoNextVersion)
            }
            Err(e) => Err(e),
        }
    }

    /// Apply every unapplied migration, including ones interleaved below the
    /// current version, then repair the history row ordering.
    ///
    /// Already-applied migrations are sequenced first in the order history
    /// recorded them, so the walk resumes at the newest applied version and
    /// proceeds through everything still pending.
    pub async fn up_all(&self) -> MigrationResult<()> {
        let applied = self.store.applied_versions().await?;
        let migrations = collect_all_migrations(
            &self.config.dir,
            &self.registry,
            &applied,
            MIN_VERSION,
            MAX_VERSION,
        )?;

        self.apply_forward(&migrations).await?;
        self.store.repair().await
    }

    /// Roll migrations back until the database is at or below `target`.
    pub async fn down_to(&self, target: i64) -> MigrationResult<()> {
        let current = self.store.ensure_version().await?;
        let migrations = collect_migrations(&self.config.dir, &self.registry, current, target)?;

        loop {
            let current = self.store.ensure_version().await?;
            if current <= target {
                tracing::info!(current, "no migrations to run");
                return Ok(());
            }

            let migration = migrations.current(current)?;
            migration
                .execute(&self.store, self.runner.as_ref(), Direction::Down)
                .await?;
        }
    }

    /// Roll back the single most recent migration.
    pub async fn down(&self) -> MigrationResult<()> {
        let migrations =
            collect_migrations(&self.config.dir, &self.registry, MIN_VERSION, MAX_VERSION)?;
        let current = self.store.ensure_version().await?;

        let migration = migrations.current(current)?;
        migration
            .execute(&self.store, self.runner.as_ref(), Direction::Down)
            .await
    }

    /// The current resolved database version, creating the history table on
    /// first contact.
    pub async fn version(&self) -> MigrationResult<i64> {
        self.store.ensure_version().await
    }

    /// Every known migration paired with whether it is currently applied.
    pub async fn status(&self) -> MigrationResult<Vec<(Migration, bool)>> {
        let migrations =
            collect_migrations(&self.config.dir, &self.registry, MIN_VERSION, MAX_VERSION)?;
        let applied = self.store.applied_versions().await?;

        Ok(migrations
            .iter()
            .map(|m| {
                let is_applied = applied.get(&m.version).copied().unwrap_or(false);
                (m.clone(), is_applied)
            })
            .collect())
    }

    /// Drive the database forward one step at a time until the sequence is
    /// exhausted.
    async fn apply_forward(&self, migrations: &MigrationSet) -> MigrationResult<()> {
        loop {
            let current = self.store.ensure_version().await?;

            match migrations.next_after(current) {
                Ok(next) => {
                    next.execute(&self.store, self.runner.as_ref(), Direction::Up)
                        .await?
                }
                Err(MigrationError::NoNextVersion) => {
                    tracing::info!(current, "no migrations to run");
                    return Ok(());
                }
                Err(e) => return Err(e),
            }
        }
    }
}
