//! # drover: versioned SQL migrations for PostgreSQL
//!
//! Tracks and applies ordered schema changes so a database can be brought to
//! any target state deterministically and idempotently. Migrations are SQL
//! scripts on disk or Rust actions registered in-process; every applied or
//! rolled-back step is recorded in a history table, and the engine advances
//! the database one transactional step at a time.
//!
//! ```ignore
//! use drover::{Migrator, MigratorConfig, Registry};
//!
//! let pool = sqlx::PgPool::connect(&database_url).await?;
//! let migrator = Migrator::new(pool, MigratorConfig::default(), Registry::new());
//! migrator.up().await?;
//! ```

pub mod collect;
pub mod dialect;
pub mod error;
pub mod migration;
pub mod migrator;
pub mod registry;
mod repair;
pub mod script;
pub mod sequence;
pub mod state;
pub mod version;

pub use collect::{collect_all_migrations, collect_migrations, version_filter};
pub use dialect::{Dialect, PostgresDialect};
pub use error::{MigrationError, MigrationResult};
pub use migration::{Direction, Migration, MigrationKind, MigrationRecord, RustMigration};
pub use migrator::{Migrator, MigratorConfig, MAX_VERSION, MIN_VERSION};
pub use registry::Registry;
pub use script::{ScriptRunner, SqlScriptRunner};
pub use sequence::MigrationSet;
pub use state::HistoryStore;
pub use version::numeric_component;
