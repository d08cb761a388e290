//! Error types for the migration engine
//!
//! Provides the failure taxonomy shared by discovery, sequencing, state
//! reading and execution. Duplicate migration versions are deliberately not
//! represented here: they indicate a corrupt migration set and abort the
//! process at detection time.

use thiserror::Error;

/// Result type alias for migration operations
pub type MigrationResult<T> = Result<T, MigrationError>;

/// Errors that can occur while resolving or applying migrations
#[derive(Debug, Error)]
pub enum MigrationError {
    /// Migration file or registration name has no usable version component
    #[error("invalid migration name '{name}': {reason}")]
    InvalidName { name: String, reason: String },

    /// The configured migrations directory does not exist
    #[error("migrations directory '{0}' does not exist")]
    DirectoryNotFound(String),

    /// No history record with an applied flag was found
    #[error("no current version found")]
    NoCurrentVersion,

    /// There is no migration after the current version; normal loop
    /// termination, not a failure to surface to end users
    #[error("no next version found")]
    NoNextVersion,

    /// A Rust migration file exists on disk but was never registered
    /// in-process; registered migrations must be compiled into the binary
    #[error("migration '{0}' is not registered")]
    Unregistered(String),

    /// A migration's forward or backward action failed; wraps the underlying
    /// error together with the offending source
    #[error("failed to run migration '{name}'")]
    ExecutionFailed {
        name: String,
        #[source]
        cause: Box<MigrationError>,
    },

    /// The history repair transaction could not be completed
    #[error("history repair failed")]
    RepairFailed(#[source] sqlx::Error),

    /// Database connection or query error
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Filesystem error while reading migration files
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

impl MigrationError {
    /// Wrap an error as an execution failure naming the migration source.
    pub fn execution(name: impl Into<String>, cause: MigrationError) -> Self {
        Self::ExecutionFailed {
            name: name.into(),
            cause: Box::new(cause),
        }
    }
}
