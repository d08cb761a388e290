//! In-process registry of Rust migrations
//!
//! Rust migrations are compiled into the consuming binary and must be
//! registered here before collection. The registry is an explicit object
//! passed into the engine rather than process-global state, so registration
//! order is visible and validated up front.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::error::MigrationResult;
use crate::migration::RustMigration;
use crate::version::numeric_component;

/// A registered Rust migration
#[derive(Clone)]
pub(crate) struct RegisteredMigration {
    pub(crate) version: i64,
    pub(crate) source: String,
    pub(crate) action: Arc<dyn RustMigration>,
}

/// Catalog of in-process Rust migrations, keyed by version
#[derive(Default)]
pub struct Registry {
    migrations: BTreeMap<i64, RegisteredMigration>,
}

impl Registry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a Rust migration under its source name.
    ///
    /// The version is parsed from `name`; an unparsable name is an error.
    /// Registering two migrations under the same version is a configuration
    /// defect and aborts the process.
    pub fn register<M>(&mut self, name: &str, action: M) -> MigrationResult<()>
    where
        M: RustMigration + 'static,
    {
        let version = numeric_component(name)?;

        if let Some(existing) = self.migrations.get(&version) {
            panic!(
                "failed to register migration '{}': version {} conflicts with '{}'",
                name, version, existing.source
            );
        }

        self.migrations.insert(
            version,
            RegisteredMigration {
                version,
                source: name.to_string(),
                action: Arc::new(action),
            },
        );
        Ok(())
    }

    /// Whether a migration is registered under this version.
    pub fn contains(&self, version: i64) -> bool {
        self.migrations.contains_key(&version)
    }

    /// Number of registered migrations.
    pub fn len(&self) -> usize {
        self.migrations.len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.migrations.is_empty()
    }

    /// Registered migrations in ascending version order.
    pub(crate) fn iter(&self) -> impl Iterator<Item = &RegisteredMigration> {
        self.migrations.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::MigrationError;
    use async_trait::async_trait;
    use sqlx::{Postgres, Transaction};

    struct Noop;

    #[async_trait]
    impl RustMigration for Noop {
        async fn up(&self, _tx: &mut Transaction<'_, Postgres>) -> MigrationResult<()> {
            Ok(())
        }

        async fn down(&self, _tx: &mut Transaction<'_, Postgres>) -> MigrationResult<()> {
            Ok(())
        }
    }

    #[test]
    fn registers_by_parsed_version() {
        let mut registry = Registry::new();
        registry.register("003_add_flags.rs", Noop).unwrap();

        assert!(registry.contains(3));
        assert!(!registry.contains(4));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn rejects_unparsable_names() {
        let mut registry = Registry::new();
        let err = registry.register("not_a_migration.txt", Noop).unwrap_err();
        assert!(matches!(err, MigrationError::InvalidName { .. }));
        assert!(registry.is_empty());
    }

    #[test]
    #[should_panic(expected = "version 5 conflicts")]
    fn duplicate_version_registration_is_fatal() {
        let mut registry = Registry::new();
        registry.register("005_first.rs", Noop).unwrap();
        registry.register("005_second.rs", Noop).unwrap();
    }
}
