//! Migration discovery and collection
//!
//! Builds the in-memory migration set from three sources: SQL scripts on
//! disk, Rust migrations registered in-process, and Rust migration files
//! discovered on disk. Scripts are held to a stricter standard than Rust
//! files: an unparsable script name aborts the whole collection, while Rust
//! files that do not look like migrations are assumed to be auxiliary code
//! and skipped.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{MigrationError, MigrationResult};
use crate::migration::Migration;
use crate::registry::Registry;
use crate::sequence::MigrationSet;
use crate::version::{numeric_component, RUST_EXTENSION, SQL_EXTENSION};

/// List files with the given extension in a directory, sorted by name.
pub fn list_files(dir: &Path, extension: &str) -> MigrationResult<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() && path.extension().map_or(false, |e| e == extension) {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// Collect every migration with `current < version <= target` (or the
/// mirrored range when moving backward) and sequence it in simple version
/// order.
pub fn collect_migrations(
    dir: &Path,
    registry: &Registry,
    current: i64,
    target: i64,
) -> MigrationResult<MigrationSet> {
    let migrations = discover(dir, registry, |v| version_filter(v, current, target))?;
    Ok(MigrationSet::sort_and_link(migrations))
}

/// Collect unapplied migrations unconditionally plus applied migrations in
/// the forward range, and sequence them in reconciling order (applied before
/// unapplied).
pub fn collect_all_migrations(
    dir: &Path,
    registry: &Registry,
    applied: &HashMap<i64, bool>,
    current: i64,
    target: i64,
) -> MigrationResult<MigrationSet> {
    let migrations = discover(dir, registry, |v| {
        unapplied_version_filter(v, current, target, is_applied(applied, v))
    })?;
    Ok(MigrationSet::sort_and_link_with_applied(migrations, applied))
}

fn is_applied(applied: &HashMap<i64, bool>, version: i64) -> bool {
    applied.get(&version).copied().unwrap_or(false)
}

fn discover(
    dir: &Path,
    registry: &Registry,
    include: impl Fn(i64) -> bool,
) -> MigrationResult<Vec<Migration>> {
    if !dir.is_dir() {
        return Err(MigrationError::DirectoryNotFound(
            dir.display().to_string(),
        ));
    }

    let mut migrations = Vec::new();

    // SQL scripts: any unparsable name aborts the collection.
    for path in list_files(dir, SQL_EXTENSION)? {
        let version = numeric_component(&path.display().to_string())?;
        if include(version) {
            migrations.push(Migration::sql(version, path));
        }
    }

    // Registered Rust migrations.
    for registered in registry.iter() {
        if include(registered.version) {
            migrations.push(Migration::rust(
                registered.version,
                registered.source.clone(),
                Some(registered.action.clone()),
            ));
        }
    }

    // Rust migration files on disk. Files without a version prefix are
    // auxiliary code, not migrations; versions covered by a registration are
    // skipped so the same migration never runs twice.
    for path in list_files(dir, RUST_EXTENSION)? {
        let Ok(version) = numeric_component(&path.display().to_string()) else {
            continue;
        };
        if registry.contains(version) {
            continue;
        }
        if include(version) {
            migrations.push(Migration::rust(version, path.display().to_string(), None));
        }
    }

    Ok(migrations)
}

/// Whether a version lies in the half-open range walked from `current`
/// toward `target`.
pub fn version_filter(v: i64, current: i64, target: i64) -> bool {
    if target > current {
        return v > current && v <= target;
    }
    if target < current {
        return v <= current && v > target;
    }
    false
}

/// Reconciling inclusion rule: unapplied versions are always collected;
/// applied versions only when moving forward. Reconciling mode never walks
/// backward.
pub fn unapplied_version_filter(v: i64, current: i64, target: i64, applied: bool) -> bool {
    if !applied {
        return true;
    }
    if target > current {
        return v > current && v <= target;
    }
    false
}
