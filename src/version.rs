//! Version extraction from migration names
//!
//! Migration files and registrations are named `<version>_<description>.<ext>`
//! where the leading digit run is the version. Anything that does not follow
//! the pattern is rejected so that non-migration files never pollute the
//! registry.

use std::ffi::OsStr;
use std::path::Path;

use crate::error::{MigrationError, MigrationResult};

/// Extension of SQL script migrations
pub const SQL_EXTENSION: &str = "sql";

/// Extension of Rust migration files (compiled into the binary and
/// registered in-process)
pub const RUST_EXTENSION: &str = "rs";

/// Extract the numeric version component from a migration name.
///
/// Accepts a bare file name or a full path; only the base name is inspected.
/// Versions must be positive 64-bit integers.
pub fn numeric_component(name: &str) -> MigrationResult<i64> {
    let base = Path::new(name)
        .file_name()
        .and_then(OsStr::to_str)
        .unwrap_or(name);

    match Path::new(base).extension().and_then(OsStr::to_str) {
        Some(SQL_EXTENSION) | Some(RUST_EXTENSION) => {}
        _ => return Err(invalid(name, "not a recognized migration file type")),
    }

    let idx = base
        .find('_')
        .ok_or_else(|| invalid(name, "no separator found"))?;

    let version: i64 = base[..idx]
        .parse()
        .map_err(|_| invalid(name, "version component is not a number"))?;

    if version <= 0 {
        return Err(invalid(name, "migration versions must be greater than zero"));
    }

    Ok(version)
}

fn invalid(name: &str, reason: &str) -> MigrationError {
    MigrationError::InvalidName {
        name: name.to_string(),
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_version_from_file_names() {
        assert_eq!(numeric_component("001_create_users.sql").unwrap(), 1);
        assert_eq!(numeric_component("042_add_index.rs").unwrap(), 42);
        assert_eq!(
            numeric_component("20240101120000_seed_data.sql").unwrap(),
            20240101120000
        );
    }

    #[test]
    fn extracts_version_from_full_paths() {
        assert_eq!(
            numeric_component("migrations/deep/007_views.sql").unwrap(),
            7
        );
    }

    #[test]
    fn rejects_unknown_extensions() {
        let err = numeric_component("001_readme.txt").unwrap_err();
        assert!(matches!(err, MigrationError::InvalidName { .. }));
    }

    #[test]
    fn rejects_missing_separator() {
        let err = numeric_component("001.sql").unwrap_err();
        assert!(matches!(err, MigrationError::InvalidName { .. }));
    }

    #[test]
    fn rejects_non_numeric_prefix() {
        assert!(numeric_component("abc_create.sql").is_err());
    }

    #[test]
    fn rejects_zero_and_negative_versions() {
        assert!(numeric_component("0_nothing.sql").is_err());
        assert!(numeric_component("-3_backwards.sql").is_err());
    }
}
