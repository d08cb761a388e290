//! Migration sequencing
//!
//! Sorts collected migrations by version and links each one to its neighbors,
//! producing a navigable order. Links are arena indexes into the owning
//! vector, never pointers, so the resolved order is a simple path with no
//! ownership cycles.
//!
//! Reconciling ordering threads every already-applied migration (ascending)
//! before any unapplied one (ascending), modeling "replay history in the
//! order it truly happened, then proceed with new work" even when an
//! unapplied version is numerically smaller than an applied one.

use std::collections::HashMap;

use crate::error::{MigrationError, MigrationResult};
use crate::migration::Migration;

/// An ordered, linked set of migrations
#[derive(Debug, Default)]
pub struct MigrationSet {
    migrations: Vec<Migration>,
}

impl MigrationSet {
    /// Sort ascending by version and link neighbors.
    ///
    /// Panics when two migrations share a version: a duplicate indicates a
    /// corrupt migration set, not a recoverable runtime error.
    pub fn sort_and_link(mut migrations: Vec<Migration>) -> Self {
        migrations.sort_by_key(|m| m.version);
        panic_on_duplicates(&migrations);
        link_in_order(&mut migrations);
        Self { migrations }
    }

    /// Sort ascending, partition into applied-then-unapplied, and link along
    /// the concatenated order.
    ///
    /// Applied migrations keep their ascending order, as do unapplied ones;
    /// the last applied migration links forward to the first unapplied one.
    pub fn sort_and_link_with_applied(
        mut migrations: Vec<Migration>,
        applied: &HashMap<i64, bool>,
    ) -> Self {
        migrations.sort_by_key(|m| m.version);
        panic_on_duplicates(&migrations);

        let (mut ordered, mut unapplied): (Vec<_>, Vec<_>) = migrations
            .into_iter()
            .partition(|m| applied.get(&m.version).copied().unwrap_or(false));
        ordered.append(&mut unapplied);

        link_in_order(&mut ordered);
        Self { migrations: ordered }
    }

    /// The migration at exactly this version.
    pub fn current(&self, version: i64) -> MigrationResult<&Migration> {
        self.migrations
            .iter()
            .find(|m| m.version == version)
            .ok_or(MigrationError::NoCurrentVersion)
    }

    /// The migration to run after the given database version.
    ///
    /// Version 0 (a fresh database) resolves to the first migration in the
    /// order. A current version at the end of the order yields
    /// [`MigrationError::NoNextVersion`], the normal termination signal.
    pub fn next_after(&self, current: i64) -> MigrationResult<&Migration> {
        if current == 0 {
            return self.migrations.first().ok_or(MigrationError::NoNextVersion);
        }
        let cur = self.current(current)?;
        let idx = cur.next.ok_or(MigrationError::NoNextVersion)?;
        Ok(&self.migrations[idx])
    }

    /// The migration preceding the given version in the resolved order.
    pub fn previous_before(&self, current: i64) -> MigrationResult<&Migration> {
        let cur = self.current(current)?;
        let idx = cur.previous.ok_or(MigrationError::NoNextVersion)?;
        Ok(&self.migrations[idx])
    }

    /// The final migration in the resolved order.
    pub fn last(&self) -> MigrationResult<&Migration> {
        self.migrations.last().ok_or(MigrationError::NoNextVersion)
    }

    /// Iterate migrations in resolved order.
    pub fn iter(&self) -> std::slice::Iter<'_, Migration> {
        self.migrations.iter()
    }

    /// Number of migrations in the set.
    pub fn len(&self) -> usize {
        self.migrations.len()
    }

    /// Whether the set is empty.
    pub fn is_empty(&self) -> bool {
        self.migrations.is_empty()
    }
}

fn panic_on_duplicates(sorted: &[Migration]) {
    for pair in sorted.windows(2) {
        if pair[0].version == pair[1].version {
            panic!(
                "duplicate migration version {} detected:\n{}\n{}",
                pair[0].version, pair[0].source, pair[1].source
            );
        }
    }
}

fn link_in_order(migrations: &mut [Migration]) {
    for i in 1..migrations.len() {
        migrations[i - 1].next = Some(i);
        migrations[i].previous = Some(i - 1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn sql(version: i64) -> Migration {
        Migration::sql(version, PathBuf::from(format!("{:03}_test.sql", version)))
    }

    fn applied_map(versions: &[i64]) -> HashMap<i64, bool> {
        versions.iter().map(|&v| (v, true)).collect()
    }

    #[test]
    fn simple_ordering_walks_forward_and_backward() {
        let set = MigrationSet::sort_and_link(vec![sql(3), sql(1), sql(2)]);

        // forward walk from the minimum visits every version once
        let mut visited = Vec::new();
        let mut version = set.iter().next().unwrap().version;
        loop {
            visited.push(version);
            match set.current(version).unwrap().next {
                Some(idx) => version = set.iter().nth(idx).unwrap().version,
                None => break,
            }
        }
        assert_eq!(visited, vec![1, 2, 3]);

        // reverse walk via previous does the same
        let mut reversed = Vec::new();
        let mut version = set.last().unwrap().version;
        loop {
            reversed.push(version);
            match set.previous_before(version) {
                Ok(prev) => version = prev.version,
                Err(MigrationError::NoNextVersion) => break,
                Err(e) => panic!("unexpected error: {e}"),
            }
        }
        assert_eq!(reversed, vec![3, 2, 1]);
    }

    #[test]
    fn endpoints_have_no_dangling_links() {
        let set = MigrationSet::sort_and_link(vec![sql(2), sql(1)]);
        assert!(set.current(1).unwrap().previous.is_none());
        assert!(set.current(2).unwrap().next.is_none());
    }

    #[test]
    fn reconciling_order_is_applied_then_unapplied() {
        let set = MigrationSet::sort_and_link_with_applied(
            vec![sql(1), sql(2), sql(3), sql(4), sql(5)],
            &applied_map(&[2, 5]),
        );

        let order: Vec<i64> = set.iter().map(|m| m.version).collect();
        assert_eq!(order, vec![2, 5, 1, 3, 4]);

        // last applied splices into the first unapplied
        let after_five = set.next_after(5).unwrap();
        assert_eq!(after_five.version, 1);
    }

    #[test]
    fn reconciling_orders_interleaved_unapplied_last() {
        let set = MigrationSet::sort_and_link_with_applied(
            vec![sql(1), sql(2), sql(3)],
            &applied_map(&[1, 3]),
        );
        let order: Vec<i64> = set.iter().map(|m| m.version).collect();
        assert_eq!(order, vec![1, 3, 2]);
        assert_eq!(set.next_after(3).unwrap().version, 2);
    }

    #[test]
    fn reconciling_with_nothing_applied_degenerates_to_simple_order() {
        let set =
            MigrationSet::sort_and_link_with_applied(vec![sql(3), sql(1)], &HashMap::new());
        let order: Vec<i64> = set.iter().map(|m| m.version).collect();
        assert_eq!(order, vec![1, 3]);
    }

    #[test]
    fn reconciling_with_everything_applied_keeps_version_order() {
        let set = MigrationSet::sort_and_link_with_applied(
            vec![sql(2), sql(1)],
            &applied_map(&[1, 2]),
        );
        let order: Vec<i64> = set.iter().map(|m| m.version).collect();
        assert_eq!(order, vec![1, 2]);
        assert!(set.current(2).unwrap().next.is_none());
    }

    #[test]
    fn next_after_zero_is_the_first_migration() {
        let set = MigrationSet::sort_and_link(vec![sql(2), sql(1), sql(3)]);
        assert_eq!(set.next_after(0).unwrap().version, 1);
    }

    #[test]
    fn next_after_the_last_version_signals_no_next() {
        let set = MigrationSet::sort_and_link(vec![sql(1), sql(2), sql(3)]);
        let err = set.next_after(3).unwrap_err();
        assert!(matches!(err, MigrationError::NoNextVersion));
    }

    #[test]
    fn next_after_unknown_version_signals_no_current() {
        let set = MigrationSet::sort_and_link(vec![sql(1), sql(3)]);
        let err = set.next_after(2).unwrap_err();
        assert!(matches!(err, MigrationError::NoCurrentVersion));
    }

    #[test]
    fn next_after_zero_on_an_empty_set_signals_no_next() {
        let set = MigrationSet::sort_and_link(Vec::new());
        assert!(matches!(
            set.next_after(0).unwrap_err(),
            MigrationError::NoNextVersion
        ));
    }

    #[test]
    #[should_panic(expected = "duplicate migration version 7")]
    fn duplicate_versions_abort_sequencing() {
        MigrationSet::sort_and_link(vec![sql(7), sql(7)]);
    }

    #[test]
    #[should_panic(expected = "duplicate migration version 4")]
    fn duplicate_versions_abort_reconciling_sequencing() {
        MigrationSet::sort_and_link_with_applied(vec![sql(4), sql(4)], &HashMap::new());
    }
}
