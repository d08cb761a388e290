//! Dialect SQL provider
//!
//! Generates the four statements the engine needs against the history table:
//! create, insert a version event, delete a version's events, and query the
//! full history ordered descending by row id. Everything else the engine
//! executes comes from migration scripts or registered actions, so this is
//! the only database-engine-specific seam.

/// Produces history-table SQL for a specific database engine.
pub trait Dialect: Send + Sync {
    /// Statement creating the history table.
    fn create_version_table_sql(&self, table: &str) -> String;

    /// Statement inserting a (version, applied) event; binds `$1` version,
    /// `$2` applied flag.
    fn insert_version_sql(&self, table: &str) -> String;

    /// Statement deleting all events for a version; binds `$1` version.
    fn delete_version_sql(&self, table: &str) -> String;

    /// Query returning id, version_id, is_applied, tstamp ordered by
    /// descending row id.
    fn version_query_sql(&self, table: &str) -> String;
}

/// PostgreSQL dialect
#[derive(Debug, Clone, Copy, Default)]
pub struct PostgresDialect;

impl Dialect for PostgresDialect {
    fn create_version_table_sql(&self, table: &str) -> String {
        format!(
            "CREATE TABLE {} (\n    \
                id BIGSERIAL PRIMARY KEY,\n    \
                version_id BIGINT NOT NULL,\n    \
                is_applied BOOLEAN NOT NULL,\n    \
                tstamp TIMESTAMPTZ NOT NULL DEFAULT now()\n\
            );",
            table
        )
    }

    fn insert_version_sql(&self, table: &str) -> String {
        format!(
            "INSERT INTO {} (version_id, is_applied) VALUES ($1, $2)",
            table
        )
    }

    fn delete_version_sql(&self, table: &str) -> String {
        format!("DELETE FROM {} WHERE version_id = $1", table)
    }

    fn version_query_sql(&self, table: &str) -> String {
        format!(
            "SELECT id, version_id, is_applied, tstamp FROM {} ORDER BY id DESC",
            table
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn postgres_statements_target_the_given_table() {
        let d = PostgresDialect;

        let create = d.create_version_table_sql("schema_versions");
        assert!(create.contains("CREATE TABLE schema_versions"));
        assert!(create.contains("version_id BIGINT NOT NULL"));

        let insert = d.insert_version_sql("schema_versions");
        assert!(insert.contains("INSERT INTO schema_versions"));
        assert!(insert.contains("($1, $2)"));

        let delete = d.delete_version_sql("schema_versions");
        assert!(delete.contains("DELETE FROM schema_versions WHERE version_id = $1"));

        let query = d.version_query_sql("schema_versions");
        assert!(query.contains("ORDER BY id DESC"));
    }
}
