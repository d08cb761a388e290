//! SQL script execution
//!
//! Script migrations are plain SQL files with `-- up` and `-- down` sections.
//! The runner executes the section matching the requested direction together
//! with the history record for that step in a single transaction, so a script
//! is never half-applied without a record.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use sqlparser::dialect::GenericDialect;
use sqlparser::parser::Parser;
use sqlx::PgPool;

use crate::dialect::Dialect;
use crate::error::MigrationResult;
use crate::migration::Direction;

/// Executes one SQL script migration against the database
#[async_trait]
pub trait ScriptRunner: Send + Sync {
    /// Run the script at `path` for `version` in the given direction.
    async fn run(&self, path: &Path, version: i64, direction: Direction) -> MigrationResult<()>;
}

/// Default script runner backed by sqlx
pub struct SqlScriptRunner {
    pool: PgPool,
    dialect: Arc<dyn Dialect>,
    table: String,
}

impl SqlScriptRunner {
    /// Create a runner recording history into the given table.
    pub fn new(pool: PgPool, dialect: Arc<dyn Dialect>, table: impl Into<String>) -> Self {
        Self {
            pool,
            dialect,
            table: table.into(),
        }
    }
}

#[async_trait]
impl ScriptRunner for SqlScriptRunner {
    async fn run(&self, path: &Path, version: i64, direction: Direction) -> MigrationResult<()> {
        let content = fs::read_to_string(path)?;
        let (up_sql, down_sql) = parse_script_sections(&content);
        let sql = match direction {
            Direction::Up => up_sql,
            Direction::Down => down_sql,
        };

        let mut tx = self.pool.begin().await?;

        for statement in split_sql_statements(&sql) {
            if statement.trim().is_empty() {
                continue;
            }
            sqlx::query(&statement).execute(&mut *tx).await?;
        }

        // Record the event in the same transaction; rollbacks append an
        // is_applied = false record rather than deleting history.
        let record = self.dialect.insert_version_sql(&self.table);
        sqlx::query(&record)
            .bind(version)
            .bind(direction == Direction::Up)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }
}

/// Split a script into its UP and DOWN sections.
///
/// Lines before the first section marker and comment lines are ignored.
pub fn parse_script_sections(content: &str) -> (String, String) {
    let mut up_sql = Vec::new();
    let mut down_sql = Vec::new();
    let mut current_section = "";

    for line in content.lines() {
        let trimmed = line.trim().to_lowercase();

        if trimmed.starts_with("-- up") {
            current_section = "up";
            continue;
        } else if trimmed.starts_with("-- down") {
            current_section = "down";
            continue;
        }

        if line.trim().is_empty() || line.trim().starts_with("--") {
            continue;
        }

        match current_section {
            "up" => up_sql.push(line),
            "down" => down_sql.push(line),
            _ => {}
        }
    }

    (
        up_sql.join("\n").trim().to_string(),
        down_sql.join("\n").trim().to_string(),
    )
}

/// Split SQL into individual statements using proper SQL parsing.
pub fn split_sql_statements(sql: &str) -> Vec<String> {
    let dialect = GenericDialect {};

    match Parser::parse_sql(&dialect, sql) {
        Ok(parsed) => parsed.iter().map(|stmt| format!("{};", stmt)).collect(),
        Err(e) => {
            // Fall back to naive semicolon splitting for SQL the parser
            // does not understand.
            tracing::warn!("SQL parsing failed, using naive semicolon splitting: {}", e);
            sql.split(';')
                .map(|s| s.trim())
                .filter(|s| !s.is_empty())
                .map(|s| format!("{};", s))
                .collect()
        }
    }
}
