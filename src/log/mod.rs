//! The migration log table.
//!
//! Every successfully applied up migration is recorded in a log table, and
//! the record is deleted again when the migration is reverted. The log is
//! the sole source of truth for the database's current version: the largest
//! `version` value across all entries, or 0 when the table is empty. Because
//! each entry captures the full migration content at apply time, the log
//! also serves as the down-migration source for [`DistributedMigrations`],
//! guaranteeing that only migrations which actually ran can be reversed.
//!
//! [`DistributedMigrations`]: crate::source::DistributedMigrations

use crate::executor::{QueryError, QueryExecutor, Row};
use crate::migration::Migration;
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

/// Log table names must be plain identifiers.
static TABLE_NAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("table name regex is valid"));

/// Error types for log table operations.
#[derive(Error, Debug)]
pub enum LogError {
    #[error("invalid migration log table name: {0:?}")]
    InvalidTableName(String),

    #[error(transparent)]
    Query(#[from] QueryError),

    #[error("log row is missing the `{0}` column")]
    MissingColumn(&'static str),

    #[error("log row has a malformed `{column}` value: {value:?}")]
    MalformedRow { column: &'static str, value: String },
}

/// One persisted log row, captured at apply time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    /// Timestamp of application, informational only.
    pub time: String,
    /// The target version this migration was applied as part of.
    pub version: i64,
    pub priority: i64,
    pub key: String,
    pub up: String,
    pub down: String,
}

impl LogEntry {
    /// Reconstruct the migration record this entry was captured from.
    pub fn to_migration(&self) -> Migration {
        Migration::new(
            self.key.clone(),
            self.priority,
            self.up.clone(),
            self.down.clone(),
        )
    }
}

/// The version log store: owns the migration history and is the sole
/// authority on the database's current version.
#[async_trait]
pub trait VersionLog: Send + Sync {
    /// Create the log table if it does not exist. Idempotent; safe to call
    /// before every read or write.
    async fn ensure_table(&self) -> Result<(), LogError>;

    /// The largest logged version, 0 when the log is empty.
    async fn current_version(&self) -> Result<i64, LogError>;

    /// Record a migration as applied at the given version.
    ///
    /// Not idempotent: a second call for the same key and version inserts a
    /// duplicate row. The engine calls this exactly once per successful up
    /// application.
    async fn append(&self, migration: &Migration, version: i64) -> Result<(), LogError>;

    /// Delete the entry matching the key and version, at most one row.
    /// A no-op when no such entry exists.
    async fn remove(&self, key: &str, version: i64) -> Result<(), LogError>;

    /// Reconstruct the migration records logged at exactly this version,
    /// in descending priority order.
    async fn entries_for_version(&self, version: i64) -> Result<Vec<Migration>, LogError>;
}

/// [`VersionLog`] implementation backed by a SQL table driven through a
/// [`QueryExecutor`].
pub struct SqlVersionLog {
    executor: Arc<dyn QueryExecutor>,
    table: String,
}

impl SqlVersionLog {
    /// Create a log store over the given table.
    ///
    /// The table name is validated eagerly, before any database
    /// interaction; only plain identifiers are accepted.
    pub fn new(executor: Arc<dyn QueryExecutor>, table: impl Into<String>) -> Result<Self, LogError> {
        let table = table.into();
        if !TABLE_NAME_RE.is_match(&table) {
            return Err(LogError::InvalidTableName(table));
        }
        Ok(Self { executor, table })
    }

    /// The log table name.
    pub fn table(&self) -> &str {
        &self.table
    }

    /// Every logged entry, ordered by version then priority.
    pub async fn history(&self) -> Result<Vec<LogEntry>, LogError> {
        self.ensure_table().await?;
        let rows = self
            .executor
            .execute(&format!(
                "SELECT * FROM `{}` ORDER BY `version`, `priority`;",
                self.table
            ))
            .await?;

        rows.iter().map(parse_entry).collect()
    }
}

#[async_trait]
impl VersionLog for SqlVersionLog {
    async fn ensure_table(&self) -> Result<(), LogError> {
        self.executor
            .execute(&format!(
                "CREATE TABLE IF NOT EXISTS `{}` (\
                 `time` TIMESTAMP DEFAULT CURRENT_TIMESTAMP, \
                 `version` INT NOT NULL, \
                 `priority` INT NOT NULL, \
                 `key` VARCHAR(80) NOT NULL, \
                 `up` LONGTEXT NOT NULL, \
                 `down` LONGTEXT NOT NULL)",
                self.table
            ))
            .await?;
        Ok(())
    }

    async fn current_version(&self) -> Result<i64, LogError> {
        self.ensure_table().await?;
        let rows = self
            .executor
            .execute(&format!(
                "SELECT MAX(`version`) AS `version` FROM `{}`;",
                self.table
            ))
            .await?;

        // An empty table yields a NULL max, surfaced as an absent or empty
        // column value.
        match rows.first().and_then(|row| row.get("version")) {
            Some(value) if !value.is_empty() => {
                value
                    .parse()
                    .map_err(|_| LogError::MalformedRow {
                        column: "version",
                        value: value.clone(),
                    })
            }
            _ => Ok(0),
        }
    }

    async fn append(&self, migration: &Migration, version: i64) -> Result<(), LogError> {
        // The timestamp is written explicitly rather than relying on the
        // column default, so entries are timestamped uniformly across
        // drivers.
        let time = chrono::Utc::now().to_rfc3339();
        self.executor
            .execute(&format!(
                "INSERT INTO `{}` (`time`, `version`, `priority`, `key`, `up`, `down`) \
                 VALUES ({}, {}, {}, {}, {}, {})",
                self.table,
                quote(&time),
                version,
                migration.priority(),
                quote(migration.key()),
                quote(migration.up()),
                quote(migration.down()),
            ))
            .await?;
        Ok(())
    }

    async fn remove(&self, key: &str, version: i64) -> Result<(), LogError> {
        self.executor
            .execute(&format!(
                "DELETE FROM `{}` WHERE `key` = {} AND `version` = {} LIMIT 1;",
                self.table,
                quote(key),
                version,
            ))
            .await?;
        Ok(())
    }

    async fn entries_for_version(&self, version: i64) -> Result<Vec<Migration>, LogError> {
        self.ensure_table().await?;
        let rows = self
            .executor
            .execute(&format!(
                "SELECT * FROM `{}` WHERE `version` = {} ORDER BY `priority` DESC;",
                self.table, version,
            ))
            .await?;

        rows.iter()
            .map(|row| parse_entry(row).map(|entry| entry.to_migration()))
            .collect()
    }
}

/// Quote a string value for embedding in a query.
fn quote(value: &str) -> String {
    format!("\"{}\"", value.replace('\\', "\\\\").replace('"', "\\\""))
}

fn parse_entry(row: &Row) -> Result<LogEntry, LogError> {
    Ok(LogEntry {
        // Informational; tolerate drivers that do not return it.
        time: row.get("time").cloned().unwrap_or_default(),
        version: int_column(row, "version")?,
        priority: int_column(row, "priority")?,
        key: text_column(row, "key")?,
        up: text_column(row, "up")?,
        down: text_column(row, "down")?,
    })
}

fn text_column(row: &Row, column: &'static str) -> Result<String, LogError> {
    row.get(column)
        .cloned()
        .ok_or(LogError::MissingColumn(column))
}

fn int_column(row: &Row, column: &'static str) -> Result<i64, LogError> {
    let value = row.get(column).ok_or(LogError::MissingColumn(column))?;
    value.parse().map_err(|_| LogError::MalformedRow {
        column,
        value: value.clone(),
    })
}
