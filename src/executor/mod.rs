//! The query execution boundary.
//!
//! The engine never talks to a database driver directly. Implementations of
//! [`QueryExecutor`] wrap a concrete connection and surface driver errors as
//! [`QueryError`]. The engine issues exactly one query at a time and waits
//! for its result before proceeding.

use async_trait::async_trait;
use std::collections::HashMap;
use thiserror::Error;

/// One result row: a mapping from column name to string value.
///
/// A NULL column is represented by its absence from the map.
pub type Row = HashMap<String, String>;

/// A failed query, carrying the driver-specific code and message.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("query failed (code {code}): {message}")]
pub struct QueryError {
    /// Driver-specific error code, 0 when the driver provides none.
    pub code: i64,
    /// Driver-specific error message.
    pub message: String,
}

impl QueryError {
    pub fn new(code: i64, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

/// Executes a single opaque query against the database.
#[async_trait]
pub trait QueryExecutor: Send + Sync {
    /// Run one query, returning any result rows.
    ///
    /// Statements that produce no row set return an empty vector.
    async fn execute(&self, query: &str) -> Result<Vec<Row>, QueryError>;
}
