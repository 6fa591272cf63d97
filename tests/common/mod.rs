#![allow(dead_code)]

//! Shared test doubles: a scripted query executor and an in-memory
//! version log.

use async_trait::async_trait;
use sql_migrator::{LogEntry, LogError, Migration, QueryError, QueryExecutor, Row, VersionLog};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

/// Records every executed query and serves scripted failures and result
/// rows keyed by exact query text.
#[derive(Default)]
pub struct FakeExecutor {
    executed: Mutex<Vec<String>>,
    failures: Mutex<HashMap<String, QueryError>>,
    results: Mutex<HashMap<String, Vec<Row>>>,
}

impl FakeExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the given query fail with a driver error.
    pub fn fail_on(&self, query: &str, message: &str) {
        self.failures
            .lock()
            .unwrap()
            .insert(query.to_string(), QueryError::new(1064, message));
    }

    /// Serve the given rows when the query is executed.
    pub fn respond(&self, query: &str, rows: Vec<Row>) {
        self.results
            .lock()
            .unwrap()
            .insert(query.to_string(), rows);
    }

    /// Every query executed so far, including failed attempts, in order.
    pub fn executed(&self) -> Vec<String> {
        self.executed.lock().unwrap().clone()
    }
}

#[async_trait]
impl QueryExecutor for FakeExecutor {
    async fn execute(&self, query: &str) -> Result<Vec<Row>, QueryError> {
        self.executed.lock().unwrap().push(query.to_string());

        if let Some(error) = self.failures.lock().unwrap().get(query) {
            return Err(error.clone());
        }

        Ok(self
            .results
            .lock()
            .unwrap()
            .get(query)
            .cloned()
            .unwrap_or_default())
    }
}

/// Build a result row from column/value pairs.
pub fn row(pairs: &[(&str, &str)]) -> Row {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

/// In-memory `VersionLog` that counts mutating calls.
#[derive(Default)]
pub struct MemoryLog {
    entries: Mutex<Vec<LogEntry>>,
    writes: AtomicUsize,
}

impl MemoryLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-populate the log with an applied migration.
    pub fn seed(&self, migration: &Migration, version: i64) {
        self.entries.lock().unwrap().push(LogEntry {
            time: chrono::Utc::now().to_rfc3339(),
            version,
            priority: migration.priority(),
            key: migration.key().to_string(),
            up: migration.up().to_string(),
            down: migration.down().to_string(),
        });
    }

    pub fn entries(&self) -> Vec<LogEntry> {
        self.entries.lock().unwrap().clone()
    }

    pub fn entries_at(&self, version: i64) -> Vec<LogEntry> {
        self.entries()
            .into_iter()
            .filter(|e| e.version == version)
            .collect()
    }

    /// How many append/remove calls the engine has issued.
    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl VersionLog for MemoryLog {
    async fn ensure_table(&self) -> Result<(), LogError> {
        Ok(())
    }

    async fn current_version(&self) -> Result<i64, LogError> {
        Ok(self
            .entries
            .lock()
            .unwrap()
            .iter()
            .map(|e| e.version)
            .max()
            .unwrap_or(0))
    }

    async fn append(&self, migration: &Migration, version: i64) -> Result<(), LogError> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.seed(migration, version);
        Ok(())
    }

    async fn remove(&self, key: &str, version: i64) -> Result<(), LogError> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        let mut entries = self.entries.lock().unwrap();
        if let Some(pos) = entries
            .iter()
            .position(|e| e.key == key && e.version == version)
        {
            entries.remove(pos);
        }
        Ok(())
    }

    async fn entries_for_version(&self, version: i64) -> Result<Vec<Migration>, LogError> {
        let mut at_version = self.entries_at(version);
        at_version.sort_by(|a, b| b.priority.cmp(&a.priority));
        Ok(at_version.iter().map(LogEntry::to_migration).collect())
    }
}
