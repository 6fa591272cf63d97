//! Reversible SQL schema migration engine.
//!
//! Given an integer target version, the [`Migrator`] transitions a database
//! from its current recorded version to the target by applying an ordered
//! sequence of reversible migrations, tracking applied state in a log table
//! and rolling back the current batch when a migration fails mid-sequence.
//!
//! # Overview
//!
//! - A [`Migration`] pairs an "up" query with the "down" query that undoes it
//! - A [`QueryExecutor`] runs one opaque query at a time against the database
//! - A [`VersionLog`] records every applied migration and derives the
//!   database's current version from the log
//! - A [`MigrationSource`] supplies the migrations for a version/direction;
//!   [`DistributedMigrations`] sources down migrations from the log itself,
//!   so a deployment never has to ship historical down definitions
//! - The [`Migrator`] walks each intermediate version in order and rolls a
//!   failed batch back in reverse application order
//!
//! # Usage
//!
//! ```ignore
//! let log = Arc::new(SqlVersionLog::new(executor.clone(), "app_migrations")?);
//! let source = Arc::new(DistributedMigrations::new(local, log.clone()));
//! let migrator = Migrator::new(executor, log, source);
//! migrator.migrate(3).await?;
//! ```

pub mod engine;
pub mod executor;
pub mod log;
pub mod migration;
pub mod source;

// Re-export commonly used types
pub use engine::{MigrationError, Migrator, StepError};
pub use executor::{QueryError, QueryExecutor, Row};
pub use log::{LogEntry, LogError, SqlVersionLog, VersionLog};
pub use migration::{Direction, Migration};
pub use source::{DistributedMigrations, LocalMigrations, MigrationSource};
