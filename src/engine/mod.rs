//! The migration engine.
//!
//! The [`Migrator`] computes the delta between the logged current version
//! and the requested target, walks every intermediate version in order, and
//! runs each version's batch sequentially. When a migration in a batch
//! fails, the already-applied part of that batch is reversed in strict
//! reverse application order before the failure is surfaced; the walk never
//! continues past a failed version.

use crate::executor::{QueryError, QueryExecutor};
use crate::log::{LogError, VersionLog};
use crate::migration::{Direction, Migration};
use crate::source::MigrationSource;
use std::sync::Arc;
use thiserror::Error;
use tracing::{error, info};

/// A single migration step that failed, either at the query boundary or
/// while updating the log.
#[derive(Error, Debug)]
pub enum StepError {
    #[error(transparent)]
    Query(#[from] QueryError),

    #[error(transparent)]
    Log(#[from] LogError),
}

/// Error types for a `migrate` call.
///
/// At most one failure is surfaced per call, naming the migration, version,
/// and direction that failed and whether rollback of its batch succeeded.
#[derive(Error, Debug)]
pub enum MigrationError {
    /// Reading the current version or fetching migrations failed before any
    /// migration in the affected version ran.
    #[error(transparent)]
    Log(#[from] LogError),

    /// A migration failed and the batch was rolled back cleanly. Re-running
    /// `migrate` recomputes the same delta and reattempts the version.
    #[error("the {key:?} {direction} migration for version {version} failed; rollback was successful")]
    Failed {
        key: String,
        version: i64,
        direction: Direction,
        #[source]
        cause: StepError,
    },

    /// A migration failed and reversing an already-applied migration of the
    /// same batch failed too. The database needs manual intervention; no
    /// further recovery is attempted.
    #[error(
        "the {key:?} {direction} migration for version {version} failed and rollback of \
         {rollback_key:?} also failed; manual intervention required (original error: {cause})"
    )]
    RollbackFailed {
        key: String,
        version: i64,
        direction: Direction,
        cause: StepError,
        rollback_key: String,
        #[source]
        rollback_cause: StepError,
    },
}

/// Orchestrates migration runs over injected collaborators.
///
/// Single-threaded by contract: one outstanding query at a time, and
/// concurrent `migrate` calls against the same log table must be serialized
/// by the caller.
pub struct Migrator {
    executor: Arc<dyn QueryExecutor>,
    log: Arc<dyn VersionLog>,
    source: Arc<dyn MigrationSource>,
}

impl Migrator {
    pub fn new(
        executor: Arc<dyn QueryExecutor>,
        log: Arc<dyn VersionLog>,
        source: Arc<dyn MigrationSource>,
    ) -> Self {
        Self {
            executor,
            log,
            source,
        }
    }

    /// Migrate the database to the target version.
    ///
    /// Negative targets are clamped to 0 (full down migration). When the
    /// database is already at the target this is a no-op: no migration
    /// queries are issued and the log is not written.
    pub async fn migrate(&self, target: i64) -> Result<(), MigrationError> {
        let target = target.max(0);
        let current = self.log.current_version().await?.max(0);

        let Some((direction, walk)) = version_walk(current, target) else {
            info!(version = current, "Already at target version");
            return Ok(());
        };

        info!(from = current, to = target, %direction, "Starting migration");

        for version in walk {
            let mut batch = self.source.migrations(version, direction).await?;
            sort_batch(&mut batch, direction);
            self.run_batch(version, direction, &batch).await?;
        }

        info!(version = target, "Migration completed successfully");
        Ok(())
    }

    /// Run one version's batch, reversing the applied subset on failure.
    async fn run_batch(
        &self,
        version: i64,
        direction: Direction,
        batch: &[Migration],
    ) -> Result<(), MigrationError> {
        let mut applied: Vec<&Migration> = Vec::new();
        let mut failure: Option<(&Migration, StepError)> = None;

        for migration in batch {
            info!(key = migration.key(), version, %direction, "Applying migration");

            match self.apply(migration, version, direction).await {
                Ok(()) => applied.push(migration),
                Err(cause) => {
                    error!(
                        key = migration.key(),
                        version,
                        %direction,
                        error = %cause,
                        "Migration failed"
                    );
                    failure = Some((migration, cause));
                    break;
                }
            }
        }

        let Some((failed, cause)) = failure else {
            return Ok(());
        };

        // Undo in strict reverse application order: later migrations may
        // depend on earlier ones.
        for migration in applied.iter().rev() {
            info!(key = migration.key(), version, "Rolling back migration");

            if let Err(rollback_cause) = self
                .apply(migration, version, direction.opposite())
                .await
            {
                error!(
                    key = migration.key(),
                    version,
                    error = %rollback_cause,
                    "Rollback failed"
                );
                return Err(MigrationError::RollbackFailed {
                    key: failed.key().to_string(),
                    version,
                    direction,
                    cause,
                    rollback_key: migration.key().to_string(),
                    rollback_cause,
                });
            }
        }

        Err(MigrationError::Failed {
            key: failed.key().to_string(),
            version,
            direction,
            cause,
        })
    }

    /// Run one migration in one direction and record its log effect.
    ///
    /// The log is only touched after the query succeeds: up applications
    /// append an entry, down applications remove one.
    async fn apply(
        &self,
        migration: &Migration,
        version: i64,
        direction: Direction,
    ) -> Result<(), StepError> {
        self.executor.execute(migration.query(direction)).await?;

        self.log.ensure_table().await?;
        match direction {
            Direction::Up => self.log.append(migration, version).await?,
            Direction::Down => self.log.remove(migration.key(), version).await?,
        }
        Ok(())
    }
}

/// The versions to process to reach `target` from `current`, in processing
/// order, or `None` when no migration is required.
fn version_walk(current: i64, target: i64) -> Option<(Direction, Vec<i64>)> {
    match target.cmp(&current) {
        std::cmp::Ordering::Equal => None,
        std::cmp::Ordering::Greater => {
            Some((Direction::Up, (current + 1..=target).collect()))
        }
        std::cmp::Ordering::Less => {
            Some((Direction::Down, (target + 1..=current).rev().collect()))
        }
    }
}

/// Sort a batch for execution: ascending priority going up, descending
/// going down, so reversal happens in the exact reverse order of
/// application.
fn sort_batch(batch: &mut [Migration], direction: Direction) {
    batch.sort_by(|a, b| match direction {
        Direction::Up => a.priority().cmp(&b.priority()),
        Direction::Down => b.priority().cmp(&a.priority()),
    });
}
