//! Migration sources.
//!
//! A source supplies the migrations applicable to one version in one
//! direction. [`LocalMigrations`] serves statically registered records for
//! both directions; [`DistributedMigrations`] serves local records going up
//! but reads down migrations back out of the version log, so a deployment
//! that only ever shipped a later version's definitions can still downgrade.

use crate::log::{LogError, VersionLog};
use crate::migration::{Direction, Migration};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

/// Supplies the migrations for a version and direction.
///
/// The returned order is not significant; the engine sorts records by
/// priority before running them.
#[async_trait]
pub trait MigrationSource: Send + Sync {
    async fn migrations(
        &self,
        version: i64,
        direction: Direction,
    ) -> Result<Vec<Migration>, LogError>;
}

/// Statically registered migrations, keyed by version.
///
/// Serves the same records for both directions, so down definitions for all
/// historical versions must stay registered. Use [`DistributedMigrations`]
/// when that is not practical.
#[derive(Debug, Clone, Default)]
pub struct LocalMigrations {
    migrations: HashMap<i64, Vec<Migration>>,
}

impl LocalMigrations {
    /// Create an empty registration map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the migrations for a version, replacing any previous
    /// registration for it.
    pub fn register(&mut self, version: i64, migrations: Vec<Migration>) {
        self.migrations.insert(version, migrations);
    }

    /// The registered migrations for a version, empty when none were
    /// registered.
    pub fn for_version(&self, version: i64) -> Vec<Migration> {
        self.migrations.get(&version).cloned().unwrap_or_default()
    }
}

impl From<HashMap<i64, Vec<Migration>>> for LocalMigrations {
    fn from(migrations: HashMap<i64, Vec<Migration>>) -> Self {
        Self { migrations }
    }
}

#[async_trait]
impl MigrationSource for LocalMigrations {
    async fn migrations(
        &self,
        version: i64,
        _direction: Direction,
    ) -> Result<Vec<Migration>, LogError> {
        Ok(self.for_version(version))
    }
}

/// Source for distributed deployments: local records going up, log-table
/// records going down.
///
/// Down migrations are reconstructed from what the log captured when the
/// version was applied upward, which guarantees that only migrations which
/// actually ran can be reversed, with exactly the reverse queries recorded
/// at apply time.
pub struct DistributedMigrations {
    local: LocalMigrations,
    log: Arc<dyn VersionLog>,
}

impl DistributedMigrations {
    pub fn new(local: LocalMigrations, log: Arc<dyn VersionLog>) -> Self {
        Self { local, log }
    }
}

#[async_trait]
impl MigrationSource for DistributedMigrations {
    async fn migrations(
        &self,
        version: i64,
        direction: Direction,
    ) -> Result<Vec<Migration>, LogError> {
        match direction {
            Direction::Up => Ok(self.local.for_version(version)),
            Direction::Down => self.log.entries_for_version(version).await,
        }
    }
}
