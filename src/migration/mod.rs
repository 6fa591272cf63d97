//! Migration records and direction of travel.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A single reversible schema change.
///
/// A migration carries a forward ("up") query and the reverse ("down") query
/// that exactly undoes it. The `key` identifies the migration within its
/// version for logging and later down-migration lookup; the `priority`
/// determines execution order within a version's batch. Records are
/// immutable once constructed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Migration {
    key: String,
    priority: i64,
    up: String,
    down: String,
}

impl Migration {
    /// Create a new migration record.
    ///
    /// Larger priority numbers indicate later execution when migrating up.
    pub fn new(
        key: impl Into<String>,
        priority: i64,
        up: impl Into<String>,
        down: impl Into<String>,
    ) -> Self {
        Self {
            key: key.into(),
            priority,
            up: up.into(),
            down: down.into(),
        }
    }

    /// The key identifying this migration within its version.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// The execution-order priority within a version's batch.
    pub fn priority(&self) -> i64 {
        self.priority
    }

    /// The forward query.
    pub fn up(&self) -> &str {
        &self.up
    }

    /// The reverse query.
    pub fn down(&self) -> &str {
        &self.down
    }

    /// The query for the given direction of travel.
    pub fn query(&self, direction: Direction) -> &str {
        match direction {
            Direction::Up => &self.up,
            Direction::Down => &self.down,
        }
    }
}

/// Direction of migration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    /// Applying forward queries, increasing version.
    Up,
    /// Applying reverse queries, decreasing version.
    Down,
}

impl Direction {
    /// The opposite direction, used when rolling a batch back.
    pub fn opposite(self) -> Self {
        match self {
            Direction::Up => Direction::Down,
            Direction::Down => Direction::Up,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Up => write!(f, "up"),
            Direction::Down => write!(f, "down"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_follows_direction() {
        let migration = Migration::new("add_users", 0, "CREATE TABLE users", "DROP TABLE users");

        assert_eq!(migration.query(Direction::Up), "CREATE TABLE users");
        assert_eq!(migration.query(Direction::Down), "DROP TABLE users");
    }

    #[test]
    fn test_opposite_direction() {
        assert_eq!(Direction::Up.opposite(), Direction::Down);
        assert_eq!(Direction::Down.opposite(), Direction::Up);
    }

    #[test]
    fn test_direction_display() {
        assert_eq!(Direction::Up.to_string(), "up");
        assert_eq!(Direction::Down.to_string(), "down");
    }
}
