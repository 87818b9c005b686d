//! Backend seam: one pool per engine, behind an object-safe async trait pair chosen when the
//! engine is built.

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;

use crate::error::SqlToolkitError;
use crate::results::ResultSet;
use crate::types::{DatabaseType, RowValues};

/// Snapshot of pool occupancy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PoolStatus {
    /// Open physical connections, idle or checked out.
    pub connections: u32,
    pub idle: u32,
}

impl PoolStatus {
    #[must_use]
    pub fn in_use(&self) -> u32 {
        self.connections.saturating_sub(self.idle)
    }
}

/// Check-in policy shared between a backend and its bb8 manager.
#[derive(Debug)]
pub(crate) struct PoolGauge {
    pub(crate) max_keep: u32,
    disposed: AtomicBool,
}

impl PoolGauge {
    pub(crate) fn new(max_keep: u32) -> Self {
        Self {
            max_keep,
            disposed: AtomicBool::new(false),
        }
    }

    pub(crate) fn dispose(&self) {
        self.disposed.store(true, Ordering::SeqCst);
    }

    pub(crate) fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::SeqCst)
    }

    /// Whether a connection being checked in should be dropped instead of kept idle.
    pub(crate) fn should_discard(&self, status: PoolStatus) -> bool {
        self.is_disposed() || status.idle >= self.max_keep
    }

    pub(crate) fn ensure_open(&self) -> Result<(), SqlToolkitError> {
        if self.is_disposed() {
            Err(SqlToolkitError::ConnectionError(
                "engine has been disposed".to_string(),
            ))
        } else {
            Ok(())
        }
    }
}

/// A pooled database target.
#[async_trait]
pub trait Backend: Send + Sync + std::fmt::Debug {
    fn database_type(&self) -> DatabaseType;

    fn status(&self) -> PoolStatus;

    /// Check a connection out of the pool, opening one if none is idle.
    async fn acquire(&self) -> Result<Box<dyn BackendConnection>, SqlToolkitError>;

    /// Refuse further checkouts and drop idle connections.
    async fn dispose(&self);

    /// Statement taking a `:seconds` bind that makes the server wait.
    fn sleep_sql(&self) -> &'static str;

    /// Statement listing `(table_name, column_name)` ordered by table then column position.
    fn catalog_sql(&self) -> &'static str;
}

/// One checked-out physical connection.
#[async_trait]
pub trait BackendConnection: Send {
    fn in_transaction(&self) -> bool;

    async fn begin(&mut self) -> Result<(), SqlToolkitError>;

    async fn commit(&mut self) -> Result<(), SqlToolkitError>;

    async fn rollback(&mut self) -> Result<(), SqlToolkitError>;

    /// Run one positional statement.
    async fn execute(
        &mut self,
        sql: &str,
        params: &[RowValues],
    ) -> Result<ResultSet, SqlToolkitError>;

    /// Run parameterless SQL that may hold several statements.
    async fn execute_batch(&mut self, sql: &str) -> Result<(), SqlToolkitError>;

    /// Return the connection to the pool, rolling back any open transaction first.
    async fn close(self: Box<Self>) -> Result<(), SqlToolkitError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gauge_discards_above_max_keep() {
        let gauge = PoolGauge::new(2);
        assert!(!gauge.should_discard(PoolStatus { connections: 3, idle: 1 }));
        assert!(gauge.should_discard(PoolStatus { connections: 3, idle: 2 }));
        gauge.dispose();
        assert!(gauge.should_discard(PoolStatus { connections: 1, idle: 0 }));
        assert!(gauge.ensure_open().is_err());
    }
}
