//! Blocking mode: the same engine contract driven from synchronous code on a private
//! multi-threaded runtime.

use std::sync::Arc;

use tokio::runtime::Runtime;

use crate::catalog::SchemaCatalog;
use crate::connection::Connection;
use crate::engine::{Engine, EngineConfig, close_all, warm_plan};
use crate::error::SqlToolkitError;
use crate::executor::{ExecutionReport, SleepSpec};
use crate::pool::{BackendConnection, PoolStatus};
use crate::query_builder::{CopyRows, Delete, Execute, Insert, Select, Update};
use crate::results::ResultSet;
use crate::types::DatabaseType;

mod connection;

pub use connection::{BlockingConnection, ResultIter};

/// Blocking counterpart of [`Engine`]. Must not be used or dropped on an async task.
///
/// ```rust,no_run
/// use sql_toolkit::prelude::*;
///
/// # fn demo() -> Result<(), SqlToolkitError> {
/// let engine = BlockingEngine::new(EngineConfig::sqlite("app.db"))?;
/// engine.warm(None)?;
/// let total = engine.count(Select::from("users"))?;
/// # let _ = total;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct BlockingEngine {
    engine: Engine,
    runtime: Arc<Runtime>,
}

fn build_runtime() -> Result<Runtime, SqlToolkitError> {
    tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .thread_name("sql-toolkit")
        .enable_all()
        .build()
        .map_err(|e| SqlToolkitError::Other(format!("failed to start runtime: {e}")))
}

impl BlockingEngine {
    /// Validate `config`, start a private runtime and build the pool.
    ///
    /// # Errors
    /// Returns `SqlToolkitError::ConfigError` for invalid settings.
    pub fn new(config: EngineConfig) -> Result<Self, SqlToolkitError> {
        config.validate()?;
        let runtime = build_runtime()?;
        let engine = {
            let _guard = runtime.enter();
            Engine::open(config)?
        };
        Ok(Self {
            engine,
            runtime: Arc::new(runtime),
        })
    }

    /// A cooperative engine for the same target with its own pool on the caller's runtime.
    ///
    /// # Errors
    /// Returns configuration errors.
    pub async fn to_cooperative(&self) -> Result<Engine, SqlToolkitError> {
        Engine::new(self.engine.config().clone()).await
    }

    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        self.engine.config()
    }

    #[must_use]
    pub fn database_type(&self) -> DatabaseType {
        self.engine.database_type()
    }

    #[must_use]
    pub fn pool_status(&self) -> PoolStatus {
        self.engine.pool_status()
    }

    #[must_use]
    pub fn connection_count(&self) -> u32 {
        self.engine.connection_count()
    }

    #[must_use]
    pub fn idle_count(&self) -> u32 {
        self.engine.idle_count()
    }

    #[must_use]
    pub fn connect(&self, autocommit: bool) -> BlockingConnection {
        BlockingConnection::new(self.engine.connect(autocommit), Arc::clone(&self.runtime))
    }

    /// # Errors
    /// See [`Engine::execute`].
    pub fn execute(&self, statement: impl Into<Execute>) -> Result<ResultSet, SqlToolkitError> {
        self.runtime.block_on(self.engine.execute(statement))
    }

    /// # Errors
    /// See [`Engine::execute_reported`].
    pub fn execute_reported(
        &self,
        statement: impl Into<Execute>,
    ) -> Result<(ResultSet, ExecutionReport), SqlToolkitError> {
        self.runtime.block_on(self.engine.execute_reported(statement))
    }

    /// # Errors
    /// See [`Engine::select`].
    pub fn select(&self, select: impl Into<Select>) -> Result<ResultSet, SqlToolkitError> {
        self.runtime.block_on(self.engine.select(select))
    }

    /// # Errors
    /// See [`Engine::insert`].
    pub fn insert(&self, insert: Insert) -> Result<ResultSet, SqlToolkitError> {
        self.runtime.block_on(self.engine.insert(insert))
    }

    /// # Errors
    /// See [`Engine::update`].
    pub fn update(&self, update: Update) -> Result<ResultSet, SqlToolkitError> {
        self.runtime.block_on(self.engine.update(update))
    }

    /// # Errors
    /// See [`Engine::delete`].
    pub fn delete(&self, delete: impl Into<Delete>) -> Result<ResultSet, SqlToolkitError> {
        self.runtime.block_on(self.engine.delete(delete))
    }

    /// # Errors
    /// See [`Engine::copy`].
    pub fn copy(&self, copy: impl Into<CopyRows>) -> Result<ResultSet, SqlToolkitError> {
        self.runtime.block_on(self.engine.copy(copy))
    }

    /// # Errors
    /// See [`Engine::count`].
    pub fn count(&self, select: impl Into<Select>) -> Result<usize, SqlToolkitError> {
        self.runtime.block_on(self.engine.count(select))
    }

    /// # Errors
    /// See [`Engine::exist`].
    pub fn exist(&self, select: impl Into<Select>) -> Result<bool, SqlToolkitError> {
        self.runtime.block_on(self.engine.exist(select))
    }

    /// # Errors
    /// See [`Engine::sleep`].
    pub fn sleep(&self, spec: SleepSpec) -> Result<f64, SqlToolkitError> {
        self.runtime.block_on(self.engine.sleep(spec))
    }

    /// Per-row replay on an autocommit connection.
    #[must_use]
    pub fn generator(&self, statement: Execute) -> ResultIter<Connection> {
        ResultIter::new(
            self.engine.connect(true),
            Arc::clone(&self.runtime),
            statement,
        )
    }

    /// Pre-open connections on worker threads, one per missing connection, then return
    /// them to the pool. Same targets as [`Engine::warm`].
    ///
    /// # Errors
    /// Returns the first connection error after every opened connection is returned.
    pub fn warm(&self, target: Option<u32>) -> Result<usize, SqlToolkitError> {
        let wanted = warm_plan(self.pool_status(), self.config().max_keep, target);
        if wanted == 0 {
            tracing::debug!(status = ?self.pool_status(), "pool already warm");
            return Ok(0);
        }
        let handle = self.runtime.handle();
        let backend = self.engine.backend();
        let opened: Vec<Result<Box<dyn BackendConnection>, SqlToolkitError>> =
            std::thread::scope(|scope| {
                let workers: Vec<_> = (0..wanted)
                    .map(|_| scope.spawn(|| handle.block_on(backend.acquire())))
                    .collect();
                workers
                    .into_iter()
                    .map(|worker| {
                        worker.join().unwrap_or_else(|_| {
                            Err(SqlToolkitError::Other(
                                "warm-up worker panicked".to_string(),
                            ))
                        })
                    })
                    .collect()
            });

        let mut conns = Vec::with_capacity(opened.len());
        let mut first_error = None;
        for result in opened {
            match result {
                Ok(conn) => conns.push(conn),
                Err(err) => {
                    first_error.get_or_insert(err);
                }
            }
        }
        let count = conns.len();
        self.runtime.block_on(close_all(conns));
        tracing::debug!(opened = count, status = ?self.pool_status(), "warmed pool");
        match first_error {
            Some(err) => Err(err),
            None => Ok(count),
        }
    }

    pub fn dispose(&self) {
        self.runtime.block_on(self.engine.dispose());
    }

    /// # Errors
    /// See [`Catalog::refresh`](crate::catalog::Catalog::refresh).
    pub fn refresh_catalog(&self) -> Result<Arc<SchemaCatalog>, SqlToolkitError> {
        self.runtime.block_on(self.engine.catalog().refresh())
    }

    /// # Errors
    /// See [`Catalog::lookup`](crate::catalog::Catalog::lookup).
    pub fn lookup(
        &self,
        table: &str,
        column: Option<&str>,
        refresh_on_miss: bool,
    ) -> Result<bool, SqlToolkitError> {
        self.runtime
            .block_on(self.engine.catalog().lookup(table, column, refresh_on_miss))
    }

    #[must_use]
    pub fn cached_catalog(&self) -> Option<Arc<SchemaCatalog>> {
        self.engine.catalog().cached()
    }
}
