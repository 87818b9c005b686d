//! The engine: one validated configuration and the pool built from it.

use std::sync::{Arc, RwLock};

use futures_util::future::try_join_all;
use futures_util::stream::Stream;

use crate::blocking::BlockingEngine;
use crate::catalog::{Catalog, SchemaCatalog};
use crate::connection::Connection;
use crate::error::SqlToolkitError;
use crate::executor::{ExecutionReport, SleepSpec, replay_stream};
use crate::pool::{Backend, PoolStatus};
use crate::query_builder::{CopyRows, Delete, Execute, Insert, Select, Update};
use crate::results::ResultSet;
use crate::types::DatabaseType;

mod config;
mod warm;

pub use config::EngineConfig;
pub(crate) use warm::{close_all, warm_plan};

#[cfg(feature = "postgres")]
use crate::postgres::PostgresBackend;
#[cfg(feature = "sqlite")]
use crate::sqlite::SqliteBackend;

struct EngineInner {
    config: EngineConfig,
    backend: Arc<dyn Backend>,
    catalog: RwLock<Option<Arc<SchemaCatalog>>>,
}

/// Cooperative-mode entry point. Cheap to clone; clones share the pool.
///
/// The engine-level statement methods each run on their own autocommit connection. Use
/// [`Engine::connect`] to group statements in one transaction.
///
/// ```rust,no_run
/// use sql_toolkit::prelude::*;
///
/// # async fn demo() -> Result<(), SqlToolkitError> {
/// let engine = Engine::new(EngineConfig::sqlite("app.db").with_pool(10, 4)).await?;
/// engine.warm(None).await?;
/// engine
///     .insert(Insert::into("users").rows([bind_row! { "name" => "ada" }]))
///     .await?;
/// let users = engine.select(Select::from("users").limit(10_u64)).await?;
/// # let _ = users;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Engine {
    inner: Arc<EngineInner>,
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("target", &self.inner.config.to_string())
            .field("backend", &self.inner.backend)
            .finish_non_exhaustive()
    }
}

impl Engine {
    /// Validate `config` and build the pool. Connections open lazily.
    ///
    /// # Errors
    /// Returns `SqlToolkitError::ConfigError` for invalid settings.
    #[allow(clippy::unused_async)]
    pub async fn new(config: EngineConfig) -> Result<Self, SqlToolkitError> {
        Self::open(config)
    }

    /// Synchronous constructor; must run inside a Tokio runtime context.
    ///
    /// # Errors
    /// Returns `SqlToolkitError::ConfigError` for invalid settings or when no runtime is
    /// entered.
    pub fn open(config: EngineConfig) -> Result<Self, SqlToolkitError> {
        config.validate()?;
        if tokio::runtime::Handle::try_current().is_err() {
            return Err(SqlToolkitError::ConfigError(
                "an engine must be opened inside a Tokio runtime".to_string(),
            ));
        }
        let backend: Arc<dyn Backend> = match config.backend {
            #[cfg(feature = "postgres")]
            DatabaseType::Postgres => Arc::new(PostgresBackend::open(&config)?),
            #[cfg(feature = "sqlite")]
            DatabaseType::Sqlite => Arc::new(SqliteBackend::open(&config)?),
        };
        tracing::debug!(
            url = %config,
            max_pool = config.max_pool,
            max_keep = config.max_keep,
            "opened engine"
        );
        Ok(Self {
            inner: Arc::new(EngineInner {
                config,
                backend,
                catalog: RwLock::new(None),
            }),
        })
    }

    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.inner.config
    }

    #[must_use]
    pub fn database_type(&self) -> DatabaseType {
        self.inner.config.backend
    }

    pub(crate) fn backend(&self) -> &Arc<dyn Backend> {
        &self.inner.backend
    }

    pub(crate) fn catalog_slot(&self) -> &RwLock<Option<Arc<SchemaCatalog>>> {
        &self.inner.catalog
    }

    /// A new connection handle. Nothing is checked out until first use.
    #[must_use]
    pub fn connect(&self, autocommit: bool) -> Connection {
        Connection::new(
            Arc::clone(&self.inner.backend),
            self.inner.config.echo,
            autocommit,
        )
    }

    #[must_use]
    pub fn pool_status(&self) -> PoolStatus {
        self.inner.backend.status()
    }

    /// Open connections, idle or checked out.
    #[must_use]
    pub fn connection_count(&self) -> u32 {
        self.pool_status().connections
    }

    #[must_use]
    pub fn idle_count(&self) -> u32 {
        self.pool_status().idle
    }

    /// # Errors
    /// See [`Connection::execute`].
    pub async fn execute(
        &self,
        statement: impl Into<Execute>,
    ) -> Result<ResultSet, SqlToolkitError> {
        self.connect(true).execute(statement).await
    }

    /// # Errors
    /// See [`Connection::execute`].
    pub async fn execute_reported(
        &self,
        statement: impl Into<Execute>,
    ) -> Result<(ResultSet, ExecutionReport), SqlToolkitError> {
        self.connect(true).execute_reported(statement).await
    }

    /// # Errors
    /// See [`Connection::select`].
    pub async fn select(&self, select: impl Into<Select>) -> Result<ResultSet, SqlToolkitError> {
        self.connect(true).select(select).await
    }

    /// # Errors
    /// See [`Connection::insert`].
    pub async fn insert(&self, insert: Insert) -> Result<ResultSet, SqlToolkitError> {
        self.connect(true).insert(insert).await
    }

    /// # Errors
    /// See [`Connection::update`].
    pub async fn update(&self, update: Update) -> Result<ResultSet, SqlToolkitError> {
        self.connect(true).update(update).await
    }

    /// # Errors
    /// See [`Connection::delete`].
    pub async fn delete(&self, delete: impl Into<Delete>) -> Result<ResultSet, SqlToolkitError> {
        self.connect(true).delete(delete).await
    }

    /// # Errors
    /// See [`Connection::copy`].
    pub async fn copy(&self, copy: impl Into<CopyRows>) -> Result<ResultSet, SqlToolkitError> {
        self.connect(true).copy(copy).await
    }

    /// # Errors
    /// See [`Connection::count`].
    pub async fn count(&self, select: impl Into<Select>) -> Result<usize, SqlToolkitError> {
        self.connect(true).count(select).await
    }

    /// # Errors
    /// See [`Connection::exist`].
    pub async fn exist(&self, select: impl Into<Select>) -> Result<bool, SqlToolkitError> {
        self.connect(true).exist(select).await
    }

    /// # Errors
    /// See [`Connection::sleep`].
    pub async fn sleep(&self, spec: SleepSpec) -> Result<f64, SqlToolkitError> {
        self.connect(true).sleep(spec).await
    }

    /// Per-row replay on an autocommit connection: each row commits on its own.
    pub fn generator(
        &self,
        statement: Execute,
    ) -> impl Stream<Item = Result<ResultSet, SqlToolkitError>> + Send + 'static {
        replay_stream(self.connect(true), statement)
    }

    /// Pre-open connections so the first callers skip connection setup.
    ///
    /// Opens up to `target` (default and cap: `max_keep`) connections concurrently, then
    /// returns them to the pool concurrently. Does nothing when the pool already holds that
    /// many. Returns the number of connections checked out.
    ///
    /// # Errors
    /// Returns the first connection error; connections already opened go back to the pool.
    pub async fn warm(&self, target: Option<u32>) -> Result<usize, SqlToolkitError> {
        let wanted = warm_plan(self.pool_status(), self.inner.config.max_keep, target);
        if wanted == 0 {
            tracing::debug!(status = ?self.pool_status(), "pool already warm");
            return Ok(0);
        }
        let backend = &self.inner.backend;
        let conns = try_join_all((0..wanted).map(|_| backend.acquire())).await?;
        let opened = conns.len();
        close_all(conns).await;
        tracing::debug!(opened, status = ?self.pool_status(), "warmed pool");
        Ok(opened)
    }

    /// Refuse new checkouts and drop idle connections. Checked-out connections are dropped
    /// when they come back.
    pub async fn dispose(&self) {
        self.inner.backend.dispose().await;
    }

    /// The schema catalog cached on this engine.
    #[must_use]
    pub fn catalog(&self) -> Catalog<'_> {
        Catalog::new(self)
    }

    /// A blocking engine for the same target with its own pool and runtime.
    ///
    /// Call this from synchronous code; a blocking engine cannot be used or dropped on an
    /// async task.
    ///
    /// # Errors
    /// Returns runtime or configuration errors.
    pub fn to_blocking(&self) -> Result<BlockingEngine, SqlToolkitError> {
        BlockingEngine::new(self.inner.config.clone())
    }
}
