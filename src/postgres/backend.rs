use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bb8::{Pool, PooledConnection};

use super::config::pg_config;
use super::manager::PgManager;
use super::query;
use crate::engine::EngineConfig;
use crate::error::{SqlToolkitError, checkout_error};
use crate::pool::{Backend, BackendConnection, PoolGauge, PoolStatus};
use crate::results::ResultSet;
use crate::types::{DatabaseType, RowValues};

const SLEEP_SQL: &str = "SELECT pg_sleep(:seconds)";

const CATALOG_SQL: &str = "SELECT table_name::text AS table_name, column_name::text AS column_name
FROM information_schema.columns
WHERE table_schema = 'public'
ORDER BY table_name, ordinal_position";

/// Pooled `PostgreSQL` target.
pub struct PostgresBackend {
    pool: Pool<PgManager>,
    gauge: Arc<PoolGauge>,
    timeout: Duration,
}

impl PostgresBackend {
    /// Build the pool without connecting. Must run inside a Tokio runtime context.
    ///
    /// # Errors
    /// Returns `SqlToolkitError::ConfigError` for unusable connection settings.
    pub(crate) fn open(config: &EngineConfig) -> Result<Self, SqlToolkitError> {
        let pg = pg_config(config)?;
        let gauge = Arc::new(PoolGauge::new(config.max_keep));
        let timeout = config.pool_timeout_duration();
        let pool = Pool::builder()
            .max_size(config.max_pool)
            .connection_timeout(timeout)
            .max_lifetime(config.pool_recycle_duration())
            .idle_timeout(None)
            .retry_connection(false)
            .build_unchecked(PgManager::new(pg, Arc::clone(&gauge)));
        Ok(Self {
            pool,
            gauge,
            timeout,
        })
    }
}

fn status_of(pool: &Pool<PgManager>) -> PoolStatus {
    let state = pool.state();
    PoolStatus {
        connections: state.connections,
        idle: state.idle_connections,
    }
}

impl fmt::Debug for PostgresBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PostgresBackend")
            .field("status", &status_of(&self.pool))
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Backend for PostgresBackend {
    fn database_type(&self) -> DatabaseType {
        DatabaseType::Postgres
    }

    fn status(&self) -> PoolStatus {
        status_of(&self.pool)
    }

    async fn acquire(&self) -> Result<Box<dyn BackendConnection>, SqlToolkitError> {
        self.gauge.ensure_open()?;
        let conn = self
            .pool
            .get_owned()
            .await
            .map_err(|err| checkout_error(err, self.timeout))?;
        Ok(Box::new(PgSession {
            conn,
            pool: self.pool.clone(),
            gauge: Arc::clone(&self.gauge),
        }))
    }

    async fn dispose(&self) {
        self.gauge.dispose();
        // Checked-out idle connections are dropped on return once the gauge is disposed.
        while self.pool.state().idle_connections > 0 {
            if self.pool.get().await.is_err() {
                break;
            }
        }
        tracing::debug!(status = ?status_of(&self.pool), "disposed postgres pool");
    }

    fn sleep_sql(&self) -> &'static str {
        SLEEP_SQL
    }

    fn catalog_sql(&self) -> &'static str {
        CATALOG_SQL
    }
}

struct PgSession {
    conn: PooledConnection<'static, PgManager>,
    pool: Pool<PgManager>,
    gauge: Arc<PoolGauge>,
}

#[async_trait]
impl BackendConnection for PgSession {
    fn in_transaction(&self) -> bool {
        self.conn.in_transaction
    }

    async fn begin(&mut self) -> Result<(), SqlToolkitError> {
        self.conn.client.batch_execute("BEGIN").await?;
        self.conn.in_transaction = true;
        Ok(())
    }

    async fn commit(&mut self) -> Result<(), SqlToolkitError> {
        self.conn.client.batch_execute("COMMIT").await?;
        self.conn.in_transaction = false;
        Ok(())
    }

    async fn rollback(&mut self) -> Result<(), SqlToolkitError> {
        self.conn.client.batch_execute("ROLLBACK").await?;
        self.conn.in_transaction = false;
        Ok(())
    }

    async fn execute(
        &mut self,
        sql: &str,
        params: &[RowValues],
    ) -> Result<ResultSet, SqlToolkitError> {
        query::execute(&self.conn.client, sql, params).await
    }

    async fn execute_batch(&mut self, sql: &str) -> Result<(), SqlToolkitError> {
        self.conn.client.batch_execute(sql).await?;
        Ok(())
    }

    async fn close(self: Box<Self>) -> Result<(), SqlToolkitError> {
        let PgSession {
            mut conn,
            pool,
            gauge,
        } = *self;
        let mut result = Ok(());
        if conn.in_transaction {
            match conn.client.batch_execute("ROLLBACK").await {
                Ok(()) => conn.in_transaction = false,
                Err(err) => {
                    conn.discard = true;
                    result = Err(err.into());
                }
            }
        }
        if gauge.should_discard(status_of(&pool)) {
            conn.discard = true;
        }
        drop(conn);
        result
    }
}
