use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bb8::{Pool, PooledConnection};

use super::config::sqlite_settings;
use super::manager::{SqliteManager, run_blocking};
use super::params::row_value_to_sqlite_value;
use super::query;
use crate::engine::EngineConfig;
use crate::error::{SqlToolkitError, checkout_error};
use crate::pool::{Backend, BackendConnection, PoolGauge, PoolStatus};
use crate::results::ResultSet;
use crate::types::{DatabaseType, RowValues};

const SLEEP_SQL: &str = "SELECT sleep(:seconds)";

const CATALOG_SQL: &str = "SELECT m.name AS table_name, p.name AS column_name
FROM sqlite_master AS m
JOIN pragma_table_info(m.name) AS p
WHERE m.type IN ('table', 'view') AND m.name NOT LIKE 'sqlite_%'
ORDER BY m.name, p.cid";

/// Pooled `SQLite` target. Every pooled connection opens the same file, so an in-memory
/// path gives each connection its own private database.
pub struct SqliteBackend {
    pool: Pool<SqliteManager>,
    gauge: Arc<PoolGauge>,
    timeout: Duration,
}

impl SqliteBackend {
    /// Build the pool without connecting. Must run inside a Tokio runtime context.
    ///
    /// # Errors
    /// Returns `SqlToolkitError::ConfigError` for unusable query parameters.
    pub(crate) fn open(config: &EngineConfig) -> Result<Self, SqlToolkitError> {
        let settings = sqlite_settings(config)?;
        let gauge = Arc::new(PoolGauge::new(config.max_keep));
        let timeout = config.pool_timeout_duration();
        let pool = Pool::builder()
            .max_size(config.max_pool)
            .connection_timeout(timeout)
            .max_lifetime(config.pool_recycle_duration())
            .idle_timeout(None)
            .retry_connection(false)
            .build_unchecked(SqliteManager::new(settings, Arc::clone(&gauge)));
        Ok(Self {
            pool,
            gauge,
            timeout,
        })
    }
}

fn status_of(pool: &Pool<SqliteManager>) -> PoolStatus {
    let state = pool.state();
    PoolStatus {
        connections: state.connections,
        idle: state.idle_connections,
    }
}

impl fmt::Debug for SqliteBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SqliteBackend")
            .field("status", &status_of(&self.pool))
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Backend for SqliteBackend {
    fn database_type(&self) -> DatabaseType {
        DatabaseType::Sqlite
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
        Ok(Box::new(SqliteSession {
            conn,
            pool: self.pool.clone(),
            gauge: Arc::clone(&self.gauge),
        }))
    }

    async fn dispose(&self) {
        self.gauge.dispose();
        while self.pool.state().idle_connections > 0 {
            if self.pool.get().await.is_err() {
                break;
            }
        }
        tracing::debug!(status = ?status_of(&self.pool), "disposed sqlite pool");
    }

    fn sleep_sql(&self) -> &'static str {
        SLEEP_SQL
    }

    fn catalog_sql(&self) -> &'static str {
        CATALOG_SQL
    }
}

struct SqliteSession {
    conn: PooledConnection<'static, SqliteManager>,
    pool: Pool<SqliteManager>,
    gauge: Arc<PoolGauge>,
}

impl SqliteSession {
    async fn batch(&self, sql: &'static str) -> Result<(), SqlToolkitError> {
        run_blocking(&self.conn.conn, move |c| {
            c.execute_batch(sql)?;
            Ok(())
        })
        .await
    }
}

#[async_trait]
impl BackendConnection for SqliteSession {
    fn in_transaction(&self) -> bool {
        self.conn.in_transaction
    }

    async fn begin(&mut self) -> Result<(), SqlToolkitError> {
        self.batch("BEGIN").await?;
        self.conn.in_transaction = true;
        Ok(())
    }

    async fn commit(&mut self) -> Result<(), SqlToolkitError> {
        self.batch("COMMIT").await?;
        self.conn.in_transaction = false;
        Ok(())
    }

    async fn rollback(&mut self) -> Result<(), SqlToolkitError> {
        self.batch("ROLLBACK").await?;
        self.conn.in_transaction = false;
        Ok(())
    }

    async fn execute(
        &mut self,
        sql: &str,
        params: &[RowValues],
    ) -> Result<ResultSet, SqlToolkitError> {
        let values = params
            .iter()
            .map(row_value_to_sqlite_value)
            .collect::<Result<Vec<_>, _>>()?;
        let sql = sql.to_string();
        run_blocking(&self.conn.conn, move |c| query::execute(c, &sql, &values)).await
    }

    async fn execute_batch(&mut self, sql: &str) -> Result<(), SqlToolkitError> {
        let sql = sql.to_string();
        run_blocking(&self.conn.conn, move |c| {
            c.execute_batch(&sql)?;
            Ok(())
        })
        .await
    }

    async fn close(self: Box<Self>) -> Result<(), SqlToolkitError> {
        let SqliteSession {
            mut conn,
            pool,
            gauge,
        } = *self;
        let mut result = Ok(());
        if conn.in_transaction {
            let handle = Arc::clone(&conn.conn);
            match run_blocking(&handle, |c| {
                c.execute_batch("ROLLBACK")?;
                Ok(())
            })
            .await
            {
                Ok(()) => conn.in_transaction = false,
                Err(err) => {
                    conn.discard = true;
                    result = Err(err);
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
