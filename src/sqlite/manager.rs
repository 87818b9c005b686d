use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use bb8::ManageConnection;
use rusqlite::Connection;
use rusqlite::functions::FunctionFlags;

use super::config::SqliteSettings;
use crate::error::SqlToolkitError;
use crate::pool::PoolGauge;

/// bb8 manager opening `rusqlite` connections to one database file.
#[derive(Debug)]
pub struct SqliteManager {
    settings: SqliteSettings,
    gauge: Arc<PoolGauge>,
}

impl SqliteManager {
    pub(crate) fn new(settings: SqliteSettings, gauge: Arc<PoolGauge>) -> Self {
        Self { settings, gauge }
    }
}

/// A pooled connection. The mutex lets blocking tasks borrow it while the handle stays
/// in the pool's hands.
pub struct SqliteHandle {
    pub(crate) conn: Arc<Mutex<Connection>>,
    pub(crate) in_transaction: bool,
    /// Drop instead of returning to the idle set.
    pub(crate) discard: bool,
}

/// Run `f` against the connection on Tokio's blocking pool.
pub(crate) async fn run_blocking<T, F>(
    conn: &Arc<Mutex<Connection>>,
    f: F,
) -> Result<T, SqlToolkitError>
where
    F: FnOnce(&mut Connection) -> Result<T, SqlToolkitError> + Send + 'static,
    T: Send + 'static,
{
    let conn = Arc::clone(conn);
    tokio::task::spawn_blocking(move || {
        let mut guard = conn.lock().map_err(|_| {
            SqlToolkitError::ConnectionError("sqlite connection mutex poisoned".to_string())
        })?;
        f(&mut guard)
    })
    .await
    .map_err(|e| SqlToolkitError::ExecutionError(format!("sqlite worker task failed: {e}")))?
}

/// Run a pragma and discard whatever rows it reports.
fn apply_pragma(conn: &Connection, name: &str, value: &str) -> Result<(), SqlToolkitError> {
    let mut stmt = conn.prepare(&format!("PRAGMA {name} = {value}"))?;
    let mut rows = stmt.query([])?;
    while rows.next()?.is_some() {}
    Ok(())
}

fn open_connection(settings: &SqliteSettings) -> Result<Connection, SqlToolkitError> {
    let conn = Connection::open(&settings.path)?;
    conn.busy_timeout(settings.busy_timeout)?;
    apply_pragma(&conn, "journal_mode", "WAL")?;
    for (name, value) in &settings.pragmas {
        apply_pragma(&conn, name, value)?;
    }
    // sleep(seconds): blocks the calling connection and returns its argument.
    conn.create_scalar_function("sleep", 1, FunctionFlags::SQLITE_UTF8, |ctx| {
        let seconds: f64 = ctx.get(0)?;
        if let Ok(pause) = Duration::try_from_secs_f64(seconds) {
            std::thread::sleep(pause);
        }
        Ok(seconds)
    })?;
    Ok(conn)
}

impl ManageConnection for SqliteManager {
    type Connection = SqliteHandle;
    type Error = SqlToolkitError;

    fn connect(&self) -> impl Future<Output = Result<Self::Connection, Self::Error>> + Send {
        let settings = self.settings.clone();
        async move {
            let conn = tokio::task::spawn_blocking(move || open_connection(&settings))
                .await
                .map_err(|e| {
                    SqlToolkitError::ConnectionError(format!("sqlite open task failed: {e}"))
                })??;
            tracing::debug!("opened sqlite connection");
            Ok(SqliteHandle {
                conn: Arc::new(Mutex::new(conn)),
                in_transaction: false,
                discard: false,
            })
        }
    }

    fn is_valid(
        &self,
        conn: &mut Self::Connection,
    ) -> impl Future<Output = Result<(), Self::Error>> + Send {
        let handle = Arc::clone(&conn.conn);
        async move {
            run_blocking(&handle, |c| {
                c.query_row("SELECT 1", [], |_| Ok(()))?;
                Ok(())
            })
            .await
        }
    }

    fn has_broken(&self, conn: &mut Self::Connection) -> bool {
        conn.discard || conn.in_transaction || self.gauge.is_disposed()
    }
}
