use std::time::Duration;

use thiserror::Error;

#[cfg(feature = "sqlite")]
use rusqlite;
#[cfg(feature = "postgres")]
use tokio_postgres;

#[derive(Debug, Error)]
pub enum SqlToolkitError {
    #[cfg(feature = "postgres")]
    #[error(transparent)]
    PostgresError(#[from] tokio_postgres::Error),

    #[cfg(feature = "sqlite")]
    #[error(transparent)]
    SqliteError(#[from] rusqlite::Error),

    /// Raised before any I/O when pool bounds or connection parameters are invalid.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Raised by the statement builders when the call shape cannot produce valid SQL.
    #[error("Statement build error: {0}")]
    BuildError(String),

    #[error("Connection error: {0}")]
    ConnectionError(String),

    #[error("Timed out after {0:?} waiting for a pooled connection")]
    PoolTimeout(Duration),

    #[error("Parameter conversion error: {0}")]
    ParameterError(String),

    #[error("SQL execution error: {0}")]
    ExecutionError(String),

    #[error("Other database error: {0}")]
    Other(String),
}

impl SqlToolkitError {
    /// True for errors raised locally before a statement reached the driver.
    #[must_use]
    pub fn is_construction_error(&self) -> bool {
        matches!(self, Self::ConfigError(_) | Self::BuildError(_))
    }
}

/// Map a bb8 checkout failure, keeping the configured wait for timeouts.
#[cfg(any(feature = "postgres", feature = "sqlite"))]
pub(crate) fn checkout_error<E>(err: bb8::RunError<E>, timeout: Duration) -> SqlToolkitError
where
    E: Into<SqlToolkitError>,
{
    match err {
        bb8::RunError::User(inner) => inner.into(),
        bb8::RunError::TimedOut => SqlToolkitError::PoolTimeout(timeout),
    }
}
