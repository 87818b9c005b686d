use std::sync::Arc;

use futures_util::future::BoxFuture;

use crate::error::SqlToolkitError;
use crate::pool::{Backend, BackendConnection};
use crate::transaction::{Transaction, TxState};
use crate::tx_outcome::TxOutcome;
use crate::types::DatabaseType;

/// Lifecycle of a [`Connection`]'s physical connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Nothing checked out yet.
    Unallocated,
    Open,
    /// Returned to the pool. The next statement checks a new one out.
    Closed,
}

pub(crate) enum Slot {
    Unallocated,
    Open(Box<dyn BackendConnection>),
    Closed,
}

/// Check a connection out if the slot does not hold one.
pub(crate) async fn open_slot<'s>(
    backend: &Arc<dyn Backend>,
    slot: &'s mut Slot,
) -> Result<&'s mut dyn BackendConnection, SqlToolkitError> {
    if !matches!(slot, Slot::Open(_)) {
        let conn = backend.acquire().await?;
        tracing::debug!(backend = backend.database_type().name(), "checked out connection");
        *slot = Slot::Open(conn);
    }
    match slot {
        Slot::Open(conn) => Ok(conn.as_mut()),
        Slot::Unallocated | Slot::Closed => Err(SqlToolkitError::ConnectionError(
            "connection is not open".to_string(),
        )),
    }
}

/// A handle on at most one pooled connection and its transaction.
///
/// The physical connection is checked out on first use and returned by [`Connection::close`].
/// Statements run inside a transaction that is begun lazily; with autocommit each statement
/// commits and closes the handle before returning.
///
/// A handle is not shared between concurrent tasks; open one per unit of work.
pub struct Connection {
    pub(crate) backend: Arc<dyn Backend>,
    pub(crate) echo: bool,
    pub(crate) autocommit: bool,
    pub(crate) slot: Slot,
    pub(crate) transaction: Transaction,
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("backend", &self.backend.database_type())
            .field("state", &self.state())
            .field("transaction", &self.transaction.state())
            .field("autocommit", &self.autocommit)
            .field("echo", &self.echo)
            .finish()
    }
}

impl Connection {
    pub(crate) fn new(backend: Arc<dyn Backend>, echo: bool, autocommit: bool) -> Self {
        Self {
            backend,
            echo,
            autocommit,
            slot: Slot::Unallocated,
            transaction: Transaction::default(),
        }
    }

    #[must_use]
    pub fn state(&self) -> ConnectionState {
        match self.slot {
            Slot::Unallocated => ConnectionState::Unallocated,
            Slot::Open(_) => ConnectionState::Open,
            Slot::Closed => ConnectionState::Closed,
        }
    }

    #[must_use]
    pub fn database_type(&self) -> DatabaseType {
        self.backend.database_type()
    }

    #[must_use]
    pub fn is_autocommit(&self) -> bool {
        self.autocommit
    }

    #[must_use]
    pub fn echo(&self) -> bool {
        self.echo
    }

    /// Change the echo default for statements on this handle.
    pub fn set_echo(&mut self, echo: bool) {
        self.echo = echo;
    }

    #[must_use]
    pub fn in_transaction(&self) -> bool {
        self.transaction.is_open()
    }

    #[must_use]
    pub fn transaction_state(&self) -> TxState {
        self.transaction.state()
    }

    /// How the previous transaction ended, if one has.
    #[must_use]
    pub fn last_outcome(&self) -> Option<TxOutcome> {
        self.transaction.last_outcome()
    }

    /// Check a connection out of the pool unless one is already held. A closed handle
    /// checks out a fresh connection.
    ///
    /// # Errors
    /// Returns pool errors such as `SqlToolkitError::PoolTimeout`.
    pub async fn acquire(&mut self) -> Result<(), SqlToolkitError> {
        open_slot(&self.backend, &mut self.slot).await?;
        Ok(())
    }

    /// Begin a transaction, reusing the open one if there is one.
    ///
    /// # Errors
    /// Returns pool or driver errors.
    pub async fn begin(&mut self) -> Result<(), SqlToolkitError> {
        let conn = open_slot(&self.backend, &mut self.slot).await?;
        self.transaction.begin(conn).await?;
        Ok(())
    }

    /// Commit the open transaction. Does nothing when none is open.
    ///
    /// # Errors
    /// Returns the driver error; the transaction then stays open.
    pub async fn commit(&mut self) -> Result<(), SqlToolkitError> {
        if let Slot::Open(conn) = &mut self.slot {
            self.transaction.commit(conn.as_mut()).await?;
        }
        Ok(())
    }

    /// Roll back the open transaction. Does nothing when none is open.
    ///
    /// # Errors
    /// Returns the driver error; the transaction then stays open.
    pub async fn rollback(&mut self) -> Result<(), SqlToolkitError> {
        if let Slot::Open(conn) = &mut self.slot {
            self.transaction.rollback(conn.as_mut()).await?;
        }
        Ok(())
    }

    /// Return the physical connection to the pool. Uncommitted work is rolled back.
    /// Closing a closed handle does nothing.
    ///
    /// # Errors
    /// Returns the error from rolling back an open transaction; the handle is closed
    /// regardless.
    pub async fn close(&mut self) -> Result<(), SqlToolkitError> {
        match std::mem::replace(&mut self.slot, Slot::Closed) {
            Slot::Open(conn) => {
                self.transaction.abandon();
                conn.close().await?;
                tracing::debug!(
                    backend = self.backend.database_type().name(),
                    "returned connection"
                );
                Ok(())
            }
            Slot::Unallocated | Slot::Closed => Ok(()),
        }
    }

    /// Run `f` as a unit of work: acquire first, then commit and close when it returns
    /// `Ok`. On `Err` the handle is closed without committing and the error is returned.
    ///
    /// ```rust,no_run
    /// # use sql_toolkit::prelude::*;
    /// # async fn demo(engine: Engine) -> Result<(), SqlToolkitError> {
    /// let moved = engine
    ///     .connect(false)
    ///     .scoped(|conn| {
    ///         Box::pin(async move {
    ///             conn.execute("UPDATE \"jobs\" SET \"state\" = 'moved'").await?;
    ///             conn.count(Select::from("jobs").filter("\"state\" = 'moved'")).await
    ///         })
    ///     })
    ///     .await?;
    /// # let _ = moved;
    /// # Ok(())
    /// # }
    /// ```
    ///
    /// # Errors
    /// Returns the error from `f`, or from acquiring, committing or closing.
    pub async fn scoped<T, E, F>(mut self, f: F) -> Result<T, E>
    where
        F: for<'c> FnOnce(&'c mut Connection) -> BoxFuture<'c, Result<T, E>>,
        E: From<SqlToolkitError>,
    {
        self.acquire().await?;
        match f(&mut self).await {
            Ok(value) => {
                if let Err(err) = self.commit().await {
                    self.close_quietly().await;
                    return Err(err.into());
                }
                self.close().await?;
                Ok(value)
            }
            Err(err) => {
                self.close_quietly().await;
                Err(err)
            }
        }
    }

    pub(crate) async fn close_quietly(&mut self) {
        if let Err(err) = self.close().await {
            tracing::warn!(error = %err, "closing connection after failure");
        }
    }
}
