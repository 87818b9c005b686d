use std::borrow::BorrowMut;
use std::sync::Arc;

use tokio::runtime::Runtime;

use crate::connection::{Connection, ConnectionState};
use crate::error::SqlToolkitError;
use crate::executor::{ExecutionReport, Replay, SleepSpec};
use crate::query_builder::{CopyRows, Delete, Execute, Insert, Select, StatementBuilder, Update};
use crate::results::ResultSet;
use crate::tx_outcome::TxOutcome;

fn detached() -> SqlToolkitError {
    SqlToolkitError::ConnectionError("connection handle already released".to_string())
}

/// Blocking counterpart of [`Connection`].
#[derive(Debug)]
pub struct BlockingConnection {
    inner: Option<Connection>,
    runtime: Arc<Runtime>,
}

macro_rules! blocking_call {
    ($self:ident, |$conn:ident| $call:expr) => {{
        let $conn = $self.inner.as_mut().ok_or_else(detached)?;
        $self.runtime.block_on($call)
    }};
}

impl BlockingConnection {
    pub(crate) fn new(inner: Connection, runtime: Arc<Runtime>) -> Self {
        Self {
            inner: Some(inner),
            runtime,
        }
    }

    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.inner
            .as_ref()
            .map_or(ConnectionState::Closed, Connection::state)
    }

    #[must_use]
    pub fn in_transaction(&self) -> bool {
        self.inner.as_ref().is_some_and(Connection::in_transaction)
    }

    #[must_use]
    pub fn last_outcome(&self) -> Option<TxOutcome> {
        self.inner.as_ref().and_then(Connection::last_outcome)
    }

    pub fn set_echo(&mut self, echo: bool) {
        if let Some(conn) = self.inner.as_mut() {
            conn.set_echo(echo);
        }
    }

    /// # Errors
    /// See [`Connection::acquire`].
    pub fn acquire(&mut self) -> Result<(), SqlToolkitError> {
        blocking_call!(self, |conn| conn.acquire())
    }

    /// # Errors
    /// See [`Connection::begin`].
    pub fn begin(&mut self) -> Result<(), SqlToolkitError> {
        blocking_call!(self, |conn| conn.begin())
    }

    /// # Errors
    /// See [`Connection::commit`].
    pub fn commit(&mut self) -> Result<(), SqlToolkitError> {
        blocking_call!(self, |conn| conn.commit())
    }

    /// # Errors
    /// See [`Connection::rollback`].
    pub fn rollback(&mut self) -> Result<(), SqlToolkitError> {
        blocking_call!(self, |conn| conn.rollback())
    }

    /// # Errors
    /// See [`Connection::close`].
    pub fn close(&mut self) -> Result<(), SqlToolkitError> {
        blocking_call!(self, |conn| conn.close())
    }

    /// # Errors
    /// See [`Connection::execute`].
    pub fn execute(&mut self, statement: impl Into<Execute>) -> Result<ResultSet, SqlToolkitError> {
        blocking_call!(self, |conn| conn.execute(statement))
    }

    /// # Errors
    /// See [`Connection::execute`].
    pub fn execute_reported(
        &mut self,
        statement: impl Into<Execute>,
    ) -> Result<(ResultSet, ExecutionReport), SqlToolkitError> {
        blocking_call!(self, |conn| conn.execute_reported(statement))
    }

    /// # Errors
    /// See [`Connection::select`].
    pub fn select(&mut self, select: impl Into<Select>) -> Result<ResultSet, SqlToolkitError> {
        blocking_call!(self, |conn| conn.select(select))
    }

    /// # Errors
    /// See [`Connection::insert`].
    pub fn insert(&mut self, insert: Insert) -> Result<ResultSet, SqlToolkitError> {
        blocking_call!(self, |conn| conn.insert(insert))
    }

    /// # Errors
    /// See [`Connection::update`].
    pub fn update(&mut self, update: Update) -> Result<ResultSet, SqlToolkitError> {
        blocking_call!(self, |conn| conn.update(update))
    }

    /// # Errors
    /// See [`Connection::delete`].
    pub fn delete(&mut self, delete: impl Into<Delete>) -> Result<ResultSet, SqlToolkitError> {
        blocking_call!(self, |conn| conn.delete(delete))
    }

    /// # Errors
    /// See [`Connection::copy`].
    pub fn copy(&mut self, copy: impl Into<CopyRows>) -> Result<ResultSet, SqlToolkitError> {
        blocking_call!(self, |conn| conn.copy(copy))
    }

    /// # Errors
    /// See [`Connection::count`].
    pub fn count(&mut self, select: impl Into<Select>) -> Result<usize, SqlToolkitError> {
        blocking_call!(self, |conn| conn.count(select))
    }

    /// # Errors
    /// See [`Connection::exist`].
    pub fn exist(&mut self, select: impl Into<Select>) -> Result<bool, SqlToolkitError> {
        blocking_call!(self, |conn| conn.exist(select))
    }

    /// # Errors
    /// See [`Connection::sleep`].
    pub fn sleep(&mut self, spec: SleepSpec) -> Result<f64, SqlToolkitError> {
        blocking_call!(self, |conn| conn.sleep(spec))
    }

    /// Lazily execute `statement` once per row on this handle.
    pub fn generator(&mut self, statement: Execute) -> ResultIter<&mut Connection> {
        match self.inner.as_mut() {
            Some(conn) => ResultIter::new(conn, Arc::clone(&self.runtime), statement),
            None => ResultIter::failed(Arc::clone(&self.runtime), detached()),
        }
    }

    /// Blocking form of [`Connection::scoped`].
    ///
    /// # Errors
    /// Returns the error from `f`, or from acquiring, committing or closing.
    pub fn scoped<T, E, F>(mut self, f: F) -> Result<T, E>
    where
        F: FnOnce(&mut BlockingConnection) -> Result<T, E>,
        E: From<SqlToolkitError>,
    {
        self.acquire()?;
        match f(&mut self) {
            Ok(value) => {
                if let Err(err) = self.commit() {
                    self.close_quietly();
                    return Err(err.into());
                }
                self.close()?;
                Ok(value)
            }
            Err(err) => {
                self.close_quietly();
                Err(err)
            }
        }
    }

    fn close_quietly(&mut self) {
        if let Some(conn) = self.inner.as_mut() {
            self.runtime.block_on(conn.close_quietly());
        }
    }
}

impl Drop for BlockingConnection {
    fn drop(&mut self) {
        let _guard = self.runtime.enter();
        drop(self.inner.take());
    }
}

/// Iterator form of [`Connection::generator`]: one result per row, stopping after the
/// first error.
#[derive(Debug)]
pub struct ResultIter<C: BorrowMut<Connection>> {
    conn: Option<C>,
    runtime: Arc<Runtime>,
    replay: Option<Result<Replay, SqlToolkitError>>,
}

impl<C: BorrowMut<Connection>> ResultIter<C> {
    pub(crate) fn new(conn: C, runtime: Arc<Runtime>, statement: Execute) -> Self {
        Self {
            conn: Some(conn),
            runtime,
            replay: Some(statement.build().map(Replay::new)),
        }
    }

    fn failed(runtime: Arc<Runtime>, err: SqlToolkitError) -> Self {
        Self {
            conn: None,
            runtime,
            replay: Some(Err(err)),
        }
    }
}

impl<C: BorrowMut<Connection>> Iterator for ResultIter<C> {
    type Item = Result<ResultSet, SqlToolkitError>;

    fn next(&mut self) -> Option<Self::Item> {
        let mut replay = match self.replay.take()? {
            Ok(replay) => replay,
            Err(err) => return Some(Err(err)),
        };
        let statement = replay.next_statement()?;
        let conn: &mut Connection = self.conn.as_mut()?.borrow_mut();
        match self.runtime.block_on(conn.run_built(statement)) {
            Ok((result, _)) => {
                self.replay = Some(Ok(replay));
                Some(Ok(result))
            }
            Err(err) => {
                replay.finish();
                Some(Err(err))
            }
        }
    }
}

impl<C: BorrowMut<Connection>> Drop for ResultIter<C> {
    fn drop(&mut self) {
        let _guard = self.runtime.enter();
        drop(self.conn.take());
    }
}
