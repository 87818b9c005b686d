//! Statement execution on a [`Connection`]: normalize, bind, run inside the lazily begun
//! transaction, report, and apply the autocommit policy.

use std::borrow::BorrowMut;
use std::time::Instant;

use chrono::Local;
use futures_util::stream::{self, Stream};

use crate::binding::{is_multi_statement, normalize};
use crate::connection::{Connection, open_slot};
use crate::error::SqlToolkitError;
use crate::params::BindRow;
use crate::query_builder::{
    BuiltStatement, CopyRows, Delete, Execute, Insert, Select, StatementBuilder, Update,
};
use crate::results::ResultSet;

mod replay;
mod report;
mod sleep;

pub(crate) use replay::Replay;
pub use report::ExecutionReport;
pub use sleep::SleepSpec;

impl Connection {
    /// Run arbitrary SQL once per bound row (or once with no rows).
    ///
    /// # Errors
    /// Returns `SqlToolkitError::ParameterError` for a placeholder without a value and
    /// driver errors unchanged. The transaction stays open unless the handle autocommits.
    pub async fn execute(
        &mut self,
        statement: impl Into<Execute>,
    ) -> Result<ResultSet, SqlToolkitError> {
        self.run(statement.into()).await.map(|(result, _)| result)
    }

    /// Like [`Connection::execute`], also returning the timing report.
    ///
    /// # Errors
    /// Same as [`Connection::execute`].
    pub async fn execute_reported(
        &mut self,
        statement: impl Into<Execute>,
    ) -> Result<(ResultSet, ExecutionReport), SqlToolkitError> {
        self.run(statement.into()).await
    }

    /// # Errors
    /// Returns build errors before any I/O, then driver errors.
    pub async fn select(&mut self, select: impl Into<Select>) -> Result<ResultSet, SqlToolkitError> {
        self.run(select.into()).await.map(|(result, _)| result)
    }

    /// # Errors
    /// Returns `SqlToolkitError::BuildError` for an empty payload or an unusable conflict
    /// clause, then driver errors.
    pub async fn insert(&mut self, insert: Insert) -> Result<ResultSet, SqlToolkitError> {
        self.run(insert).await.map(|(result, _)| result)
    }

    /// # Errors
    /// Returns `SqlToolkitError::BuildError` for an empty payload or rows with differing
    /// columns, then driver errors.
    pub async fn update(&mut self, update: Update) -> Result<ResultSet, SqlToolkitError> {
        self.run(update).await.map(|(result, _)| result)
    }

    /// # Errors
    /// Returns driver errors.
    pub async fn delete(&mut self, delete: impl Into<Delete>) -> Result<ResultSet, SqlToolkitError> {
        self.run(delete.into()).await.map(|(result, _)| result)
    }

    /// Duplicate matching rows within their table.
    ///
    /// # Errors
    /// Returns driver errors, e.g. unique violations when copying whole rows.
    pub async fn copy(&mut self, copy: impl Into<CopyRows>) -> Result<ResultSet, SqlToolkitError> {
        self.run(copy.into()).await.map(|(result, _)| result)
    }

    /// Number of rows the select would return.
    ///
    /// # Errors
    /// Returns driver errors.
    pub async fn count(&mut self, select: impl Into<Select>) -> Result<usize, SqlToolkitError> {
        let result = self.run(select.into().counting()).await?.0;
        Ok(result.len())
    }

    /// # Errors
    /// Returns driver errors.
    pub async fn exist(&mut self, select: impl Into<Select>) -> Result<bool, SqlToolkitError> {
        Ok(self.count(select).await? != 0)
    }

    /// Execute `statement` once per row, lazily, yielding each result.
    ///
    /// The stream ends after the last row or right after the first error; rows already run
    /// stay in the open transaction.
    pub fn generator(
        &mut self,
        statement: Execute,
    ) -> impl Stream<Item = Result<ResultSet, SqlToolkitError>> + Send + '_ {
        replay_stream(self, statement)
    }

    /// Make the server wait, returning the seconds slept.
    ///
    /// # Errors
    /// Returns `SqlToolkitError::BuildError` for unusable bounds, then driver errors.
    pub async fn sleep(&mut self, spec: SleepSpec) -> Result<f64, SqlToolkitError> {
        let seconds = spec.sample(&mut rand::thread_rng())?;
        let sql = self.backend.sleep_sql();
        self.run(Execute::new(sql).bind("seconds", seconds)).await?;
        Ok(seconds)
    }

    pub(crate) async fn run<B: StatementBuilder>(
        &mut self,
        builder: B,
    ) -> Result<(ResultSet, ExecutionReport), SqlToolkitError> {
        let built = builder.build()?;
        self.run_built(built).await
    }

    pub(crate) async fn run_built(
        &mut self,
        built: BuiltStatement,
    ) -> Result<(ResultSet, ExecutionReport), SqlToolkitError> {
        let outcome = self.dispatch(built).await;
        if !self.autocommit {
            return outcome;
        }
        match outcome {
            Ok(done) => {
                if let Err(err) = self.commit().await {
                    self.close_quietly().await;
                    return Err(err);
                }
                self.close().await?;
                Ok(done)
            }
            Err(err) => {
                self.close_quietly().await;
                Err(err)
            }
        }
    }

    async fn dispatch(
        &mut self,
        built: BuiltStatement,
    ) -> Result<(ResultSet, ExecutionReport), SqlToolkitError> {
        let echo = built.echo.unwrap_or(self.echo);
        let (mut statement, rows) = normalize(&built.sql, built.rows);
        statement.inline_raw(&built.raw);
        let style = self.backend.database_type().placeholder_style();

        let conn = open_slot(&self.backend, &mut self.slot).await?;
        self.transaction.begin(&mut *conn).await?;

        // Timing covers statement dispatch only, not checkout or BEGIN.
        let started_at = Local::now();
        let timer = Instant::now();

        let single = [BindRow::new()];
        let bound: &[BindRow] = if rows.is_empty() { &single } else { &rows };
        let mut result = ResultSet::with_capacity(0);
        for row in bound {
            let rendered = statement.render(row, style)?;
            let part = if rendered.params.is_empty() && is_multi_statement(&rendered.sql) {
                conn.execute_batch(&rendered.sql).await?;
                ResultSet::affected(0)
            } else {
                conn.execute(&rendered.sql, &rendered.params).await?
            };
            result.merge(part);
        }

        let report = ExecutionReport {
            sql: statement.text().to_string(),
            rows,
            started_at,
            finished_at: Local::now(),
            elapsed: timer.elapsed(),
            row_count: result.rows_affected,
        };
        if echo {
            report.log();
        }
        Ok((result, report))
    }
}

/// Stream driving a [`Replay`] on a borrowed or owned connection.
pub(crate) fn replay_stream<C>(
    conn: C,
    statement: Execute,
) -> impl Stream<Item = Result<ResultSet, SqlToolkitError>> + Send
where
    C: BorrowMut<Connection> + Send,
{
    let replay = statement.build().map(Replay::new);
    stream::unfold((conn, Some(replay)), |(mut conn, state)| async move {
        match state? {
            Err(err) => Some((Err(err), (conn, None))),
            Ok(mut replay) => {
                let statement = replay.next_statement()?;
                let target: &mut Connection = conn.borrow_mut();
                match target.run_built(statement).await {
                    Ok((result, _)) => Some((Ok(result), (conn, Some(Ok(replay))))),
                    Err(err) => {
                        replay.finish();
                        Some((Err(err), (conn, None)))
                    }
                }
            }
        }
    })
}
