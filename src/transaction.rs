use crate::error::SqlToolkitError;
use crate::pool::BackendConnection;
use crate::tx_outcome::TxOutcome;

/// Whether a transaction is open on a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TxState {
    #[default]
    Idle,
    Open,
}

/// Transaction bookkeeping for one connection. At most one transaction is open at a time;
/// `begin` while open reuses it instead of nesting.
///
/// A failed `commit` or `rollback` leaves the state `Open` so the caller decides what to
/// do next.
#[derive(Debug, Default)]
pub(crate) struct Transaction {
    state: TxState,
    last: Option<TxOutcome>,
}

impl Transaction {
    pub(crate) fn state(&self) -> TxState {
        self.state
    }

    pub(crate) fn is_open(&self) -> bool {
        self.state == TxState::Open
    }

    pub(crate) fn last_outcome(&self) -> Option<TxOutcome> {
        self.last
    }

    /// Returns `true` when a new transaction was started.
    pub(crate) async fn begin(
        &mut self,
        conn: &mut dyn BackendConnection,
    ) -> Result<bool, SqlToolkitError> {
        if self.is_open() {
            return Ok(false);
        }
        conn.begin().await?;
        self.state = TxState::Open;
        Ok(true)
    }

    pub(crate) async fn commit(
        &mut self,
        conn: &mut dyn BackendConnection,
    ) -> Result<(), SqlToolkitError> {
        if !self.is_open() {
            return Ok(());
        }
        conn.commit().await?;
        self.end(TxOutcome::Committed);
        Ok(())
    }

    pub(crate) async fn rollback(
        &mut self,
        conn: &mut dyn BackendConnection,
    ) -> Result<(), SqlToolkitError> {
        if !self.is_open() {
            return Ok(());
        }
        conn.rollback().await?;
        self.end(TxOutcome::RolledBack);
        Ok(())
    }

    /// Record an open transaction as rolled back because its connection is going away.
    pub(crate) fn abandon(&mut self) {
        if self.is_open() {
            self.end(TxOutcome::RolledBack);
        }
    }

    fn end(&mut self, outcome: TxOutcome) {
        self.state = TxState::Idle;
        self.last = Some(outcome);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::results::ResultSet;
    use crate::types::RowValues;
    use async_trait::async_trait;

    #[derive(Default)]
    struct Recorder {
        calls: Vec<&'static str>,
        fail_commit: bool,
    }

    #[async_trait]
    impl BackendConnection for Recorder {
        fn in_transaction(&self) -> bool {
            false
        }

        async fn begin(&mut self) -> Result<(), SqlToolkitError> {
            self.calls.push("begin");
            Ok(())
        }

        async fn commit(&mut self) -> Result<(), SqlToolkitError> {
            self.calls.push("commit");
            if self.fail_commit {
                return Err(SqlToolkitError::ExecutionError("serialization failure".into()));
            }
            Ok(())
        }

        async fn rollback(&mut self) -> Result<(), SqlToolkitError> {
            self.calls.push("rollback");
            Ok(())
        }

        async fn execute(
            &mut self,
            _sql: &str,
            _params: &[RowValues],
        ) -> Result<ResultSet, SqlToolkitError> {
            Ok(ResultSet::affected(0))
        }

        async fn execute_batch(&mut self, _sql: &str) -> Result<(), SqlToolkitError> {
            Ok(())
        }

        async fn close(self: Box<Self>) -> Result<(), SqlToolkitError> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn begin_is_idempotent_and_end_is_noop_when_idle() {
        let mut conn = Recorder::default();
        let mut tx = Transaction::default();
        tx.commit(&mut conn).await.unwrap();
        assert!(tx.begin(&mut conn).await.unwrap());
        assert!(!tx.begin(&mut conn).await.unwrap());
        tx.commit(&mut conn).await.unwrap();
        tx.rollback(&mut conn).await.unwrap();
        assert_eq!(conn.calls, vec!["begin", "commit"]);
        assert_eq!(tx.last_outcome(), Some(TxOutcome::Committed));
        assert_eq!(tx.state(), TxState::Idle);
    }

    #[tokio::test]
    async fn failed_commit_leaves_transaction_open() {
        let mut conn = Recorder {
            fail_commit: true,
            ..Recorder::default()
        };
        let mut tx = Transaction::default();
        tx.begin(&mut conn).await.unwrap();
        assert!(tx.commit(&mut conn).await.is_err());
        assert!(tx.is_open());
        tx.abandon();
        assert_eq!(tx.last_outcome(), Some(TxOutcome::RolledBack));
    }
}
