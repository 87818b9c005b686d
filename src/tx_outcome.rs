/// How the most recent transaction on a connection ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxOutcome {
    Committed,
    /// Rolled back explicitly, or abandoned when the connection closed.
    RolledBack,
}
