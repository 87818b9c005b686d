//! Convenient imports for common functionality.

pub use crate::bind_row;
pub use crate::binding::{PreparedStatement, is_multi_statement, normalize, statement_kinds};
pub use crate::blocking::{BlockingConnection, BlockingEngine, ResultIter};
pub use crate::catalog::{Catalog, SchemaCatalog};
pub use crate::connection::{Connection, ConnectionState};
pub use crate::engine::{Engine, EngineConfig};
pub use crate::error::SqlToolkitError;
pub use crate::executor::{ExecutionReport, SleepSpec};
pub use crate::params::{BindRow, BindValue};
pub use crate::pool::PoolStatus;
pub use crate::query_builder::{
    BuiltStatement, ConflictAction, CopyRows, Delete, Execute, Field, Insert, Limit, Select,
    StatementBuilder, Update,
};
pub use crate::results::{ResultRow, ResultSet};
pub use crate::transaction::TxState;
pub use crate::tx_outcome::TxOutcome;
pub use crate::types::{DatabaseType, RowValues};
