//! SQL statement construction and pooled transactional execution for `PostgreSQL`
//! (`tokio-postgres`) and `SQLite` (`rusqlite`).
//!
//! Statements are written with `:name` placeholders. Builders produce the SQL text and the
//! rows to bind; a [`Connection`] normalizes the values, renders positional placeholders
//! for its backend and runs each row inside a lazily begun transaction.
//!
//! ```rust,no_run
//! use sql_toolkit::prelude::*;
//!
//! # async fn demo() -> Result<(), SqlToolkitError> {
//! let engine = Engine::new(EngineConfig::sqlite("jobs.db")).await?;
//! engine
//!     .execute("CREATE TABLE IF NOT EXISTS \"jobs\" (\"id\" INTEGER PRIMARY KEY, \"state\" TEXT)")
//!     .await?;
//!
//! let mut conn = engine.connect(false);
//! conn.insert(
//!     Insert::into("jobs")
//!         .rows([bind_row! { "id" => 1_i64, "state" => "queued" }])
//!         .on_conflict(["id"]),
//! )
//! .await?;
//! conn.delete(Delete::from("jobs").filter("\"id\" IN :ids").bind("ids", vec![2_i64, 3]))
//!     .await?;
//! conn.commit().await?;
//! conn.close().await?;
//! # Ok(())
//! # }
//! ```
//!
//! [`BlockingEngine`] offers the same surface to synchronous callers.

#[cfg(not(any(feature = "postgres", feature = "sqlite")))]
compile_error!("enable at least one of the `postgres` or `sqlite` features");

pub mod binding;
pub mod blocking;
pub mod catalog;
pub mod connection;
pub mod engine;
pub mod error;
pub mod executor;
pub mod params;
pub mod pool;
pub mod prelude;
pub mod query_builder;
pub mod results;
pub mod transaction;
pub mod tx_outcome;
pub mod types;

#[cfg(feature = "postgres")]
pub mod postgres;
#[cfg(feature = "sqlite")]
pub mod sqlite;

pub use binding::{PreparedStatement, is_multi_statement, normalize, statement_kinds};
pub use blocking::{BlockingConnection, BlockingEngine};
pub use connection::{Connection, ConnectionState};
pub use engine::{Engine, EngineConfig};
pub use error::SqlToolkitError;
pub use params::{BindRow, BindValue};
pub use results::{ResultRow, ResultSet};
pub use types::{DatabaseType, RowValues};
