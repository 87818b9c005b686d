//! `PostgreSQL` backend: a bb8 pool of `tokio_postgres` clients.

mod backend;
mod config;
mod manager;
mod params;
mod query;

pub use backend::PostgresBackend;
pub use manager::{PgClient, PgManager};
