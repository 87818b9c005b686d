//! `SQLite` backend: a bb8 pool of `rusqlite` connections driven on the blocking thread pool.

mod backend;
mod config;
mod manager;
mod params;
mod query;

pub use backend::SqliteBackend;
pub use manager::{SqliteHandle, SqliteManager};
