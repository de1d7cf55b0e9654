//! SQLite backend for the songvote store.
//!
//! Wraps [`tokio_rusqlite`] so all database access runs on a dedicated thread
//! without blocking the async runtime. Each write executes inside a single
//! closure on that thread, so a transaction is never split across requests.
//! A write whose caller has gone away rolls back instead of committing.

mod encode;
mod schema;
mod store;

pub mod error;

pub use error::{Error, Result};
pub use store::SqliteStore;

#[cfg(test)]
mod tests;
