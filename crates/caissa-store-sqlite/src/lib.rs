//! SQLite backend for the Caissa analytics store.
//!
//! Wraps [`tokio_rusqlite`] so all database access runs on a dedicated
//! thread without blocking the async runtime. Append-only invariants on
//! the interaction log are enforced in code and backed by SQLite triggers
//! as a storage-level constraint.

mod encode;
mod schema;
mod store;

pub mod error;

pub use error::{Error, Result};
pub use store::SqliteStore;

#[cfg(test)]
mod tests;
