//! Error types for `caissa-core`.
//!
//! Deliberately small: the backends and the analysis crate carry their own
//! richer error enums. What lives here is only what the core types
//! themselves can fail at, which is payload decoding.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("unknown aggregate kind discriminant: {0:?}")]
  UnknownAggregateKind(String),

  #[error("serialization error: {0}")]
  Serialization(#[from] serde_json::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
