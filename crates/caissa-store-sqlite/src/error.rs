//! Error type for `caissa-store-sqlite`.

use thiserror::Error;

/// Message raised by the schema triggers guarding the interaction log.
pub(crate) const APPEND_ONLY_MSG: &str = "interaction records are append-only";

#[derive(Debug, Error)]
pub enum Error {
  #[error("core error: {0}")]
  Core(#[from] caissa_core::Error),

  #[error("database error: {0}")]
  Database(tokio_rusqlite::Error),

  /// A write attempted to mutate the interaction log outside the sanctioned
  /// privacy paths; raised by the schema triggers.
  #[error("interaction records are append-only: {0}")]
  AppendOnlyViolation(String),

  #[error("json error: {0}")]
  Json(#[from] serde_json::Error),

  #[error("uuid parse error: {0}")]
  Uuid(#[from] uuid::Error),

  #[error("date/time parse error: {0}")]
  DateParse(String),

  #[error("decode error: {0}")]
  Decode(String),

  #[error("game not found: {0}")]
  GameNotFound(uuid::Uuid),

  /// Facts cannot be written to a game that has left the window.
  #[error("game {0} is already compacted")]
  AlreadyCompacted(uuid::Uuid),

  #[error("gold case not found: {0}")]
  GoldCaseNotFound(uuid::Uuid),
}

impl From<tokio_rusqlite::Error> for Error {
  fn from(e: tokio_rusqlite::Error) -> Self {
    // Trigger aborts carry their RAISE message; surface them as the
    // integrity violation they are rather than a generic database fault.
    if e.to_string().contains(APPEND_ONLY_MSG) {
      Error::AppendOnlyViolation(e.to_string())
    } else {
      Error::Database(e)
    }
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
