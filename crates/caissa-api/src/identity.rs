//! Owner identity extraction.
//!
//! Authentication itself happens upstream; the trusted proxy forwards the
//! authenticated user's id in the `x-caissa-owner` header. Every user-facing
//! handler scopes its store queries to that id.

use axum::{extract::FromRequestParts, http::request::Parts};
use uuid::Uuid;

use crate::error::ApiError;

/// The header carrying the authenticated owner's id.
pub const OWNER_HEADER: &str = "x-caissa-owner";

/// The authenticated owner of the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Owner(pub Uuid);

impl<S: Send + Sync> FromRequestParts<S> for Owner {
  type Rejection = ApiError;

  async fn from_request_parts(
    parts: &mut Parts,
    _state: &S,
  ) -> Result<Self, Self::Rejection> {
    let value = parts
      .headers
      .get(OWNER_HEADER)
      .ok_or_else(|| {
        ApiError::Unauthorized(format!("missing {OWNER_HEADER} header"))
      })?
      .to_str()
      .map_err(|_| {
        ApiError::Unauthorized(format!("malformed {OWNER_HEADER} header"))
      })?;

    let owner = Uuid::parse_str(value).map_err(|_| {
      ApiError::Unauthorized(format!("{OWNER_HEADER} is not a uuid"))
    })?;

    Ok(Owner(owner))
  }
}
