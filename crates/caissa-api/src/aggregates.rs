//! Handlers for `/aggregates` endpoints.
//!
//! Reads are never stale: a cached document flagged for recompute (or
//! missing entirely) is recomputed synchronously before it is returned.

use std::sync::Arc;

use axum::{
  Json,
  extract::{Path, State},
};
use caissa_analysis::aggregates::read_aggregate;
use caissa_core::{
  aggregate::{AggregateKind, ComputedAggregate},
  store::AnalyticsStore,
};

use crate::{error::ApiError, identity::Owner};

/// Map the URL segment onto an [`AggregateKind`].
fn parse_kind(segment: &str) -> Result<AggregateKind, ApiError> {
  match segment {
    "lifetime-stats" => Ok(AggregateKind::LifetimeStats),
    "strength-profile" => Ok(AggregateKind::StrengthProfile),
    "tag-transitions" => Ok(AggregateKind::TagTransitions),
    "habits" => Ok(AggregateKind::Habits),
    other => Err(ApiError::NotFound(format!("unknown aggregate: {other}"))),
  }
}

/// `GET /aggregates/{kind}` where `{kind}` is one of `lifetime-stats`,
/// `strength-profile`, `tag-transitions`, `habits`.
pub async fn get_one<S>(
  State(store): State<Arc<S>>,
  Owner(owner_id): Owner,
  Path(kind): Path<String>,
) -> Result<Json<ComputedAggregate>, ApiError>
where
  S: AnalyticsStore,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  let kind = parse_kind(&kind)?;
  let aggregate = read_aggregate(store.as_ref(), owner_id, kind).await?;
  Ok(Json(aggregate))
}
