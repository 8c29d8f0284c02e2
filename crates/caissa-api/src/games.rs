//! Handlers for `/games` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `POST` | `/games` | Body: [`IngestBody`]; returns 201 + ingest report |
//! | `GET`  | `/games` | Caller's games, newest first; optional `?state=` |

use std::sync::Arc;

use axum::{
  Json,
  extract::{Query, State},
  http::StatusCode,
  response::IntoResponse,
};
use caissa_analysis::ingest::{IngestConfig, ingest_game};
use caissa_core::{
  game::{Game, GameResult, GameState, NewGame, RatingContext, TimeControlClass},
  store::AnalyticsStore,
  trace::EvalTrace,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::{error::ApiError, identity::Owner};

// ─── Ingest ──────────────────────────────────────────────────────────────────

/// JSON body accepted by `POST /games`.
#[derive(Debug, Deserialize)]
pub struct IngestBody {
  pub played_at:    DateTime<Utc>,
  pub rating:       Option<RatingContext>,
  pub result:       GameResult,
  pub time_control: TimeControlClass,
  /// The engine collaborator's already-computed evaluation trace.
  pub trace:        EvalTrace,
}

/// `POST /games` — ingest one game's evaluation trace for the caller.
pub async fn ingest<S>(
  State(store): State<Arc<S>>,
  Owner(owner_id): Owner,
  Json(body): Json<IngestBody>,
) -> Result<impl IntoResponse, ApiError>
where
  S: AnalyticsStore,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  let new_game = NewGame {
    owner_id,
    played_at: body.played_at,
    rating: body.rating,
    result: body.result,
    time_control: body.time_control,
  };

  let report =
    ingest_game(store.as_ref(), new_game, &body.trace, &IngestConfig::default())
      .await?;

  Ok((StatusCode::CREATED, Json(report)))
}

// ─── List ────────────────────────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
  /// If set, restrict to `active` or `compacted` games.
  pub state: Option<GameState>,
}

/// `GET /games[?state=active|compacted]`
pub async fn list<S>(
  State(store): State<Arc<S>>,
  Owner(owner_id): Owner,
  Query(params): Query<ListParams>,
) -> Result<Json<Vec<Game>>, ApiError>
where
  S: AnalyticsStore,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  let games = store
    .list_games(owner_id, params.state)
    .await
    .map_err(ApiError::store)?;
  Ok(Json(games))
}
