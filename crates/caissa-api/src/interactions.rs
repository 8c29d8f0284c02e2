//! Handlers for `/interactions` and `/flags` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `POST` | `/interactions` | Body: [`LogBody`]; returns 201 + stored bundle |
//! | `POST` | `/debug-sessions` | Opt the caller's session into debug capture |
//! | `GET`  | `/flags/{name}` | Kill-switch read; 404 when never set |

use std::sync::Arc;

use axum::{
  Json,
  extract::{Path, State},
  http::StatusCode,
  response::IntoResponse,
};
use caissa_core::{
  interaction::{
    ComponentVersions, DebugText, EngineTruth, InteractionBundle,
    InteractionMode, NewInteraction, ReasoningTrace, ResponseMeta, UserBehavior,
  },
  store::{AnalyticsStore, KillSwitch},
};
use chrono::{Duration, Utc};
use serde::Deserialize;
use uuid::Uuid;

use crate::{error::ApiError, identity::Owner};

/// Kill switch gating interaction logging (and, upstream, AI responses).
/// Fail-open: an unset flag counts as enabled.
pub const AI_RESPONSES_FLAG: &str = "ai_responses_enabled";

/// How long opt-in debug text is retained before the purge job removes it.
const DEBUG_TEXT_TTL_DAYS: i64 = 7;

// ─── Log ─────────────────────────────────────────────────────────────────────

/// Raw text accompanying an interaction, stored only for opted-in sessions.
#[derive(Debug, Deserialize)]
pub struct DebugTextBody {
  pub user_text:  Option<String>,
  pub model_text: Option<String>,
}

/// JSON body accepted by `POST /interactions`.
#[derive(Debug, Deserialize)]
pub struct LogBody {
  pub session_id:      Uuid,
  pub mode:            InteractionMode,
  pub position_fen:    Option<String>,
  #[serde(default)]
  pub tools_used:      Vec<String>,
  #[serde(default)]
  pub versions:        ComponentVersions,
  pub engine_truth:    Option<EngineTruth>,
  pub reasoning_trace: Option<ReasoningTrace>,
  pub response_meta:   Option<ResponseMeta>,
  pub user_behavior:   Option<UserBehavior>,
  /// Silently dropped unless the session has opted into debug capture.
  pub debug_text:      Option<DebugTextBody>,
}

/// `POST /interactions` — append one interaction record.
pub async fn create<S>(
  State(store): State<Arc<S>>,
  Owner(owner_id): Owner,
  Json(body): Json<LogBody>,
) -> Result<impl IntoResponse, ApiError>
where
  S: AnalyticsStore,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  let enabled = store
    .get_flag(AI_RESPONSES_FLAG)
    .await
    .map_err(ApiError::store)?
    .map(|flag| flag.enabled)
    .unwrap_or(true);
  if !enabled {
    return Err(ApiError::Unavailable(format!(
      "{AI_RESPONSES_FLAG} is switched off"
    )));
  }

  let input = NewInteraction {
    owner_id,
    session_id: body.session_id,
    mode: body.mode,
    position_fen: body.position_fen,
    tools_used: body.tools_used,
    versions: body.versions,
    engine_truth: body.engine_truth,
    reasoning_trace: body.reasoning_trace,
    response_meta: body.response_meta,
    user_behavior: body.user_behavior,
  };

  let bundle: InteractionBundle = store
    .record_interaction(input)
    .await
    .map_err(ApiError::store)?;

  if let Some(text) = body.debug_text {
    let opted_in = store
      .is_debug_session(bundle.interaction.session_id)
      .await
      .map_err(ApiError::store)?;
    if opted_in {
      store
        .put_debug_text(DebugText {
          interaction_id: bundle.interaction.interaction_id,
          owner_id,
          user_text:      text.user_text,
          model_text:     text.model_text,
          expires_at:     Utc::now() + Duration::days(DEBUG_TEXT_TTL_DAYS),
        })
        .await
        .map_err(ApiError::store)?;
    }
  }

  Ok((StatusCode::CREATED, Json(bundle)))
}

// ─── Debug opt-in ────────────────────────────────────────────────────────────

/// JSON body accepted by `POST /debug-sessions`.
#[derive(Debug, Deserialize)]
pub struct OptInBody {
  pub session_id: Uuid,
}

/// `POST /debug-sessions` — opt the caller's session into debug-text
/// capture. Idempotent.
pub async fn opt_in_debug<S>(
  State(store): State<Arc<S>>,
  Owner(owner_id): Owner,
  Json(body): Json<OptInBody>,
) -> Result<StatusCode, ApiError>
where
  S: AnalyticsStore,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  store
    .set_debug_session(body.session_id, owner_id)
    .await
    .map_err(ApiError::store)?;
  Ok(StatusCode::NO_CONTENT)
}

// ─── Flags ───────────────────────────────────────────────────────────────────

/// `GET /flags/{name}`
pub async fn get_flag<S>(
  State(store): State<Arc<S>>,
  Path(name): Path<String>,
) -> Result<Json<KillSwitch>, ApiError>
where
  S: AnalyticsStore,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  let flag = store
    .get_flag(&name)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| ApiError::NotFound(format!("flag {name} never set")))?;
  Ok(Json(flag))
}
