//! Handlers for the operator-facing `/admin` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/admin/interactions/{id}/flags` | Derived failure-mode flags |
//! | `GET`  | `/admin/kpis/daily?date=` | Per-mode KPI rates for one day |
//! | `GET`  | `/admin/cohorts/failure-modes` | Ranked trailing-7-day cohorts |
//! | `PUT`  | `/admin/flags/{name}` | Kill-switch write |
//! | `POST` | `/admin/gold-cases` | Create a frozen benchmark case |
//! | `GET`  | `/admin/gold-cases` | List the gold set |
//! | `POST` | `/admin/benchmark` | Score a model replay against the gold set |
//! | `POST` | `/admin/privacy/{owner}/anonymize` | Clear owner references |
//! | `POST` | `/admin/privacy/{owner}/delete` | Soft-delete + purge debug data |
//!
//! Operator authentication is layered on by the server binary; these
//! handlers assume the caller is already trusted.

use std::sync::Arc;

use axum::{
  Json,
  extract::{Path, Query, State},
  http::StatusCode,
  response::IntoResponse,
};
use caissa_analysis::{
  diagnostics::{
    DailyKpis, DiagnosticConfig, FailureCohort, InteractionFlags, daily_kpis,
    derive_flags, failure_cohorts,
  },
  goldset::evaluate_against_gold_set,
};
use caissa_core::{
  goldcase::{BenchmarkReport, GoldCase, GoldPrediction, NewGoldCase},
  store::{AnalyticsStore, InteractionQuery, KillSwitch, PrivacyReport},
};
use chrono::{Days, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ApiError;

// ─── Diagnostics ─────────────────────────────────────────────────────────────

/// `GET /admin/interactions/{id}/flags`
pub async fn interaction_flags<S>(
  State(store): State<Arc<S>>,
  Path(id): Path<Uuid>,
) -> Result<Json<InteractionFlags>, ApiError>
where
  S: AnalyticsStore,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  let bundle = store
    .get_interaction(id)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| ApiError::NotFound(format!("interaction {id} not found")))?;
  Ok(Json(derive_flags(&bundle, &DiagnosticConfig::default())))
}

#[derive(Debug, Deserialize)]
pub struct DailyParams {
  pub date: NaiveDate,
}

/// `GET /admin/kpis/daily?date=YYYY-MM-DD`
pub async fn daily<S>(
  State(store): State<Arc<S>>,
  Query(params): Query<DailyParams>,
) -> Result<Json<DailyKpis>, ApiError>
where
  S: AnalyticsStore,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  let start = params
    .date
    .and_hms_opt(0, 0, 0)
    .ok_or_else(|| ApiError::BadRequest("invalid date".into()))?
    .and_utc();
  let end = start + chrono::Duration::days(1);

  let bundles = store
    .list_interactions(&InteractionQuery {
      occurred_after: Some(start),
      occurred_before: Some(end),
      ..Default::default()
    })
    .await
    .map_err(ApiError::store)?;

  Ok(Json(daily_kpis(&bundles, params.date, &DiagnosticConfig::default())))
}

/// `GET /admin/cohorts/failure-modes`
pub async fn cohorts<S>(
  State(store): State<Arc<S>>,
) -> Result<Json<Vec<FailureCohort>>, ApiError>
where
  S: AnalyticsStore,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  let now = Utc::now();
  let window_start = now.checked_sub_days(Days::new(7)).unwrap_or(now);

  let bundles = store
    .list_interactions(&InteractionQuery {
      occurred_after: Some(window_start),
      ..Default::default()
    })
    .await
    .map_err(ApiError::store)?;

  Ok(Json(failure_cohorts(&bundles, now, &DiagnosticConfig::default())))
}

// ─── Kill switches ───────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct FlagBody {
  pub enabled: bool,
}

/// `PUT /admin/flags/{name}` — body: `{"enabled":false}`
pub async fn set_flag<S>(
  State(store): State<Arc<S>>,
  Path(name): Path<String>,
  Json(body): Json<FlagBody>,
) -> Result<Json<KillSwitch>, ApiError>
where
  S: AnalyticsStore,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  let flag = store
    .set_flag(&name, body.enabled)
    .await
    .map_err(ApiError::store)?;
  tracing::info!(flag = %flag.name, enabled = flag.enabled, "kill switch set");
  Ok(Json(flag))
}

// ─── Gold set ────────────────────────────────────────────────────────────────

/// `POST /admin/gold-cases` — returns 201 + the frozen case.
pub async fn create_gold_case<S>(
  State(store): State<Arc<S>>,
  Json(body): Json<NewGoldCase>,
) -> Result<impl IntoResponse, ApiError>
where
  S: AnalyticsStore,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  let case = store.add_gold_case(body).await.map_err(ApiError::store)?;
  Ok((StatusCode::CREATED, Json(case)))
}

/// `GET /admin/gold-cases`
pub async fn list_gold_cases<S>(
  State(store): State<Arc<S>>,
) -> Result<Json<Vec<GoldCase>>, ApiError>
where
  S: AnalyticsStore,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  let cases = store.list_gold_cases().await.map_err(ApiError::store)?;
  Ok(Json(cases))
}

/// JSON body accepted by `POST /admin/benchmark`.
#[derive(Debug, Deserialize)]
pub struct BenchmarkBody {
  pub model_identity: String,
  /// The model's already-computed answers, replayed by the operator.
  pub predictions:    Vec<GoldPrediction>,
}

/// `POST /admin/benchmark`
pub async fn run_benchmark<S>(
  State(store): State<Arc<S>>,
  Json(body): Json<BenchmarkBody>,
) -> Result<Json<BenchmarkReport>, ApiError>
where
  S: AnalyticsStore,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  let report = evaluate_against_gold_set(
    store.as_ref(),
    &body.model_identity,
    &body.predictions,
  )
  .await?;
  Ok(Json(report))
}

// ─── Privacy ─────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct AnonymizeResponse {
  pub interactions_anonymized: u32,
}

/// `POST /admin/privacy/{owner}/anonymize`
pub async fn anonymize<S>(
  State(store): State<Arc<S>>,
  Path(owner): Path<Uuid>,
) -> Result<Json<AnonymizeResponse>, ApiError>
where
  S: AnalyticsStore,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  let touched = store.anonymize(owner).await.map_err(ApiError::store)?;
  tracing::info!(%owner, touched, "anonymized interaction records");
  Ok(Json(AnonymizeResponse { interactions_anonymized: touched }))
}

/// `POST /admin/privacy/{owner}/delete`
pub async fn delete_all<S>(
  State(store): State<Arc<S>>,
  Path(owner): Path<Uuid>,
) -> Result<Json<PrivacyReport>, ApiError>
where
  S: AnalyticsStore,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  let report = store.delete_all(owner).await.map_err(ApiError::store)?;
  tracing::info!(%owner, ?report, "privacy delete completed");
  Ok(Json(report))
}
