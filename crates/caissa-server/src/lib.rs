//! HTTP server wiring for Caissa.
//!
//! Composes the [`caissa_api`] routers into one application: the user
//! surface at the root, the operator surface under `/admin` behind Basic
//! auth, plus the background workers (debounced aggregate recomputation and
//! debug-text expiry).

pub mod auth;
pub mod error;
pub mod worker;

pub use error::Error;

use std::{path::PathBuf, sync::Arc};

use axum::{
  Router,
  extract::{Request, State},
  http::Method,
  middleware::{self, Next},
  response::{IntoResponse, Response},
};
use caissa_api::OWNER_HEADER;
use caissa_core::store::AnalyticsStore;
use serde::Deserialize;
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use auth::{AuthConfig, verify_auth};
use worker::InvalidationBus;

// ─── Configuration ────────────────────────────────────────────────────────────

/// Runtime server configuration, deserialised from `config.toml`.
#[derive(Deserialize, Clone)]
pub struct ServerConfig {
  pub host:               String,
  pub port:               u16,
  pub store_path:         PathBuf,
  pub auth_username:      String,
  pub auth_password_hash: String,
  /// Quiet period after the last ingest before aggregates are recomputed.
  #[serde(default = "default_recompute_debounce_ms")]
  pub recompute_debounce_ms: u64,
  /// How often expired opt-in debug text is purged.
  #[serde(default = "default_debug_purge_interval_secs")]
  pub debug_purge_interval_secs: u64,
}

fn default_recompute_debounce_ms() -> u64 {
  750
}

fn default_debug_purge_interval_secs() -> u64 {
  3600
}

// ─── Application state ────────────────────────────────────────────────────────

/// Shared state threaded through the middleware layers.
#[derive(Clone)]
pub struct AppState<S: AnalyticsStore> {
  pub store:         Arc<S>,
  pub config:        Arc<ServerConfig>,
  pub auth:          Arc<AuthConfig>,
  pub invalidations: InvalidationBus,
}

// ─── Router ───────────────────────────────────────────────────────────────────

/// Build the full application router.
pub fn router<S>(state: AppState<S>) -> Router
where
  S: AnalyticsStore + Clone + 'static,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  let admin = caissa_api::admin_router(state.store.clone()).layer(
    middleware::from_fn_with_state(state.clone(), require_operator::<S>),
  );

  Router::new()
    .merge(caissa_api::user_router(state.store.clone()))
    .nest("/admin", admin)
    .layer(middleware::from_fn_with_state(
      state.clone(),
      publish_invalidations::<S>,
    ))
    .layer(TraceLayer::new_for_http())
}

// ─── Middleware ──────────────────────────────────────────────────────────────

/// Gate the operator surface behind Basic auth.
async fn require_operator<S>(
  State(state): State<AppState<S>>,
  req: Request,
  next: Next,
) -> Response
where
  S: AnalyticsStore + Clone + 'static,
{
  match verify_auth(req.headers(), &state.auth) {
    Ok(()) => next.run(req).await,
    Err(e) => e.into_response(),
  }
}

/// After a successful game ingest, mark the owner's aggregates stale on the
/// invalidation bus so the recompute worker refreshes them.
async fn publish_invalidations<S>(
  State(state): State<AppState<S>>,
  req: Request,
  next: Next,
) -> Response
where
  S: AnalyticsStore + Clone + 'static,
{
  let ingest_owner = (req.method() == Method::POST
    && req.uri().path() == "/games")
    .then(|| {
      req
        .headers()
        .get(OWNER_HEADER)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| Uuid::parse_str(s).ok())
    })
    .flatten();

  let response = next.run(req).await;

  if response.status().is_success()
    && let Some(owner) = ingest_owner
  {
    state.invalidations.publish(owner);
  }

  response
}

// ─── Integration tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
  use super::*;

  use argon2::{Argon2, PasswordHasher, password_hash::SaltString};
  use axum::{
    body::Body,
    http::{Request, StatusCode, header},
  };
  use base64::Engine as _;
  use base64::engine::general_purpose::STANDARD as B64;
  use caissa_store_sqlite::SqliteStore;
  use rand_core::OsRng;
  use serde_json::json;
  use tokio::sync::mpsc::UnboundedReceiver;
  use tower::ServiceExt as _;

  async fn make_state(
    password: &str,
  ) -> (AppState<SqliteStore>, UnboundedReceiver<Uuid>) {
    let store = SqliteStore::open_in_memory().await.unwrap();
    let salt  = SaltString::generate(&mut OsRng);
    let hash  = Argon2::default()
      .hash_password(password.as_bytes(), &salt)
      .unwrap()
      .to_string();

    let (bus, rx) = InvalidationBus::new();
    let state = AppState {
      store: Arc::new(store),
      config: Arc::new(ServerConfig {
        host:                      "127.0.0.1".to_string(),
        port:                      7373,
        store_path:                PathBuf::from(":memory:"),
        auth_username:             "operator".to_string(),
        auth_password_hash:        hash.clone(),
        recompute_debounce_ms:     default_recompute_debounce_ms(),
        debug_purge_interval_secs: default_debug_purge_interval_secs(),
      }),
      auth: Arc::new(AuthConfig {
        username:      "operator".to_string(),
        password_hash: hash,
      }),
      invalidations: bus,
    };
    (state, rx)
  }

  fn basic(user: &str, pass: &str) -> String {
    format!("Basic {}", B64.encode(format!("{user}:{pass}")))
  }

  fn ingest_body() -> String {
    json!({
      "played_at":    "2026-08-01T12:00:00Z",
      "rating":       null,
      "result":       "win",
      "time_control": "blitz",
      "trace": {
        "plies": [{
          "fen_before":     "start",
          "fen_after":      "after",
          "played_move":    "e2e4",
          "best_move":      "e2e4",
          "eval_before_cp": 20,
          "eval_played_cp": 20,
          "eval_best_cp":   20,
          "time_spent_ms":  900,
          "phase":          "opening",
          "tags":           []
        }]
      }
    })
    .to_string()
  }

  #[tokio::test]
  async fn admin_requires_basic_auth() {
    let (state, _rx) = make_state("secret").await;

    let unauthed = Request::builder()
      .method("PUT")
      .uri("/admin/flags/ai_responses_enabled")
      .header(header::CONTENT_TYPE, "application/json")
      .body(Body::from(r#"{"enabled":false}"#))
      .unwrap();
    let resp = router(state.clone()).oneshot(unauthed).await.unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    assert!(resp.headers().contains_key(header::WWW_AUTHENTICATE));

    let authed = Request::builder()
      .method("PUT")
      .uri("/admin/flags/ai_responses_enabled")
      .header(header::AUTHORIZATION, basic("operator", "secret"))
      .header(header::CONTENT_TYPE, "application/json")
      .body(Body::from(r#"{"enabled":false}"#))
      .unwrap();
    let resp = router(state).oneshot(authed).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
  }

  #[tokio::test]
  async fn user_routes_skip_operator_auth() {
    let (state, _rx) = make_state("secret").await;
    let owner = Uuid::new_v4();

    let req = Request::builder()
      .method("GET")
      .uri("/games")
      .header(OWNER_HEADER, owner.to_string())
      .body(Body::empty())
      .unwrap();
    let resp = router(state).oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
  }

  #[tokio::test]
  async fn successful_ingest_publishes_invalidation() {
    let (state, mut rx) = make_state("secret").await;
    let owner = Uuid::new_v4();

    let req = Request::builder()
      .method("POST")
      .uri("/games")
      .header(OWNER_HEADER, owner.to_string())
      .header(header::CONTENT_TYPE, "application/json")
      .body(Body::from(ingest_body()))
      .unwrap();
    let resp = router(state).oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::CREATED);

    let published = rx.try_recv().expect("invalidation should be published");
    assert_eq!(published, owner);
  }

  #[tokio::test]
  async fn failed_ingest_publishes_nothing() {
    let (state, mut rx) = make_state("secret").await;

    // Missing owner header fails before the handler runs.
    let req = Request::builder()
      .method("POST")
      .uri("/games")
      .header(header::CONTENT_TYPE, "application/json")
      .body(Body::from(ingest_body()))
      .unwrap();
    let resp = router(state).oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    assert!(rx.try_recv().is_err());
  }
}
