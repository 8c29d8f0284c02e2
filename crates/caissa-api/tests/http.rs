//! End-to-end router tests against an in-memory store.

use std::sync::Arc;

use axum::{
  Router,
  body::Body,
  http::{Request, StatusCode, header},
};
use caissa_api::{OWNER_HEADER, admin_router, user_router};
use caissa_store_sqlite::SqliteStore;
use serde_json::{Value, json};
use tower::ServiceExt;
use uuid::Uuid;

async fn app() -> Router {
  let store = Arc::new(SqliteStore::open_in_memory().await.unwrap());
  Router::new()
    .merge(user_router(store.clone()))
    .nest("/admin", admin_router(store))
}

async fn send(
  app: &Router,
  method: &str,
  uri: &str,
  owner: Option<Uuid>,
  body: Option<Value>,
) -> (StatusCode, Value) {
  let mut builder = Request::builder().method(method).uri(uri);
  if let Some(owner) = owner {
    builder = builder.header(OWNER_HEADER, owner.to_string());
  }
  let request = match body {
    Some(v) => builder
      .header(header::CONTENT_TYPE, "application/json")
      .body(Body::from(v.to_string()))
      .unwrap(),
    None => builder.body(Body::empty()).unwrap(),
  };

  let response = app.clone().oneshot(request).await.unwrap();
  let status = response.status();
  let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
    .await
    .unwrap();
  let value = if bytes.is_empty() {
    Value::Null
  } else {
    serde_json::from_slice(&bytes).unwrap()
  };
  (status, value)
}

fn ingest_body() -> Value {
  json!({
    "played_at": "2026-08-01T18:30:00Z",
    "result": "win",
    "time_control": "blitz",
    "trace": {
      "plies": [{
        "fen_before": "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1",
        "fen_after": "rnbqkbnr/pppppppp/8/8/4P3/8/PPPP1PPP/RNBQKBNR b KQkq - 0 1",
        "played_move": "e2e4",
        "eval_before_cp": 20,
        "eval_played_cp": 25,
        "eval_best_cp": 30,
        "tags": ["center_control"]
      }]
    }
  })
}

#[tokio::test]
async fn ingest_then_list_and_aggregate() {
  let app = app().await;
  let owner = Uuid::new_v4();

  let (status, report) =
    send(&app, "POST", "/games", Some(owner), Some(ingest_body())).await;
  assert_eq!(status, StatusCode::CREATED);
  assert_eq!(report["facts_written"], 1);
  assert_eq!(report["plies_skipped"], 0);

  let (status, games) = send(&app, "GET", "/games", Some(owner), None).await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(games.as_array().unwrap().len(), 1);
  assert_eq!(games[0]["state"], "active");

  let (status, stats) =
    send(&app, "GET", "/aggregates/lifetime-stats", Some(owner), None).await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(stats["payload"]["kind"], "lifetime_stats");
  assert_eq!(stats["payload"]["data"]["games_total"], 1);

  // Another owner sees nothing.
  let (status, other) =
    send(&app, "GET", "/games", Some(Uuid::new_v4()), None).await;
  assert_eq!(status, StatusCode::OK);
  assert!(other.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn missing_owner_header_is_unauthorized() {
  let app = app().await;
  let (status, _) = send(&app, "GET", "/games", None, None).await;
  assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn unknown_aggregate_is_not_found() {
  let app = app().await;
  let (status, _) =
    send(&app, "GET", "/aggregates/win-rate", Some(Uuid::new_v4()), None).await;
  assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn kill_switch_blocks_interaction_logging() {
  let app = app().await;
  let owner = Uuid::new_v4();
  let log = json!({ "session_id": Uuid::new_v4(), "mode": "coach" });

  let (status, _) =
    send(&app, "POST", "/interactions", Some(owner), Some(log.clone())).await;
  assert_eq!(status, StatusCode::CREATED);

  let (status, _) = send(
    &app,
    "PUT",
    "/admin/flags/ai_responses_enabled",
    None,
    Some(json!({ "enabled": false })),
  )
  .await;
  assert_eq!(status, StatusCode::OK);

  let (status, _) =
    send(&app, "POST", "/interactions", Some(owner), Some(log)).await;
  assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn debug_text_requires_session_opt_in() {
  let app = app().await;
  let owner = Uuid::new_v4();
  let session = Uuid::new_v4();
  let log = json!({
    "session_id": session,
    "mode": "coach",
    "debug_text": { "user_text": "what did I miss?", "model_text": null }
  });

  // Without opt-in the interaction is stored and the text dropped.
  let (status, _) =
    send(&app, "POST", "/interactions", Some(owner), Some(log.clone())).await;
  assert_eq!(status, StatusCode::CREATED);

  let (status, _) = send(
    &app,
    "POST",
    "/debug-sessions",
    Some(owner),
    Some(json!({ "session_id": session })),
  )
  .await;
  assert_eq!(status, StatusCode::NO_CONTENT);

  let (status, _) =
    send(&app, "POST", "/interactions", Some(owner), Some(log)).await;
  assert_eq!(status, StatusCode::CREATED);
}

#[tokio::test]
async fn admin_privacy_and_diagnostics_flow() {
  let app = app().await;
  let owner = Uuid::new_v4();
  let session = Uuid::new_v4();

  let log = json!({
    "session_id": session,
    "mode": "game_review",
    "response_meta": {
      "model_identity": "m9",
      "latency_ms": 800,
      "tokens_in": 100,
      "tokens_out": 50,
      "declared_confidence": "high",
      "permitted_confidence": "medium",
      "claim_count": 1,
      "grounded_claim_count": 1,
      "asserted_lines": [],
      "mentioned_tags": [],
      "mentions_tradeoff": false,
      "schema_valid": true
    }
  });
  let (status, bundle) =
    send(&app, "POST", "/interactions", Some(owner), Some(log)).await;
  assert_eq!(status, StatusCode::CREATED);
  let id = bundle["interaction"]["interaction_id"].as_str().unwrap().to_owned();

  // Declared high with permitted medium is overconfident.
  let (status, flags) = send(
    &app,
    "GET",
    &format!("/admin/interactions/{id}/flags"),
    None,
    None,
  )
  .await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(flags["overconfident"], true);

  let (status, cohorts) =
    send(&app, "GET", "/admin/cohorts/failure-modes", None, None).await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(cohorts.as_array().unwrap().len(), 6);

  let (status, report) = send(
    &app,
    "POST",
    &format!("/admin/privacy/{owner}/delete"),
    None,
    None,
  )
  .await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(report["interactions_soft_deleted"], 1);
}
