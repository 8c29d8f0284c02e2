//! Game ingestion — the write path that ties the pipeline together.
//!
//! One call normalizes a trace into facts, replaces the game's fact set
//! atomically, enforces the retention window, and flags the owner's
//! aggregates stale. Safe to re-run on any partial game: every step is
//! idempotent.

use caissa_core::{
  fact::ClassifyConfig,
  game::NewGame,
  store::AnalyticsStore,
  trace::EvalTrace,
};
use serde::Serialize;
use uuid::Uuid;

use crate::{
  Error, Result,
  normalize::normalize_trace,
  retention::{RetentionConfig, enforce_window},
};

/// Tuning for the ingestion pipeline.
#[derive(Debug, Clone, Copy, Default)]
pub struct IngestConfig {
  pub classify:  ClassifyConfig,
  pub retention: RetentionConfig,
}

/// What one ingestion did.
#[derive(Debug, Clone, Serialize)]
pub struct IngestReport {
  pub game_id:         Uuid,
  pub facts_written:   usize,
  /// Malformed plies dropped by the normalizer (operational signal, not a
  /// failure).
  pub plies_skipped:   usize,
  pub games_compacted: u32,
}

/// Ingest one game's evaluation trace for its owner.
pub async fn ingest_game<S: AnalyticsStore>(
  store: &S,
  new_game: NewGame,
  trace: &EvalTrace,
  cfg: &IngestConfig,
) -> Result<IngestReport> {
  let owner_id = new_game.owner_id;
  let game = store.add_game(new_game).await.map_err(Error::store)?;

  let outcome = normalize_trace(trace, &cfg.classify);
  let facts = store
    .replace_facts(game.game_id, outcome.facts)
    .await
    .map_err(Error::store)?;

  let games_compacted = enforce_window(store, owner_id, &cfg.retention).await?;

  store
    .invalidate_aggregates(owner_id)
    .await
    .map_err(Error::store)?;

  tracing::info!(
    game_id = %game.game_id,
    %owner_id,
    facts = facts.len(),
    skipped = outcome.skipped,
    games_compacted,
    "ingested game"
  );

  Ok(IngestReport {
    game_id: game.game_id,
    facts_written: facts.len(),
    plies_skipped: outcome.skipped,
    games_compacted,
  })
}

/// Re-normalize an existing game's trace, replacing its facts atomically.
/// Used by backfill jobs when classification boundaries change.
pub async fn renormalize_game<S: AnalyticsStore>(
  store: &S,
  game_id: Uuid,
  trace: &EvalTrace,
  cfg: &IngestConfig,
) -> Result<IngestReport> {
  let game = store
    .get_game(game_id)
    .await
    .map_err(Error::store)?
    .ok_or(Error::GameNotFound(game_id))?;

  let outcome = normalize_trace(trace, &cfg.classify);
  let facts = store
    .replace_facts(game.game_id, outcome.facts)
    .await
    .map_err(Error::store)?;

  store
    .invalidate_aggregates(game.owner_id)
    .await
    .map_err(Error::store)?;

  Ok(IngestReport {
    game_id,
    facts_written: facts.len(),
    plies_skipped: outcome.skipped,
    games_compacted: 0,
  })
}
