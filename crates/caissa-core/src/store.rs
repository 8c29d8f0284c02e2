//! The `AnalyticsStore` trait and supporting query types.
//!
//! The trait is implemented by storage backends (e.g.
//! `caissa-store-sqlite`). Higher layers (`caissa-analysis`, `caissa-api`)
//! depend on this abstraction, not on any concrete backend.

use std::future::Future;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{
  aggregate::{AggregateKind, AggregatePayload, ComputedAggregate},
  fact::{MoveFact, NewMoveFact, Tag},
  game::{Game, GameState, NewGame, PatternSummary},
  goldcase::{BenchmarkResult, GoldCase, NewGoldCase},
  interaction::{DebugText, InteractionBundle, NewInteraction},
};

// ─── Query and outcome types ─────────────────────────────────────────────────

/// Parameters for [`AnalyticsStore::list_interactions`].
#[derive(Debug, Clone, Default)]
pub struct InteractionQuery {
  /// Restrict to a single owner. Anonymized records never match.
  pub owner_id:        Option<Uuid>,
  /// Restrict to a single session; matches anonymized records too.
  pub session_id:      Option<Uuid>,
  pub occurred_after:  Option<DateTime<Utc>>,
  pub occurred_before: Option<DateTime<Utc>>,
  /// If `true`, soft-deleted records are included. Default `false`.
  pub include_deleted: bool,
  pub limit:           Option<usize>,
}

/// The result of a compaction attempt guarded by optimistic versioning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompactOutcome {
  /// This caller performed the compaction.
  Compacted,
  /// A concurrent caller got there first (version moved on, or the game is
  /// already compacted). Not an error; the caller observes the winner's
  /// result.
  Lost,
}

/// What the soft-delete privacy path removed or marked.
#[derive(
  Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize,
)]
pub struct PrivacyReport {
  pub interactions_soft_deleted: u32,
  pub debug_texts_purged:        u32,
  pub debug_sessions_purged:     u32,
}

/// A named operational kill switch.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct KillSwitch {
  pub name:       String,
  pub enabled:    bool,
  pub updated_at: DateTime<Utc>,
}

// ─── Trait ───────────────────────────────────────────────────────────────────

/// Abstraction over a Caissa analytics store backend.
///
/// Interaction writes are append-only: the trait deliberately exposes no
/// update or delete for them beyond [`anonymize`](Self::anonymize) and
/// [`delete_all`](Self::delete_all), the two sanctioned privacy paths.
/// Move facts mutate only through whole-set replacement per game.
///
/// All methods return `Send` futures so the trait can be used in
/// multi-threaded async runtimes (e.g. tokio with `axum`).
pub trait AnalyticsStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  // ── Games ─────────────────────────────────────────────────────────────

  /// Create and persist a new active game. Id, state, version, and
  /// `created_at` are assigned by the store.
  fn add_game(
    &self,
    input: NewGame,
  ) -> impl Future<Output = Result<Game, Self::Error>> + Send + '_;

  /// Retrieve a game by id. Returns `None` if not found.
  fn get_game(
    &self,
    game_id: Uuid,
  ) -> impl Future<Output = Result<Option<Game>, Self::Error>> + Send + '_;

  /// List an owner's games, newest `played_at` first, optionally filtered
  /// by state.
  fn list_games(
    &self,
    owner_id: Uuid,
    state: Option<GameState>,
  ) -> impl Future<Output = Result<Vec<Game>, Self::Error>> + Send + '_;

  // ── Move facts ────────────────────────────────────────────────────────

  /// Atomically replace the full fact set for a game and register any
  /// previously unseen tag names in the catalog. The whole swap happens in
  /// one transaction; re-running with the same input is idempotent.
  fn replace_facts(
    &self,
    game_id: Uuid,
    facts: Vec<NewMoveFact>,
  ) -> impl Future<Output = Result<Vec<MoveFact>, Self::Error>> + Send + '_;

  /// All facts for one game, ordered by ply.
  fn get_facts(
    &self,
    game_id: Uuid,
  ) -> impl Future<Output = Result<Vec<MoveFact>, Self::Error>> + Send + '_;

  /// All facts belonging to the owner's *active* games.
  fn get_active_facts(
    &self,
    owner_id: Uuid,
  ) -> impl Future<Output = Result<Vec<MoveFact>, Self::Error>> + Send + '_;

  /// The full deduplicated tag catalog.
  fn list_tags(
    &self,
  ) -> impl Future<Output = Result<Vec<Tag>, Self::Error>> + Send + '_;

  // ── Retention ─────────────────────────────────────────────────────────

  /// Mark a game compacted, store its summary, and discard its facts — one
  /// transaction, guarded by `expected_version`. Returns
  /// [`CompactOutcome::Lost`] without error when a concurrent caller won.
  fn compact_game(
    &self,
    game_id: Uuid,
    summary: PatternSummary,
    expected_version: i64,
  ) -> impl Future<Output = Result<CompactOutcome, Self::Error>> + Send + '_;

  // ── Aggregates ────────────────────────────────────────────────────────

  fn get_aggregate(
    &self,
    owner_id: Uuid,
    kind: AggregateKind,
  ) -> impl Future<Output = Result<Option<ComputedAggregate>, Self::Error>> + Send + '_;

  /// Upsert the cached document for `(owner, payload.kind())`, clearing
  /// its `needs_recompute` flag and stamping `computed_at`.
  fn put_aggregate(
    &self,
    owner_id: Uuid,
    payload: AggregatePayload,
    input_game_count: u32,
  ) -> impl Future<Output = Result<ComputedAggregate, Self::Error>> + Send + '_;

  /// Flag every cached aggregate for the owner as stale.
  fn invalidate_aggregates(
    &self,
    owner_id: Uuid,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  // ── Interactions — append-only ────────────────────────────────────────

  /// Write the core record and all present facet sub-records as one
  /// transaction. A fresh interaction id and timestamp are assigned.
  fn record_interaction(
    &self,
    input: NewInteraction,
  ) -> impl Future<Output = Result<InteractionBundle, Self::Error>> + Send + '_;

  fn get_interaction(
    &self,
    interaction_id: Uuid,
  ) -> impl Future<Output = Result<Option<InteractionBundle>, Self::Error>> + Send + '_;

  fn list_interactions<'a>(
    &'a self,
    query: &'a InteractionQuery,
  ) -> impl Future<Output = Result<Vec<InteractionBundle>, Self::Error>> + Send + 'a;

  // ── Privacy ───────────────────────────────────────────────────────────

  /// Clear owner references on the owner's interaction records, keeping
  /// session ids intact. Returns the number of records touched. Runs in a
  /// single transaction, so a failure leaves nothing partially anonymized.
  fn anonymize(
    &self,
    owner_id: Uuid,
  ) -> impl Future<Output = Result<u32, Self::Error>> + Send + '_;

  /// Soft-delete the owner's interaction records and hard-delete their
  /// opt-in debug texts and debug-session flags, in a single transaction.
  fn delete_all(
    &self,
    owner_id: Uuid,
  ) -> impl Future<Output = Result<PrivacyReport, Self::Error>> + Send + '_;

  // ── Opt-in debug text ─────────────────────────────────────────────────

  /// Flag a session as opted into debug-text capture.
  fn set_debug_session(
    &self,
    session_id: Uuid,
    owner_id: Uuid,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  fn is_debug_session(
    &self,
    session_id: Uuid,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  fn put_debug_text(
    &self,
    text: DebugText,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// Remove debug texts whose TTL has elapsed. Returns the purge count.
  fn purge_expired_debug_text(
    &self,
    now: DateTime<Utc>,
  ) -> impl Future<Output = Result<u32, Self::Error>> + Send + '_;

  // ── Kill switches ─────────────────────────────────────────────────────

  /// Read a named flag. Unset flags read as `None`; callers choose the
  /// fail-open or fail-closed default.
  fn get_flag<'a>(
    &'a self,
    name: &'a str,
  ) -> impl Future<Output = Result<Option<KillSwitch>, Self::Error>> + Send + 'a;

  fn set_flag<'a>(
    &'a self,
    name: &'a str,
    enabled: bool,
  ) -> impl Future<Output = Result<KillSwitch, Self::Error>> + Send + 'a;

  // ── Gold set ──────────────────────────────────────────────────────────

  fn add_gold_case(
    &self,
    input: NewGoldCase,
  ) -> impl Future<Output = Result<GoldCase, Self::Error>> + Send + '_;

  fn list_gold_cases(
    &self,
  ) -> impl Future<Output = Result<Vec<GoldCase>, Self::Error>> + Send + '_;

  /// Persist one scored benchmark outcome.
  fn record_benchmark_result(
    &self,
    case_id: Uuid,
    model_identity: String,
    matched: bool,
    eval_error_cp: Option<i64>,
  ) -> impl Future<Output = Result<BenchmarkResult, Self::Error>> + Send + '_;

  fn list_benchmark_results<'a>(
    &'a self,
    model_identity: &'a str,
  ) -> impl Future<Output = Result<Vec<BenchmarkResult>, Self::Error>> + Send + 'a;
}
