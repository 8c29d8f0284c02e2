//! Integration tests for `SqliteStore` against an in-memory database.

use caissa_analysis::ingest::{IngestConfig, ingest_game, renormalize_game};
use caissa_core::{
  aggregate::{AggregateKind, AggregatePayload, LifetimeStats},
  fact::{ClassifyConfig, ErrorClass, NewMoveFact, Phase, Side},
  game::{GameResult, GameState, NewGame, PatternSummary, TimeControlClass},
  goldcase::NewGoldCase,
  interaction::{
    CandidateLine, ComponentVersions, ConfidenceLevel, DebugText, EngineTruth,
    InteractionMode, NewInteraction, ReasoningTrace, ResponseMeta, UserBehavior,
  },
  store::{AnalyticsStore, CompactOutcome, InteractionQuery},
  trace::{EvalTrace, RawPly},
};
use chrono::{Duration, Utc};
use uuid::Uuid;

use crate::{Error, SqliteStore};

async fn store() -> SqliteStore {
  SqliteStore::open_in_memory()
    .await
    .expect("in-memory store")
}

fn new_game(owner_id: Uuid) -> NewGame {
  new_game_at(owner_id, 0)
}

/// A game played `minutes_ago` minutes before now, so ordering is exact.
fn new_game_at(owner_id: Uuid, minutes_ago: i64) -> NewGame {
  NewGame {
    owner_id,
    played_at: Utc::now() - Duration::minutes(minutes_ago),
    rating: None,
    result: GameResult::Win,
    time_control: TimeControlClass::Blitz,
  }
}

fn move_fact(ply: u32, cp_loss: i64, tags: &[&str]) -> NewMoveFact {
  NewMoveFact {
    ply,
    side: Side::from_ply(ply),
    fen_before: format!("fen-{ply}"),
    fen_after: format!("fen-{}", ply + 1),
    eval_before_cp: 0,
    eval_played_cp: -cp_loss,
    eval_best_cp: 0,
    cp_loss,
    class: ClassifyConfig::default().classify(cp_loss),
    phase: Phase::Middlegame,
    time_spent_ms: Some(3_000),
    tags: tags.iter().map(|t| t.to_string()).collect(),
  }
}

fn summary_for(move_count: u32) -> PatternSummary {
  PatternSummary {
    tag_frequencies: Default::default(),
    phase_accuracy: Default::default(),
    result: GameResult::Win,
    rating_delta: None,
    move_count,
    blunder_count: 0,
    mean_cp_loss: 12.0,
  }
}

fn interaction(owner_id: Uuid, session_id: Uuid) -> NewInteraction {
  NewInteraction {
    owner_id,
    session_id,
    mode: InteractionMode::Coach,
    position_fen: Some("8/8/8/8/8/8/8/K6k w - - 0 1".into()),
    tools_used: vec!["engine_eval".into()],
    versions: ComponentVersions {
      prompt: Some("p3".into()),
      router: None,
      tagger: Some("t1".into()),
      model: Some("m9".into()),
    },
    engine_truth: Some(EngineTruth {
      eval_cp: 120,
      disagreement_cp: Some(30),
      candidates: vec![CandidateLine { first_move: "e2e4".into(), eval_cp: 120 }],
      tablebase_exact: false,
    }),
    reasoning_trace: Some(ReasoningTrace {
      fired_tags: vec!["fork".into(), "pin".into()],
      dominant_tag: Some("fork".into()),
      runner_up_tag: Some("pin".into()),
      margin: Some(0.4),
    }),
    response_meta: Some(ResponseMeta {
      model_identity: "m9".into(),
      latency_ms: 900,
      tokens_in: 400,
      tokens_out: 120,
      declared_confidence: ConfidenceLevel::Medium,
      permitted_confidence: ConfidenceLevel::High,
      claim_count: 2,
      grounded_claim_count: 2,
      asserted_lines: vec!["e2e4".into()],
      mentioned_tags: vec!["fork".into()],
      mentions_tradeoff: true,
      schema_valid: true,
    }),
    user_behavior: Some(UserBehavior {
      time_to_next_action_ms: Some(8_000),
      follow_up_count: 1,
      rapid_follow_up_count: 0,
      abandoned: false,
      takeback_count: 0,
    }),
  }
}

// ─── Games ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn add_and_get_game() {
  let s = store().await;
  let owner = Uuid::new_v4();

  let game = s.add_game(new_game(owner)).await.unwrap();
  assert_eq!(game.state, GameState::Active);
  assert_eq!(game.version, 1);

  let fetched = s.get_game(game.game_id).await.unwrap().unwrap();
  assert_eq!(fetched.game_id, game.game_id);
  assert_eq!(fetched.owner_id, owner);
  assert_eq!(fetched.state, GameState::Active);
  assert!(fetched.pattern_summary.is_none());
}

#[tokio::test]
async fn get_game_missing_returns_none() {
  let s = store().await;
  assert!(s.get_game(Uuid::new_v4()).await.unwrap().is_none());
}

#[tokio::test]
async fn list_games_newest_first_and_filtered() {
  let s = store().await;
  let owner = Uuid::new_v4();

  let oldest = s.add_game(new_game_at(owner, 30)).await.unwrap();
  let newest = s.add_game(new_game_at(owner, 10)).await.unwrap();
  let middle = s.add_game(new_game_at(owner, 20)).await.unwrap();

  let all = s.list_games(owner, None).await.unwrap();
  assert_eq!(
    all.iter().map(|g| g.game_id).collect::<Vec<_>>(),
    vec![newest.game_id, middle.game_id, oldest.game_id],
  );

  s.compact_game(oldest.game_id, summary_for(0), oldest.version)
    .await
    .unwrap();

  let active = s.list_games(owner, Some(GameState::Active)).await.unwrap();
  assert_eq!(active.len(), 2);
  let compacted = s
    .list_games(owner, Some(GameState::Compacted))
    .await
    .unwrap();
  assert_eq!(compacted.len(), 1);
  assert_eq!(compacted[0].game_id, oldest.game_id);
}

// ─── Move facts ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn replace_facts_roundtrip_with_tags() {
  let s = store().await;
  let owner = Uuid::new_v4();
  let game = s.add_game(new_game(owner)).await.unwrap();

  let written = s
    .replace_facts(game.game_id, vec![
      move_fact(0, 10, &["development"]),
      move_fact(1, 220, &["hanging_piece", "back_rank"]),
    ])
    .await
    .unwrap();
  assert_eq!(written.len(), 2);
  assert_eq!(written[0].owner_id, owner);

  let facts = s.get_facts(game.game_id).await.unwrap();
  assert_eq!(facts.len(), 2);
  assert_eq!(facts[0].ply, 0);
  assert_eq!(facts[1].ply, 1);
  assert_eq!(facts[1].class, ErrorClass::Blunder);
  assert_eq!(facts[1].tags, vec!["back_rank", "hanging_piece"]);

  let catalog = s.list_tags().await.unwrap();
  let names: Vec<_> = catalog.into_iter().map(|t| t.name).collect();
  assert_eq!(names, vec!["back_rank", "development", "hanging_piece"]);
}

#[tokio::test]
async fn replace_facts_is_idempotent() {
  let s = store().await;
  let owner = Uuid::new_v4();
  let game = s.add_game(new_game(owner)).await.unwrap();

  let set = vec![move_fact(0, 10, &["fork"]), move_fact(1, 60, &["fork"])];
  s.replace_facts(game.game_id, set.clone()).await.unwrap();
  s.replace_facts(game.game_id, set).await.unwrap();

  let facts = s.get_facts(game.game_id).await.unwrap();
  assert_eq!(facts.len(), 2);
  // The tag catalog does not grow on re-runs either.
  assert_eq!(s.list_tags().await.unwrap().len(), 1);
}

#[tokio::test]
async fn replace_facts_unknown_game_fails() {
  let s = store().await;
  let err = s
    .replace_facts(Uuid::new_v4(), vec![move_fact(0, 0, &[])])
    .await
    .unwrap_err();
  assert!(matches!(err, Error::GameNotFound(_)));
}

#[tokio::test]
async fn replace_facts_on_compacted_game_fails() {
  let s = store().await;
  let owner = Uuid::new_v4();
  let game = s.add_game(new_game(owner)).await.unwrap();
  s.compact_game(game.game_id, summary_for(0), game.version)
    .await
    .unwrap();

  let err = s
    .replace_facts(game.game_id, vec![move_fact(0, 0, &[])])
    .await
    .unwrap_err();
  assert!(matches!(err, Error::AlreadyCompacted(_)));
}

#[tokio::test]
async fn get_active_facts_excludes_compacted_games() {
  let s = store().await;
  let owner = Uuid::new_v4();

  let keep = s.add_game(new_game_at(owner, 10)).await.unwrap();
  let drop = s.add_game(new_game_at(owner, 20)).await.unwrap();
  s.replace_facts(keep.game_id, vec![move_fact(0, 10, &[])])
    .await
    .unwrap();
  s.replace_facts(drop.game_id, vec![move_fact(0, 10, &[])])
    .await
    .unwrap();

  s.compact_game(drop.game_id, summary_for(1), drop.version)
    .await
    .unwrap();

  let facts = s.get_active_facts(owner).await.unwrap();
  assert_eq!(facts.len(), 1);
  assert_eq!(facts[0].game_id, keep.game_id);
}

// ─── Compaction ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn compact_game_discards_facts_and_bumps_version() {
  let s = store().await;
  let owner = Uuid::new_v4();
  let game = s.add_game(new_game(owner)).await.unwrap();
  s.replace_facts(game.game_id, vec![move_fact(0, 10, &["fork"])])
    .await
    .unwrap();

  let outcome = s
    .compact_game(game.game_id, summary_for(1), game.version)
    .await
    .unwrap();
  assert_eq!(outcome, CompactOutcome::Compacted);

  let after = s.get_game(game.game_id).await.unwrap().unwrap();
  assert_eq!(after.state, GameState::Compacted);
  assert_eq!(after.version, game.version + 1);
  assert_eq!(after.pattern_summary.unwrap().move_count, 1);
  assert!(s.get_facts(game.game_id).await.unwrap().is_empty());
}

#[tokio::test]
async fn compact_game_with_stale_version_loses() {
  let s = store().await;
  let owner = Uuid::new_v4();
  let game = s.add_game(new_game(owner)).await.unwrap();

  let first = s
    .compact_game(game.game_id, summary_for(0), game.version)
    .await
    .unwrap();
  assert_eq!(first, CompactOutcome::Compacted);

  // A second caller holding the pre-compaction version loses quietly.
  let second = s
    .compact_game(game.game_id, summary_for(0), game.version)
    .await
    .unwrap();
  assert_eq!(second, CompactOutcome::Lost);

  let after = s.get_game(game.game_id).await.unwrap().unwrap();
  assert_eq!(after.version, game.version + 1);
}

// ─── Retention, end to end ───────────────────────────────────────────────────

#[tokio::test]
async fn window_never_exceeds_sixty_games() {
  let s = store().await;
  let owner = Uuid::new_v4();
  let cfg = IngestConfig::default();

  let mut total_compacted = 0u32;
  for i in 0..66 {
    let game = s.add_game(new_game_at(owner, 100 - i)).await.unwrap();
    s.replace_facts(game.game_id, vec![move_fact(0, 10, &[])])
      .await
      .unwrap();
    total_compacted +=
      caissa_analysis::retention::enforce_window(&s, owner, &cfg.retention)
        .await
        .unwrap();
  }

  assert_eq!(total_compacted, 6);
  let active = s.list_games(owner, Some(GameState::Active)).await.unwrap();
  assert_eq!(active.len(), 60);
  let compacted = s
    .list_games(owner, Some(GameState::Compacted))
    .await
    .unwrap();
  assert_eq!(compacted.len(), 6);
  assert!(compacted.iter().all(|g| g.pattern_summary.is_some()));
}

#[tokio::test]
async fn ingest_produces_blunder_fact() {
  let s = store().await;
  let owner = Uuid::new_v4();

  // A 250 cp loss at ply 12, still in the opening band by ply fallback.
  let mut trace = EvalTrace::default();
  for ply in 0..=12 {
    let loss = if ply == 12 { 250 } else { 5 };
    trace.plies.push(RawPly {
      fen_before: Some(format!("fen-{ply}")),
      fen_after: Some(format!("fen-{}", ply + 1)),
      played_move: Some("e2e4".into()),
      best_move: Some("d2d4".into()),
      eval_before_cp: Some(0),
      eval_played_cp: Some(-loss),
      eval_best_cp: Some(0),
      time_spent_ms: None,
      phase: None,
      tags: vec![],
    });
  }

  let report = ingest_game(&s, new_game(owner), &trace, &IngestConfig::default())
    .await
    .unwrap();
  assert_eq!(report.facts_written, 13);
  assert_eq!(report.plies_skipped, 0);

  let facts = s.get_facts(report.game_id).await.unwrap();
  let blunder = &facts[12];
  assert_eq!(blunder.ply, 12);
  assert_eq!(blunder.cp_loss, 250);
  assert_eq!(blunder.class, ErrorClass::Blunder);
  assert_eq!(blunder.phase, Phase::Opening);
}

#[tokio::test]
async fn renormalize_replaces_facts_under_new_bands() {
  let s = store().await;
  let owner = Uuid::new_v4();

  let mut trace = EvalTrace::default();
  trace.plies.push(RawPly {
    fen_before: Some("fen-0".into()),
    fen_after: Some("fen-1".into()),
    played_move: Some("g2g4".into()),
    best_move: Some("e2e4".into()),
    eval_before_cp: Some(0),
    eval_played_cp: Some(-80),
    eval_best_cp: Some(0),
    time_spent_ms: None,
    phase: None,
    tags: vec![],
  });

  let report = ingest_game(&s, new_game(owner), &trace, &IngestConfig::default())
    .await
    .unwrap();
  let facts = s.get_facts(report.game_id).await.unwrap();
  assert_eq!(facts[0].class, ErrorClass::Inaccuracy);

  // Tighter bands reclassify the same trace without duplicating facts.
  let strict = IngestConfig {
    classify: ClassifyConfig { inaccuracy: 10, mistake: 50, blunder: 75 },
    ..Default::default()
  };
  let redone = renormalize_game(&s, report.game_id, &trace, &strict)
    .await
    .unwrap();
  assert_eq!(redone.facts_written, 1);

  let facts = s.get_facts(report.game_id).await.unwrap();
  assert_eq!(facts.len(), 1);
  assert_eq!(facts[0].class, ErrorClass::Blunder);
}

// ─── Aggregates ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn aggregate_put_get_invalidate() {
  let s = store().await;
  let owner = Uuid::new_v4();

  assert!(s
    .get_aggregate(owner, AggregateKind::LifetimeStats)
    .await
    .unwrap()
    .is_none());

  let payload = AggregatePayload::LifetimeStats(LifetimeStats {
    games_total: 3,
    games_active: 3,
    wins: 2,
    losses: 1,
    ..Default::default()
  });
  s.put_aggregate(owner, payload.clone(), 3).await.unwrap();

  let cached = s
    .get_aggregate(owner, AggregateKind::LifetimeStats)
    .await
    .unwrap()
    .unwrap();
  assert_eq!(cached.payload, payload);
  assert_eq!(cached.input_game_count, 3);
  assert!(!cached.needs_recompute);

  s.invalidate_aggregates(owner).await.unwrap();
  let stale = s
    .get_aggregate(owner, AggregateKind::LifetimeStats)
    .await
    .unwrap()
    .unwrap();
  assert!(stale.needs_recompute);

  // A fresh write clears the flag again.
  s.put_aggregate(owner, payload, 4).await.unwrap();
  let fresh = s
    .get_aggregate(owner, AggregateKind::LifetimeStats)
    .await
    .unwrap()
    .unwrap();
  assert!(!fresh.needs_recompute);
  assert_eq!(fresh.input_game_count, 4);
}

// ─── Interactions ────────────────────────────────────────────────────────────

#[tokio::test]
async fn record_interaction_full_bundle_roundtrip() {
  let s = store().await;
  let owner = Uuid::new_v4();
  let session = Uuid::new_v4();

  let written = s.record_interaction(interaction(owner, session)).await.unwrap();
  let fetched = s
    .get_interaction(written.interaction.interaction_id)
    .await
    .unwrap()
    .unwrap();

  assert_eq!(fetched.interaction.owner_id, Some(owner));
  assert_eq!(fetched.interaction.session_id, session);
  assert_eq!(fetched.interaction.mode, InteractionMode::Coach);
  assert!(!fetched.interaction.deleted);

  let et = fetched.engine_truth.unwrap();
  assert_eq!(et.eval_cp, 120);
  assert_eq!(et.candidates.len(), 1);
  let rt = fetched.reasoning_trace.unwrap();
  assert_eq!(rt.dominant_tag.as_deref(), Some("fork"));
  assert_eq!(rt.margin, Some(0.4));
  let rm = fetched.response_meta.unwrap();
  assert_eq!(rm.declared_confidence, ConfidenceLevel::Medium);
  assert_eq!(rm.permitted_confidence, ConfidenceLevel::High);
  let ub = fetched.user_behavior.unwrap();
  assert_eq!(ub.follow_up_count, 1);
}

#[tokio::test]
async fn record_interaction_core_only() {
  let s = store().await;
  let mut input = interaction(Uuid::new_v4(), Uuid::new_v4());
  input.engine_truth = None;
  input.reasoning_trace = None;
  input.response_meta = None;
  input.user_behavior = None;

  let written = s.record_interaction(input).await.unwrap();
  let fetched = s
    .get_interaction(written.interaction.interaction_id)
    .await
    .unwrap()
    .unwrap();
  assert!(fetched.engine_truth.is_none());
  assert!(fetched.reasoning_trace.is_none());
  assert!(fetched.response_meta.is_none());
  assert!(fetched.user_behavior.is_none());
}

#[tokio::test]
async fn list_interactions_filters_and_limit() {
  let s = store().await;
  let owner_a = Uuid::new_v4();
  let owner_b = Uuid::new_v4();
  let session = Uuid::new_v4();

  for _ in 0..3 {
    s.record_interaction(interaction(owner_a, session)).await.unwrap();
  }
  s.record_interaction(interaction(owner_b, Uuid::new_v4()))
    .await
    .unwrap();

  let for_a = s
    .list_interactions(&InteractionQuery {
      owner_id: Some(owner_a),
      ..Default::default()
    })
    .await
    .unwrap();
  assert_eq!(for_a.len(), 3);

  let limited = s
    .list_interactions(&InteractionQuery {
      owner_id: Some(owner_a),
      limit: Some(2),
      ..Default::default()
    })
    .await
    .unwrap();
  assert_eq!(limited.len(), 2);

  let future_only = s
    .list_interactions(&InteractionQuery {
      occurred_after: Some(Utc::now() + Duration::hours(1)),
      ..Default::default()
    })
    .await
    .unwrap();
  assert!(future_only.is_empty());
}

#[tokio::test]
async fn append_only_triggers_reject_raw_statements() {
  let s = store().await;
  let written = s
    .record_interaction(interaction(Uuid::new_v4(), Uuid::new_v4()))
    .await
    .unwrap();
  let id = written.interaction.interaction_id;

  let update = s
    .raw_execute(format!(
      "UPDATE interactions SET mode = 'game_review' \
       WHERE interaction_id = '{id}'"
    ))
    .await;
  assert!(matches!(update, Err(Error::AppendOnlyViolation(_))));

  let delete = s
    .raw_execute(format!(
      "DELETE FROM interactions WHERE interaction_id = '{id}'"
    ))
    .await;
  assert!(delete.is_err());

  let facet_update = s
    .raw_execute(format!(
      "UPDATE response_metas SET claim_count = 99 \
       WHERE interaction_id = '{id}'"
    ))
    .await;
  assert!(facet_update.is_err());

  // Untouched after all three attempts.
  let fetched = s.get_interaction(id).await.unwrap().unwrap();
  assert_eq!(fetched.interaction.mode, InteractionMode::Coach);
  assert_eq!(fetched.response_meta.unwrap().claim_count, 2);
}

#[tokio::test]
async fn guarded_update_permits_only_privacy_shaped_changes() {
  let s = store().await;
  let owner = Uuid::new_v4();
  let written = s
    .record_interaction(interaction(owner, Uuid::new_v4()))
    .await
    .unwrap();
  let id = written.interaction.interaction_id;

  // owner_id may be cleared but never re-pointed to another owner.
  let repoint = s
    .raw_execute(format!(
      "UPDATE interactions SET owner_id = '{}' \
       WHERE interaction_id = '{id}'",
      Uuid::new_v4()
    ))
    .await;
  assert!(matches!(repoint, Err(Error::AppendOnlyViolation(_))));

  let clear = s
    .raw_execute(format!(
      "UPDATE interactions SET owner_id = NULL WHERE interaction_id = '{id}'"
    ))
    .await;
  assert_eq!(clear.unwrap(), 1);

  // Soft deletion cannot be reversed.
  s.raw_execute(format!(
    "UPDATE interactions SET deleted = 1 WHERE interaction_id = '{id}'"
  ))
  .await
  .unwrap();
  let undelete = s
    .raw_execute(format!(
      "UPDATE interactions SET deleted = 0 WHERE interaction_id = '{id}'"
    ))
    .await;
  assert!(matches!(undelete, Err(Error::AppendOnlyViolation(_))));
}

// ─── Privacy ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn anonymize_clears_owner_but_keeps_session() {
  let s = store().await;
  let owner = Uuid::new_v4();
  let session = Uuid::new_v4();

  s.record_interaction(interaction(owner, session)).await.unwrap();
  s.record_interaction(interaction(owner, session)).await.unwrap();

  let touched = s.anonymize(owner).await.unwrap();
  assert_eq!(touched, 2);

  let by_owner = s
    .list_interactions(&InteractionQuery {
      owner_id: Some(owner),
      ..Default::default()
    })
    .await
    .unwrap();
  assert!(by_owner.is_empty());

  let by_session = s
    .list_interactions(&InteractionQuery {
      session_id: Some(session),
      ..Default::default()
    })
    .await
    .unwrap();
  assert_eq!(by_session.len(), 2);
  assert!(by_session.iter().all(|b| b.interaction.owner_id.is_none()));
}

#[tokio::test]
async fn delete_all_soft_deletes_and_purges_debug_data() {
  let s = store().await;
  let owner = Uuid::new_v4();
  let session = Uuid::new_v4();

  let written = s.record_interaction(interaction(owner, session)).await.unwrap();
  s.set_debug_session(session, owner).await.unwrap();
  s.put_debug_text(DebugText {
    interaction_id: written.interaction.interaction_id,
    owner_id: owner,
    user_text: Some("what went wrong here?".into()),
    model_text: Some("the knight was hanging".into()),
    expires_at: Utc::now() + Duration::days(7),
  })
  .await
  .unwrap();

  let report = s.delete_all(owner).await.unwrap();
  assert_eq!(report.interactions_soft_deleted, 1);
  assert_eq!(report.debug_texts_purged, 1);
  assert_eq!(report.debug_sessions_purged, 1);

  let visible = s
    .list_interactions(&InteractionQuery {
      session_id: Some(session),
      ..Default::default()
    })
    .await
    .unwrap();
  assert!(visible.is_empty());

  let with_deleted = s
    .list_interactions(&InteractionQuery {
      session_id: Some(session),
      include_deleted: true,
      ..Default::default()
    })
    .await
    .unwrap();
  assert_eq!(with_deleted.len(), 1);
  assert!(with_deleted[0].interaction.deleted);

  // Re-running is harmless.
  let again = s.delete_all(owner).await.unwrap();
  assert_eq!(again.interactions_soft_deleted, 0);
}

// ─── Debug text ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn debug_sessions_opt_in_and_ttl_purge() {
  let s = store().await;
  let owner = Uuid::new_v4();
  let session = Uuid::new_v4();

  assert!(!s.is_debug_session(session).await.unwrap());
  s.set_debug_session(session, owner).await.unwrap();
  assert!(s.is_debug_session(session).await.unwrap());

  let written = s.record_interaction(interaction(owner, session)).await.unwrap();
  s.put_debug_text(DebugText {
    interaction_id: written.interaction.interaction_id,
    owner_id: owner,
    user_text: Some("why not the rook?".into()),
    model_text: None,
    expires_at: Utc::now() - Duration::hours(1),
  })
  .await
  .unwrap();

  let purged = s.purge_expired_debug_text(Utc::now()).await.unwrap();
  assert_eq!(purged, 1);
  let purged_again = s.purge_expired_debug_text(Utc::now()).await.unwrap();
  assert_eq!(purged_again, 0);
}

// ─── Kill switches ───────────────────────────────────────────────────────────

#[tokio::test]
async fn flags_default_unset_then_toggle() {
  let s = store().await;

  assert!(s.get_flag("coach_mode").await.unwrap().is_none());

  let set = s.set_flag("coach_mode", false).await.unwrap();
  assert!(!set.enabled);

  let read = s.get_flag("coach_mode").await.unwrap().unwrap();
  assert_eq!(read.name, "coach_mode");
  assert!(!read.enabled);

  s.set_flag("coach_mode", true).await.unwrap();
  assert!(s.get_flag("coach_mode").await.unwrap().unwrap().enabled);
}

// ─── Gold set ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn gold_cases_and_benchmark_results() {
  let s = store().await;

  let case = s
    .add_gold_case(NewGoldCase {
      fen: "r1bqkbnr/pppp1ppp/2n5/4p3/2B1P3/5N2/PPPP1PPP/RNBQK2R b KQkq - 3 3"
        .into(),
      best_move: "g8f6".into(),
      worst_move: "f7f6".into(),
      eval_cp: 25,
      note: Some("italian, quiet line".into()),
    })
    .await
    .unwrap();

  let cases = s.list_gold_cases().await.unwrap();
  assert_eq!(cases.len(), 1);
  assert_eq!(cases[0].case_id, case.case_id);

  s.record_benchmark_result(case.case_id, "m9".into(), true, Some(15))
    .await
    .unwrap();
  s.record_benchmark_result(case.case_id, "m9".into(), false, None)
    .await
    .unwrap();

  let results = s.list_benchmark_results("m9").await.unwrap();
  assert_eq!(results.len(), 2);
  assert!(s.list_benchmark_results("m10").await.unwrap().is_empty());

  let err = s
    .record_benchmark_result(Uuid::new_v4(), "m9".into(), true, None)
    .await
    .unwrap_err();
  assert!(matches!(err, Error::GoldCaseNotFound(_)));
}
