//! The Fact Normalizer — raw engine traces into move facts.
//!
//! Normalization is lenient: a ply missing its position or played move is
//! skipped and counted rather than failing the whole game. The output set
//! is written through `replace_facts`, so re-running on the same trace
//! replaces facts atomically instead of duplicating them.

use caissa_core::{
  fact::{ClassifyConfig, NewMoveFact, Phase, Side},
  trace::{EvalTrace, RawPly},
};

/// Evaluations beyond this magnitude (mate scores) are clamped so that
/// centipawn arithmetic stays well-behaved.
const EVAL_CLAMP_CP: i64 = 10_000;

/// Plies at or below this index default to [`Phase::Opening`].
const OPENING_LAST_PLY: u32 = 20;
/// Plies at or above this index default to [`Phase::Endgame`].
const ENDGAME_FIRST_PLY: u32 = 61;

/// The result of normalizing one trace.
#[derive(Debug, Clone)]
pub struct NormalizeOutcome {
  pub facts:   Vec<NewMoveFact>,
  /// Plies dropped for missing required fields.
  pub skipped: usize,
}

/// Convert a raw evaluation trace into a flat sequence of move facts.
///
/// Deterministic for a given `(trace, config)` pair; ply indices follow
/// trace order.
pub fn normalize_trace(trace: &EvalTrace, cfg: &ClassifyConfig) -> NormalizeOutcome {
  let mut facts = Vec::with_capacity(trace.plies.len());
  let mut skipped = 0usize;

  for (idx, raw) in trace.plies.iter().enumerate() {
    let ply = idx as u32;
    match normalize_ply(ply, raw, cfg) {
      Some(fact) => facts.push(fact),
      None => skipped += 1,
    }
  }

  if skipped > 0 {
    tracing::warn!(skipped, total = trace.plies.len(), "trace had malformed plies");
  }

  NormalizeOutcome { facts, skipped }
}

fn normalize_ply(ply: u32, raw: &RawPly, cfg: &ClassifyConfig) -> Option<NewMoveFact> {
  let fen_before = raw.fen_before.as_deref()?.to_owned();
  raw.played_move.as_deref()?;

  // fen_after is recoverable; the position before the move is the anchor.
  let fen_after = raw
    .fen_after
    .clone()
    .unwrap_or_else(|| fen_before.clone());

  let eval_before = clamp_eval(raw.eval_before_cp.unwrap_or(0));
  let eval_played = clamp_eval(raw.eval_played_cp.unwrap_or(eval_before));
  let eval_best = clamp_eval(raw.eval_best_cp.unwrap_or(eval_before));

  let cp_loss = (eval_best - eval_played).max(0);

  Some(NewMoveFact {
    ply,
    side: Side::from_ply(ply),
    fen_before,
    fen_after,
    eval_before_cp: eval_before,
    eval_played_cp: eval_played,
    eval_best_cp: eval_best,
    cp_loss,
    class: cfg.classify(cp_loss),
    phase: raw.phase.unwrap_or_else(|| phase_for_ply(ply)),
    time_spent_ms: raw.time_spent_ms,
    tags: dedup_tags(&raw.tags),
  })
}

fn clamp_eval(cp: i64) -> i64 { cp.clamp(-EVAL_CLAMP_CP, EVAL_CLAMP_CP) }

/// Ply-index fallback when the trace carries no phase annotation.
fn phase_for_ply(ply: u32) -> Phase {
  if ply <= OPENING_LAST_PLY {
    Phase::Opening
  } else if ply < ENDGAME_FIRST_PLY {
    Phase::Middlegame
  } else {
    Phase::Endgame
  }
}

fn dedup_tags(tags: &[String]) -> Vec<String> {
  let mut out: Vec<String> = Vec::with_capacity(tags.len());
  for t in tags {
    let t = t.trim();
    if !t.is_empty() && !out.iter().any(|e| e == t) {
      out.push(t.to_owned());
    }
  }
  out
}
