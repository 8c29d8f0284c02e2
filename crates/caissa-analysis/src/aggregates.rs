//! The Aggregate Engine — derived statistics over the active window plus
//! compacted summaries.
//!
//! The four computations are pure functions; `read_aggregate` adds the
//! freshness policy (recompute synchronously on a stale or missing cached
//! row) and `recompute_all` is the worker entry point.

use std::collections::BTreeMap;

use caissa_core::{
  aggregate::{
    AggregateKind, AggregatePayload, ComputedAggregate, Habits, LifetimeStats,
    StrengthProfile, TagRelevance, TagTransitions,
  },
  fact::{ErrorClass, MoveFact, Phase},
  game::{Game, GameResult, GameState, TimeControlClass},
  store::AnalyticsStore,
};
use uuid::Uuid;

use crate::{Error, Result};

/// Moves played faster than this count as "fast" for habit analysis.
const FAST_MOVE_MS: u64 = 5_000;

// ─── Lifetime stats ──────────────────────────────────────────────────────────

/// Counts and averages over every visible game: active games contribute
/// their facts in full detail, compacted games contribute their summaries.
pub fn lifetime_stats(games: &[Game], active_facts: &[MoveFact]) -> LifetimeStats {
  let mut out = LifetimeStats::default();
  let mut cp_loss_weighted = 0.0f64;
  let mut phase_clean: BTreeMap<Phase, f64> = BTreeMap::new();
  let mut phase_total: BTreeMap<Phase, f64> = BTreeMap::new();

  for game in games {
    out.games_total += 1;
    match game.state {
      GameState::Active => out.games_active += 1,
      GameState::Compacted => out.games_compacted += 1,
    }
    match game.result {
      GameResult::Win => out.wins += 1,
      GameResult::Loss => out.losses += 1,
      GameResult::Draw => out.draws += 1,
    }
    *out.games_by_time_control.entry(game.time_control).or_insert(0) += 1;

    // Compacted games carry their detail through the summary only.
    if let Some(summary) = &game.pattern_summary {
      out.moves_analyzed += summary.move_count;
      cp_loss_weighted += summary.mean_cp_loss * f64::from(summary.move_count);
      *out.error_counts.entry(ErrorClass::Blunder).or_insert(0) +=
        summary.blunder_count;

      let per_phase_weight =
        f64::from(summary.move_count) / summary.phase_accuracy.len().max(1) as f64;
      for (&phase, &accuracy) in &summary.phase_accuracy {
        *phase_total.entry(phase).or_insert(0.0) += per_phase_weight;
        *phase_clean.entry(phase).or_insert(0.0) += accuracy * per_phase_weight;
      }
    }
  }

  for fact in active_facts {
    out.moves_analyzed += 1;
    cp_loss_weighted += fact.cp_loss as f64;
    *out.error_counts.entry(fact.class).or_insert(0) += 1;
    *phase_total.entry(fact.phase).or_insert(0.0) += 1.0;
    if !fact.class.is_error() {
      *phase_clean.entry(fact.phase).or_insert(0.0) += 1.0;
    }
  }

  if out.moves_analyzed > 0 {
    out.mean_cp_loss = cp_loss_weighted / f64::from(out.moves_analyzed);
  }
  out.phase_accuracy = phase_total
    .iter()
    .filter(|&(_, &total)| total > 0.0)
    .map(|(&phase, &total)| {
      (phase, phase_clean.get(&phase).copied().unwrap_or(0.0) / total)
    })
    .collect();

  out
}

// ─── Strength profile ────────────────────────────────────────────────────────

/// Rank pattern tags by relevance: how far the tag's accuracy deviates
/// from the owner's global accuracy, weighted by a log-scaled sample-size
/// confidence term so rare extreme tags do not dominate common
/// moderately-informative ones.
pub fn strength_profile(active_facts: &[MoveFact]) -> StrengthProfile {
  if active_facts.is_empty() {
    return StrengthProfile::default();
  }

  let clean = active_facts.iter().filter(|f| !f.class.is_error()).count();
  let global_accuracy = clean as f64 / active_facts.len() as f64;

  let mut per_tag: BTreeMap<&str, (u32, u32)> = BTreeMap::new(); // (total, clean)
  for fact in active_facts {
    for tag in &fact.tags {
      let entry = per_tag.entry(tag).or_insert((0, 0));
      entry.0 += 1;
      if !fact.class.is_error() {
        entry.1 += 1;
      }
    }
  }

  let n_max = per_tag.values().map(|(n, _)| *n).max().unwrap_or(1);
  let confidence_scale = f64::from(n_max + 1).ln();

  let mut relevances: Vec<TagRelevance> = per_tag
    .into_iter()
    .map(|(tag, (total, clean))| {
      let accuracy = f64::from(clean) / f64::from(total);
      let deviation = accuracy - global_accuracy;
      let confidence = f64::from(total + 1).ln() / confidence_scale;
      TagRelevance {
        tag: tag.to_owned(),
        accuracy,
        deviation,
        sample: total,
        relevance: deviation * confidence,
      }
    })
    .collect();

  relevances.sort_by(|a, b| {
    b.relevance
      .partial_cmp(&a.relevance)
      .unwrap_or(std::cmp::Ordering::Equal)
      .then_with(|| a.tag.cmp(&b.tag))
  });

  let (strengths, mut weaknesses): (Vec<_>, Vec<_>) =
    relevances.into_iter().partition(|r| r.relevance >= 0.0);
  weaknesses.reverse(); // most negative first

  StrengthProfile { global_accuracy, strengths, weaknesses }
}

// ─── Tag transitions ─────────────────────────────────────────────────────────

/// Count tags gained and lost between a move and the same side's previous
/// move within each game.
pub fn tag_transitions(active_facts: &[MoveFact]) -> TagTransitions {
  let mut out = TagTransitions::default();

  let mut by_game: BTreeMap<Uuid, Vec<&MoveFact>> = BTreeMap::new();
  for fact in active_facts {
    by_game.entry(fact.game_id).or_default().push(fact);
  }

  for facts in by_game.values_mut() {
    facts.sort_by_key(|f| f.ply);
    for window_end in 0..facts.len() {
      let current = facts[window_end];
      // Same side's previous move is two plies back.
      let Some(prev) = facts[..window_end]
        .iter()
        .rev()
        .find(|f| f.ply + 2 == current.ply)
      else {
        continue;
      };

      out.pairs_considered += 1;
      for tag in &current.tags {
        if !prev.tags.contains(tag) {
          *out.gained.entry(tag.clone()).or_insert(0) += 1;
        }
      }
      for tag in &prev.tags {
        if !current.tags.contains(tag) {
          *out.lost.entry(tag.clone()).or_insert(0) += 1;
        }
      }
    }
  }

  out
}

// ─── Habits ──────────────────────────────────────────────────────────────────

/// Recurring behavioural patterns: clock usage per phase, blunder rates on
/// fast versus deliberate moves, error streaks, favourite time control.
pub fn habits(games: &[Game], active_facts: &[MoveFact]) -> Habits {
  let mut out = Habits::default();

  let mut time_sum: BTreeMap<Phase, f64> = BTreeMap::new();
  let mut time_n: BTreeMap<Phase, u32> = BTreeMap::new();
  let (mut fast_total, mut fast_blunders) = (0u32, 0u32);
  let (mut slow_total, mut slow_blunders) = (0u32, 0u32);

  for fact in active_facts {
    if let Some(ms) = fact.time_spent_ms {
      *time_sum.entry(fact.phase).or_insert(0.0) += ms as f64;
      *time_n.entry(fact.phase).or_insert(0) += 1;

      let blunder = fact.class == ErrorClass::Blunder;
      if ms < FAST_MOVE_MS {
        fast_total += 1;
        fast_blunders += u32::from(blunder);
      } else {
        slow_total += 1;
        slow_blunders += u32::from(blunder);
      }
    }
  }

  out.mean_time_ms_by_phase = time_sum
    .iter()
    .map(|(&phase, &sum)| (phase, sum / f64::from(time_n[&phase])))
    .collect();
  if fast_total > 0 {
    out.fast_move_blunder_rate = f64::from(fast_blunders) / f64::from(fast_total);
  }
  if slow_total > 0 {
    out.slow_move_blunder_rate = f64::from(slow_blunders) / f64::from(slow_total);
  }

  out.error_streak_rate = error_streak_rate(active_facts);
  out.favourite_time_control = favourite_time_control(games);

  out
}

/// Among the owner's errors that have a same-side predecessor, the
/// fraction whose predecessor was also an error.
fn error_streak_rate(active_facts: &[MoveFact]) -> f64 {
  let mut by_game: BTreeMap<Uuid, Vec<&MoveFact>> = BTreeMap::new();
  for fact in active_facts {
    by_game.entry(fact.game_id).or_default().push(fact);
  }

  let (mut with_predecessor, mut streaks) = (0u32, 0u32);
  for facts in by_game.values_mut() {
    facts.sort_by_key(|f| f.ply);
    for i in 0..facts.len() {
      if !facts[i].class.is_error() {
        continue;
      }
      if let Some(prev) =
        facts[..i].iter().rev().find(|f| f.ply + 2 == facts[i].ply)
      {
        with_predecessor += 1;
        streaks += u32::from(prev.class.is_error());
      }
    }
  }

  if with_predecessor == 0 {
    0.0
  } else {
    f64::from(streaks) / f64::from(with_predecessor)
  }
}

fn favourite_time_control(games: &[Game]) -> Option<TimeControlClass> {
  let mut counts: BTreeMap<TimeControlClass, u32> = BTreeMap::new();
  for game in games {
    *counts.entry(game.time_control).or_insert(0) += 1;
  }
  counts.into_iter().max_by_key(|&(_, n)| n).map(|(tc, _)| tc)
}

// ─── Orchestration ───────────────────────────────────────────────────────────

fn compute_payload(
  kind: AggregateKind,
  games: &[Game],
  active_facts: &[MoveFact],
) -> AggregatePayload {
  match kind {
    AggregateKind::LifetimeStats => {
      AggregatePayload::LifetimeStats(lifetime_stats(games, active_facts))
    }
    AggregateKind::StrengthProfile => {
      AggregatePayload::StrengthProfile(strength_profile(active_facts))
    }
    AggregateKind::TagTransitions => {
      AggregatePayload::TagTransitions(tag_transitions(active_facts))
    }
    AggregateKind::Habits => AggregatePayload::Habits(habits(games, active_facts)),
  }
}

/// Recompute one aggregate kind from current store state and cache it.
pub async fn recompute<S: AnalyticsStore>(
  store: &S,
  owner_id: Uuid,
  kind: AggregateKind,
) -> Result<ComputedAggregate> {
  let games = store.list_games(owner_id, None).await.map_err(Error::store)?;
  let facts = store.get_active_facts(owner_id).await.map_err(Error::store)?;

  let payload = compute_payload(kind, &games, &facts);
  store
    .put_aggregate(owner_id, payload, games.len() as u32)
    .await
    .map_err(Error::store)
}

/// Recompute all four aggregate kinds — the invalidation worker's entry
/// point.
pub async fn recompute_all<S: AnalyticsStore>(store: &S, owner_id: Uuid) -> Result<()> {
  for kind in AggregateKind::ALL {
    recompute(store, owner_id, kind).await?;
  }
  Ok(())
}

/// Read an aggregate, recomputing synchronously first when the cached row
/// is missing or flagged stale. Never returns stale data.
pub async fn read_aggregate<S: AnalyticsStore>(
  store: &S,
  owner_id: Uuid,
  kind: AggregateKind,
) -> Result<ComputedAggregate> {
  match store
    .get_aggregate(owner_id, kind)
    .await
    .map_err(Error::store)?
  {
    Some(cached) if !cached.needs_recompute => Ok(cached),
    _ => recompute(store, owner_id, kind).await,
  }
}
