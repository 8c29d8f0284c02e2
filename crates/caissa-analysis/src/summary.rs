//! Pattern summaries — the compressed form a game takes at compaction.

use std::collections::BTreeMap;

use caissa_core::{
  fact::{ErrorClass, MoveFact, Phase},
  game::{Game, PatternSummary},
};

/// Derive the [`PatternSummary`] that survives a game's compaction.
///
/// Deterministic for a given fact set; all maps are ordered so repeated
/// computation yields byte-identical serialisations.
pub fn pattern_summary(game: &Game, facts: &[MoveFact]) -> PatternSummary {
  let mut tag_frequencies: BTreeMap<String, u32> = BTreeMap::new();
  let mut phase_total: BTreeMap<Phase, u32> = BTreeMap::new();
  let mut phase_clean: BTreeMap<Phase, u32> = BTreeMap::new();
  let mut blunder_count = 0u32;
  let mut cp_loss_sum = 0i64;

  for fact in facts {
    for tag in &fact.tags {
      *tag_frequencies.entry(tag.clone()).or_insert(0) += 1;
    }

    *phase_total.entry(fact.phase).or_insert(0) += 1;
    if !fact.class.is_error() {
      *phase_clean.entry(fact.phase).or_insert(0) += 1;
    }
    if fact.class == ErrorClass::Blunder {
      blunder_count += 1;
    }
    cp_loss_sum += fact.cp_loss;
  }

  let phase_accuracy = phase_total
    .iter()
    .map(|(&phase, &total)| {
      let clean = phase_clean.get(&phase).copied().unwrap_or(0);
      (phase, f64::from(clean) / f64::from(total))
    })
    .collect();

  let move_count = facts.len() as u32;
  let mean_cp_loss = if facts.is_empty() {
    0.0
  } else {
    cp_loss_sum as f64 / facts.len() as f64
  };

  PatternSummary {
    tag_frequencies,
    phase_accuracy,
    result: game.result,
    rating_delta: game.rating.and_then(|r| r.rating_delta),
    move_count,
    blunder_count,
    mean_cp_loss,
  }
}
