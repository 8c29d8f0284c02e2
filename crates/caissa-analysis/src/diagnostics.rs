//! The Diagnostic View Engine — failure-mode flags and rolled-up views
//! over the immutable interaction log.
//!
//! Everything here is a pure read-side derivation: flags, daily KPIs, and
//! cohort rankings are recomputable at any time from logged interactions
//! and are never stored as ground truth.

use std::collections::BTreeMap;

use caissa_core::interaction::{ConfidenceLevel, InteractionBundle, InteractionMode};
use chrono::{DateTime, Days, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ─── Config ──────────────────────────────────────────────────────────────────

/// Thresholds for flag derivation.
#[derive(Debug, Clone, Copy)]
pub struct DiagnosticConfig {
  /// Engine disagreement beyond this makes a "high" declaration
  /// overconfident.
  pub disagreement_threshold_cp: i64,
  /// Top-two tag margins at or below this count as "near-equal".
  pub margin_threshold: f64,
}

impl Default for DiagnosticConfig {
  fn default() -> Self {
    Self { disagreement_threshold_cp: 100, margin_threshold: 0.10 }
  }
}

// ─── Flags ───────────────────────────────────────────────────────────────────

/// The six failure modes tracked per interaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureMode {
  ConfusionLoop,
  GroundingViolation,
  Overconfident,
  Underconfident,
  TradeoffMissing,
  DominantTagNotMentioned,
}

impl FailureMode {
  pub const ALL: [FailureMode; 6] = [
    Self::ConfusionLoop,
    Self::GroundingViolation,
    Self::Overconfident,
    Self::Underconfident,
    Self::TradeoffMissing,
    Self::DominantTagNotMentioned,
  ];
}

/// Derived booleans for one interaction.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct InteractionFlags {
  pub interaction_id:             Uuid,
  pub confusion_loop:             bool,
  pub grounding_violation:        bool,
  pub overconfident:              bool,
  pub underconfident:             bool,
  pub tradeoff_missing:           bool,
  pub dominant_tag_not_mentioned: bool,
}

impl InteractionFlags {
  pub fn is_set(&self, mode: FailureMode) -> bool {
    match mode {
      FailureMode::ConfusionLoop => self.confusion_loop,
      FailureMode::GroundingViolation => self.grounding_violation,
      FailureMode::Overconfident => self.overconfident,
      FailureMode::Underconfident => self.underconfident,
      FailureMode::TradeoffMissing => self.tradeoff_missing,
      FailureMode::DominantTagNotMentioned => self.dominant_tag_not_mentioned,
    }
  }

  pub fn any(&self) -> bool {
    FailureMode::ALL.iter().any(|&m| self.is_set(m))
  }
}

/// Derive all six flags for one logged interaction.
pub fn derive_flags(bundle: &InteractionBundle, cfg: &DiagnosticConfig) -> InteractionFlags {
  let truth = bundle.engine_truth.as_ref();
  let trace = bundle.reasoning_trace.as_ref();
  let meta = bundle.response_meta.as_ref();
  let behavior = bundle.user_behavior.as_ref();

  let confusion_loop = behavior.is_some_and(|b| b.rapid_follow_up_count >= 2);

  let grounding_violation = meta.is_some_and(|m| {
    if m.claim_count > m.grounded_claim_count {
      return true;
    }
    match truth {
      Some(t) => m
        .asserted_lines
        .iter()
        .any(|line| !t.candidates.iter().any(|c| &c.first_move == line)),
      // Lines asserted with no engine truth captured are ungrounded by
      // definition.
      None => !m.asserted_lines.is_empty(),
    }
  });

  let overconfident = meta.is_some_and(|m| {
    m.declared_confidence == ConfidenceLevel::High
      && (m.permitted_confidence < ConfidenceLevel::High
        || truth.is_some_and(|t| {
          t.disagreement_cp
            .is_some_and(|d| d.abs() > cfg.disagreement_threshold_cp)
        }))
  });

  let underconfident = meta.is_some_and(|m| {
    truth.is_some_and(|t| t.tablebase_exact)
      && m.declared_confidence < ConfidenceLevel::High
  });

  let tradeoff_missing = match (trace.and_then(|t| t.margin), meta) {
    (Some(margin), Some(m)) => margin <= cfg.margin_threshold && !m.mentions_tradeoff,
    _ => false,
  };

  let dominant_tag_not_mentioned = match (trace.and_then(|t| t.dominant_tag.as_ref()), meta)
  {
    (Some(dominant), Some(m)) => !m.mentioned_tags.iter().any(|t| t == dominant),
    _ => false,
  };

  InteractionFlags {
    interaction_id: bundle.interaction.interaction_id,
    confusion_loop,
    grounding_violation,
    overconfident,
    underconfident,
    tradeoff_missing,
    dominant_tag_not_mentioned,
  }
}

// ─── Daily KPIs ──────────────────────────────────────────────────────────────

/// Failure-mode rates for one mode on one day.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ModeKpis {
  pub interactions: u32,
  /// Rate per failure mode over that day's interactions.
  pub rates:        BTreeMap<FailureMode, f64>,
}

/// Per-mode KPI rollup for a single day.
#[derive(Debug, Clone, Serialize)]
pub struct DailyKpis {
  pub date:     NaiveDate,
  pub by_mode:  BTreeMap<InteractionMode, ModeKpis>,
}

/// Roll per-interaction flags into daily per-mode rates.
pub fn daily_kpis(
  bundles: &[InteractionBundle],
  date: NaiveDate,
  cfg: &DiagnosticConfig,
) -> DailyKpis {
  let mut counts: BTreeMap<InteractionMode, (u32, BTreeMap<FailureMode, u32>)> =
    BTreeMap::new();

  for bundle in bundles {
    if bundle.interaction.occurred_at.date_naive() != date {
      continue;
    }
    let flags = derive_flags(bundle, cfg);
    let entry = counts.entry(bundle.interaction.mode).or_default();
    entry.0 += 1;
    for mode in FailureMode::ALL {
      if flags.is_set(mode) {
        *entry.1.entry(mode).or_insert(0) += 1;
      }
    }
  }

  let by_mode = counts
    .into_iter()
    .map(|(mode, (total, fails))| {
      let rates = FailureMode::ALL
        .iter()
        .map(|&m| {
          let n = fails.get(&m).copied().unwrap_or(0);
          (m, f64::from(n) / f64::from(total))
        })
        .collect();
      (mode, ModeKpis { interactions: total, rates })
    })
    .collect();

  DailyKpis { date, by_mode }
}

// ─── Cohorts ─────────────────────────────────────────────────────────────────

/// One failure mode's standing over the trailing seven days.
#[derive(Debug, Clone, Serialize)]
pub struct FailureCohort {
  pub mode:         FailureMode,
  pub occurrences:  u32,
  pub interactions: u32,
  pub rate:         f64,
}

/// Rank failure modes by rate over the seven days ending at `now`.
pub fn failure_cohorts(
  bundles: &[InteractionBundle],
  now: DateTime<Utc>,
  cfg: &DiagnosticConfig,
) -> Vec<FailureCohort> {
  let window_start = now
    .checked_sub_days(Days::new(7))
    .unwrap_or(DateTime::<Utc>::MIN_UTC);

  let mut interactions = 0u32;
  let mut occurrences: BTreeMap<FailureMode, u32> = BTreeMap::new();

  for bundle in bundles {
    let at = bundle.interaction.occurred_at;
    if at < window_start || at > now {
      continue;
    }
    interactions += 1;
    let flags = derive_flags(bundle, cfg);
    for mode in FailureMode::ALL {
      if flags.is_set(mode) {
        *occurrences.entry(mode).or_insert(0) += 1;
      }
    }
  }

  let mut cohorts: Vec<FailureCohort> = FailureMode::ALL
    .iter()
    .map(|&mode| {
      let n = occurrences.get(&mode).copied().unwrap_or(0);
      FailureCohort {
        mode,
        occurrences: n,
        interactions,
        rate: if interactions == 0 {
          0.0
        } else {
          f64::from(n) / f64::from(interactions)
        },
      }
    })
    .collect();

  cohorts.sort_by(|a, b| {
    b.rate
      .partial_cmp(&a.rate)
      .unwrap_or(std::cmp::Ordering::Equal)
      .then_with(|| a.mode.cmp(&b.mode))
  });
  cohorts
}
