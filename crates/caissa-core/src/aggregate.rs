//! Computed aggregates — pre-materialized, user-scoped analytics results.
//!
//! One cached document exists per owner per aggregate kind. Payloads are
//! typed variants (one struct per kind) validated at the write boundary;
//! the variant tag doubles as the `kind` column discriminant.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
  Error, Result,
  fact::{ErrorClass, Phase},
  game::TimeControlClass,
};

// ─── Kind ────────────────────────────────────────────────────────────────────

/// The four aggregate kinds the engine materializes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AggregateKind {
  LifetimeStats,
  StrengthProfile,
  TagTransitions,
  Habits,
}

impl AggregateKind {
  pub const ALL: [AggregateKind; 4] = [
    Self::LifetimeStats,
    Self::StrengthProfile,
    Self::TagTransitions,
    Self::Habits,
  ];

  /// The discriminant string stored in the `kind` column.
  pub fn discriminant(self) -> &'static str {
    match self {
      Self::LifetimeStats => "lifetime_stats",
      Self::StrengthProfile => "strength_profile",
      Self::TagTransitions => "tag_transitions",
      Self::Habits => "habits",
    }
  }

  pub fn from_discriminant(s: &str) -> Result<Self> {
    match s {
      "lifetime_stats" => Ok(Self::LifetimeStats),
      "strength_profile" => Ok(Self::StrengthProfile),
      "tag_transitions" => Ok(Self::TagTransitions),
      "habits" => Ok(Self::Habits),
      other => Err(Error::UnknownAggregateKind(other.to_owned())),
    }
  }
}

// ─── Payload structs ─────────────────────────────────────────────────────────

/// Counts and averages over the owner's whole visible history — the active
/// window in full detail plus every compacted summary.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LifetimeStats {
  pub games_total:     u32,
  pub games_active:    u32,
  pub games_compacted: u32,
  pub wins:            u32,
  pub losses:          u32,
  pub draws:           u32,
  pub moves_analyzed:  u32,
  pub mean_cp_loss:    f64,
  pub error_counts:    BTreeMap<ErrorClass, u32>,
  pub phase_accuracy:  BTreeMap<Phase, f64>,
  pub games_by_time_control: BTreeMap<TimeControlClass, u32>,
}

/// One tag's contribution to the strength profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TagRelevance {
  pub tag:        String,
  /// Fraction of error-free moves among moves carrying this tag.
  pub accuracy:   f64,
  /// `accuracy - global_accuracy`; positive means a strength.
  pub deviation:  f64,
  /// Moves carrying this tag in the active window.
  pub sample:     u32,
  /// Deviation weighted by log-scaled sample confidence.
  pub relevance:  f64,
}

/// Tags ranked by how informative they are about the owner's play.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StrengthProfile {
  pub global_accuracy: f64,
  /// Positive-relevance tags, strongest first.
  pub strengths:       Vec<TagRelevance>,
  /// Negative-relevance tags, weakest first.
  pub weaknesses:      Vec<TagRelevance>,
}

/// How often each tag was gained or lost relative to the same side's
/// previous move.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TagTransitions {
  pub gained: BTreeMap<String, u32>,
  pub lost:   BTreeMap<String, u32>,
  /// Plies compared (pairs of same-side consecutive moves).
  pub pairs_considered: u32,
}

/// Recurring behavioural patterns over the active window.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Habits {
  /// Mean time spent per move, per phase, where clock data exists.
  pub mean_time_ms_by_phase: BTreeMap<Phase, f64>,
  /// Blunder rate on moves played in under five seconds.
  pub fast_move_blunder_rate: f64,
  /// Blunder rate on all other moves.
  pub slow_move_blunder_rate: f64,
  /// Fraction of errors immediately following another error by the owner.
  pub error_streak_rate: f64,
  pub favourite_time_control: Option<TimeControlClass>,
}

// ─── Tagged payload ──────────────────────────────────────────────────────────

/// The typed payload of a [`ComputedAggregate`]. The variant tag matches
/// [`AggregateKind::discriminant`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum AggregatePayload {
  LifetimeStats(LifetimeStats),
  StrengthProfile(StrengthProfile),
  TagTransitions(TagTransitions),
  Habits(Habits),
}

impl AggregatePayload {
  pub fn kind(&self) -> AggregateKind {
    match self {
      Self::LifetimeStats(_) => AggregateKind::LifetimeStats,
      Self::StrengthProfile(_) => AggregateKind::StrengthProfile,
      Self::TagTransitions(_) => AggregateKind::TagTransitions,
      Self::Habits(_) => AggregateKind::Habits,
    }
  }

  /// Serialise the inner payload (without the kind tag) for the
  /// `payload_json` column.
  pub fn to_json(&self) -> Result<serde_json::Value> {
    let full = serde_json::to_value(self)?;
    Ok(full.get("data").cloned().unwrap_or(serde_json::Value::Null))
  }

  /// Deserialise from the discriminant string and JSON payload stored in
  /// the database.
  pub fn from_parts(discriminant: &str, data: serde_json::Value) -> Result<Self> {
    // Validate the discriminant before handing it to serde.
    AggregateKind::from_discriminant(discriminant)?;
    let wrapped = serde_json::json!({ "kind": discriminant, "data": data });
    Ok(serde_json::from_value(wrapped)?)
  }
}

// ─── Cached row ──────────────────────────────────────────────────────────────

/// One materialized aggregate for one owner.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComputedAggregate {
  pub owner_id:         Uuid,
  pub payload:          AggregatePayload,
  /// Games (active + compacted) the payload was computed from.
  pub input_game_count: u32,
  pub computed_at:      DateTime<Utc>,
  pub needs_recompute:  bool,
}
