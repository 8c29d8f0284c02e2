//! Game — the envelope that owns move facts.
//!
//! A game is either fully present (`Active`, with per-ply facts in the
//! store) or summary-only (`Compacted`, facts discarded, pattern summary
//! retained forever). It is never both, and never hard-deleted while the
//! owner's account exists.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::fact::Phase;

// ─── Classification enums ────────────────────────────────────────────────────

/// The outcome of a game from the owner's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GameResult {
  Win,
  Loss,
  Draw,
}

/// Broad time-control class; exact clock settings are not retained.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum TimeControlClass {
  Bullet,
  Blitz,
  Rapid,
  Classical,
  Correspondence,
}

/// Whether the game is held in full per-ply detail or as a summary only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GameState {
  Active,
  Compacted,
}

// ─── Rating context ──────────────────────────────────────────────────────────

/// The rating situation at the time the game was played.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RatingContext {
  pub own_rating:      i32,
  pub opponent_rating: i32,
  /// Rating change credited to the owner for this game, when known.
  pub rating_delta:    Option<i32>,
  pub rated:           bool,
}

// ─── Pattern summary ─────────────────────────────────────────────────────────

/// The compressed form a game takes once it leaves the retention window.
///
/// Small enough to keep forever; rich enough that historical pattern
/// analysis never loses the game entirely.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatternSummary {
  /// How many facts each pattern tag appeared on.
  pub tag_frequencies: BTreeMap<String, u32>,
  /// Fraction of error-free moves per phase, for phases the game reached.
  pub phase_accuracy:  BTreeMap<Phase, f64>,
  pub result:          GameResult,
  pub rating_delta:    Option<i32>,
  /// Total plies the owner played (facts the summary was computed from).
  pub move_count:      u32,
  pub blunder_count:   u32,
  pub mean_cp_loss:    f64,
}

// ─── Game ────────────────────────────────────────────────────────────────────

/// One played match. The raw evaluation trace is consumed at ingestion and
/// not retained; facts (while active) and the summary (once compacted) are
/// the queryable forms.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Game {
  pub game_id:         Uuid,
  pub owner_id:        Uuid,
  pub played_at:       DateTime<Utc>,
  pub rating:          Option<RatingContext>,
  pub result:          GameResult,
  pub time_control:    TimeControlClass,
  pub state:           GameState,
  /// Set exactly when `state == Compacted`.
  pub pattern_summary: Option<PatternSummary>,
  /// Optimistic-concurrency token; bumped by every state transition.
  pub version:         i64,
  pub created_at:      DateTime<Utc>,
}

/// Input to [`crate::store::AnalyticsStore::add_game`].
/// Ids, state, and timestamps are assigned by the store.
#[derive(Debug, Clone)]
pub struct NewGame {
  pub owner_id:     Uuid,
  pub played_at:    DateTime<Utc>,
  pub rating:       Option<RatingContext>,
  pub result:       GameResult,
  pub time_control: TimeControlClass,
}
