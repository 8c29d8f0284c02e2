//! MoveFact — the atomic unit of the analytics store.
//!
//! A move fact is an immutable observation about one ply of one game.
//! Facts are written once per game during normalization; re-normalization
//! replaces the whole set atomically. Nothing ever updates a single fact.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ─── Side and phase ──────────────────────────────────────────────────────────

/// Which player made the move.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
  White,
  Black,
}

impl Side {
  /// The side to move at a zero-based ply index.
  pub fn from_ply(ply: u32) -> Self {
    if ply % 2 == 0 { Self::White } else { Self::Black }
  }
}

/// Coarse game phase a ply belongs to.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
  Opening,
  Middlegame,
  Endgame,
}

// ─── Error classification ────────────────────────────────────────────────────

/// How severe a move's centipawn loss was.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum ErrorClass {
  None,
  Inaccuracy,
  Mistake,
  Blunder,
}

impl ErrorClass {
  pub fn is_error(self) -> bool { !matches!(self, Self::None) }
}

/// Centipawn-loss boundaries between the four error bands.
///
/// A loss below `inaccuracy` is no error; below `mistake` an inaccuracy;
/// below `blunder` a mistake; at or above `blunder` a blunder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassifyConfig {
  pub inaccuracy: i64,
  pub mistake:    i64,
  pub blunder:    i64,
}

impl Default for ClassifyConfig {
  fn default() -> Self {
    Self { inaccuracy: 50, mistake: 100, blunder: 200 }
  }
}

impl ClassifyConfig {
  /// Map a centipawn loss deterministically onto an [`ErrorClass`].
  pub fn classify(&self, cp_loss: i64) -> ErrorClass {
    if cp_loss < self.inaccuracy {
      ErrorClass::None
    } else if cp_loss < self.mistake {
      ErrorClass::Inaccuracy
    } else if cp_loss < self.blunder {
      ErrorClass::Mistake
    } else {
      ErrorClass::Blunder
    }
  }
}

// ─── MoveFact ────────────────────────────────────────────────────────────────

/// One ply of one game, normalized into queryable form.
///
/// Evaluations are in centipawns from the mover's perspective. Exactly one
/// fact exists per `(game_id, ply)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MoveFact {
  pub fact_id:        Uuid,
  pub game_id:        Uuid,
  pub owner_id:       Uuid,
  /// Zero-based half-move index within the game.
  pub ply:            u32,
  pub side:           Side,
  pub fen_before:     String,
  pub fen_after:      String,
  pub eval_before_cp: i64,
  /// Evaluation after the move actually played.
  pub eval_played_cp: i64,
  /// Evaluation after the engine's preferred move.
  pub eval_best_cp:   i64,
  /// `max(0, eval_best_cp - eval_played_cp)`.
  pub cp_loss:        i64,
  pub class:          ErrorClass,
  pub phase:          Phase,
  pub time_spent_ms:  Option<u64>,
  /// Pattern tags that applied to this move; also recorded in the catalog.
  pub tags:           Vec<String>,
}

/// Input to [`crate::store::AnalyticsStore::replace_facts`] — a fact
/// without its store-assigned id.
#[derive(Debug, Clone)]
pub struct NewMoveFact {
  pub ply:            u32,
  pub side:           Side,
  pub fen_before:     String,
  pub fen_after:      String,
  pub eval_before_cp: i64,
  pub eval_played_cp: i64,
  pub eval_best_cp:   i64,
  pub cp_loss:        i64,
  pub class:          ErrorClass,
  pub phase:          Phase,
  pub time_spent_ms:  Option<u64>,
  pub tags:           Vec<String>,
}

// ─── Tag catalog ─────────────────────────────────────────────────────────────

/// A deduplicated pattern label. Created lazily during normalization and
/// never deleted while referenced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tag {
  pub tag_id: i64,
  pub name:   String,
}
