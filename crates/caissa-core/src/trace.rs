//! Raw evaluation traces — the ingestion interface from the chess-engine
//! collaborator.
//!
//! A trace is an opaque, already-computed engine output. This subsystem
//! performs no move-legality or rule checking on it; plies missing required
//! fields are skipped (and counted) during normalization.

use serde::{Deserialize, Serialize};

use crate::fact::Phase;

/// One ply of engine output as delivered by the engine collaborator.
///
/// `fen_before`, `fen_after`, and `played_move` are required for a ply to
/// normalize; everything else degrades gracefully.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawPly {
  pub fen_before:     Option<String>,
  pub fen_after:      Option<String>,
  pub played_move:    Option<String>,
  pub best_move:      Option<String>,
  /// Evaluation of the position before the move, mover's perspective.
  pub eval_before_cp: Option<i64>,
  /// Evaluation after the played move.
  pub eval_played_cp: Option<i64>,
  /// Evaluation after the engine's best move; defaults to `eval_before_cp`.
  pub eval_best_cp:   Option<i64>,
  pub time_spent_ms:  Option<u64>,
  /// Phase as reported by the engine's annotator, if any.
  pub phase:          Option<Phase>,
  /// Pattern tags the engine's tagger attached to this move.
  #[serde(default)]
  pub tags:           Vec<String>,
}

/// A full per-game evaluation trace: ordered per-ply engine outputs.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EvalTrace {
  pub plies: Vec<RawPly>,
}
