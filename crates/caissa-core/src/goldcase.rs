//! Gold cases — frozen regression benchmarks for model behaviour.
//!
//! Created by operators, never derived from user data. Each case pins a
//! position with a known-correct and known-incorrect move so model
//! variants can be compared across versions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A frozen evaluation position with known-correct and known-incorrect
/// moves.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GoldCase {
  pub case_id:    Uuid,
  pub fen:        String,
  pub best_move:  String,
  pub worst_move: String,
  /// The frozen reference evaluation for the position.
  pub eval_cp:    i64,
  pub note:       Option<String>,
  pub created_at: DateTime<Utc>,
}

/// Input to [`crate::store::AnalyticsStore::add_gold_case`].
#[derive(Debug, Clone, Deserialize)]
pub struct NewGoldCase {
  pub fen:        String,
  pub best_move:  String,
  pub worst_move: String,
  pub eval_cp:    i64,
  pub note:       Option<String>,
}

/// A model's already-computed answer for one gold case, as delivered by
/// the chat collaborator's replay.
#[derive(Debug, Clone, Deserialize)]
pub struct GoldPrediction {
  pub case_id:     Uuid,
  pub chosen_move: String,
  pub eval_cp:     Option<i64>,
}

/// The scored outcome of one prediction against one case.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BenchmarkResult {
  pub result_id:      Uuid,
  pub case_id:        Uuid,
  pub model_identity: String,
  pub matched:        bool,
  /// `|predicted eval - frozen eval|`, when the model asserted one.
  pub eval_error_cp:  Option<i64>,
  pub run_at:         DateTime<Utc>,
}

/// Summary of one benchmark run across the whole gold set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BenchmarkReport {
  pub model_identity:      String,
  pub cases_total:         u32,
  pub matched:             u32,
  pub mismatched:          u32,
  /// Cases the replay produced no prediction for.
  pub missing:             u32,
  pub mean_abs_eval_error: Option<f64>,
  pub run_at:              DateTime<Utc>,
}
