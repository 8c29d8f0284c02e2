//! Gold-set benchmarking — regression tracking across model versions.
//!
//! The chat collaborator replays the frozen positions against a model
//! variant and hands the already-computed predictions here; this module
//! scores them against the frozen cases and persists one result per case.

use std::collections::BTreeMap;

use caissa_core::{
  goldcase::{BenchmarkReport, GoldCase, GoldPrediction},
  store::AnalyticsStore,
};
use chrono::Utc;
use uuid::Uuid;

use crate::{Error, Result};

/// Pure scoring of predictions against the frozen case set.
pub fn score_predictions(
  cases: &[GoldCase],
  predictions: &[GoldPrediction],
) -> Vec<(Uuid, bool, Option<i64>)> {
  let by_case: BTreeMap<Uuid, &GoldPrediction> =
    predictions.iter().map(|p| (p.case_id, p)).collect();

  cases
    .iter()
    .filter_map(|case| {
      let prediction = by_case.get(&case.case_id)?;
      let matched = prediction.chosen_move == case.best_move;
      let eval_error = prediction.eval_cp.map(|cp| (cp - case.eval_cp).abs());
      Some((case.case_id, matched, eval_error))
    })
    .collect()
}

/// Replay a model's predictions against the full gold set, record one
/// [`caissa_core::goldcase::BenchmarkResult`] per covered case, and return
/// the run summary.
pub async fn evaluate_against_gold_set<S: AnalyticsStore>(
  store: &S,
  model_identity: &str,
  predictions: &[GoldPrediction],
) -> Result<BenchmarkReport> {
  let cases = store.list_gold_cases().await.map_err(Error::store)?;
  let scored = score_predictions(&cases, predictions);

  let mut matched = 0u32;
  let mut mismatched = 0u32;
  let mut error_sum = 0i64;
  let mut error_n = 0u32;

  for &(case_id, hit, eval_error) in &scored {
    if hit { matched += 1 } else { mismatched += 1 }
    if let Some(e) = eval_error {
      error_sum += e;
      error_n += 1;
    }
    store
      .record_benchmark_result(case_id, model_identity.to_owned(), hit, eval_error)
      .await
      .map_err(Error::store)?;
  }

  let missing = cases.len() as u32 - scored.len() as u32;
  tracing::info!(model_identity, matched, mismatched, missing, "gold-set run recorded");

  Ok(BenchmarkReport {
    model_identity: model_identity.to_owned(),
    cases_total: cases.len() as u32,
    matched,
    mismatched,
    missing,
    mean_abs_eval_error: (error_n > 0)
      .then(|| error_sum as f64 / f64::from(error_n)),
    run_at: Utc::now(),
  })
}

#[cfg(test)]
mod tests {
  use super::*;

  fn case(best: &str, eval: i64) -> GoldCase {
    GoldCase {
      case_id:    Uuid::new_v4(),
      fen:        "r1bqkbnr/pppp1ppp/2n5/4p3/2B1P3/5N2/PPPP1PPP/RNBQK2R w".into(),
      best_move:  best.into(),
      worst_move: "a2a3".into(),
      eval_cp:    eval,
      note:       None,
      created_at: Utc::now(),
    }
  }

  #[test]
  fn scores_match_mismatch_and_eval_error() {
    let cases = vec![case("f3g5", 120), case("e1g1", 40)];
    let predictions = vec![
      GoldPrediction {
        case_id:     cases[0].case_id,
        chosen_move: "f3g5".into(),
        eval_cp:     Some(90),
      },
      GoldPrediction {
        case_id:     cases[1].case_id,
        chosen_move: "a2a3".into(),
        eval_cp:     None,
      },
    ];

    let scored = score_predictions(&cases, &predictions);
    assert_eq!(scored.len(), 2);

    let first = scored.iter().find(|(id, ..)| *id == cases[0].case_id).unwrap();
    assert!(first.1);
    assert_eq!(first.2, Some(30));

    let second = scored.iter().find(|(id, ..)| *id == cases[1].case_id).unwrap();
    assert!(!second.1);
    assert_eq!(second.2, None);
  }

  #[test]
  fn uncovered_cases_are_left_unscored() {
    let cases = vec![case("f3g5", 120), case("e1g1", 40)];
    let predictions = vec![GoldPrediction {
      case_id:     cases[0].case_id,
      chosen_move: "f3g5".into(),
      eval_cp:     Some(120),
    }];

    let scored = score_predictions(&cases, &predictions);
    assert_eq!(scored.len(), 1);
    assert_eq!(scored[0].0, cases[0].case_id);
  }
}
