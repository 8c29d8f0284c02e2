//! Background jobs: debounced aggregate recomputation and debug-text
//! expiry.
//!
//! Ingestion bursts publish the owner's id to the [`InvalidationBus`]; the
//! recompute worker coalesces everything that arrives within the debounce
//! window into one `recompute_all` pass per owner. Reads never wait for the
//! worker — a stale read recomputes synchronously — so a lost or delayed
//! recompute costs latency, never correctness.

use std::{collections::BTreeMap, sync::Arc, time::Duration};

use caissa_analysis::aggregates::recompute_all;
use caissa_core::store::AnalyticsStore;
use chrono::Utc;
use tokio::{
  sync::mpsc,
  time::{Instant, MissedTickBehavior, sleep_until},
};
use uuid::Uuid;

// ─── Invalidation bus ────────────────────────────────────────────────────────

/// In-process publisher of "this owner's aggregates went stale" events.
#[derive(Clone)]
pub struct InvalidationBus {
  tx: mpsc::UnboundedSender<Uuid>,
}

impl InvalidationBus {
  pub fn new() -> (Self, mpsc::UnboundedReceiver<Uuid>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (Self { tx }, rx)
  }

  /// Fire-and-forget; a closed bus (worker gone) is not the publisher's
  /// problem.
  pub fn publish(&self, owner_id: Uuid) {
    let _ = self.tx.send(owner_id);
  }
}

// ─── Recompute worker ────────────────────────────────────────────────────────

/// Remove and return every owner whose debounce deadline has passed.
fn drain_due(deadlines: &mut BTreeMap<Uuid, Instant>, now: Instant) -> Vec<Uuid> {
  let due: Vec<Uuid> = deadlines
    .iter()
    .filter(|&(_, at)| *at <= now)
    .map(|(owner, _)| *owner)
    .collect();
  for owner in &due {
    deadlines.remove(owner);
  }
  due
}

/// Consume invalidations until the bus closes, recomputing each owner's
/// aggregates once their debounce window goes quiet.
pub async fn run_recompute_worker<S>(
  store: Arc<S>,
  mut rx: mpsc::UnboundedReceiver<Uuid>,
  debounce: Duration,
) where
  S: AnalyticsStore,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  let mut deadlines: BTreeMap<Uuid, Instant> = BTreeMap::new();

  loop {
    let next = deadlines.values().min().copied();

    tokio::select! {
      received = rx.recv() => match received {
        // A fresh event pushes the owner's deadline out again.
        Some(owner) => {
          deadlines.insert(owner, Instant::now() + debounce);
        }
        None => break,
      },
      _ = async {
        match next {
          Some(at) => sleep_until(at).await,
          None => std::future::pending().await,
        }
      } => {
        for owner in drain_due(&mut deadlines, Instant::now()) {
          match recompute_all(store.as_ref(), owner).await {
            Ok(()) => tracing::debug!(%owner, "aggregates recomputed"),
            Err(e) => {
              // The next read heals it synchronously.
              tracing::warn!(%owner, error = %e, "aggregate recompute failed");
            }
          }
        }
      }
    }
  }

  tracing::info!("invalidation bus closed, recompute worker stopping");
}

// ─── Debug-text expiry ───────────────────────────────────────────────────────

/// Periodically hard-delete opt-in debug text whose TTL has elapsed.
pub async fn run_debug_purge<S>(store: Arc<S>, every: Duration)
where
  S: AnalyticsStore,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  let mut ticker = tokio::time::interval(every);
  ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

  loop {
    ticker.tick().await;
    match store.purge_expired_debug_text(Utc::now()).await {
      Ok(0) => {}
      Ok(purged) => tracing::info!(purged, "expired debug text purged"),
      Err(e) => tracing::warn!(error = %e, "debug-text purge failed"),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use caissa_core::{
    aggregate::AggregateKind,
    game::{GameResult, NewGame, TimeControlClass},
  };
  use caissa_store_sqlite::SqliteStore;

  #[test]
  fn drain_due_takes_only_elapsed_deadlines() {
    let now = Instant::now();
    let soon = Uuid::new_v4();
    let later = Uuid::new_v4();

    let mut deadlines = BTreeMap::new();
    deadlines.insert(soon, now);
    deadlines.insert(later, now + Duration::from_secs(10));

    let due = drain_due(&mut deadlines, now);
    assert_eq!(due, vec![soon]);
    assert_eq!(deadlines.len(), 1);
    assert!(deadlines.contains_key(&later));
  }

  #[tokio::test]
  async fn worker_recomputes_after_debounce_and_stops_on_close() {
    let store = Arc::new(SqliteStore::open_in_memory().await.unwrap());
    let owner = Uuid::new_v4();
    store
      .add_game(NewGame {
        owner_id: owner,
        played_at: Utc::now(),
        rating: None,
        result: GameResult::Draw,
        time_control: TimeControlClass::Rapid,
      })
      .await
      .unwrap();

    let (bus, rx) = InvalidationBus::new();
    let worker = tokio::spawn(run_recompute_worker(
      store.clone(),
      rx,
      Duration::from_millis(10),
    ));

    // A burst coalesces into one recompute once the window goes quiet.
    bus.publish(owner);
    bus.publish(owner);
    bus.publish(owner);
    tokio::time::sleep(Duration::from_millis(200)).await;

    let cached = store
      .get_aggregate(owner, AggregateKind::LifetimeStats)
      .await
      .unwrap()
      .expect("worker should have cached the aggregate");
    assert!(!cached.needs_recompute);

    drop(bus);
    worker.await.unwrap();
  }
}
