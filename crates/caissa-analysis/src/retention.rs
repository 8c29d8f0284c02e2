//! The Retention Manager — bounded rolling window of active games.
//!
//! `enforce_window` keeps the newest N games per owner active and compacts
//! the rest into pattern summaries. It is idempotent and safe to run
//! concurrently for the same owner: each compaction is guarded by the
//! game's optimistic version, so a losing caller observes the winner's
//! result instead of racing it.

use caissa_core::{
  game::GameState,
  store::{AnalyticsStore, CompactOutcome},
};
use uuid::Uuid;

use crate::{Error, Result, summary::pattern_summary};

/// Retention-window settings.
#[derive(Debug, Clone, Copy)]
pub struct RetentionConfig {
  /// Number of most-recent games kept in full per-ply detail.
  pub window_size: usize,
}

impl Default for RetentionConfig {
  fn default() -> Self { Self { window_size: 60 } }
}

/// Compact every active game of `owner` beyond the window. Returns the
/// number of games this caller compacted (concurrent winners excluded).
///
/// Compaction only reduces detail: the compacted games stay visible to the
/// aggregate engine through their summaries.
pub async fn enforce_window<S: AnalyticsStore>(
  store: &S,
  owner_id: Uuid,
  cfg: &RetentionConfig,
) -> Result<u32> {
  // Newest first, so everything past `window_size` is the oldest overflow.
  let active = store
    .list_games(owner_id, Some(GameState::Active))
    .await
    .map_err(Error::store)?;

  if active.len() <= cfg.window_size {
    return Ok(0);
  }

  let mut compacted = 0u32;
  for game in &active[cfg.window_size..] {
    let facts = store.get_facts(game.game_id).await.map_err(Error::store)?;
    let summary = pattern_summary(game, &facts);

    match store
      .compact_game(game.game_id, summary, game.version)
      .await
      .map_err(Error::store)?
    {
      CompactOutcome::Compacted => {
        compacted += 1;
        tracing::info!(game_id = %game.game_id, %owner_id, "compacted game");
      }
      CompactOutcome::Lost => {
        tracing::debug!(game_id = %game.game_id, "compaction lost to concurrent caller");
      }
    }
  }

  Ok(compacted)
}
