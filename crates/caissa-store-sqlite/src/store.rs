//! [`SqliteStore`] — the SQLite implementation of [`AnalyticsStore`].

use std::path::Path;

use chrono::{DateTime, Utc};
use rusqlite::OptionalExtension as _;
use uuid::Uuid;

use caissa_core::{
  aggregate::{AggregateKind, AggregatePayload, ComputedAggregate},
  fact::{MoveFact, NewMoveFact, Tag},
  game::{Game, GameState, NewGame, PatternSummary},
  goldcase::{BenchmarkResult, GoldCase, NewGoldCase},
  interaction::{DebugText, Interaction, InteractionBundle, NewInteraction},
  store::{
    AnalyticsStore, CompactOutcome, InteractionQuery, KillSwitch, PrivacyReport,
  },
};

use crate::{
  encode::{
    RawGame, RawInteraction, RawMoveFact, decode_dt, decode_uuid,
    encode_candidates, encode_class, encode_confidence, encode_dt, encode_mode,
    encode_phase, encode_rating, encode_result, encode_side, encode_state,
    encode_strings, encode_summary, encode_time_control, encode_uuid,
    encode_versions,
  },
  schema::SCHEMA,
  Error, Result,
};

// ─── Row helpers ─────────────────────────────────────────────────────────────

const GAME_COLUMNS: &str = "game_id, owner_id, played_at, rating_json, result, \
                            time_control, state, pattern_summary, version, \
                            created_at";

const FACT_COLUMNS: &str = "mf.fact_id, mf.game_id, mf.owner_id, mf.ply, \
                            mf.side, mf.fen_before, mf.fen_after, \
                            mf.eval_before_cp, mf.eval_played_cp, \
                            mf.eval_best_cp, mf.cp_loss, mf.class, mf.phase, \
                            mf.time_spent_ms";

const INTERACTION_SELECT: &str = "
  SELECT
    i.interaction_id, i.owner_id, i.session_id, i.mode, i.position_fen,
    i.tools_used, i.versions_json, i.occurred_at, i.deleted,
    et.eval_cp, et.disagreement_cp, et.candidates_json, et.tablebase_exact,
    rt.fired_tags, rt.dominant_tag, rt.runner_up_tag, rt.margin,
    rm.model_identity, rm.latency_ms, rm.tokens_in, rm.tokens_out,
    rm.declared_confidence, rm.permitted_confidence, rm.claim_count,
    rm.grounded_claim_count, rm.asserted_lines, rm.mentioned_tags,
    rm.mentions_tradeoff, rm.schema_valid,
    ub.time_to_next_action_ms, ub.follow_up_count, ub.rapid_follow_up_count,
    ub.abandoned, ub.takeback_count
  FROM interactions i
  LEFT JOIN engine_truths    et ON et.interaction_id = i.interaction_id
  LEFT JOIN reasoning_traces rt ON rt.interaction_id = i.interaction_id
  LEFT JOIN response_metas   rm ON rm.interaction_id = i.interaction_id
  LEFT JOIN user_behaviors   ub ON ub.interaction_id = i.interaction_id";

fn game_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawGame> {
  Ok(RawGame {
    game_id:         row.get(0)?,
    owner_id:        row.get(1)?,
    played_at:       row.get(2)?,
    rating_json:     row.get(3)?,
    result:          row.get(4)?,
    time_control:    row.get(5)?,
    state:           row.get(6)?,
    pattern_summary: row.get(7)?,
    version:         row.get(8)?,
    created_at:      row.get(9)?,
  })
}

fn fact_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawMoveFact> {
  Ok(RawMoveFact {
    fact_id:        row.get(0)?,
    game_id:        row.get(1)?,
    owner_id:       row.get(2)?,
    ply:            row.get(3)?,
    side:           row.get(4)?,
    fen_before:     row.get(5)?,
    fen_after:      row.get(6)?,
    eval_before_cp: row.get(7)?,
    eval_played_cp: row.get(8)?,
    eval_best_cp:   row.get(9)?,
    cp_loss:        row.get(10)?,
    class:          row.get(11)?,
    phase:          row.get(12)?,
    time_spent_ms:  row.get(13)?,
  })
}

fn interaction_from_row(
  row: &rusqlite::Row<'_>,
) -> rusqlite::Result<RawInteraction> {
  Ok(RawInteraction {
    interaction_id: row.get(0)?,
    owner_id:       row.get(1)?,
    session_id:     row.get(2)?,
    mode:           row.get(3)?,
    position_fen:   row.get(4)?,
    tools_used:     row.get(5)?,
    versions_json:  row.get(6)?,
    occurred_at:    row.get(7)?,
    deleted:        row.get(8)?,

    et_eval_cp:         row.get(9)?,
    et_disagreement_cp: row.get(10)?,
    et_candidates:      row.get(11)?,
    et_tablebase_exact: row.get(12)?,

    rt_fired_tags:    row.get(13)?,
    rt_dominant_tag:  row.get(14)?,
    rt_runner_up_tag: row.get(15)?,
    rt_margin:        row.get(16)?,

    rm_model_identity:       row.get(17)?,
    rm_latency_ms:           row.get(18)?,
    rm_tokens_in:            row.get(19)?,
    rm_tokens_out:           row.get(20)?,
    rm_declared_confidence:  row.get(21)?,
    rm_permitted_confidence: row.get(22)?,
    rm_claim_count:          row.get(23)?,
    rm_grounded_claim_count: row.get(24)?,
    rm_asserted_lines:       row.get(25)?,
    rm_mentioned_tags:       row.get(26)?,
    rm_mentions_tradeoff:    row.get(27)?,
    rm_schema_valid:         row.get(28)?,

    ub_time_to_next_action_ms: row.get(29)?,
    ub_follow_up_count:        row.get(30)?,
    ub_rapid_follow_up_count:  row.get(31)?,
    ub_abandoned:              row.get(32)?,
    ub_takeback_count:         row.get(33)?,
  })
}

/// Read the tags of one fact, lexically ordered.
fn tags_for_fact(
  conn: &rusqlite::Connection,
  fact_id: &str,
) -> rusqlite::Result<Vec<String>> {
  let mut stmt = conn.prepare_cached(
    "SELECT t.name FROM move_fact_tags mft
     JOIN tags t ON t.tag_id = mft.tag_id
     WHERE mft.fact_id = ?1
     ORDER BY t.name",
  )?;
  stmt
    .query_map(rusqlite::params![fact_id], |row| row.get(0))?
    .collect()
}

/// A pre-encoded `move_facts` row ready for insertion.
struct FactInsertRow {
  fact_id:        String,
  ply:            i64,
  side:           String,
  fen_before:     String,
  fen_after:      String,
  eval_before_cp: i64,
  eval_played_cp: i64,
  eval_best_cp:   i64,
  cp_loss:        i64,
  class:          String,
  phase:          String,
  time_spent_ms:  Option<i64>,
  tags:           Vec<String>,
}

/// The in-transaction result of a fact-set replacement.
enum ReplaceCheck {
  Missing,
  Compacted,
  /// The owning user's id, read from the game row.
  Written(String),
}

// ─── Store ───────────────────────────────────────────────────────────────────

/// A Caissa analytics store backed by a single SQLite file.
///
/// Cloning is cheap — the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store — useful for testing.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  /// Run an arbitrary statement against the raw connection. Exists so tests
  /// can prove the append-only triggers fire on statements the repository
  /// layer never issues.
  #[cfg(test)]
  pub(crate) async fn raw_execute(&self, sql: String) -> Result<usize> {
    let affected = self
      .conn
      .call(move |conn| Ok(conn.execute(&sql, [])?))
      .await?;
    Ok(affected)
  }
}

// ─── AnalyticsStore impl ─────────────────────────────────────────────────────

impl AnalyticsStore for SqliteStore {
  type Error = Error;

  // ── Games ─────────────────────────────────────────────────────────────────

  async fn add_game(&self, input: NewGame) -> Result<Game> {
    let game = Game {
      game_id:         Uuid::new_v4(),
      owner_id:        input.owner_id,
      played_at:       input.played_at,
      rating:          input.rating,
      result:          input.result,
      time_control:    input.time_control,
      state:           GameState::Active,
      pattern_summary: None,
      version:         1,
      created_at:      Utc::now(),
    };

    let id_str     = encode_uuid(game.game_id);
    let owner_str  = encode_uuid(game.owner_id);
    let played_str = encode_dt(game.played_at);
    let rating_str = game.rating.as_ref().map(encode_rating).transpose()?;
    let result_str = encode_result(game.result).to_owned();
    let tc_str     = encode_time_control(game.time_control).to_owned();
    let state_str  = encode_state(game.state).to_owned();
    let at_str     = encode_dt(game.created_at);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO games (
             game_id, owner_id, played_at, rating_json, result,
             time_control, state, pattern_summary, version, created_at
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, NULL, 1, ?8)",
          rusqlite::params![
            id_str, owner_str, played_str, rating_str, result_str, tc_str,
            state_str, at_str,
          ],
        )?;
        Ok(())
      })
      .await?;

    Ok(game)
  }

  async fn get_game(&self, game_id: Uuid) -> Result<Option<Game>> {
    let id_str = encode_uuid(game_id);

    let raw: Option<RawGame> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!("SELECT {GAME_COLUMNS} FROM games WHERE game_id = ?1"),
              rusqlite::params![id_str],
              game_from_row,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawGame::into_game).transpose()
  }

  async fn list_games(
    &self,
    owner_id: Uuid,
    state: Option<GameState>,
  ) -> Result<Vec<Game>> {
    let owner_str = encode_uuid(owner_id);
    let state_str = state.map(encode_state).map(str::to_owned);

    let raws: Vec<RawGame> = self
      .conn
      .call(move |conn| {
        let rows = if let Some(s) = state_str {
          let mut stmt = conn.prepare(&format!(
            "SELECT {GAME_COLUMNS} FROM games
             WHERE owner_id = ?1 AND state = ?2
             ORDER BY played_at DESC"
          ))?;
          stmt
            .query_map(rusqlite::params![owner_str, s], game_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?
        } else {
          let mut stmt = conn.prepare(&format!(
            "SELECT {GAME_COLUMNS} FROM games
             WHERE owner_id = ?1
             ORDER BY played_at DESC"
          ))?;
          stmt
            .query_map(rusqlite::params![owner_str], game_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?
        };
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawGame::into_game).collect()
  }

  // ── Move facts ────────────────────────────────────────────────────────────

  async fn replace_facts(
    &self,
    game_id: Uuid,
    facts: Vec<NewMoveFact>,
  ) -> Result<Vec<MoveFact>> {
    let fact_ids: Vec<Uuid> = facts.iter().map(|_| Uuid::new_v4()).collect();
    let rows: Vec<FactInsertRow> = facts
      .iter()
      .zip(&fact_ids)
      .map(|(f, id)| FactInsertRow {
        fact_id:        encode_uuid(*id),
        ply:            f.ply as i64,
        side:           encode_side(f.side).to_owned(),
        fen_before:     f.fen_before.clone(),
        fen_after:      f.fen_after.clone(),
        eval_before_cp: f.eval_before_cp,
        eval_played_cp: f.eval_played_cp,
        eval_best_cp:   f.eval_best_cp,
        cp_loss:        f.cp_loss,
        class:          encode_class(f.class).to_owned(),
        phase:          encode_phase(f.phase).to_owned(),
        time_spent_ms:  f.time_spent_ms.map(|v| v as i64),
        tags:           f.tags.clone(),
      })
      .collect();

    let gid = encode_uuid(game_id);
    let check: ReplaceCheck = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;

        let game: Option<(String, String)> = tx
          .query_row(
            "SELECT owner_id, state FROM games WHERE game_id = ?1",
            rusqlite::params![gid],
            |row| Ok((row.get(0)?, row.get(1)?)),
          )
          .optional()?;

        let owner_str = match game {
          None => return Ok(ReplaceCheck::Missing),
          Some((_, state)) if state != "active" => {
            return Ok(ReplaceCheck::Compacted);
          }
          Some((owner, _)) => owner,
        };

        // Old set out, new set in; join rows cascade with their facts.
        tx.execute(
          "DELETE FROM move_facts WHERE game_id = ?1",
          rusqlite::params![gid],
        )?;

        {
          let mut insert_fact = tx.prepare(
            "INSERT INTO move_facts (
               fact_id, game_id, owner_id, ply, side, fen_before, fen_after,
               eval_before_cp, eval_played_cp, eval_best_cp, cp_loss,
               class, phase, time_spent_ms
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12,
                       ?13, ?14)",
          )?;
          let mut insert_tag =
            tx.prepare("INSERT OR IGNORE INTO tags (name) VALUES (?1)")?;
          let mut insert_join = tx.prepare(
            "INSERT INTO move_fact_tags (fact_id, tag_id)
             SELECT ?1, tag_id FROM tags WHERE name = ?2",
          )?;

          for row in &rows {
            insert_fact.execute(rusqlite::params![
              row.fact_id,
              gid,
              owner_str,
              row.ply,
              row.side,
              row.fen_before,
              row.fen_after,
              row.eval_before_cp,
              row.eval_played_cp,
              row.eval_best_cp,
              row.cp_loss,
              row.class,
              row.phase,
              row.time_spent_ms,
            ])?;
            for tag in &row.tags {
              insert_tag.execute(rusqlite::params![tag])?;
              insert_join.execute(rusqlite::params![row.fact_id, tag])?;
            }
          }
        }

        tx.commit()?;
        Ok(ReplaceCheck::Written(owner_str))
      })
      .await?;

    let owner_id = match check {
      ReplaceCheck::Missing => return Err(Error::GameNotFound(game_id)),
      ReplaceCheck::Compacted => return Err(Error::AlreadyCompacted(game_id)),
      ReplaceCheck::Written(owner_str) => decode_uuid(&owner_str)?,
    };

    Ok(
      facts
        .into_iter()
        .zip(fact_ids)
        .map(|(f, fact_id)| MoveFact {
          fact_id,
          game_id,
          owner_id,
          ply: f.ply,
          side: f.side,
          fen_before: f.fen_before,
          fen_after: f.fen_after,
          eval_before_cp: f.eval_before_cp,
          eval_played_cp: f.eval_played_cp,
          eval_best_cp: f.eval_best_cp,
          cp_loss: f.cp_loss,
          class: f.class,
          phase: f.phase,
          time_spent_ms: f.time_spent_ms,
          tags: f.tags,
        })
        .collect(),
    )
  }

  async fn get_facts(&self, game_id: Uuid) -> Result<Vec<MoveFact>> {
    let id_str = encode_uuid(game_id);

    let raws: Vec<(RawMoveFact, Vec<String>)> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {FACT_COLUMNS} FROM move_facts mf
           WHERE mf.game_id = ?1
           ORDER BY mf.ply"
        ))?;
        let raws = stmt
          .query_map(rusqlite::params![id_str], fact_from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;

        let mut out = Vec::with_capacity(raws.len());
        for raw in raws {
          let tags = tags_for_fact(conn, &raw.fact_id)?;
          out.push((raw, tags));
        }
        Ok(out)
      })
      .await?;

    raws
      .into_iter()
      .map(|(raw, tags)| raw.into_fact(tags))
      .collect()
  }

  async fn get_active_facts(&self, owner_id: Uuid) -> Result<Vec<MoveFact>> {
    let owner_str = encode_uuid(owner_id);

    let raws: Vec<(RawMoveFact, Vec<String>)> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {FACT_COLUMNS} FROM move_facts mf
           JOIN games g ON g.game_id = mf.game_id
           WHERE g.owner_id = ?1 AND g.state = 'active'
           ORDER BY g.played_at DESC, mf.ply"
        ))?;
        let raws = stmt
          .query_map(rusqlite::params![owner_str], fact_from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;

        let mut out = Vec::with_capacity(raws.len());
        for raw in raws {
          let tags = tags_for_fact(conn, &raw.fact_id)?;
          out.push((raw, tags));
        }
        Ok(out)
      })
      .await?;

    raws
      .into_iter()
      .map(|(raw, tags)| raw.into_fact(tags))
      .collect()
  }

  async fn list_tags(&self) -> Result<Vec<Tag>> {
    let tags: Vec<Tag> = self
      .conn
      .call(|conn| {
        let mut stmt =
          conn.prepare("SELECT tag_id, name FROM tags ORDER BY name")?;
        let rows = stmt
          .query_map([], |row| {
            Ok(Tag { tag_id: row.get(0)?, name: row.get(1)? })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;
    Ok(tags)
  }

  // ── Retention ─────────────────────────────────────────────────────────────

  async fn compact_game(
    &self,
    game_id: Uuid,
    summary: PatternSummary,
    expected_version: i64,
  ) -> Result<CompactOutcome> {
    let id_str       = encode_uuid(game_id);
    let summary_json = encode_summary(&summary)?;

    let won: bool = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;

        // The version guard is the whole concurrency story: a stale caller
        // matches zero rows and walks away with nothing changed.
        let updated = tx.execute(
          "UPDATE games
           SET state = 'compacted', pattern_summary = ?1, version = version + 1
           WHERE game_id = ?2 AND version = ?3 AND state = 'active'",
          rusqlite::params![summary_json, id_str, expected_version],
        )?;

        if updated == 0 {
          return Ok(false);
        }

        tx.execute(
          "DELETE FROM move_facts WHERE game_id = ?1",
          rusqlite::params![id_str],
        )?;

        tx.commit()?;
        Ok(true)
      })
      .await?;

    Ok(if won { CompactOutcome::Compacted } else { CompactOutcome::Lost })
  }

  // ── Aggregates ────────────────────────────────────────────────────────────

  async fn get_aggregate(
    &self,
    owner_id: Uuid,
    kind: AggregateKind,
  ) -> Result<Option<ComputedAggregate>> {
    let owner_str = encode_uuid(owner_id);
    let kind_str  = kind.discriminant().to_owned();

    let row: Option<(String, i64, String, bool)> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT payload_json, input_game_count, computed_at,
                      needs_recompute
               FROM computed_aggregates
               WHERE owner_id = ?1 AND kind = ?2",
              rusqlite::params![owner_str, kind_str],
              |row| {
                Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
              },
            )
            .optional()?,
        )
      })
      .await?;

    let Some((payload_json, input_game_count, computed_at, needs_recompute)) =
      row
    else {
      return Ok(None);
    };

    let data: serde_json::Value = serde_json::from_str(&payload_json)?;
    let payload = AggregatePayload::from_parts(kind.discriminant(), data)?;

    Ok(Some(ComputedAggregate {
      owner_id,
      payload,
      input_game_count: input_game_count as u32,
      computed_at: decode_dt(&computed_at)?,
      needs_recompute,
    }))
  }

  async fn put_aggregate(
    &self,
    owner_id: Uuid,
    payload: AggregatePayload,
    input_game_count: u32,
  ) -> Result<ComputedAggregate> {
    let computed_at = Utc::now();

    let owner_str    = encode_uuid(owner_id);
    let kind_str     = payload.kind().discriminant().to_owned();
    let payload_json = payload.to_json()?.to_string();
    let at_str       = encode_dt(computed_at);
    let count        = input_game_count as i64;

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO computed_aggregates (
             owner_id, kind, payload_json, input_game_count, computed_at,
             needs_recompute
           ) VALUES (?1, ?2, ?3, ?4, ?5, 0)
           ON CONFLICT (owner_id, kind) DO UPDATE SET
             payload_json     = excluded.payload_json,
             input_game_count = excluded.input_game_count,
             computed_at      = excluded.computed_at,
             needs_recompute  = 0",
          rusqlite::params![owner_str, kind_str, payload_json, count, at_str],
        )?;
        Ok(())
      })
      .await?;

    Ok(ComputedAggregate {
      owner_id,
      payload,
      input_game_count,
      computed_at,
      needs_recompute: false,
    })
  }

  async fn invalidate_aggregates(&self, owner_id: Uuid) -> Result<()> {
    let owner_str = encode_uuid(owner_id);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "UPDATE computed_aggregates SET needs_recompute = 1
           WHERE owner_id = ?1",
          rusqlite::params![owner_str],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  // ── Interactions — append-only ────────────────────────────────────────────

  async fn record_interaction(
    &self,
    input: NewInteraction,
  ) -> Result<InteractionBundle> {
    let bundle = InteractionBundle {
      interaction:     Interaction {
        interaction_id: Uuid::new_v4(),
        owner_id:       Some(input.owner_id),
        session_id:     input.session_id,
        mode:           input.mode,
        position_fen:   input.position_fen,
        tools_used:     input.tools_used,
        versions:       input.versions,
        occurred_at:    Utc::now(),
        deleted:        false,
      },
      engine_truth:    input.engine_truth,
      reasoning_trace: input.reasoning_trace,
      response_meta:   input.response_meta,
      user_behavior:   input.user_behavior,
    };

    let i = &bundle.interaction;
    let id_str       = encode_uuid(i.interaction_id);
    let owner_str    = i.owner_id.map(encode_uuid);
    let session_str  = encode_uuid(i.session_id);
    let mode_str     = encode_mode(i.mode).to_owned();
    let fen          = i.position_fen.clone();
    let tools_str    = encode_strings(&i.tools_used)?;
    let versions_str = encode_versions(&i.versions)?;
    let at_str       = encode_dt(i.occurred_at);

    let et = bundle
      .engine_truth
      .as_ref()
      .map(|et| -> Result<_> {
        Ok((
          et.eval_cp,
          et.disagreement_cp,
          encode_candidates(&et.candidates)?,
          et.tablebase_exact,
        ))
      })
      .transpose()?;

    let rt = bundle
      .reasoning_trace
      .as_ref()
      .map(|rt| -> Result<_> {
        Ok((
          encode_strings(&rt.fired_tags)?,
          rt.dominant_tag.clone(),
          rt.runner_up_tag.clone(),
          rt.margin,
        ))
      })
      .transpose()?;

    let rm = bundle
      .response_meta
      .as_ref()
      .map(|rm| -> Result<_> {
        Ok((
          rm.model_identity.clone(),
          rm.latency_ms as i64,
          rm.tokens_in as i64,
          rm.tokens_out as i64,
          encode_confidence(rm.declared_confidence).to_owned(),
          encode_confidence(rm.permitted_confidence).to_owned(),
          rm.claim_count as i64,
          rm.grounded_claim_count as i64,
          encode_strings(&rm.asserted_lines)?,
          encode_strings(&rm.mentioned_tags)?,
          rm.mentions_tradeoff,
          rm.schema_valid,
        ))
      })
      .transpose()?;

    let ub = bundle.user_behavior.as_ref().map(|ub| {
      (
        ub.time_to_next_action_ms.map(|v| v as i64),
        ub.follow_up_count as i64,
        ub.rapid_follow_up_count as i64,
        ub.abandoned,
        ub.takeback_count as i64,
      )
    });

    self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;

        tx.execute(
          "INSERT INTO interactions (
             interaction_id, owner_id, session_id, mode, position_fen,
             tools_used, versions_json, occurred_at, deleted
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, 0)",
          rusqlite::params![
            id_str, owner_str, session_str, mode_str, fen, tools_str,
            versions_str, at_str,
          ],
        )?;

        if let Some((eval_cp, disagreement_cp, candidates, tablebase)) = et {
          tx.execute(
            "INSERT INTO engine_truths (
               interaction_id, eval_cp, disagreement_cp, candidates_json,
               tablebase_exact
             ) VALUES (?1, ?2, ?3, ?4, ?5)",
            rusqlite::params![
              id_str, eval_cp, disagreement_cp, candidates, tablebase,
            ],
          )?;
        }

        if let Some((fired, dominant, runner_up, margin)) = rt {
          tx.execute(
            "INSERT INTO reasoning_traces (
               interaction_id, fired_tags, dominant_tag, runner_up_tag, margin
             ) VALUES (?1, ?2, ?3, ?4, ?5)",
            rusqlite::params![id_str, fired, dominant, runner_up, margin],
          )?;
        }

        if let Some((
          model, latency, tokens_in, tokens_out, declared, permitted, claims,
          grounded, lines, mentioned, tradeoff, schema_valid,
        )) = rm
        {
          tx.execute(
            "INSERT INTO response_metas (
               interaction_id, model_identity, latency_ms, tokens_in,
               tokens_out, declared_confidence, permitted_confidence,
               claim_count, grounded_claim_count, asserted_lines,
               mentioned_tags, mentions_tradeoff, schema_valid
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12,
                       ?13)",
            rusqlite::params![
              id_str, model, latency, tokens_in, tokens_out, declared,
              permitted, claims, grounded, lines, mentioned, tradeoff,
              schema_valid,
            ],
          )?;
        }

        if let Some((next_action, follow_ups, rapid, abandoned, takebacks)) = ub
        {
          tx.execute(
            "INSERT INTO user_behaviors (
               interaction_id, time_to_next_action_ms, follow_up_count,
               rapid_follow_up_count, abandoned, takeback_count
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            rusqlite::params![
              id_str, next_action, follow_ups, rapid, abandoned, takebacks,
            ],
          )?;
        }

        tx.commit()?;
        Ok(())
      })
      .await?;

    Ok(bundle)
  }

  async fn get_interaction(
    &self,
    interaction_id: Uuid,
  ) -> Result<Option<InteractionBundle>> {
    let id_str = encode_uuid(interaction_id);

    let raw: Option<RawInteraction> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!("{INTERACTION_SELECT} WHERE i.interaction_id = ?1"),
              rusqlite::params![id_str],
              interaction_from_row,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawInteraction::into_bundle).transpose()
  }

  async fn list_interactions(
    &self,
    query: &InteractionQuery,
  ) -> Result<Vec<InteractionBundle>> {
    let mut conditions: Vec<&'static str> = Vec::new();
    let mut values: Vec<rusqlite::types::Value> = Vec::new();

    if let Some(owner) = query.owner_id {
      conditions.push("i.owner_id = ?");
      values.push(encode_uuid(owner).into());
    }
    if let Some(session) = query.session_id {
      conditions.push("i.session_id = ?");
      values.push(encode_uuid(session).into());
    }
    if let Some(after) = query.occurred_after {
      conditions.push("i.occurred_at >= ?");
      values.push(encode_dt(after).into());
    }
    if let Some(before) = query.occurred_before {
      conditions.push("i.occurred_at < ?");
      values.push(encode_dt(before).into());
    }
    if !query.include_deleted {
      conditions.push("i.deleted = 0");
    }

    let mut sql = INTERACTION_SELECT.to_owned();
    if !conditions.is_empty() {
      sql.push_str(" WHERE ");
      sql.push_str(&conditions.join(" AND "));
    }
    sql.push_str(" ORDER BY i.occurred_at DESC");
    if let Some(limit) = query.limit {
      sql.push_str(" LIMIT ?");
      values.push((limit as i64).into());
    }

    let raws: Vec<RawInteraction> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map(
            rusqlite::params_from_iter(values),
            interaction_from_row,
          )?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawInteraction::into_bundle).collect()
  }

  // ── Privacy ───────────────────────────────────────────────────────────────

  async fn anonymize(&self, owner_id: Uuid) -> Result<u32> {
    let owner_str = encode_uuid(owner_id);

    // The guarded-update trigger admits exactly this column.
    let touched = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "UPDATE interactions SET owner_id = NULL WHERE owner_id = ?1",
          rusqlite::params![owner_str],
        )?)
      })
      .await?;

    Ok(touched as u32)
  }

  async fn delete_all(&self, owner_id: Uuid) -> Result<PrivacyReport> {
    let owner_str = encode_uuid(owner_id);

    let report = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;

        let soft_deleted = tx.execute(
          "UPDATE interactions SET deleted = 1
           WHERE owner_id = ?1 AND deleted = 0",
          rusqlite::params![owner_str],
        )?;
        let texts = tx.execute(
          "DELETE FROM debug_texts WHERE owner_id = ?1",
          rusqlite::params![owner_str],
        )?;
        let sessions = tx.execute(
          "DELETE FROM debug_sessions WHERE owner_id = ?1",
          rusqlite::params![owner_str],
        )?;

        tx.commit()?;
        Ok(PrivacyReport {
          interactions_soft_deleted: soft_deleted as u32,
          debug_texts_purged:        texts as u32,
          debug_sessions_purged:     sessions as u32,
        })
      })
      .await?;

    Ok(report)
  }

  // ── Opt-in debug text ─────────────────────────────────────────────────────

  async fn set_debug_session(
    &self,
    session_id: Uuid,
    owner_id: Uuid,
  ) -> Result<()> {
    let session_str = encode_uuid(session_id);
    let owner_str   = encode_uuid(owner_id);
    let at_str      = encode_dt(Utc::now());

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT OR IGNORE INTO debug_sessions (session_id, owner_id,
             created_at)
           VALUES (?1, ?2, ?3)",
          rusqlite::params![session_str, owner_str, at_str],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn is_debug_session(&self, session_id: Uuid) -> Result<bool> {
    let session_str = encode_uuid(session_id);

    let opted_in = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT 1 FROM debug_sessions WHERE session_id = ?1",
              rusqlite::params![session_str],
              |_| Ok(true),
            )
            .optional()?
            .unwrap_or(false),
        )
      })
      .await?;
    Ok(opted_in)
  }

  async fn put_debug_text(&self, text: DebugText) -> Result<()> {
    let id_str      = encode_uuid(text.interaction_id);
    let owner_str   = encode_uuid(text.owner_id);
    let expires_str = encode_dt(text.expires_at);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT OR REPLACE INTO debug_texts (
             interaction_id, owner_id, user_text, model_text, expires_at
           ) VALUES (?1, ?2, ?3, ?4, ?5)",
          rusqlite::params![
            id_str, owner_str, text.user_text, text.model_text, expires_str,
          ],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn purge_expired_debug_text(&self, now: DateTime<Utc>) -> Result<u32> {
    let now_str = encode_dt(now);

    let purged = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "DELETE FROM debug_texts WHERE expires_at <= ?1",
          rusqlite::params![now_str],
        )?)
      })
      .await?;
    Ok(purged as u32)
  }

  // ── Kill switches ─────────────────────────────────────────────────────────

  async fn get_flag(&self, name: &str) -> Result<Option<KillSwitch>> {
    let name_owned = name.to_owned();

    let row: Option<(String, bool, String)> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT name, enabled, updated_at FROM flags WHERE name = ?1",
              rusqlite::params![name_owned],
              |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .optional()?,
        )
      })
      .await?;

    row
      .map(|(name, enabled, updated_at)| {
        Ok(KillSwitch { name, enabled, updated_at: decode_dt(&updated_at)? })
      })
      .transpose()
  }

  async fn set_flag(&self, name: &str, enabled: bool) -> Result<KillSwitch> {
    let flag = KillSwitch {
      name:       name.to_owned(),
      enabled,
      updated_at: Utc::now(),
    };

    let name_owned = flag.name.clone();
    let at_str     = encode_dt(flag.updated_at);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO flags (name, enabled, updated_at) VALUES (?1, ?2, ?3)
           ON CONFLICT (name) DO UPDATE SET
             enabled    = excluded.enabled,
             updated_at = excluded.updated_at",
          rusqlite::params![name_owned, enabled, at_str],
        )?;
        Ok(())
      })
      .await?;

    Ok(flag)
  }

  // ── Gold set ──────────────────────────────────────────────────────────────

  async fn add_gold_case(&self, input: NewGoldCase) -> Result<GoldCase> {
    let case = GoldCase {
      case_id:    Uuid::new_v4(),
      fen:        input.fen,
      best_move:  input.best_move,
      worst_move: input.worst_move,
      eval_cp:    input.eval_cp,
      note:       input.note,
      created_at: Utc::now(),
    };

    let id_str = encode_uuid(case.case_id);
    let fen        = case.fen.clone();
    let best_move  = case.best_move.clone();
    let worst_move = case.worst_move.clone();
    let eval_cp    = case.eval_cp;
    let note       = case.note.clone();
    let at_str     = encode_dt(case.created_at);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO gold_cases (
             case_id, fen, best_move, worst_move, eval_cp, note, created_at
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
          rusqlite::params![
            id_str, fen, best_move, worst_move, eval_cp, note, at_str,
          ],
        )?;
        Ok(())
      })
      .await?;

    Ok(case)
  }

  async fn list_gold_cases(&self) -> Result<Vec<GoldCase>> {
    let rows: Vec<(String, String, String, String, i64, Option<String>, String)> =
      self
        .conn
        .call(|conn| {
          let mut stmt = conn.prepare(
            "SELECT case_id, fen, best_move, worst_move, eval_cp, note,
                    created_at
             FROM gold_cases ORDER BY created_at",
          )?;
          let rows = stmt
            .query_map([], |row| {
              Ok((
                row.get(0)?,
                row.get(1)?,
                row.get(2)?,
                row.get(3)?,
                row.get(4)?,
                row.get(5)?,
                row.get(6)?,
              ))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
          Ok(rows)
        })
        .await?;

    rows
      .into_iter()
      .map(|(case_id, fen, best_move, worst_move, eval_cp, note, created_at)| {
        Ok(GoldCase {
          case_id: decode_uuid(&case_id)?,
          fen,
          best_move,
          worst_move,
          eval_cp,
          note,
          created_at: decode_dt(&created_at)?,
        })
      })
      .collect()
  }

  async fn record_benchmark_result(
    &self,
    case_id: Uuid,
    model_identity: String,
    matched: bool,
    eval_error_cp: Option<i64>,
  ) -> Result<BenchmarkResult> {
    let result = BenchmarkResult {
      result_id: Uuid::new_v4(),
      case_id,
      model_identity,
      matched,
      eval_error_cp,
      run_at: Utc::now(),
    };

    let result_id_str = encode_uuid(result.result_id);
    let case_id_str   = encode_uuid(case_id);
    let model         = result.model_identity.clone();
    let at_str        = encode_dt(result.run_at);

    let case_exists = self
      .conn
      .call(move |conn| {
        let exists: bool = conn
          .query_row(
            "SELECT 1 FROM gold_cases WHERE case_id = ?1",
            rusqlite::params![case_id_str],
            |_| Ok(true),
          )
          .optional()?
          .unwrap_or(false);

        if !exists {
          return Ok(false);
        }

        conn.execute(
          "INSERT INTO benchmark_results (
             result_id, case_id, model_identity, matched, eval_error_cp, run_at
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
          rusqlite::params![
            result_id_str, case_id_str, model, matched, eval_error_cp, at_str,
          ],
        )?;
        Ok(true)
      })
      .await?;

    if !case_exists {
      return Err(Error::GoldCaseNotFound(case_id));
    }

    Ok(result)
  }

  async fn list_benchmark_results(
    &self,
    model_identity: &str,
  ) -> Result<Vec<BenchmarkResult>> {
    let model = model_identity.to_owned();

    let rows: Vec<(String, String, String, bool, Option<i64>, String)> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT result_id, case_id, model_identity, matched, eval_error_cp,
                  run_at
           FROM benchmark_results
           WHERE model_identity = ?1
           ORDER BY run_at DESC",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![model], |row| {
            Ok((
              row.get(0)?,
              row.get(1)?,
              row.get(2)?,
              row.get(3)?,
              row.get(4)?,
              row.get(5)?,
            ))
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    rows
      .into_iter()
      .map(|(result_id, case_id, model_identity, matched, eval_error_cp, run_at)| {
        Ok(BenchmarkResult {
          result_id: decode_uuid(&result_id)?,
          case_id: decode_uuid(&case_id)?,
          model_identity,
          matched,
          eval_error_cp,
          run_at: decode_dt(&run_at)?,
        })
      })
      .collect()
  }
}
