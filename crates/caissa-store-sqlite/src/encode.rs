//! Encoding and decoding helpers between Rust domain types and the
//! plain-text representations stored in SQLite columns.
//!
//! All timestamps are stored as RFC 3339 strings. Structured fields
//! (rating context, pattern summaries, aggregate payloads, candidate
//! lines, string lists) are stored as compact JSON. UUIDs are stored as
//! hyphenated lowercase strings.

use caissa_core::{
  fact::{ErrorClass, Phase, Side},
  game::{GameResult, GameState, PatternSummary, RatingContext, TimeControlClass},
  interaction::{
    CandidateLine, ComponentVersions, ConfidenceLevel, InteractionMode,
  },
};
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Uuid ────────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

// ─── DateTime<Utc> ───────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String { dt.to_rfc3339() }

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

// ─── Game enums ──────────────────────────────────────────────────────────────

pub fn encode_result(r: GameResult) -> &'static str {
  match r {
    GameResult::Win => "win",
    GameResult::Loss => "loss",
    GameResult::Draw => "draw",
  }
}

pub fn decode_result(s: &str) -> Result<GameResult> {
  match s {
    "win" => Ok(GameResult::Win),
    "loss" => Ok(GameResult::Loss),
    "draw" => Ok(GameResult::Draw),
    other => Err(Error::Decode(format!("unknown game result: {other:?}"))),
  }
}

pub fn encode_time_control(tc: TimeControlClass) -> &'static str {
  match tc {
    TimeControlClass::Bullet => "bullet",
    TimeControlClass::Blitz => "blitz",
    TimeControlClass::Rapid => "rapid",
    TimeControlClass::Classical => "classical",
    TimeControlClass::Correspondence => "correspondence",
  }
}

pub fn decode_time_control(s: &str) -> Result<TimeControlClass> {
  match s {
    "bullet" => Ok(TimeControlClass::Bullet),
    "blitz" => Ok(TimeControlClass::Blitz),
    "rapid" => Ok(TimeControlClass::Rapid),
    "classical" => Ok(TimeControlClass::Classical),
    "correspondence" => Ok(TimeControlClass::Correspondence),
    other => Err(Error::Decode(format!("unknown time control: {other:?}"))),
  }
}

pub fn encode_state(s: GameState) -> &'static str {
  match s {
    GameState::Active => "active",
    GameState::Compacted => "compacted",
  }
}

pub fn decode_state(s: &str) -> Result<GameState> {
  match s {
    "active" => Ok(GameState::Active),
    "compacted" => Ok(GameState::Compacted),
    other => Err(Error::Decode(format!("unknown game state: {other:?}"))),
  }
}

// ─── Fact enums ──────────────────────────────────────────────────────────────

pub fn encode_side(s: Side) -> &'static str {
  match s {
    Side::White => "white",
    Side::Black => "black",
  }
}

pub fn decode_side(s: &str) -> Result<Side> {
  match s {
    "white" => Ok(Side::White),
    "black" => Ok(Side::Black),
    other => Err(Error::Decode(format!("unknown side: {other:?}"))),
  }
}

pub fn encode_phase(p: Phase) -> &'static str {
  match p {
    Phase::Opening => "opening",
    Phase::Middlegame => "middlegame",
    Phase::Endgame => "endgame",
  }
}

pub fn decode_phase(s: &str) -> Result<Phase> {
  match s {
    "opening" => Ok(Phase::Opening),
    "middlegame" => Ok(Phase::Middlegame),
    "endgame" => Ok(Phase::Endgame),
    other => Err(Error::Decode(format!("unknown phase: {other:?}"))),
  }
}

pub fn encode_class(c: ErrorClass) -> &'static str {
  match c {
    ErrorClass::None => "none",
    ErrorClass::Inaccuracy => "inaccuracy",
    ErrorClass::Mistake => "mistake",
    ErrorClass::Blunder => "blunder",
  }
}

pub fn decode_class(s: &str) -> Result<ErrorClass> {
  match s {
    "none" => Ok(ErrorClass::None),
    "inaccuracy" => Ok(ErrorClass::Inaccuracy),
    "mistake" => Ok(ErrorClass::Mistake),
    "blunder" => Ok(ErrorClass::Blunder),
    other => Err(Error::Decode(format!("unknown error class: {other:?}"))),
  }
}

// ─── Interaction enums ───────────────────────────────────────────────────────

pub fn encode_mode(m: InteractionMode) -> &'static str {
  match m {
    InteractionMode::Coach => "coach",
    InteractionMode::GameReview => "game_review",
    InteractionMode::PositionChat => "position_chat",
    InteractionMode::OpeningExplorer => "opening_explorer",
  }
}

pub fn decode_mode(s: &str) -> Result<InteractionMode> {
  match s {
    "coach" => Ok(InteractionMode::Coach),
    "game_review" => Ok(InteractionMode::GameReview),
    "position_chat" => Ok(InteractionMode::PositionChat),
    "opening_explorer" => Ok(InteractionMode::OpeningExplorer),
    other => Err(Error::Decode(format!("unknown interaction mode: {other:?}"))),
  }
}

pub fn encode_confidence(c: ConfidenceLevel) -> &'static str {
  match c {
    ConfidenceLevel::Low => "low",
    ConfidenceLevel::Medium => "medium",
    ConfidenceLevel::High => "high",
  }
}

pub fn decode_confidence(s: &str) -> Result<ConfidenceLevel> {
  match s {
    "low" => Ok(ConfidenceLevel::Low),
    "medium" => Ok(ConfidenceLevel::Medium),
    "high" => Ok(ConfidenceLevel::High),
    other => Err(Error::Decode(format!("unknown confidence level: {other:?}"))),
  }
}

// ─── JSON columns ────────────────────────────────────────────────────────────

pub fn encode_rating(r: &RatingContext) -> Result<String> {
  Ok(serde_json::to_string(r)?)
}

pub fn decode_rating(s: &str) -> Result<RatingContext> {
  Ok(serde_json::from_str(s)?)
}

pub fn encode_summary(s: &PatternSummary) -> Result<String> {
  Ok(serde_json::to_string(s)?)
}

pub fn decode_summary(s: &str) -> Result<PatternSummary> {
  Ok(serde_json::from_str(s)?)
}

pub fn encode_versions(v: &ComponentVersions) -> Result<String> {
  Ok(serde_json::to_string(v)?)
}

pub fn decode_versions(s: &str) -> Result<ComponentVersions> {
  Ok(serde_json::from_str(s)?)
}

pub fn encode_candidates(c: &[CandidateLine]) -> Result<String> {
  Ok(serde_json::to_string(c)?)
}

pub fn decode_candidates(s: &str) -> Result<Vec<CandidateLine>> {
  Ok(serde_json::from_str(s)?)
}

pub fn encode_strings(v: &[String]) -> Result<String> {
  Ok(serde_json::to_string(v)?)
}

pub fn decode_strings(s: &str) -> Result<Vec<String>> {
  Ok(serde_json::from_str(s)?)
}

// ─── Row types ───────────────────────────────────────────────────────────────

/// Raw strings read directly from a `games` row.
pub struct RawGame {
  pub game_id:         String,
  pub owner_id:        String,
  pub played_at:       String,
  pub rating_json:     Option<String>,
  pub result:          String,
  pub time_control:    String,
  pub state:           String,
  pub pattern_summary: Option<String>,
  pub version:         i64,
  pub created_at:      String,
}

impl RawGame {
  pub fn into_game(self) -> Result<caissa_core::game::Game> {
    Ok(caissa_core::game::Game {
      game_id:         decode_uuid(&self.game_id)?,
      owner_id:        decode_uuid(&self.owner_id)?,
      played_at:       decode_dt(&self.played_at)?,
      rating:          self.rating_json.as_deref().map(decode_rating).transpose()?,
      result:          decode_result(&self.result)?,
      time_control:    decode_time_control(&self.time_control)?,
      state:           decode_state(&self.state)?,
      pattern_summary: self
        .pattern_summary
        .as_deref()
        .map(decode_summary)
        .transpose()?,
      version:         self.version,
      created_at:      decode_dt(&self.created_at)?,
    })
  }
}

/// Raw strings read from a `move_facts` row; tags are merged in later from
/// the join table.
pub struct RawMoveFact {
  pub fact_id:        String,
  pub game_id:        String,
  pub owner_id:       String,
  pub ply:            i64,
  pub side:           String,
  pub fen_before:     String,
  pub fen_after:      String,
  pub eval_before_cp: i64,
  pub eval_played_cp: i64,
  pub eval_best_cp:   i64,
  pub cp_loss:        i64,
  pub class:          String,
  pub phase:          String,
  pub time_spent_ms:  Option<i64>,
}

impl RawMoveFact {
  pub fn into_fact(self, tags: Vec<String>) -> Result<caissa_core::fact::MoveFact> {
    Ok(caissa_core::fact::MoveFact {
      fact_id:        decode_uuid(&self.fact_id)?,
      game_id:        decode_uuid(&self.game_id)?,
      owner_id:       decode_uuid(&self.owner_id)?,
      ply:            self.ply as u32,
      side:           decode_side(&self.side)?,
      fen_before:     self.fen_before,
      fen_after:      self.fen_after,
      eval_before_cp: self.eval_before_cp,
      eval_played_cp: self.eval_played_cp,
      eval_best_cp:   self.eval_best_cp,
      cp_loss:        self.cp_loss,
      class:          decode_class(&self.class)?,
      phase:          decode_phase(&self.phase)?,
      time_spent_ms:  self.time_spent_ms.map(|v| v as u64),
      tags,
    })
  }
}

/// Raw strings read from an `interactions` row joined against the four
/// facet tables.
pub struct RawInteraction {
  pub interaction_id: String,
  pub owner_id:       Option<String>,
  pub session_id:     String,
  pub mode:           String,
  pub position_fen:   Option<String>,
  pub tools_used:     String,
  pub versions_json:  String,
  pub occurred_at:    String,
  pub deleted:        bool,
  // engine_truths join
  pub et_eval_cp:         Option<i64>,
  pub et_disagreement_cp: Option<i64>,
  pub et_candidates:      Option<String>,
  pub et_tablebase_exact: Option<bool>,
  // reasoning_traces join
  pub rt_fired_tags:    Option<String>,
  pub rt_dominant_tag:  Option<String>,
  pub rt_runner_up_tag: Option<String>,
  pub rt_margin:        Option<f64>,
  // response_metas join
  pub rm_model_identity:       Option<String>,
  pub rm_latency_ms:           Option<i64>,
  pub rm_tokens_in:            Option<i64>,
  pub rm_tokens_out:           Option<i64>,
  pub rm_declared_confidence:  Option<String>,
  pub rm_permitted_confidence: Option<String>,
  pub rm_claim_count:          Option<i64>,
  pub rm_grounded_claim_count: Option<i64>,
  pub rm_asserted_lines:       Option<String>,
  pub rm_mentioned_tags:       Option<String>,
  pub rm_mentions_tradeoff:    Option<bool>,
  pub rm_schema_valid:         Option<bool>,
  // user_behaviors join
  pub ub_time_to_next_action_ms: Option<i64>,
  pub ub_follow_up_count:        Option<i64>,
  pub ub_rapid_follow_up_count:  Option<i64>,
  pub ub_abandoned:              Option<bool>,
  pub ub_takeback_count:         Option<i64>,
}

impl RawInteraction {
  pub fn into_bundle(self) -> Result<caissa_core::interaction::InteractionBundle> {
    use caissa_core::interaction::*;

    let interaction = Interaction {
      interaction_id: decode_uuid(&self.interaction_id)?,
      owner_id:       self.owner_id.as_deref().map(decode_uuid).transpose()?,
      session_id:     decode_uuid(&self.session_id)?,
      mode:           decode_mode(&self.mode)?,
      position_fen:   self.position_fen,
      tools_used:     decode_strings(&self.tools_used)?,
      versions:       decode_versions(&self.versions_json)?,
      occurred_at:    decode_dt(&self.occurred_at)?,
      deleted:        self.deleted,
    };

    let engine_truth = match self.et_eval_cp {
      Some(eval_cp) => Some(EngineTruth {
        eval_cp,
        disagreement_cp: self.et_disagreement_cp,
        candidates:      self
          .et_candidates
          .as_deref()
          .map(decode_candidates)
          .transpose()?
          .unwrap_or_default(),
        tablebase_exact: self.et_tablebase_exact.unwrap_or(false),
      }),
      None => None,
    };

    let reasoning_trace = match self.rt_fired_tags {
      Some(fired) => Some(ReasoningTrace {
        fired_tags:    decode_strings(&fired)?,
        dominant_tag:  self.rt_dominant_tag,
        runner_up_tag: self.rt_runner_up_tag,
        margin:        self.rt_margin,
      }),
      None => None,
    };

    let response_meta = match self.rm_model_identity {
      Some(model_identity) => Some(ResponseMeta {
        model_identity,
        latency_ms:           self.rm_latency_ms.unwrap_or(0) as u64,
        tokens_in:            self.rm_tokens_in.unwrap_or(0) as u32,
        tokens_out:           self.rm_tokens_out.unwrap_or(0) as u32,
        declared_confidence:  decode_confidence(
          self.rm_declared_confidence.as_deref().unwrap_or("low"),
        )?,
        permitted_confidence: decode_confidence(
          self.rm_permitted_confidence.as_deref().unwrap_or("low"),
        )?,
        claim_count:          self.rm_claim_count.unwrap_or(0) as u32,
        grounded_claim_count: self.rm_grounded_claim_count.unwrap_or(0) as u32,
        asserted_lines:       self
          .rm_asserted_lines
          .as_deref()
          .map(decode_strings)
          .transpose()?
          .unwrap_or_default(),
        mentioned_tags:       self
          .rm_mentioned_tags
          .as_deref()
          .map(decode_strings)
          .transpose()?
          .unwrap_or_default(),
        mentions_tradeoff:    self.rm_mentions_tradeoff.unwrap_or(false),
        schema_valid:         self.rm_schema_valid.unwrap_or(true),
      }),
      None => None,
    };

    let user_behavior = match self.ub_follow_up_count {
      Some(follow_up_count) => Some(UserBehavior {
        time_to_next_action_ms: self.ub_time_to_next_action_ms.map(|v| v as u64),
        follow_up_count:        follow_up_count as u32,
        rapid_follow_up_count:  self.ub_rapid_follow_up_count.unwrap_or(0) as u32,
        abandoned:              self.ub_abandoned.unwrap_or(false),
        takeback_count:         self.ub_takeback_count.unwrap_or(0) as u32,
      }),
      None => None,
    };

    Ok(InteractionBundle {
      interaction,
      engine_truth,
      reasoning_trace,
      response_meta,
      user_behavior,
    })
  }
}
