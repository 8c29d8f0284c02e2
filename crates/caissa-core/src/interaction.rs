//! Interaction records — the append-only audit trail of AI-assisted
//! exchanges.
//!
//! One [`Interaction`] is written per user-visible AI response, linked to
//! up to four facet sub-records. Once written, nothing mutates these rows
//! except the two sanctioned privacy operations (anonymize, soft delete).
//! Free text never lives here; it goes to the opt-in, TTL-bounded debug
//! table.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ─── Enums ───────────────────────────────────────────────────────────────────

/// The product surface the exchange happened on.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum InteractionMode {
  Coach,
  GameReview,
  PositionChat,
  OpeningExplorer,
}

/// A declared or permitted confidence level. Ordered: `Low < Medium < High`.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum ConfidenceLevel {
  Low,
  Medium,
  High,
}

// ─── Component versions ──────────────────────────────────────────────────────

/// Version stamps of every component that shaped the response, so any
/// regression can be pinned to a deploy.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentVersions {
  pub prompt:  Option<String>,
  pub router:  Option<String>,
  pub tagger:  Option<String>,
  pub model:   Option<String>,
}

// ─── Core record ─────────────────────────────────────────────────────────────

/// The mandatory core record of one AI-assisted exchange.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Interaction {
  pub interaction_id: Uuid,
  /// Cleared (set to `None`) by the anonymize privacy path.
  pub owner_id:       Option<Uuid>,
  /// Survives anonymization so cohort analysis keeps working.
  pub session_id:     Uuid,
  pub mode:           InteractionMode,
  /// FEN of the position under discussion, if any.
  pub position_fen:   Option<String>,
  /// Names of tools the response path invoked.
  pub tools_used:     Vec<String>,
  pub versions:       ComponentVersions,
  pub occurred_at:    DateTime<Utc>,
  /// Set by the soft-delete privacy path; rows are never removed.
  pub deleted:        bool,
}

// ─── Facet sub-records ───────────────────────────────────────────────────────

/// A candidate line the engine considered best for the position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateLine {
  /// First move of the line in coordinate or SAN form (opaque here).
  pub first_move: String,
  pub eval_cp:    i64,
}

/// Ground-truth engine data captured at response time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineTruth {
  pub eval_cp:           i64,
  /// Gap between the response's asserted evaluation and `eval_cp`, when
  /// the response asserted one.
  pub disagreement_cp:   Option<i64>,
  pub candidates:        Vec<CandidateLine>,
  /// True when the position has an exact tablebase result.
  pub tablebase_exact:   bool,
}

/// Which pattern tags fired while reasoning about the position.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReasoningTrace {
  pub fired_tags:    Vec<String>,
  pub dominant_tag:  Option<String>,
  pub runner_up_tag: Option<String>,
  /// Score margin between dominant and runner-up, in `[0, 1]`.
  pub margin:        Option<f64>,
}

/// Metadata about the generated response itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseMeta {
  pub model_identity:       String,
  pub latency_ms:           u64,
  pub tokens_in:            u32,
  pub tokens_out:           u32,
  pub declared_confidence:  ConfidenceLevel,
  /// The ceiling policy allowed for this response.
  pub permitted_confidence: ConfidenceLevel,
  /// Factual claims (evaluations, lines) the response asserted.
  pub claim_count:          u32,
  /// Claims backed by the engine truth available at response time.
  pub grounded_claim_count: u32,
  /// First moves of lines the response asserted, for grounding checks.
  pub asserted_lines:       Vec<String>,
  pub mentioned_tags:       Vec<String>,
  pub mentions_tradeoff:    bool,
  pub schema_valid:         bool,
}

/// Passive signals about what the user did next.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserBehavior {
  pub time_to_next_action_ms: Option<u64>,
  pub follow_up_count:        u32,
  /// Follow-ups arriving within 60 seconds of the response.
  pub rapid_follow_up_count:  u32,
  pub abandoned:              bool,
  pub takeback_count:         u32,
}

// ─── Bundle ──────────────────────────────────────────────────────────────────

/// A full interaction with whichever facets were recorded. Any facet may be
/// absent; the core record is mandatory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InteractionBundle {
  pub interaction:     Interaction,
  pub engine_truth:    Option<EngineTruth>,
  pub reasoning_trace: Option<ReasoningTrace>,
  pub response_meta:   Option<ResponseMeta>,
  pub user_behavior:   Option<UserBehavior>,
}

/// Input to [`crate::store::AnalyticsStore::record_interaction`].
/// The interaction id and timestamp are assigned by the store.
#[derive(Debug, Clone)]
pub struct NewInteraction {
  pub owner_id:        Uuid,
  pub session_id:      Uuid,
  pub mode:            InteractionMode,
  pub position_fen:    Option<String>,
  pub tools_used:      Vec<String>,
  pub versions:        ComponentVersions,
  pub engine_truth:    Option<EngineTruth>,
  pub reasoning_trace: Option<ReasoningTrace>,
  pub response_meta:   Option<ResponseMeta>,
  pub user_behavior:   Option<UserBehavior>,
}

// ─── Opt-in debug text ───────────────────────────────────────────────────────

/// Raw user/model text for one interaction. Stored only for sessions that
/// explicitly opted in, bounded by a TTL, and hard-deleted on privacy
/// requests.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DebugText {
  pub interaction_id: Uuid,
  pub owner_id:       Uuid,
  pub user_text:      Option<String>,
  pub model_text:     Option<String>,
  pub expires_at:     DateTime<Utc>,
}
