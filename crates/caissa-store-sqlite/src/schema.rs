//! SQL schema for the Caissa SQLite store.
//!
//! Executed once at connection startup. The interaction log and its facet
//! tables carry append-only triggers: the repository layer never issues
//! forbidden statements, and the triggers reject them at the storage level
//! if anything else does. The only UPDATE the `interactions` trigger
//! admits is the sanctioned privacy pair (`owner_id`, `deleted`).

/// Full schema DDL; idempotent thanks to `CREATE ... IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

-- One row per played match. `version` is the optimistic-concurrency token
-- bumped by compaction; the CHECK pins the active/compacted invariant.
CREATE TABLE IF NOT EXISTS games (
    game_id         TEXT PRIMARY KEY,
    owner_id        TEXT NOT NULL,
    played_at       TEXT NOT NULL,   -- ISO 8601 UTC
    rating_json     TEXT,            -- JSON RatingContext or NULL
    result          TEXT NOT NULL,   -- 'win' | 'loss' | 'draw'
    time_control    TEXT NOT NULL,
    state           TEXT NOT NULL DEFAULT 'active',
    pattern_summary TEXT,            -- JSON; set exactly when compacted
    version         INTEGER NOT NULL DEFAULT 1,
    created_at      TEXT NOT NULL,
    CHECK ((state = 'active'    AND pattern_summary IS NULL)
        OR (state = 'compacted' AND pattern_summary IS NOT NULL))
);

-- Exactly one fact per (game, ply). Facts are replaced as a whole set per
-- game, never updated individually.
CREATE TABLE IF NOT EXISTS move_facts (
    fact_id        TEXT PRIMARY KEY,
    game_id        TEXT NOT NULL REFERENCES games(game_id),
    owner_id       TEXT NOT NULL,
    ply            INTEGER NOT NULL,
    side           TEXT NOT NULL,
    fen_before     TEXT NOT NULL,
    fen_after      TEXT NOT NULL,
    eval_before_cp INTEGER NOT NULL,
    eval_played_cp INTEGER NOT NULL,
    eval_best_cp   INTEGER NOT NULL,
    cp_loss        INTEGER NOT NULL,
    class          TEXT NOT NULL,
    phase          TEXT NOT NULL,
    time_spent_ms  INTEGER,
    UNIQUE (game_id, ply)
);

-- Deduplicated pattern-label vocabulary, populated lazily.
CREATE TABLE IF NOT EXISTS tags (
    tag_id INTEGER PRIMARY KEY,
    name   TEXT NOT NULL UNIQUE
);

CREATE TABLE IF NOT EXISTS move_fact_tags (
    fact_id TEXT NOT NULL REFERENCES move_facts(fact_id) ON DELETE CASCADE,
    tag_id  INTEGER NOT NULL REFERENCES tags(tag_id),
    PRIMARY KEY (fact_id, tag_id)
);

-- One cached document per owner per aggregate kind.
CREATE TABLE IF NOT EXISTS computed_aggregates (
    owner_id         TEXT NOT NULL,
    kind             TEXT NOT NULL,
    payload_json     TEXT NOT NULL,
    input_game_count INTEGER NOT NULL,
    computed_at      TEXT NOT NULL,
    needs_recompute  INTEGER NOT NULL DEFAULT 0,
    PRIMARY KEY (owner_id, kind)
);

-- The append-only interaction log. owner_id is nullable: the anonymize
-- privacy path clears it while session_id survives for cohort analysis.
CREATE TABLE IF NOT EXISTS interactions (
    interaction_id TEXT PRIMARY KEY,
    owner_id       TEXT,
    session_id     TEXT NOT NULL,
    mode           TEXT NOT NULL,
    position_fen   TEXT,
    tools_used     TEXT NOT NULL DEFAULT '[]',
    versions_json  TEXT NOT NULL DEFAULT '{}',
    occurred_at    TEXT NOT NULL,
    deleted        INTEGER NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS engine_truths (
    interaction_id  TEXT PRIMARY KEY REFERENCES interactions(interaction_id),
    eval_cp         INTEGER NOT NULL,
    disagreement_cp INTEGER,
    candidates_json TEXT NOT NULL DEFAULT '[]',
    tablebase_exact INTEGER NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS reasoning_traces (
    interaction_id TEXT PRIMARY KEY REFERENCES interactions(interaction_id),
    fired_tags     TEXT NOT NULL DEFAULT '[]',
    dominant_tag   TEXT,
    runner_up_tag  TEXT,
    margin         REAL
);

CREATE TABLE IF NOT EXISTS response_metas (
    interaction_id       TEXT PRIMARY KEY REFERENCES interactions(interaction_id),
    model_identity       TEXT NOT NULL,
    latency_ms           INTEGER NOT NULL,
    tokens_in            INTEGER NOT NULL,
    tokens_out           INTEGER NOT NULL,
    declared_confidence  TEXT NOT NULL,
    permitted_confidence TEXT NOT NULL,
    claim_count          INTEGER NOT NULL,
    grounded_claim_count INTEGER NOT NULL,
    asserted_lines       TEXT NOT NULL DEFAULT '[]',
    mentioned_tags       TEXT NOT NULL DEFAULT '[]',
    mentions_tradeoff    INTEGER NOT NULL DEFAULT 0,
    schema_valid         INTEGER NOT NULL DEFAULT 1
);

CREATE TABLE IF NOT EXISTS user_behaviors (
    interaction_id         TEXT PRIMARY KEY REFERENCES interactions(interaction_id),
    time_to_next_action_ms INTEGER,
    follow_up_count        INTEGER NOT NULL DEFAULT 0,
    rapid_follow_up_count  INTEGER NOT NULL DEFAULT 0,
    abandoned              INTEGER NOT NULL DEFAULT 0,
    takeback_count         INTEGER NOT NULL DEFAULT 0
);

-- Storage-level append-only enforcement.
CREATE TRIGGER IF NOT EXISTS interactions_no_delete
BEFORE DELETE ON interactions
BEGIN
    SELECT RAISE(ABORT, 'interaction records are append-only');
END;

CREATE TRIGGER IF NOT EXISTS interactions_guarded_update
BEFORE UPDATE ON interactions
WHEN NEW.interaction_id        != OLD.interaction_id
  OR NEW.session_id            != OLD.session_id
  OR NEW.mode                  != OLD.mode
  OR IFNULL(NEW.position_fen, '') != IFNULL(OLD.position_fen, '')
  OR NEW.tools_used            != OLD.tools_used
  OR NEW.versions_json         != OLD.versions_json
  OR NEW.occurred_at           != OLD.occurred_at
  -- anonymize may only clear owner_id, never re-point it
  OR (NEW.owner_id IS NOT NULL AND NEW.owner_id IS NOT OLD.owner_id)
  -- soft deletion is one-way
  OR (OLD.deleted = 1 AND NEW.deleted = 0)
BEGIN
    SELECT RAISE(ABORT, 'interaction records are append-only');
END;

CREATE TRIGGER IF NOT EXISTS engine_truths_no_update
BEFORE UPDATE ON engine_truths
BEGIN SELECT RAISE(ABORT, 'interaction records are append-only'); END;
CREATE TRIGGER IF NOT EXISTS engine_truths_no_delete
BEFORE DELETE ON engine_truths
BEGIN SELECT RAISE(ABORT, 'interaction records are append-only'); END;

CREATE TRIGGER IF NOT EXISTS reasoning_traces_no_update
BEFORE UPDATE ON reasoning_traces
BEGIN SELECT RAISE(ABORT, 'interaction records are append-only'); END;
CREATE TRIGGER IF NOT EXISTS reasoning_traces_no_delete
BEFORE DELETE ON reasoning_traces
BEGIN SELECT RAISE(ABORT, 'interaction records are append-only'); END;

CREATE TRIGGER IF NOT EXISTS response_metas_no_update
BEFORE UPDATE ON response_metas
BEGIN SELECT RAISE(ABORT, 'interaction records are append-only'); END;
CREATE TRIGGER IF NOT EXISTS response_metas_no_delete
BEFORE DELETE ON response_metas
BEGIN SELECT RAISE(ABORT, 'interaction records are append-only'); END;

CREATE TRIGGER IF NOT EXISTS user_behaviors_no_update
BEFORE UPDATE ON user_behaviors
BEGIN SELECT RAISE(ABORT, 'interaction records are append-only'); END;
CREATE TRIGGER IF NOT EXISTS user_behaviors_no_delete
BEFORE DELETE ON user_behaviors
BEGIN SELECT RAISE(ABORT, 'interaction records are append-only'); END;

-- Opt-in, TTL-bounded raw text. The only table privacy hard-deletes from.
CREATE TABLE IF NOT EXISTS debug_texts (
    interaction_id TEXT PRIMARY KEY REFERENCES interactions(interaction_id),
    owner_id       TEXT NOT NULL,
    user_text      TEXT,
    model_text     TEXT,
    expires_at     TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS debug_sessions (
    session_id TEXT PRIMARY KEY,
    owner_id   TEXT NOT NULL,
    created_at TEXT NOT NULL
);

-- Operator kill switches.
CREATE TABLE IF NOT EXISTS flags (
    name       TEXT PRIMARY KEY,
    enabled    INTEGER NOT NULL,
    updated_at TEXT NOT NULL
);

-- Frozen regression benchmarks; operator-created, never user-derived.
CREATE TABLE IF NOT EXISTS gold_cases (
    case_id    TEXT PRIMARY KEY,
    fen        TEXT NOT NULL,
    best_move  TEXT NOT NULL,
    worst_move TEXT NOT NULL,
    eval_cp    INTEGER NOT NULL,
    note       TEXT,
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS benchmark_results (
    result_id      TEXT PRIMARY KEY,
    case_id        TEXT NOT NULL REFERENCES gold_cases(case_id),
    model_identity TEXT NOT NULL,
    matched        INTEGER NOT NULL,
    eval_error_cp  INTEGER,
    run_at         TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS games_owner_state_idx   ON games(owner_id, state);
CREATE INDEX IF NOT EXISTS games_owner_played_idx  ON games(owner_id, played_at DESC);
CREATE INDEX IF NOT EXISTS facts_game_idx          ON move_facts(game_id);
CREATE INDEX IF NOT EXISTS facts_owner_idx         ON move_facts(owner_id);
CREATE INDEX IF NOT EXISTS interactions_owner_idx  ON interactions(owner_id);
CREATE INDEX IF NOT EXISTS interactions_session_idx ON interactions(session_id);
CREATE INDEX IF NOT EXISTS interactions_time_idx   ON interactions(occurred_at);
CREATE INDEX IF NOT EXISTS bench_model_idx         ON benchmark_results(model_identity);

PRAGMA user_version = 1;
";
