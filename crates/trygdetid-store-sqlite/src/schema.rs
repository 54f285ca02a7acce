//! SQL schema for the trygdetid SQLite store.
//!
//! Executed once at connection startup. Future migrations will be gated on
//! `PRAGMA user_version`.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS trygdetid (
    record_id           TEXT PRIMARY KEY,
    case_id             TEXT NOT NULL,
    ident               TEXT NOT NULL,
    created_at          TEXT NOT NULL,   -- RFC 3339 UTC
    occupational_injury INTEGER NOT NULL DEFAULT 0,
    nordic_convention   INTEGER NOT NULL DEFAULT 0,
    point_year_override INTEGER,
    result_override     TEXT,            -- JSON or NULL
    computed_result     TEXT,            -- JSON or NULL
    facts               TEXT NOT NULL,   -- JSON fact snapshot
    UNIQUE (case_id, ident)
);

-- Periods are rewritten wholesale on every update of their record. A period
-- id is only unique within its record.
CREATE TABLE IF NOT EXISTS trygdetid_period (
    period_id              TEXT NOT NULL,
    record_id              TEXT NOT NULL
                           REFERENCES trygdetid(record_id) ON DELETE CASCADE,
    position               INTEGER NOT NULL,
    kind                   TEXT NOT NULL,   -- 'actual' | 'future'
    country                TEXT NOT NULL,
    from_date              TEXT NOT NULL,   -- ISO 8601 date
    to_date                TEXT,            -- NULL while open
    counts_at_period_start INTEGER NOT NULL DEFAULT 0,
    counts_at_period_end   INTEGER NOT NULL DEFAULT 0,
    is_prorated            INTEGER NOT NULL DEFAULT 0,
    computed_duration      TEXT,            -- JSON or NULL
    justification          TEXT,
    source                 TEXT NOT NULL,   -- JSON
    PRIMARY KEY (record_id, period_id)
);

CREATE INDEX IF NOT EXISTS trygdetid_case_idx   ON trygdetid(case_id);

PRAGMA user_version = 1;
";
