//! SQL schema for the RAM SQLite store.
//!
//! Executed once at connection startup via `PRAGMA user_version`. Future
//! migrations will be gated on that version number.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
///
/// Timestamps are fixed-width RFC 3339 UTC strings, so comparisons on the
/// text columns order them chronologically for four-digit years only. The
/// period rule (end not before start) is enforced before writing.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS parties (
    party_id    TEXT PRIMARY KEY,
    created_at  TEXT NOT NULL,
    kind        TEXT NOT NULL    -- 'individual' | 'abn'
);

CREATE TABLE IF NOT EXISTS identities (
    identity_id           TEXT PRIMARY KEY,
    party_id              TEXT NOT NULL REFERENCES parties(party_id),
    kind                  TEXT NOT NULL,   -- 'invitation_code' | 'link_id'
    raw_id_value          TEXT NOT NULL,
    id_value              TEXT NOT NULL UNIQUE,
    link_id_scheme        TEXT,
    invitation_status     TEXT,            -- NULL unless kind = 'invitation_code'
    invitation_expires_at TEXT,
    invitation_claimed_at TEXT,
    invitation_email      TEXT,
    name_json             TEXT NOT NULL,
    created_at            TEXT NOT NULL,
    CHECK ((kind = 'invitation_code') = (invitation_status IS NOT NULL))
);

CREATE TABLE IF NOT EXISTS relationship_types (
    relationship_type_id TEXT PRIMARY KEY,
    code                 TEXT NOT NULL,
    short_description    TEXT,
    deleted              INTEGER NOT NULL DEFAULT 0
);

-- Rows are never removed; `deleted` is a logical flag.
CREATE TABLE IF NOT EXISTS relationships (
    relationship_id      TEXT PRIMARY KEY,
    relationship_type_id TEXT NOT NULL REFERENCES relationship_types(relationship_type_id),
    subject_party_id     TEXT NOT NULL REFERENCES parties(party_id),
    subject_nickname     TEXT,            -- JSON-encoded Name or NULL
    delegate_party_id    TEXT NOT NULL REFERENCES parties(party_id),
    delegate_nickname    TEXT,
    start_at             TEXT NOT NULL,
    end_at               TEXT,
    end_event_at         TEXT,
    status               TEXT NOT NULL,
    attributes           TEXT NOT NULL DEFAULT '[]',
    deleted              INTEGER NOT NULL DEFAULT 0,
    created_at           TEXT NOT NULL,
    updated_at           TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS identities_party_idx       ON identities(party_id);
CREATE INDEX IF NOT EXISTS identities_raw_idx         ON identities(raw_id_value);
CREATE INDEX IF NOT EXISTS relationships_subject_idx  ON relationships(subject_party_id);
CREATE INDEX IF NOT EXISTS relationships_delegate_idx ON relationships(delegate_party_id);

PRAGMA user_version = 1;
";
