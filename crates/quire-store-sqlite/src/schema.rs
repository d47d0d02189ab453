//! SQL schema for the Quire SQLite store.
//!
//! Executed once at connection startup. `PRAGMA user_version` records the
//! schema revision for later migrations.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

-- kind, owner_id and created_at are written once, on insert.
CREATE TABLE IF NOT EXISTS artifacts (
    artifact_id TEXT PRIMARY KEY,
    owner_id    TEXT NOT NULL,
    title       TEXT NOT NULL,
    kind        TEXT NOT NULL DEFAULT 'text',      -- 'text' | 'code' | 'image' | 'sheet'
    content     TEXT NOT NULL,
    status      TEXT NOT NULL DEFAULT 'complete',  -- 'streaming' | 'complete' | 'error'
    created_at  TEXT NOT NULL,
    updated_at  TEXT NOT NULL
);

-- Every committed content, strictly append-only.
CREATE TABLE IF NOT EXISTS artifact_versions (
    artifact_id  TEXT    NOT NULL REFERENCES artifacts(artifact_id),
    version      INTEGER NOT NULL,
    content_hash TEXT    NOT NULL,   -- hex SHA-256 of content
    content      TEXT    NOT NULL,
    recorded_at  TEXT    NOT NULL,
    PRIMARY KEY (artifact_id, version)
);

CREATE INDEX IF NOT EXISTS artifacts_owner_idx ON artifacts(owner_id, updated_at);

PRAGMA user_version = 1;
";
