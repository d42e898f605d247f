//! SQLite DDL definitions for the chore store.
//!
//! All `CREATE TABLE` / `CREATE INDEX` statements live here so they are
//! reviewable and testable in isolation.

use rusqlite::Connection;

/// Complete DDL for the chore database.
///
/// Uses `IF NOT EXISTS` throughout so `apply_schema` is idempotent.
/// Timestamps are epoch milliseconds (UTC).
pub(crate) const SCHEMA_SQL: &str = r#"
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS schema_meta (
    key   TEXT PRIMARY KEY,
    value TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS accounts (
    id         TEXT PRIMARY KEY,
    name       TEXT NOT NULL,
    email      TEXT NOT NULL UNIQUE,
    created_at INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS groups (
    id         TEXT PRIMARY KEY,
    name       TEXT NOT NULL,
    owner_id   TEXT NOT NULL,
    created_at INTEGER NOT NULL
);

-- One row per account: an account is in at most one group.
-- Rotation order is (joined_at, seq).
CREATE TABLE IF NOT EXISTS group_members (
    account_id TEXT PRIMARY KEY,
    group_id   TEXT NOT NULL,
    joined_at  INTEGER NOT NULL,
    seq        INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_members_group ON group_members(group_id, joined_at, seq);

CREATE TABLE IF NOT EXISTS tasks (
    id                TEXT PRIMARY KEY,
    group_id          TEXT NOT NULL,
    title             TEXT NOT NULL,
    description       TEXT NOT NULL DEFAULT '',
    assignee          TEXT,
    rotating_assignee INTEGER NOT NULL DEFAULT 0,
    interval_unit     TEXT NOT NULL,
    interval_size     INTEGER NOT NULL,
    next_due          INTEGER NOT NULL,
    created_at        INTEGER NOT NULL,
    updated_at        INTEGER NOT NULL,
    completed_at      INTEGER,
    deleted_at        INTEGER
);

CREATE INDEX IF NOT EXISTS idx_tasks_group ON tasks(group_id, created_at);

CREATE TABLE IF NOT EXISTS group_webhooks (
    group_id   TEXT PRIMARY KEY,
    url        TEXT NOT NULL,
    created_at INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS webhook_handles (
    account_id TEXT PRIMARY KEY,
    handle     TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS chat_bindings (
    account_id TEXT PRIMARY KEY,
    chat_id    INTEGER NOT NULL UNIQUE
);

CREATE TABLE IF NOT EXISTS connect_codes (
    code       TEXT PRIMARY KEY,
    chat_id    INTEGER NOT NULL,
    issued_at  INTEGER NOT NULL,
    account_id TEXT
);

CREATE INDEX IF NOT EXISTS idx_connect_codes_chat ON connect_codes(chat_id);
"#;

/// Apply the full schema to an open connection.
///
/// Safe to call multiple times. Seeds the schema version on a fresh
/// database without overwriting an existing one.
pub(crate) fn apply_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(SCHEMA_SQL)?;

    let version_str = super::types::CURRENT_SCHEMA_VERSION.to_string();
    conn.execute(
        "INSERT OR IGNORE INTO schema_meta (key, value) VALUES ('schema_version', ?1)",
        rusqlite::params![version_str],
    )?;

    Ok(())
}

/// Read the current schema version from the database.
pub(crate) fn read_schema_version(conn: &Connection) -> rusqlite::Result<Option<u32>> {
    let mut stmt = conn.prepare("SELECT value FROM schema_meta WHERE key = 'schema_version'")?;
    let mut rows = stmt.query([])?;
    match rows.next()? {
        Some(row) => {
            let val: String = row.get(0)?;
            Ok(val.parse::<u32>().ok())
        }
        None => Ok(None),
    }
}
