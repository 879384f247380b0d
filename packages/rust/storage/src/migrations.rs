//! SQL migration definitions for the RegLens database.
//!
//! Migrations are applied in order on database open. Each migration has a
//! version number and a batch of SQL statements.

/// A database migration with a version and SQL statements.
pub(crate) struct Migration {
    pub version: u32,
    pub description: &'static str,
    pub sql: &'static str,
}

/// All migrations, in ascending version order.
pub(crate) fn all_migrations() -> Vec<Migration> {
    vec![Migration {
        version: 1,
        description: "Initial schema: regulations, amendments",
        sql: r#"
-- Schema version tracking
CREATE TABLE IF NOT EXISTS schema_migrations (
    version    INTEGER PRIMARY KEY,
    applied_at TEXT NOT NULL DEFAULT (datetime('now'))
);

-- Current consolidated text of each regulation
CREATE TABLE IF NOT EXISTS regulations (
    id           TEXT PRIMARY KEY,
    key          TEXT NOT NULL UNIQUE,
    title        TEXT,
    body         TEXT NOT NULL,
    content_hash TEXT NOT NULL,
    created_at   TEXT NOT NULL,
    updated_at   TEXT NOT NULL
);

-- Amendment history, one row per applied update
CREATE TABLE IF NOT EXISTS amendments (
    id            TEXT PRIMARY KEY,
    regulation_id TEXT NOT NULL REFERENCES regulations(id) ON DELETE CASCADE,
    text          TEXT NOT NULL,
    previous_hash TEXT NOT NULL,
    new_hash      TEXT NOT NULL,
    applied_at    TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_amendments_regulation ON amendments(regulation_id);

INSERT INTO schema_migrations (version) VALUES (1);
"#,
    }]
}
