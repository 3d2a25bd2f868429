//! Embedded SQL migrations and runner.
//!
//! Migrations are stored as `&str` constants and executed in order. A
//! `schema_migrations` table tracks which versions have been applied.

use rendition_common::{Error, Result};
use rusqlite::Connection;

/// V1: initial schema.
const V1_INITIAL: &str = r#"
CREATE TABLE originals (
    id         INTEGER PRIMARY KEY AUTOINCREMENT,
    owner_id   INTEGER NOT NULL,
    url        TEXT NOT NULL DEFAULT '',
    title      TEXT NOT NULL DEFAULT '',
    status     TEXT NOT NULL DEFAULT 'not started',
    audio      INTEGER NOT NULL DEFAULT 0,
    video      INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL
);

CREATE TABLE videos (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    original_id INTEGER NOT NULL REFERENCES originals(id) ON DELETE CASCADE,
    source      TEXT NOT NULL CHECK (source IN ('original', 'transcode')),
    filename    TEXT NOT NULL,
    size        INTEGER NOT NULL DEFAULT 0,
    duration    REAL NOT NULL DEFAULT 0,
    codec       TEXT NOT NULL DEFAULT '',
    container   TEXT NOT NULL DEFAULT '',
    width       INTEGER NOT NULL DEFAULT 0,
    height      INTEGER NOT NULL DEFAULT 0,
    fps         REAL NOT NULL DEFAULT 0,
    created_at  TEXT NOT NULL
);

CREATE TABLE audios (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    original_id INTEGER NOT NULL REFERENCES originals(id) ON DELETE CASCADE,
    source      TEXT NOT NULL CHECK (source IN ('original', 'transcode')),
    filename    TEXT NOT NULL,
    size        INTEGER NOT NULL DEFAULT 0,
    duration    REAL NOT NULL DEFAULT 0,
    codec       TEXT NOT NULL DEFAULT '',
    container   TEXT NOT NULL DEFAULT '',
    kbps        INTEGER NOT NULL DEFAULT 0,
    created_at  TEXT NOT NULL
);

CREATE TABLE transcode_jobs (
    id           INTEGER PRIMARY KEY AUTOINCREMENT,
    status       TEXT NOT NULL DEFAULT 'pending'
                 CHECK (status IN ('pending', 'running', 'failed')),
    src_id       INTEGER NOT NULL,
    src_kind     TEXT NOT NULL,
    dst_kind     TEXT NOT NULL,
    original_id  INTEGER NOT NULL REFERENCES originals(id) ON DELETE CASCADE,
    height       INTEGER,
    fps          REAL,
    kbps         INTEGER,
    error        TEXT,
    submitted_at TEXT NOT NULL,
    started_at   TEXT,
    CHECK (
        (src_kind = 'video' AND dst_kind IN ('video', 'audio'))
        OR (src_kind = 'audio' AND dst_kind = 'audio')
    )
);

CREATE INDEX idx_originals_status      ON originals(status);
CREATE INDEX idx_originals_owner       ON originals(owner_id);
CREATE INDEX idx_videos_original       ON videos(original_id);
CREATE INDEX idx_audios_original       ON audios(original_id);
CREATE INDEX idx_transcode_jobs_status ON transcode_jobs(status);
CREATE INDEX idx_transcode_jobs_orig   ON transcode_jobs(original_id);
"#;

/// Ordered list of (version, sql) pairs.
const MIGRATIONS: &[(i64, &str)] = &[(1, V1_INITIAL)];

/// Run all pending migrations on `conn`.
///
/// Creates the `schema_migrations` tracking table if it does not exist,
/// then applies each outstanding migration inside a transaction.
pub fn run_migrations(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version    INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        )",
    )
    .map_err(|e| Error::database(format!("Failed to create schema_migrations: {e}")))?;

    for &(version, sql) in MIGRATIONS {
        let already: bool = conn
            .query_row(
                "SELECT COUNT(*) > 0 FROM schema_migrations WHERE version = ?1",
                [version],
                |row| row.get(0),
            )
            .map_err(|e| Error::database(e.to_string()))?;

        if already {
            continue;
        }

        let tx = conn
            .unchecked_transaction()
            .map_err(|e| Error::database(e.to_string()))?;

        tx.execute_batch(sql)
            .map_err(|e| Error::database(format!("Migration V{version} failed: {e}")))?;

        tx.execute(
            "INSERT INTO schema_migrations (version) VALUES (?1)",
            [version],
        )
        .map_err(|e| Error::database(e.to_string()))?;

        tx.commit().map_err(|e| Error::database(e.to_string()))?;

        tracing::info!(version, "Applied database migration");
    }

    Ok(())
}
