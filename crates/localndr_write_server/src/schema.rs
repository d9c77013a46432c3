//! Authoritative event table.
//!
//! The server-side table carries only user-visible columns; the
//! change-tracking bookkeeping of the client replicas never reaches
//! this store.

/// Idempotent migration.
pub const CREATE_TABLES: &str = r#"
CREATE TABLE IF NOT EXISTS event (
    id TEXT PRIMARY KEY,
    title TEXT NOT NULL DEFAULT '',
    description TEXT NOT NULL DEFAULT '',
    start_date TEXT NOT NULL,
    end_date TEXT NOT NULL,
    created TEXT NOT NULL,
    modified TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS event_start_date_idx ON event (start_date);
CREATE INDEX IF NOT EXISTS event_end_date_idx ON event (end_date);
"#;
