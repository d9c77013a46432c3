//! Replica schema and change-tracking triggers.
//!
//! The migration is idempotent; it runs once per process before the
//! store is used. Trigger state lives in the `sync_state` table because
//! SQLite has no `ENABLE`/`DISABLE TRIGGER`: every trigger consults the
//! `triggers_enabled` and `bypass` flags in its `WHEN` clause. The pull
//! controller flips `triggers_enabled` around the bootstrap bulk load;
//! the store flips `bypass` inside transactions that must not dirty rows
//! (replication-stream applies).

/// Tables and flag rows.
pub const CREATE_TABLES: &str = r#"
CREATE TABLE IF NOT EXISTS event (
    id TEXT PRIMARY KEY,
    title TEXT NOT NULL DEFAULT '',
    description TEXT NOT NULL DEFAULT '',
    start_date TEXT NOT NULL,
    end_date TEXT NOT NULL,
    created TEXT NOT NULL,
    modified TEXT NOT NULL,
    synced INTEGER NOT NULL DEFAULT 0,
    sent_to_server INTEGER NOT NULL DEFAULT 0,
    modified_columns TEXT NOT NULL DEFAULT '[]',
    "new" INTEGER NOT NULL DEFAULT 0,
    deleted INTEGER NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS sync_state (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);

INSERT OR IGNORE INTO sync_state (key, value) VALUES ('triggers_enabled', '1');
INSERT OR IGNORE INTO sync_state (key, value) VALUES ('bypass', '0');
"#;

/// Change-tracking triggers.
///
/// A locally inserted row starts dirty and new with every declarable
/// column in its changed set, so the write-back insert carries the full
/// row. A local update merges the touched columns (plus `modified`) into
/// the existing set and resets `sent_to_server` so an in-flight
/// generation cannot acknowledge the newer edit.
pub const CREATE_TRIGGERS: &str = r#"
CREATE TRIGGER IF NOT EXISTS event_track_insert
AFTER INSERT ON event
WHEN (SELECT value FROM sync_state WHERE key = 'triggers_enabled') = '1'
  AND (SELECT value FROM sync_state WHERE key = 'bypass') = '0'
BEGIN
    UPDATE event SET
        synced = 0,
        sent_to_server = 0,
        "new" = 1,
        deleted = 0,
        modified_columns = '["title","description","start_date","end_date","created","modified"]'
    WHERE id = NEW.id;
END;

CREATE TRIGGER IF NOT EXISTS event_track_update
AFTER UPDATE OF title, description, start_date, end_date, deleted ON event
WHEN (SELECT value FROM sync_state WHERE key = 'triggers_enabled') = '1'
  AND (SELECT value FROM sync_state WHERE key = 'bypass') = '0'
BEGIN
    UPDATE event SET
        synced = 0,
        sent_to_server = 0,
        modified_columns = (
            SELECT json_group_array(column_name) FROM (
                SELECT value AS column_name FROM json_each(OLD.modified_columns)
                UNION
                SELECT 'title' WHERE NEW.title IS NOT OLD.title
                UNION
                SELECT 'description' WHERE NEW.description IS NOT OLD.description
                UNION
                SELECT 'start_date' WHERE NEW.start_date IS NOT OLD.start_date
                UNION
                SELECT 'end_date' WHERE NEW.end_date IS NOT OLD.end_date
                UNION
                SELECT 'modified'
            )
        )
    WHERE id = NEW.id;
END;
"#;

/// Indexes created once after the initial snapshot has landed.
///
/// Kept out of the bootstrap path so the bulk load writes into an
/// index-free table.
pub const POST_SYNC_INDEXES: &str = r#"
CREATE INDEX IF NOT EXISTS event_start_date_idx ON event (start_date);
CREATE INDEX IF NOT EXISTS event_end_date_idx ON event (end_date);
CREATE INDEX IF NOT EXISTS event_modified_idx ON event (modified);
CREATE INDEX IF NOT EXISTS event_dirty_idx ON event (synced) WHERE synced = 0;
"#;
