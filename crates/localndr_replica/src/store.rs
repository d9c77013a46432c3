//! The event store seam and its SQLite implementation.

use crate::change_feed::{DirtyCountCallback, DirtyCountFeed};
use crate::error::{StoreError, StoreResult};
use crate::event::{format_ts, parse_ts, Event, EventDraft, EventPatch};
use crate::schema;
use chrono::{Duration, Utc};
use localndr_protocol::EventChange;
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension, Row, Transaction};
use std::path::Path;

/// The embedded store as the sync controllers see it.
///
/// The pull controller drives the bootstrap operations
/// (`has_events`, trigger toggles, `bulk_insert`, index creation); the
/// push controller drives the outbound operations (`pending_changes`,
/// `acknowledge`, the dirty-count subscription); the application uses
/// the local write path and the user-facing queries.
pub trait EventStore: Send + Sync {
    /// Returns true if the replica already holds any event rows.
    fn has_events(&self) -> StoreResult<bool>;

    /// Turns the change-tracking triggers off (bootstrap bulk load).
    fn disable_triggers(&self) -> StoreResult<()>;

    /// Turns the change-tracking triggers back on.
    fn enable_triggers(&self) -> StoreResult<()>;

    /// Inserts a snapshot batch in one transaction. Rows land clean.
    ///
    /// Callers must have disabled the triggers first; this is the
    /// bulk-load path of the initial snapshot.
    fn bulk_insert(&self, events: &[Event]) -> StoreResult<usize>;

    /// Upserts one row arriving from the replication stream, pre-clean.
    fn apply_stream_upsert(&self, event: &Event) -> StoreResult<()>;

    /// Physically removes a row the stream reported deleted.
    fn apply_stream_delete(&self, id: &str) -> StoreResult<()>;

    /// Creates the post-bootstrap indexes. Idempotent.
    fn create_post_sync_indexes(&self) -> StoreResult<()>;

    /// Runs a no-op query, confirming the store is idle.
    fn noop_query(&self) -> StoreResult<()>;

    /// Number of rows with unsynchronized local changes.
    fn dirty_count(&self) -> StoreResult<i64>;

    /// Reads, in one transaction, every row eligible for push
    /// (`synced = 0 AND sent_to_server = 0`) as wire changes.
    fn pending_changes(&self) -> StoreResult<Vec<EventChange>>;

    /// Marks shipped rows as sent, in one transaction, conditioned on
    /// the `modified` timestamp still matching the value that was
    /// shipped. Returns how many rows matched; a row re-edited while the
    /// batch was in flight keeps `sent_to_server = 0` and stays eligible.
    fn acknowledge(&self, changes: &[EventChange]) -> StoreResult<usize>;

    /// Registers a dirty-count subscriber. The callback fires once
    /// immediately with the current count, then after every committed
    /// local write.
    fn subscribe_dirty_count(&self, callback: DirtyCountCallback) -> StoreResult<()>;

    /// Creates an event locally. The row starts dirty and new.
    fn insert_local(&self, draft: EventDraft) -> StoreResult<Event>;

    /// Applies a partial edit to one event, advancing `modified`.
    fn update_local(&self, id: &str, patch: EventPatch) -> StoreResult<Event>;

    /// Soft-deletes an event; the tombstone stays until the remote store
    /// confirms the delete.
    fn delete_local(&self, id: &str) -> StoreResult<()>;

    /// User-facing listing, tombstones excluded.
    fn list_events(&self) -> StoreResult<Vec<Event>>;

    /// Single-row lookup, tombstones excluded.
    fn get_event(&self, id: &str) -> StoreResult<Option<Event>>;

    /// Total row count including tombstones and clean rows.
    fn event_count(&self) -> StoreResult<i64>;
}

/// SQLite-backed event store.
pub struct SqliteEventStore {
    conn: Mutex<Connection>,
    feed: DirtyCountFeed,
}

const EVENT_COLUMNS: &str = "id, title, description, start_date, end_date, created, modified";

impl SqliteEventStore {
    /// Opens an in-memory replica and runs the migration.
    pub fn open_in_memory() -> StoreResult<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    /// Opens (or creates) an on-disk replica and runs the migration.
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        Self::from_connection(Connection::open(path)?)
    }

    fn from_connection(conn: Connection) -> StoreResult<Self> {
        conn.execute_batch(schema::CREATE_TABLES)?;
        conn.execute_batch(schema::CREATE_TRIGGERS)?;
        tracing::debug!("replica schema ready");
        Ok(Self {
            conn: Mutex::new(conn),
            feed: DirtyCountFeed::new(),
        })
    }

    fn set_flag(&self, key: &str, on: bool) -> StoreResult<()> {
        let conn = self.conn.lock();
        conn.execute(
            "UPDATE sync_state SET value = ?1 WHERE key = ?2",
            params![if on { "1" } else { "0" }, key],
        )?;
        Ok(())
    }

    fn set_bypass(tx: &Transaction<'_>, on: bool) -> StoreResult<()> {
        tx.execute(
            "UPDATE sync_state SET value = ?1 WHERE key = 'bypass'",
            params![if on { "1" } else { "0" }],
        )?;
        Ok(())
    }

    fn emit_dirty_count(&self) -> StoreResult<()> {
        let count = self.dirty_count()?;
        self.feed.emit(count);
        Ok(())
    }

    fn row_to_event(row: &Row<'_>) -> rusqlite::Result<Event> {
        let get_ts = |idx: usize| -> rusqlite::Result<chrono::DateTime<Utc>> {
            let text: String = row.get(idx)?;
            parse_ts(&text).map_err(|e| {
                rusqlite::Error::FromSqlConversionFailure(
                    idx,
                    rusqlite::types::Type::Text,
                    Box::new(e),
                )
            })
        };

        Ok(Event {
            id: row.get(0)?,
            title: row.get(1)?,
            description: row.get(2)?,
            start_date: get_ts(3)?,
            end_date: get_ts(4)?,
            created: get_ts(5)?,
            modified: get_ts(6)?,
        })
    }
}

impl EventStore for SqliteEventStore {
    fn has_events(&self) -> StoreResult<bool> {
        let conn = self.conn.lock();
        let found: Option<i64> = conn
            .query_row("SELECT 1 FROM event LIMIT 1", [], |row| row.get(0))
            .optional()?;
        Ok(found.is_some())
    }

    fn disable_triggers(&self) -> StoreResult<()> {
        self.set_flag("triggers_enabled", false)
    }

    fn enable_triggers(&self) -> StoreResult<()> {
        self.set_flag("triggers_enabled", true)
    }

    fn bulk_insert(&self, events: &[Event]) -> StoreResult<usize> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT OR REPLACE INTO event
                     (id, title, description, start_date, end_date, created, modified,
                      synced, sent_to_server, modified_columns, \"new\", deleted)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 1, 0, '[]', 0, 0)",
            )?;
            for event in events {
                stmt.execute(params![
                    event.id,
                    event.title,
                    event.description,
                    format_ts(event.start_date),
                    format_ts(event.end_date),
                    format_ts(event.created),
                    format_ts(event.modified),
                ])?;
            }
        }
        tx.commit()?;
        Ok(events.len())
    }

    fn apply_stream_upsert(&self, event: &Event) -> StoreResult<()> {
        {
            let mut conn = self.conn.lock();
            let tx = conn.transaction()?;
            Self::set_bypass(&tx, true)?;
            tx.execute(
                "INSERT INTO event
                     (id, title, description, start_date, end_date, created, modified,
                      synced, sent_to_server, modified_columns, \"new\", deleted)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 1, 0, '[]', 0, 0)
                 ON CONFLICT(id) DO UPDATE SET
                     title = excluded.title,
                     description = excluded.description,
                     start_date = excluded.start_date,
                     end_date = excluded.end_date,
                     created = excluded.created,
                     modified = excluded.modified,
                     synced = 1,
                     sent_to_server = 0,
                     modified_columns = '[]',
                     \"new\" = 0,
                     deleted = 0",
                params![
                    event.id,
                    event.title,
                    event.description,
                    format_ts(event.start_date),
                    format_ts(event.end_date),
                    format_ts(event.created),
                    format_ts(event.modified),
                ],
            )?;
            Self::set_bypass(&tx, false)?;
            tx.commit()?;
        }
        self.emit_dirty_count()
    }

    fn apply_stream_delete(&self, id: &str) -> StoreResult<()> {
        {
            let mut conn = self.conn.lock();
            let tx = conn.transaction()?;
            Self::set_bypass(&tx, true)?;
            tx.execute("DELETE FROM event WHERE id = ?1", params![id])?;
            Self::set_bypass(&tx, false)?;
            tx.commit()?;
        }
        self.emit_dirty_count()
    }

    fn create_post_sync_indexes(&self) -> StoreResult<()> {
        let conn = self.conn.lock();
        conn.execute_batch(schema::POST_SYNC_INDEXES)?;
        Ok(())
    }

    fn noop_query(&self) -> StoreResult<()> {
        let conn = self.conn.lock();
        conn.query_row("SELECT 1", [], |_| Ok(()))?;
        Ok(())
    }

    fn dirty_count(&self) -> StoreResult<i64> {
        let conn = self.conn.lock();
        let count = conn.query_row(
            "SELECT count(id) FROM event WHERE synced = 0",
            [],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    fn pending_changes(&self) -> StoreResult<Vec<EventChange>> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        let mut changes = Vec::new();
        {
            let mut stmt = tx.prepare(
                "SELECT id, title, description, start_date, end_date, created, modified,
                        modified_columns, \"new\", deleted
                 FROM event
                 WHERE synced = 0 AND sent_to_server = 0",
            )?;
            let mut rows = stmt.query([])?;
            while let Some(row) = rows.next()? {
                let modified_columns: String = row.get(7)?;
                let columns: Vec<String> = serde_json::from_str(&modified_columns)?;
                changes.push(EventChange {
                    id: row.get(0)?,
                    title: Some(row.get(1)?),
                    description: Some(row.get(2)?),
                    start_date: Some(row.get(3)?),
                    end_date: Some(row.get(4)?),
                    created: row.get(5)?,
                    modified: Some(row.get(6)?),
                    modified_columns: Some(columns),
                    is_new: Some(row.get::<_, i64>(8)? != 0),
                    deleted: Some(row.get::<_, i64>(9)? != 0),
                });
            }
        }
        tx.commit()?;
        Ok(changes)
    }

    fn acknowledge(&self, changes: &[EventChange]) -> StoreResult<usize> {
        let matched = {
            let mut conn = self.conn.lock();
            let tx = conn.transaction()?;
            let mut matched = 0usize;
            {
                let mut stmt = tx.prepare(
                    "UPDATE event SET sent_to_server = 1
                     WHERE id = ?1 AND modified = ?2",
                )?;
                for change in changes {
                    let Some(modified) = change.modified.as_deref() else {
                        continue;
                    };
                    matched += stmt.execute(params![change.id, modified])?;
                }
            }
            tx.commit()?;
            matched
        };
        self.emit_dirty_count()?;
        Ok(matched)
    }

    fn subscribe_dirty_count(&self, callback: DirtyCountCallback) -> StoreResult<()> {
        let count = self.dirty_count()?;
        callback(count);
        self.feed.subscribe(callback);
        Ok(())
    }

    fn insert_local(&self, draft: EventDraft) -> StoreResult<Event> {
        let event = draft.into_event(Utc::now());
        {
            let conn = self.conn.lock();
            conn.execute(
                "INSERT INTO event (id, title, description, start_date, end_date, created, modified)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    event.id,
                    event.title,
                    event.description,
                    format_ts(event.start_date),
                    format_ts(event.end_date),
                    format_ts(event.created),
                    format_ts(event.modified),
                ],
            )?;
        }
        self.emit_dirty_count()?;
        Ok(event)
    }

    fn update_local(&self, id: &str, patch: EventPatch) -> StoreResult<Event> {
        let updated = {
            let mut conn = self.conn.lock();
            let tx = conn.transaction()?;
            let current = tx
                .query_row(
                    &format!("SELECT {EVENT_COLUMNS} FROM event WHERE id = ?1 AND deleted = 0"),
                    params![id],
                    Self::row_to_event,
                )
                .optional()?;
            let mut event = current.ok_or_else(|| StoreError::NotFound(id.to_string()))?;

            if let Some(title) = patch.title {
                event.title = title;
            }
            if let Some(description) = patch.description {
                event.description = description;
            }
            if let Some(start_date) = patch.start_date {
                event.start_date = start_date;
            }
            if let Some(end_date) = patch.end_date {
                event.end_date = end_date;
            }

            // modified must never move backwards; it is the concurrency token.
            let now = Utc::now();
            event.modified = if now > event.modified {
                now
            } else {
                event.modified + Duration::milliseconds(1)
            };

            tx.execute(
                "UPDATE event SET title = ?2, description = ?3, start_date = ?4,
                                  end_date = ?5, modified = ?6
                 WHERE id = ?1",
                params![
                    event.id,
                    event.title,
                    event.description,
                    format_ts(event.start_date),
                    format_ts(event.end_date),
                    format_ts(event.modified),
                ],
            )?;
            tx.commit()?;
            event
        };
        self.emit_dirty_count()?;
        Ok(updated)
    }

    fn delete_local(&self, id: &str) -> StoreResult<()> {
        {
            let mut conn = self.conn.lock();
            let tx = conn.transaction()?;
            let modified: Option<String> = tx
                .query_row(
                    "SELECT modified FROM event WHERE id = ?1 AND deleted = 0",
                    params![id],
                    |row| row.get(0),
                )
                .optional()?;
            let modified = modified.ok_or_else(|| StoreError::NotFound(id.to_string()))?;

            let old = parse_ts(&modified)?;
            let now = Utc::now();
            let bumped = if now > old {
                now
            } else {
                old + Duration::milliseconds(1)
            };

            tx.execute(
                "UPDATE event SET deleted = 1, modified = ?2 WHERE id = ?1",
                params![id, format_ts(bumped)],
            )?;
            tx.commit()?;
        }
        self.emit_dirty_count()
    }

    fn list_events(&self) -> StoreResult<Vec<Event>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(&format!(
            "SELECT {EVENT_COLUMNS} FROM event WHERE deleted = 0 ORDER BY start_date, id"
        ))?;
        let mut rows = stmt.query([])?;
        let mut events = Vec::new();
        while let Some(row) = rows.next()? {
            events.push(Self::row_to_event(row)?);
        }
        Ok(events)
    }

    fn get_event(&self, id: &str) -> StoreResult<Option<Event>> {
        let conn = self.conn.lock();
        let event = conn
            .query_row(
                &format!("SELECT {EVENT_COLUMNS} FROM event WHERE id = ?1 AND deleted = 0"),
                params![id],
                Self::row_to_event,
            )
            .optional()?;
        Ok(event)
    }

    fn event_count(&self) -> StoreResult<i64> {
        let conn = self.conn.lock();
        let count = conn.query_row("SELECT count(*) FROM event", [], |row| row.get(0))?;
        Ok(count)
    }
}
