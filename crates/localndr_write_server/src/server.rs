//! The write server facade.

use crate::apply::apply_change_set;
use crate::error::{ServerError, ServerResult};
use crate::schema;
use localndr_protocol::ChangeSet;
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;

/// A row of the authoritative `event` table.
///
/// Timestamps stay as the RFC 3339 text they arrived as; the server
/// never reinterprets them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredEvent {
    /// Identifier.
    pub id: String,
    /// Title.
    pub title: String,
    /// Description.
    pub description: String,
    /// Start instant.
    pub start_date: String,
    /// End instant.
    pub end_date: String,
    /// Creation instant.
    pub created: String,
    /// Last-modified instant.
    pub modified: String,
}

/// Applies client change-sets to the authoritative store.
pub struct WriteServer {
    conn: Mutex<Connection>,
}

impl WriteServer {
    /// Opens an in-memory store and runs the migration.
    pub fn open_in_memory() -> ServerResult<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    /// Opens (or creates) an on-disk store and runs the migration.
    pub fn open(path: impl AsRef<Path>) -> ServerResult<Self> {
        Self::from_connection(Connection::open(path)?)
    }

    fn from_connection(conn: Connection) -> ServerResult<Self> {
        conn.execute_batch(schema::CREATE_TABLES)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Validates a batch, then applies all of it in one transaction.
    ///
    /// Returns the number of changes applied. On any failure nothing is
    /// applied.
    pub fn apply_changes(&self, set: &ChangeSet) -> ServerResult<usize> {
        set.validate()?;
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        let applied = apply_change_set(&tx, set)?;
        tx.commit()?;
        tracing::debug!(applied, "applied change batch");
        Ok(applied)
    }

    /// Parses, validates and applies a JSON change-set document.
    pub fn apply_changes_json(&self, body: &str) -> ServerResult<usize> {
        let set = ChangeSet::from_json(body).map_err(ServerError::Invalid)?;
        self.apply_changes(&set)
    }

    /// Transport-free request handler.
    ///
    /// The HTTP layer and in-process test transports both route POSTs
    /// here; the bodies are exactly what goes on the wire.
    pub fn handle_post(&self, path: &str, body: &str) -> (u16, String) {
        if path != "/apply-changes" {
            return (404, serde_json::json!({"error": "not found"}).to_string());
        }
        match self.apply_changes_json(body) {
            Ok(_) => (200, r#"{"success":true}"#.to_string()),
            Err(err) => {
                tracing::warn!(error = %err, "change batch refused");
                (
                    err.status_code(),
                    serde_json::json!({"error": err.to_string()}).to_string(),
                )
            }
        }
    }

    /// Inserts pre-built rows in one transaction (seeding).
    pub fn insert_events(&self, events: &[StoredEvent]) -> ServerResult<usize> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        for event in events {
            tx.execute(
                "INSERT INTO event (id, title, description, start_date, end_date, created, modified)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    event.id,
                    event.title,
                    event.description,
                    event.start_date,
                    event.end_date,
                    event.created,
                    event.modified,
                ],
            )?;
        }
        tx.commit()?;
        Ok(events.len())
    }

    /// Total number of stored events.
    pub fn event_count(&self) -> ServerResult<i64> {
        let conn = self.conn.lock();
        let count = conn.query_row("SELECT count(*) FROM event", [], |row| row.get(0))?;
        Ok(count)
    }

    /// Single-row lookup.
    pub fn get_event(&self, id: &str) -> ServerResult<Option<StoredEvent>> {
        let conn = self.conn.lock();
        let event = conn
            .query_row(
                "SELECT id, title, description, start_date, end_date, created, modified
                 FROM event WHERE id = ?1",
                [id],
                |row| {
                    Ok(StoredEvent {
                        id: row.get(0)?,
                        title: row.get(1)?,
                        description: row.get(2)?,
                        start_date: row.get(3)?,
                        end_date: row.get(4)?,
                        created: row.get(5)?,
                        modified: row.get(6)?,
                    })
                },
            )
            .optional()?;
        Ok(event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn insert_body(id: &str, title: &str) -> String {
        format!(
            r#"{{"events":[{{
                "id":"{id}",
                "title":"{title}",
                "description":"",
                "start_date":"2024-01-01T09:00:00Z",
                "end_date":"2024-01-01T10:00:00Z",
                "created":"2024-01-01T08:00:00Z",
                "modified":"2024-01-01T08:00:00Z",
                "modified_columns":["title","description","start_date","end_date","created","modified"],
                "new":true
            }}]}}"#
        )
    }

    #[test]
    fn applies_a_json_insert() {
        let server = WriteServer::open_in_memory().unwrap();
        let applied = server.apply_changes_json(&insert_body("a1", "Standup")).unwrap();
        assert_eq!(applied, 1);
        let event = server.get_event("a1").unwrap().unwrap();
        assert_eq!(event.title, "Standup");
        assert_eq!(event.modified, "2024-01-01T08:00:00Z");
    }

    #[test]
    fn handle_post_speaks_the_wire_contract() {
        let server = WriteServer::open_in_memory().unwrap();

        let (status, body) = server.handle_post("/apply-changes", &insert_body("a1", "Standup"));
        assert_eq!(status, 200);
        assert_eq!(body, r#"{"success":true}"#);

        let (status, body) = server.handle_post("/apply-changes", "not json");
        assert_eq!(status, 400);
        assert!(body.contains("Invalid changes"));

        let (status, _) = server.handle_post("/nope", "{}");
        assert_eq!(status, 404);
    }

    #[test]
    fn invalid_column_is_a_client_error() {
        let server = WriteServer::open_in_memory().unwrap();
        let body = r#"{"events":[{
            "id":"a1",
            "created":"2024-01-01T08:00:00Z",
            "modified_columns":["synced"]
        }]}"#;
        let (status, reply) = server.handle_post("/apply-changes", body);
        assert_eq!(status, 400);
        assert!(reply.contains("synced"));
        assert_eq!(server.event_count().unwrap(), 0);
    }

    #[test]
    fn failed_batch_applies_nothing() {
        let server = WriteServer::open_in_memory().unwrap();

        // Second change declares a date column it carries no value
        // for; the constraint failure must roll back the first change
        // too.
        let body = r#"{"events":[
            {"id":"a1","title":"Standup","description":"",
             "start_date":"2024-01-01T09:00:00Z","end_date":"2024-01-01T10:00:00Z",
             "created":"2024-01-01T08:00:00Z","modified":"2024-01-01T08:00:00Z",
             "modified_columns":["title","description","start_date","end_date","created","modified"],
             "new":true},
            {"id":"a2","created":"2024-01-01T08:00:00Z",
             "modified_columns":["title","start_date"],"title":"Broken","new":true}
        ]}"#;
        let (status, _) = server.handle_post("/apply-changes", body);
        assert_eq!(status, 500);
        assert_eq!(server.event_count().unwrap(), 0);
    }

    #[test]
    fn on_disk_store_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("events.db");
        {
            let server = WriteServer::open(&path).unwrap();
            server
                .apply_changes_json(&insert_body("a1", "Standup"))
                .unwrap();
        }
        let server = WriteServer::open(&path).unwrap();
        assert_eq!(server.event_count().unwrap(), 1);
    }

    #[test]
    fn update_and_delete_round_trip() {
        let server = WriteServer::open_in_memory().unwrap();
        server.apply_changes_json(&insert_body("a1", "Standup")).unwrap();

        let update = r#"{"events":[{
            "id":"a1",
            "title":"Standup (moved)",
            "created":"2024-01-01T08:00:00Z",
            "modified":"2024-01-02T08:00:00Z",
            "modified_columns":["title","modified"]
        }]}"#;
        server.apply_changes_json(update).unwrap();
        assert_eq!(
            server.get_event("a1").unwrap().unwrap().title,
            "Standup (moved)"
        );

        let delete = r#"{"events":[{
            "id":"a1",
            "created":"2024-01-01T08:00:00Z",
            "deleted":true
        }]}"#;
        server.apply_changes_json(delete).unwrap();
        assert!(server.get_event("a1").unwrap().is_none());
    }
}
