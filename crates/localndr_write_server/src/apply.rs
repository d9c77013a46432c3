//! Applying validated change-sets to the authoritative table.
//!
//! Callers validate the set before applying it, so every declared
//! column name has already passed the whitelist and is safe to splice
//! into SQL. The whole batch runs inside the caller's transaction; the
//! first failure rolls everything back.

use crate::error::ServerResult;
use localndr_protocol::{ChangeSet, EventChange};
use rusqlite::{params_from_iter, Transaction};

/// Applies every change in order. Returns the number applied.
pub fn apply_change_set(tx: &Transaction<'_>, set: &ChangeSet) -> ServerResult<usize> {
    let mut applied = 0;
    for change in &set.events {
        apply_change(tx, change)?;
        applied += 1;
    }
    Ok(applied)
}

fn apply_change(tx: &Transaction<'_>, change: &EventChange) -> ServerResult<()> {
    if change.is_delete() {
        tx.execute("DELETE FROM event WHERE id = ?1", [change.id.as_str()])?;
    } else if change.is_insert() {
        insert(tx, change)?;
    } else {
        update(tx, change)?;
    }
    Ok(())
}

/// Inserts a new row from its declared columns.
///
/// Upserts on the id so a client re-shipping an insert (its first
/// acknowledge went stale against a newer local edit) converges
/// instead of failing on the primary key.
fn insert(tx: &Transaction<'_>, change: &EventChange) -> ServerResult<()> {
    let mut columns = vec!["id"];
    let mut values = vec![Some(change.id.as_str())];
    for column in change.columns() {
        columns.push(column.as_str());
        values.push(change.column_value(column));
    }

    let placeholders: Vec<String> = (1..=columns.len()).map(|i| format!("?{i}")).collect();
    let assignments: Vec<String> = columns
        .iter()
        .skip(1)
        .map(|column| format!("{column} = excluded.{column}"))
        .collect();
    let sql = format!(
        "INSERT INTO event ({}) VALUES ({}) ON CONFLICT (id) DO UPDATE SET {}",
        columns.join(", "),
        placeholders.join(", "),
        assignments.join(", ")
    );
    tx.execute(&sql, params_from_iter(values))?;
    Ok(())
}

/// Updates only the declared columns of an existing row.
fn update(tx: &Transaction<'_>, change: &EventChange) -> ServerResult<()> {
    let columns = change.columns();
    let assignments: Vec<String> = columns
        .iter()
        .enumerate()
        .map(|(i, column)| format!("{column} = ?{}", i + 1))
        .collect();
    let sql = format!(
        "UPDATE event SET {} WHERE id = ?{}",
        assignments.join(", "),
        columns.len() + 1
    );

    let mut values: Vec<Option<&str>> = columns
        .iter()
        .map(|column| change.column_value(column))
        .collect();
    values.push(Some(change.id.as_str()));
    tx.execute(&sql, params_from_iter(values))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema;
    use rusqlite::Connection;

    fn conn() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(schema::CREATE_TABLES).unwrap();
        conn
    }

    fn insert_change(id: &str, title: &str) -> EventChange {
        EventChange {
            id: id.into(),
            title: Some(title.into()),
            description: Some(String::new()),
            start_date: Some("2024-01-01T09:00:00Z".into()),
            end_date: Some("2024-01-01T10:00:00Z".into()),
            created: "2024-01-01T08:00:00Z".into(),
            modified: Some("2024-01-01T08:00:00Z".into()),
            modified_columns: Some(
                [
                    "title",
                    "description",
                    "start_date",
                    "end_date",
                    "created",
                    "modified",
                ]
                .map(String::from)
                .to_vec(),
            ),
            deleted: None,
            is_new: Some(true),
        }
    }

    fn title_of(conn: &Connection, id: &str) -> Option<String> {
        conn.query_row("SELECT title FROM event WHERE id = ?1", [id], |row| {
            row.get(0)
        })
        .ok()
    }

    #[test]
    fn insert_lands_the_declared_columns() {
        let mut conn = conn();
        let tx = conn.transaction().unwrap();
        apply_change_set(&tx, &ChangeSet::new(vec![insert_change("a1", "Standup")])).unwrap();
        tx.commit().unwrap();

        assert_eq!(title_of(&conn, "a1").as_deref(), Some("Standup"));
        let created: String = conn
            .query_row("SELECT created FROM event WHERE id = 'a1'", [], |row| {
                row.get(0)
            })
            .unwrap();
        assert_eq!(created, "2024-01-01T08:00:00Z");
    }

    #[test]
    fn reshipped_insert_converges() {
        let mut conn = conn();
        let tx = conn.transaction().unwrap();
        apply_change_set(&tx, &ChangeSet::new(vec![insert_change("a1", "Standup")])).unwrap();
        let mut again = insert_change("a1", "Standup (moved)");
        again.modified = Some("2024-01-01T09:30:00Z".into());
        apply_change_set(&tx, &ChangeSet::new(vec![again])).unwrap();
        tx.commit().unwrap();

        assert_eq!(title_of(&conn, "a1").as_deref(), Some("Standup (moved)"));
        let count: i64 = conn
            .query_row("SELECT count(*) FROM event", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn update_touches_only_declared_columns() {
        let mut conn = conn();
        let tx = conn.transaction().unwrap();
        apply_change_set(&tx, &ChangeSet::new(vec![insert_change("a1", "Standup")])).unwrap();

        let update = EventChange {
            id: "a1".into(),
            title: Some("Standup (moved)".into()),
            description: None,
            start_date: None,
            end_date: None,
            created: "2024-01-01T08:00:00Z".into(),
            modified: Some("2024-01-02T08:00:00Z".into()),
            modified_columns: Some(vec!["title".into(), "modified".into()]),
            deleted: None,
            is_new: None,
        };
        apply_change_set(&tx, &ChangeSet::new(vec![update])).unwrap();
        tx.commit().unwrap();

        assert_eq!(title_of(&conn, "a1").as_deref(), Some("Standup (moved)"));
        let (start, modified): (String, String) = conn
            .query_row(
                "SELECT start_date, modified FROM event WHERE id = 'a1'",
                [],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .unwrap();
        assert_eq!(start, "2024-01-01T09:00:00Z");
        assert_eq!(modified, "2024-01-02T08:00:00Z");
    }

    #[test]
    fn delete_removes_the_row() {
        let mut conn = conn();
        let tx = conn.transaction().unwrap();
        apply_change_set(&tx, &ChangeSet::new(vec![insert_change("a1", "Standup")])).unwrap();

        let delete = EventChange {
            id: "a1".into(),
            title: None,
            description: None,
            start_date: None,
            end_date: None,
            created: "2024-01-01T08:00:00Z".into(),
            modified: None,
            modified_columns: None,
            deleted: Some(true),
            is_new: None,
        };
        apply_change_set(&tx, &ChangeSet::new(vec![delete])).unwrap();
        tx.commit().unwrap();

        assert_eq!(title_of(&conn, "a1"), None);
    }

    #[test]
    fn incomplete_insert_fails_the_batch() {
        let mut conn = conn();
        let tx = conn.transaction().unwrap();

        // Declares start_date but carries no value for it: NOT NULL
        // constraint failure inside the transaction.
        let mut broken = insert_change("a2", "Broken");
        broken.start_date = None;

        let set = ChangeSet::new(vec![insert_change("a1", "Standup"), broken]);
        assert!(apply_change_set(&tx, &set).is_err());
    }
}
