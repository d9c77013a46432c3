//! Change-set types for the write path.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type for change-set validation.
pub type ChangeResult<T> = Result<T, ChangeError>;

/// Columns of the `event` table a client change may declare as modified.
///
/// `created` is declarable only by insert changes; everything outside
/// this list is either the key (`id`) or local bookkeeping that never
/// crosses the wire (`synced`, `sent_to_server`, `modified_columns`,
/// `new`, `deleted`).
pub const UPDATABLE_COLUMNS: &[&str] = &[
    "title",
    "description",
    "start_date",
    "end_date",
    "created",
    "modified",
];

/// Errors produced while validating a change-set.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ChangeError {
    /// A change is missing its identifier.
    #[error("change is missing an id")]
    MissingId,

    /// A change declared a column outside the updatable whitelist.
    #[error("column {column:?} of event {id} is not updatable")]
    UnknownColumn {
        /// Event identifier.
        id: String,
        /// Offending column name.
        column: String,
    },

    /// An insert or update declared no modified columns.
    #[error("event {0} declares no modified columns")]
    EmptyColumnSet(String),

    /// The JSON document did not parse as a change-set.
    #[error("malformed change-set: {0}")]
    Malformed(String),
}

/// A single client-originated change to one row of the `event` table.
///
/// Optional fields are omitted from the wire when the column was not
/// touched; `modified` doubles as the optimistic-concurrency token the
/// client later uses to acknowledge the change locally.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventChange {
    /// Stable, client-generated identifier (random 128-bit).
    pub id: String,
    /// Event title, when changed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Event description, when changed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Start instant (RFC 3339), when changed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_date: Option<String>,
    /// End instant (RFC 3339), when changed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_date: Option<String>,
    /// Creation instant (RFC 3339). Always present.
    pub created: String,
    /// Last-modified instant (RFC 3339); the concurrency token.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modified: Option<String>,
    /// Names of the columns this change touches.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modified_columns: Option<Vec<String>>,
    /// Soft-delete marker; a deleted change removes the row upstream.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deleted: Option<bool>,
    /// New-row marker; a new change inserts rather than updates.
    #[serde(default, skip_serializing_if = "Option::is_none", rename = "new")]
    pub is_new: Option<bool>,
}

impl EventChange {
    /// Returns true if this change deletes the row.
    pub fn is_delete(&self) -> bool {
        self.deleted.unwrap_or(false)
    }

    /// Returns true if this change inserts a new row.
    pub fn is_insert(&self) -> bool {
        !self.is_delete() && self.is_new.unwrap_or(false)
    }

    /// The declared modified columns, empty if none were sent.
    pub fn columns(&self) -> &[String] {
        self.modified_columns.as_deref().unwrap_or(&[])
    }

    /// Validates the change against the column whitelist.
    ///
    /// Deletes need no column set; inserts and updates must declare at
    /// least one updatable column.
    pub fn validate(&self) -> ChangeResult<()> {
        if self.id.trim().is_empty() {
            return Err(ChangeError::MissingId);
        }

        if self.is_delete() {
            return Ok(());
        }

        let columns = self.columns();
        if columns.is_empty() {
            return Err(ChangeError::EmptyColumnSet(self.id.clone()));
        }

        for column in columns {
            if !UPDATABLE_COLUMNS.contains(&column.as_str()) {
                return Err(ChangeError::UnknownColumn {
                    id: self.id.clone(),
                    column: column.clone(),
                });
            }
        }

        Ok(())
    }

    /// Looks up the wire value for one declared column.
    pub fn column_value(&self, column: &str) -> Option<&str> {
        match column {
            "title" => self.title.as_deref(),
            "description" => self.description.as_deref(),
            "start_date" => self.start_date.as_deref(),
            "end_date" => self.end_date.as_deref(),
            "created" => Some(self.created.as_str()),
            "modified" => self.modified.as_deref(),
            _ => None,
        }
    }
}

/// A batch of changes shipped to the write-back server in one request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChangeSet {
    /// Changes to the `event` table.
    pub events: Vec<EventChange>,
}

impl ChangeSet {
    /// Creates a change-set from a batch of event changes.
    pub fn new(events: Vec<EventChange>) -> Self {
        Self { events }
    }

    /// Returns true if there is nothing to apply.
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Validates every change in the batch.
    ///
    /// Fails on the first invalid change; the server applies either the
    /// whole batch or none of it, so partial validation is pointless.
    pub fn validate(&self) -> ChangeResult<()> {
        for change in &self.events {
            change.validate()?;
        }
        Ok(())
    }

    /// Parses and validates a change-set from a JSON document.
    pub fn from_json(body: &str) -> ChangeResult<Self> {
        let set: Self =
            serde_json::from_str(body).map_err(|e| ChangeError::Malformed(e.to_string()))?;
        set.validate()?;
        Ok(set)
    }
}

/// Response body of `POST /apply-changes`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApplyChangesResponse {
    /// Present and true when the whole batch applied.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub success: Option<bool>,
    /// Error description for 400/500 responses.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ApplyChangesResponse {
    /// The success response.
    pub fn ok() -> Self {
        Self {
            success: Some(true),
            error: None,
        }
    }

    /// An error response with the given message.
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            success: None,
            error: Some(message.into()),
        }
    }

    /// Returns true if the batch applied.
    pub fn is_success(&self) -> bool {
        self.success.unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn update_change(id: &str) -> EventChange {
        EventChange {
            id: id.into(),
            title: Some("Dentist".into()),
            description: None,
            start_date: None,
            end_date: None,
            created: "2024-01-01T09:00:00Z".into(),
            modified: Some("2024-01-02T10:00:00Z".into()),
            modified_columns: Some(vec!["title".into(), "modified".into()]),
            deleted: None,
            is_new: None,
        }
    }

    #[test]
    fn update_change_validates() {
        assert!(update_change("a1").validate().is_ok());
    }

    #[test]
    fn missing_id_rejected() {
        let mut change = update_change("");
        change.id = "  ".into();
        assert_eq!(change.validate(), Err(ChangeError::MissingId));
    }

    #[test]
    fn unknown_column_rejected() {
        let mut change = update_change("a1");
        change.modified_columns = Some(vec!["synced".into()]);
        assert!(matches!(
            change.validate(),
            Err(ChangeError::UnknownColumn { .. })
        ));
    }

    #[test]
    fn empty_column_set_rejected_for_update() {
        let mut change = update_change("a1");
        change.modified_columns = Some(vec![]);
        assert_eq!(
            change.validate(),
            Err(ChangeError::EmptyColumnSet("a1".into()))
        );
    }

    #[test]
    fn delete_needs_no_columns() {
        let mut change = update_change("a1");
        change.deleted = Some(true);
        change.modified_columns = None;
        assert!(change.validate().is_ok());
        assert!(change.is_delete());
        assert!(!change.is_insert());
    }

    #[test]
    fn new_flag_round_trips_as_new() {
        let mut change = update_change("a1");
        change.is_new = Some(true);

        let json = serde_json::to_string(&change).unwrap();
        assert!(json.contains("\"new\":true"));

        let back: EventChange = serde_json::from_str(&json).unwrap();
        assert!(back.is_insert());
    }

    #[test]
    fn untouched_fields_stay_off_the_wire() {
        let change = update_change("a1");
        let json = serde_json::to_string(&change).unwrap();
        assert!(!json.contains("description"));
        assert!(!json.contains("deleted"));
    }

    #[test]
    fn change_set_from_json_validates() {
        let body = r#"{"events":[{"id":"a1","created":"2024-01-01T09:00:00Z","deleted":true}]}"#;
        let set = ChangeSet::from_json(body).unwrap();
        assert_eq!(set.events.len(), 1);
        assert!(set.events[0].is_delete());

        let bad = r#"{"events":[{"created":"2024-01-01T09:00:00Z"}]}"#;
        assert!(matches!(
            ChangeSet::from_json(bad),
            Err(ChangeError::Malformed(_))
        ));

        let invalid = r#"{"events":[{"id":"a1","created":"2024-01-01T09:00:00Z"}]}"#;
        assert_eq!(
            ChangeSet::from_json(invalid),
            Err(ChangeError::EmptyColumnSet("a1".into()))
        );
    }

    #[test]
    fn apply_response_bodies() {
        assert_eq!(
            serde_json::to_string(&ApplyChangesResponse::ok()).unwrap(),
            r#"{"success":true}"#
        );
        let err = ApplyChangesResponse::error("Invalid changes");
        assert!(!err.is_success());
        assert_eq!(
            serde_json::to_string(&err).unwrap(),
            r#"{"error":"Invalid changes"}"#
        );
    }

    #[test]
    fn column_value_lookup() {
        let change = update_change("a1");
        assert_eq!(change.column_value("title"), Some("Dentist"));
        assert_eq!(change.column_value("modified"), Some("2024-01-02T10:00:00Z"));
        assert_eq!(change.column_value("description"), None);
        assert_eq!(change.column_value("id"), None);
    }
}
