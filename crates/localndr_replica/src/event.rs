//! Event domain types.

use crate::error::{StoreError, StoreResult};
use chrono::{DateTime, SecondsFormat, Utc};
use uuid::Uuid;

/// A calendar event as seen by user-facing queries.
///
/// Change-tracking bookkeeping (`synced`, `sent_to_server`,
/// `modified_columns`, `new`, `deleted`) stays inside the store and is
/// never part of this type.
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    /// Stable identifier, globally unique across devices.
    pub id: String,
    /// Title.
    pub title: String,
    /// Free-form description.
    pub description: String,
    /// Start instant.
    pub start_date: DateTime<Utc>,
    /// End instant.
    pub end_date: DateTime<Utc>,
    /// Creation instant.
    pub created: DateTime<Utc>,
    /// Last-modified instant; advances on every user-visible mutation.
    pub modified: DateTime<Utc>,
}

/// Fields for creating a new local event.
#[derive(Debug, Clone)]
pub struct EventDraft {
    /// Title.
    pub title: String,
    /// Description.
    pub description: String,
    /// Start instant.
    pub start_date: DateTime<Utc>,
    /// End instant.
    pub end_date: DateTime<Utc>,
}

impl EventDraft {
    /// Materializes the draft into an event with a fresh random id and
    /// `created = modified = now`.
    pub fn into_event(self, now: DateTime<Utc>) -> Event {
        Event {
            id: Uuid::new_v4().to_string(),
            title: self.title,
            description: self.description,
            start_date: self.start_date,
            end_date: self.end_date,
            created: now,
            modified: now,
        }
    }
}

/// A partial update of one event's user-visible fields.
#[derive(Debug, Clone, Default)]
pub struct EventPatch {
    /// New title, if changed.
    pub title: Option<String>,
    /// New description, if changed.
    pub description: Option<String>,
    /// New start instant, if changed.
    pub start_date: Option<DateTime<Utc>>,
    /// New end instant, if changed.
    pub end_date: Option<DateTime<Utc>>,
}

impl EventPatch {
    /// Returns true if the patch touches nothing.
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.start_date.is_none()
            && self.end_date.is_none()
    }
}

/// Formats a timestamp the way the store and the wire expect it.
///
/// RFC 3339, UTC, minimal sub-second digits. The `modified` text is the
/// optimistic-concurrency token, so formatting must be byte-stable.
pub(crate) fn format_ts(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

/// Parses a stored RFC 3339 timestamp.
pub(crate) fn parse_ts(value: &str) -> StoreResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StoreError::invalid_timestamp(value, e))
}
