//! Replication-stream subscription parameters.

use serde::{Deserialize, Serialize};

/// How the replication stream groups incoming changes into commits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CommitGranularity {
    /// Buffer rows and emit a single signal once the snapshot is caught up.
    UpToDate,
    /// Emit every change as it arrives.
    Incremental,
}

/// Parameters for subscribing to a server-defined shape of one table.
///
/// A shape is a filtered view of a table that the replication stream
/// replays into the local replica.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShapeOptions {
    /// Shape endpoint URL (e.g. `http://localhost:3000/v1/shape`).
    pub url: String,
    /// Table the shape covers.
    pub table: String,
    /// Key identifying this shape subscription across restarts.
    pub shape_key: String,
    /// Primary key column list of the target table.
    pub primary_key: Vec<String>,
    /// Commit granularity for incoming changes.
    pub commit_granularity: CommitGranularity,
    /// Whether the initial snapshot may use the trigger-bypassing bulk
    /// load path.
    pub use_copy: bool,
}

impl ShapeOptions {
    /// Creates shape options with the usual defaults for a single-pk table.
    pub fn new(url: impl Into<String>, table: impl Into<String>) -> Self {
        let table = table.into();
        Self {
            url: url.into(),
            shape_key: table.clone(),
            table,
            primary_key: vec!["id".into()],
            commit_granularity: CommitGranularity::UpToDate,
            use_copy: true,
        }
    }

    /// Sets the shape key.
    pub fn with_shape_key(mut self, key: impl Into<String>) -> Self {
        self.shape_key = key.into();
        self
    }

    /// Sets the primary key column list.
    pub fn with_primary_key(mut self, columns: Vec<String>) -> Self {
        self.primary_key = columns;
        self
    }

    /// Sets the commit granularity.
    pub fn with_commit_granularity(mut self, granularity: CommitGranularity) -> Self {
        self.commit_granularity = granularity;
        self
    }

    /// Disables the bulk load path.
    pub fn without_copy(mut self) -> Self {
        self.use_copy = false;
        self
    }
}

/// Shape options for the `event` table against a stream base URL.
pub fn event_shape(base_url: &str) -> ShapeOptions {
    let base = base_url.trim_end_matches('/');
    ShapeOptions::new(format!("{base}/v1/shape"), "event")
}
