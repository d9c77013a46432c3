//! Configuration for the sync engine.

use localndr_protocol::ShapeOptions;
use std::time::Duration;

/// Default write-back endpoint.
pub const DEFAULT_WRITE_SERVER_URL: &str = "http://localhost:3001";

/// Default replication-stream endpoint.
pub const DEFAULT_REPLICATION_URL: &str = "http://localhost:3000";

/// Environment variable overriding the write-back endpoint.
pub const WRITE_SERVER_URL_VAR: &str = "WRITE_SERVER_URL";

/// Environment variable overriding the replication-stream endpoint.
pub const REPLICATION_URL_VAR: &str = "ELECTRIC_API_URL";

/// Configuration for sync operations.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Base URL of the write-back server.
    pub write_server_url: String,
    /// Base URL of the replication-stream server.
    pub replication_url: String,
    /// Synchronized table.
    pub table: String,
    /// Shape key identifying the subscription.
    pub shape_key: String,
    /// Request timeout for write-back calls.
    pub timeout: Duration,
}

impl SyncConfig {
    /// Creates a configuration with the default endpoints.
    pub fn new() -> Self {
        Self {
            write_server_url: DEFAULT_WRITE_SERVER_URL.into(),
            replication_url: DEFAULT_REPLICATION_URL.into(),
            table: "event".into(),
            shape_key: "event".into(),
            timeout: Duration::from_secs(30),
        }
    }

    /// Creates a configuration from the environment, falling back to
    /// the defaults for anything unset.
    pub fn from_env() -> Self {
        let mut config = Self::new();
        if let Ok(url) = std::env::var(WRITE_SERVER_URL_VAR) {
            config.write_server_url = url;
        }
        if let Ok(url) = std::env::var(REPLICATION_URL_VAR) {
            config.replication_url = url;
        }
        config
    }

    /// Sets the write-back server URL.
    pub fn with_write_server_url(mut self, url: impl Into<String>) -> Self {
        self.write_server_url = url.into();
        self
    }

    /// Sets the replication-stream server URL.
    pub fn with_replication_url(mut self, url: impl Into<String>) -> Self {
        self.replication_url = url.into();
        self
    }

    /// Sets the synchronized table and shape key.
    pub fn with_table(mut self, table: impl Into<String>) -> Self {
        let table = table.into();
        self.shape_key = table.clone();
        self.table = table;
        self
    }

    /// Sets the write-back request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// The shape subscription this configuration describes.
    pub fn shape(&self) -> ShapeOptions {
        let base = self.replication_url.trim_end_matches('/');
        ShapeOptions::new(format!("{base}/v1/shape"), &self.table).with_shape_key(&self.shape_key)
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self::new()
    }
}
