//! Server configuration from the environment.

use std::env;
use std::path::PathBuf;
use thiserror::Error;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// An environment variable held an unusable value.
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Runtime configuration of the write server.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Listen address.
    pub bind_addr: String,
    /// SQLite file; in-memory when unset.
    pub database_path: Option<PathBuf>,
    /// Demo events to seed into an empty store.
    pub seed_events: usize,
}

impl ServerConfig {
    /// Reads `BIND_ADDR`, `DATABASE_PATH` and `SEED_EVENTS`, falling
    /// back to a local development setup.
    pub fn from_env() -> Result<Self, ConfigError> {
        let bind_addr = env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3001".into());
        let database_path = env::var("DATABASE_PATH").ok().map(PathBuf::from);
        let seed_events = match env::var("SEED_EVENTS") {
            Ok(value) => value
                .parse()
                .map_err(|_| ConfigError::Invalid(format!("SEED_EVENTS: {value:?}")))?,
            Err(_) => 0,
        };
        Ok(Self {
            bind_addr,
            database_path,
            seed_events,
        })
    }
}
