//! # localndr write server
//!
//! The authoritative side of the write path. Clients batch their
//! locally dirtied rows into change-sets and POST them to
//! `/apply-changes`; the server validates the batch, applies it to the
//! authoritative `event` table in a single transaction, and answers
//! `{"success":true}` or an error with the matching status code (400
//! for invalid batches, 500 for apply failures).
//!
//! The applied rows flow back to every replica through the replication
//! stream, which is what finally marks them synced; this server never
//! talks to the replicas directly.

mod apply;
mod config;
mod error;
mod http;
mod schema;
mod seed;
mod server;

pub use config::{ConfigError, ServerConfig};
pub use error::{ServerError, ServerResult};
pub use http::{app_router, AppState};
pub use seed::demo_events;
pub use server::{StoredEvent, WriteServer};
