//! # localndr replica
//!
//! The on-device copy of the synchronized dataset.
//!
//! This crate provides:
//! - The `EventStore` seam the sync controllers drive
//! - A SQLite-backed implementation with trigger-maintained change
//!   tracking (dirty flag, changed-column set, new/deleted markers)
//! - The live dirty-count feed that wakes the push path
//!
//! ## Change-tracking contract
//!
//! Every row of the `event` table carries `synced`, `sent_to_server`,
//! `modified_columns`, `new` and `deleted` alongside the user-visible
//! columns. Local writes dirty a row through SQLite triggers; rows
//! arriving from the replication stream bypass the triggers and land
//! pre-clean. A row is eligible for push exactly when `synced = 0` and
//! `sent_to_server = 0`.

mod change_feed;
mod error;
mod event;
mod schema;
mod store;

pub use change_feed::{DirtyCountCallback, DirtyCountFeed};
pub use error::{StoreError, StoreResult};
pub use event::{Event, EventDraft, EventPatch};
pub use store::{EventStore, SqliteEventStore};
