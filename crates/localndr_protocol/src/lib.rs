//! # localndr sync protocol
//!
//! Wire types shared between the client-side sync engine and the
//! write-back server.
//!
//! This crate provides:
//! - Change-set types (`EventChange`, `ChangeSet`) mirroring the
//!   change-tracking columns of the replicated `event` table
//! - Validation against the updatable-column whitelist
//! - Replication-stream subscription parameters (`ShapeOptions`)
//!
//! ## Wire format
//!
//! All messages are JSON. The change-set is posted as a single document
//! to `POST /apply-changes`; the server answers `{"success": true}` on
//! 200 and `{"error": "..."}` on 400/500.

mod changes;
mod shape;

pub use changes::{
    ApplyChangesResponse, ChangeError, ChangeResult, ChangeSet, EventChange, UPDATABLE_COLUMNS,
};
pub use shape::{event_shape, CommitGranularity, ShapeOptions};
