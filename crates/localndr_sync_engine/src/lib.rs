//! # localndr sync engine
//!
//! Bidirectional synchronization between the local replica and the
//! upstream store.
//!
//! The engine is two one-way paths plus supervision:
//! - The **pull path** ([`PullController`]) bootstraps an empty
//!   replica from the replication stream and keeps applying live
//!   changes after the initial snapshot.
//! - The **push path** ([`PushController`]) wakes on dirty-row
//!   notifications and ships local changes to the write-back endpoint,
//!   acknowledging them with an optimistic `modified` token.
//! - The [`SyncSupervisor`] starts both exactly once in whichever
//!   context wins the [`LeaderElection`], and the
//!   [`StatusBroadcaster`] keeps every context informed of progress.
//!
//! External I/O goes through seams ([`ReplicationStream`],
//! [`HttpClient`], [`SharedSlot`]) so the whole engine runs in-process
//! under test.

mod config;
mod error;
mod http;
mod pull;
mod push;
mod replication;
mod status;
mod supervisor;

pub use config::{
    SyncConfig, DEFAULT_REPLICATION_URL, DEFAULT_WRITE_SERVER_URL, REPLICATION_URL_VAR,
    WRITE_SERVER_URL_VAR,
};
pub use error::{SyncError, SyncResult};
pub use http::{
    HttpClient, HttpResponse, LoopbackClient, LoopbackServer, ReqwestClient, WriteBackClient,
    APPLY_CHANGES_PATH,
};
pub use pull::{PullController, PullState};
pub use push::PushController;
pub use replication::{MockReplicationStream, ReplicationStream, StreamHandler, StreamMessage};
pub use status::{
    MemorySlot, SharedSlot, StatusBroadcaster, StatusCallback, SyncStatus, STATUS_KEY,
};
pub use supervisor::{LeaderElection, SingleContextLeader, SyncSupervisor};
