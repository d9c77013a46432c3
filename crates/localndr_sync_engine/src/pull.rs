//! Pull controller: bootstrap and steady-state ingestion.
//!
//! On an empty replica the controller disables the change-tracking
//! triggers, bulk-loads the initial snapshot from the replication
//! stream, re-enables the triggers and builds the post-bootstrap
//! indexes before declaring the database ready. A replica that already
//! holds data skips the bootstrap entirely and goes straight to ready
//! while the subscription catches up in the background.
//!
//! A stream failure is terminal for this engine instance; it is
//! published on the status broadcast, never retried.

use crate::error::{SyncError, SyncResult};
use crate::replication::{ReplicationStream, StreamHandler, StreamMessage};
use crate::status::{StatusBroadcaster, SyncStatus};
use localndr_protocol::ShapeOptions;
use localndr_replica::EventStore;
use parking_lot::{Mutex, RwLock};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};

/// Bootstrap progress of the pull path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PullState {
    /// `start` has not been called.
    Uninitialized,
    /// Probing whether the replica already holds data.
    CheckingLocalData,
    /// Waiting for the initial snapshot to stream in.
    Downloading,
    /// Bulk-loading snapshot rows.
    Inserting,
    /// Building the post-bootstrap indexes.
    Indexing,
    /// Caught up; live changes apply as they arrive.
    Ready,
    /// Terminal failure.
    Failed,
}

struct PullShared {
    store: Arc<dyn EventStore>,
    status: Arc<StatusBroadcaster>,
    state: RwLock<PullState>,
    caught_up: AtomicBool,
    post_sync_done: AtomicBool,
    done: Mutex<Option<mpsc::Sender<Result<(), String>>>>,
}

impl PullShared {
    fn set_state(&self, state: PullState) {
        *self.state.write() = state;
    }

    fn send_done(&self, result: Result<(), String>) {
        if let Some(tx) = self.done.lock().take() {
            let _ = tx.send(result);
        }
    }

    /// Terminal failure: publish, record, unblock the bootstrap waiter.
    fn fail(&self, message: &str) {
        tracing::error!(message, "pull path failed");
        self.set_state(PullState::Failed);
        self.status.set(SyncStatus::Error, message);
        self.send_done(Err(message.to_string()));
    }

    fn handle_message(&self, message: StreamMessage) {
        match message {
            StreamMessage::Upsert(events) => {
                if self.caught_up.load(Ordering::SeqCst) {
                    for event in &events {
                        if let Err(err) = self.store.apply_stream_upsert(event) {
                            tracing::error!(error = %err, id = %event.id, "streamed upsert failed");
                        }
                    }
                } else {
                    if *self.state.read() != PullState::Inserting {
                        self.set_state(PullState::Inserting);
                        self.status.set(SyncStatus::Syncing, "Inserting events...");
                    }
                    if let Err(err) = self.store.bulk_insert(&events) {
                        self.fail(&format!("snapshot insert failed: {err}"));
                    }
                }
            }
            StreamMessage::Delete(ids) => {
                for id in &ids {
                    if let Err(err) = self.store.apply_stream_delete(id) {
                        tracing::error!(error = %err, id = %id, "streamed delete failed");
                    }
                }
            }
            StreamMessage::UpToDate => {
                if self.caught_up.swap(true, Ordering::SeqCst) {
                    return;
                }
                match self.finish_bootstrap() {
                    Ok(()) => self.send_done(Ok(())),
                    Err(err) => self.fail(&err.to_string()),
                }
            }
        }
    }

    /// Runs once, after the first `up-to-date` signal of a bootstrap.
    fn finish_bootstrap(&self) -> SyncResult<()> {
        self.store.enable_triggers()?;
        if !self.post_sync_done.swap(true, Ordering::SeqCst) {
            self.set_state(PullState::Indexing);
            self.status.set(SyncStatus::Syncing, "Creating indexes...");
            self.store.create_post_sync_indexes()?;
        }
        Ok(())
    }
}

/// Drives the replica up to date from the replication stream.
pub struct PullController {
    shared: Arc<PullShared>,
    stream: Arc<dyn ReplicationStream>,
    shape: ShapeOptions,
}

impl PullController {
    /// Creates a controller for one shape subscription.
    pub fn new(
        store: Arc<dyn EventStore>,
        stream: Arc<dyn ReplicationStream>,
        status: Arc<StatusBroadcaster>,
        shape: ShapeOptions,
    ) -> Self {
        Self {
            shared: Arc::new(PullShared {
                store,
                status,
                state: RwLock::new(PullState::Uninitialized),
                caught_up: AtomicBool::new(false),
                post_sync_done: AtomicBool::new(false),
                done: Mutex::new(None),
            }),
            stream,
            shape,
        }
    }

    /// Current bootstrap state.
    pub fn state(&self) -> PullState {
        *self.shared.state.read()
    }

    /// Brings the replica up, blocking until it is ready or failed.
    ///
    /// Live changes keep applying through the stream handler after this
    /// returns.
    pub fn start(&self) -> SyncResult<()> {
        let shared = &self.shared;
        shared.set_state(PullState::CheckingLocalData);

        if shared.store.has_events()? {
            // Data survived from an earlier session; serve it
            // immediately and let the subscription catch up live. If
            // that session died mid-bootstrap the triggers are still
            // off, so change tracking must come back before any local
            // write lands.
            shared.store.enable_triggers()?;
            shared.caught_up.store(true, Ordering::SeqCst);
            self.subscribe()?;
            shared.set_state(PullState::Ready);
            shared.status.set(SyncStatus::Ready, "Database ready");
            tracing::info!("replica already populated, skipping bootstrap");
            return Ok(());
        }

        shared.store.disable_triggers()?;
        shared.set_state(PullState::Downloading);
        shared
            .status
            .set(SyncStatus::Syncing, "Downloading shape data...");

        let (tx, rx) = mpsc::channel();
        *shared.done.lock() = Some(tx);
        self.subscribe()?;

        match rx.recv() {
            Ok(Ok(())) => {}
            Ok(Err(message)) => return Err(SyncError::Bootstrap(message)),
            Err(_) => {
                let message = "replication stream closed during bootstrap".to_string();
                shared.set_state(PullState::Failed);
                shared.status.set(SyncStatus::Error, &message);
                return Err(SyncError::Bootstrap(message));
            }
        }

        shared.store.noop_query()?;
        shared.set_state(PullState::Ready);
        shared.status.set(SyncStatus::Ready, "Database ready");
        tracing::info!("initial sync complete");
        Ok(())
    }

    fn subscribe(&self) -> SyncResult<()> {
        let on_message = {
            let shared = Arc::clone(&self.shared);
            Box::new(move |message: StreamMessage| shared.handle_message(message))
        };
        let on_error = {
            let shared = Arc::clone(&self.shared);
            Box::new(move |err: SyncError| shared.fail(&err.to_string()))
        };
        let result = self.stream.subscribe(
            &self.shape,
            StreamHandler {
                on_message,
                on_error,
            },
        );
        if let Err(ref err) = result {
            self.shared.set_state(PullState::Failed);
            self.shared.status.set(SyncStatus::Error, &err.to_string());
        }
        result
    }
}
