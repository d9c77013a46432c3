//! Push controller: ships dirty rows to the write-back endpoint.
//!
//! Wakes on dirty-count notifications from the store, snapshots the
//! pending rows in one transaction, POSTs them as a change-set and
//! acknowledges them conditionally on their `modified` token. At most
//! one batch is in flight at a time; a notification arriving while a
//! batch is out is deferred, and the controller re-checks for pending
//! work after each successful batch so the deferral loses nothing.

use crate::error::SyncResult;
use crate::http::{HttpClient, WriteBackClient};
use localndr_protocol::ChangeSet;
use localndr_replica::EventStore;
use parking_lot::Mutex;
use std::sync::Arc;

/// Ships locally dirtied rows upstream.
pub struct PushController<C: HttpClient> {
    store: Arc<dyn EventStore>,
    client: WriteBackClient<C>,
    in_flight: Mutex<()>,
}

impl<C: HttpClient + 'static> PushController<C> {
    /// Creates a controller over a store and a write-back client.
    pub fn new(store: Arc<dyn EventStore>, client: WriteBackClient<C>) -> Self {
        Self {
            store,
            client,
            in_flight: Mutex::new(()),
        }
    }

    /// Hooks the controller to the store's dirty-count feed.
    ///
    /// The subscription fires immediately with the current count, so
    /// rows dirtied while the engine was down are shipped right away.
    pub fn start(self: &Arc<Self>) -> SyncResult<()> {
        let controller = Arc::clone(self);
        self.store.subscribe_dirty_count(Box::new(move |count| {
            if count == 0 {
                return;
            }
            if let Err(err) = controller.try_sync() {
                tracing::warn!(error = %err, "write path sync failed");
            }
        }))?;
        Ok(())
    }

    /// Ships pending batches until the table is clean.
    ///
    /// Returns false without doing anything when another batch is
    /// already in flight; the in-flight run re-checks for pending work
    /// before releasing the slot, so the skipped wake-up is covered.
    pub fn try_sync(&self) -> SyncResult<bool> {
        let Some(_guard) = self.in_flight.try_lock() else {
            tracing::debug!("push already in flight, deferring");
            return Ok(false);
        };
        while self.run_once()? {}
        Ok(true)
    }

    /// Ships one batch. Returns false when nothing was pending.
    fn run_once(&self) -> SyncResult<bool> {
        let changes = self.store.pending_changes()?;
        if changes.is_empty() {
            return Ok(false);
        }
        let set = ChangeSet::new(changes);
        set.validate()?;
        self.client.apply_changes(&set)?;

        // Conditional on the modified token: rows edited while the
        // batch was out stay pending and go with the next batch.
        let acknowledged = self.store.acknowledge(&set.events)?;
        tracing::debug!(
            shipped = set.events.len(),
            acknowledged,
            "pushed local changes"
        );
        Ok(true)
    }
}
