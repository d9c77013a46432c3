//! Sync status broadcast shared across contexts.
//!
//! The engine publishes its status as a durable last-value record in a
//! shared key/value slot, plus a change notification. A context that
//! attaches late (another tab, a worker restarted mid-session) reads
//! the last value instead of waiting for the next transition, so the
//! broadcast never strands anyone in `initializing`.

use crate::error::{SyncError, SyncResult};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::mpsc;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Slot key the status record is published under.
pub const STATUS_KEY: &str = "syncStatus";

/// Lifecycle state of the sync engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncStatus {
    /// The engine has not finished bringing the replica up.
    Initializing,
    /// The bootstrap is in progress.
    Syncing,
    /// The replica is caught up and usable.
    Ready,
    /// The engine hit a terminal error.
    Error,
}

/// A shared last-value key/value slot visible to every context.
///
/// Implementations must deliver `set` values to subscribers of the same
/// key, including subscribers in the writing context.
pub trait SharedSlot: Send + Sync {
    /// Reads the current value for a key.
    fn get(&self, key: &str) -> Option<String>;

    /// Durably stores a value and notifies subscribers of the key.
    fn set(&self, key: &str, value: &str);

    /// Registers a subscriber for changes to one key.
    fn subscribe(&self, key: &str, callback: Box<dyn Fn(&str) + Send + Sync>);
}

/// In-process slot for single-context deployments and tests.
#[derive(Default)]
pub struct MemorySlot {
    values: RwLock<HashMap<String, String>>,
    subscribers: RwLock<HashMap<String, Vec<Arc<dyn Fn(&str) + Send + Sync>>>>,
}

impl MemorySlot {
    /// Creates an empty slot.
    pub fn new() -> Self {
        Self::default()
    }
}

impl SharedSlot for MemorySlot {
    fn get(&self, key: &str) -> Option<String> {
        self.values.read().get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) {
        self.values.write().insert(key.into(), value.into());
        // Callbacks run outside the registry lock; a subscriber may
        // publish or subscribe from inside its notification.
        let callbacks = self
            .subscribers
            .read()
            .get(key)
            .cloned()
            .unwrap_or_default();
        for callback in &callbacks {
            callback(value);
        }
    }

    fn subscribe(&self, key: &str, callback: Box<dyn Fn(&str) + Send + Sync>) {
        self.subscribers
            .write()
            .entry(key.into())
            .or_default()
            .push(Arc::from(callback));
    }
}

/// Callback receiving status transitions.
pub type StatusCallback = Box<dyn Fn(SyncStatus, &str) + Send + Sync>;

/// Publishes and observes the engine status over a [`SharedSlot`].
pub struct StatusBroadcaster {
    slot: Arc<dyn SharedSlot>,
}

impl StatusBroadcaster {
    /// Creates a broadcaster over the given slot.
    pub fn new(slot: Arc<dyn SharedSlot>) -> Self {
        Self { slot }
    }

    /// Publishes a status transition.
    pub fn set(&self, status: SyncStatus, message: &str) {
        tracing::debug!(?status, message, "sync status");
        match serde_json::to_string(&(status, message)) {
            Ok(encoded) => self.slot.set(STATUS_KEY, &encoded),
            Err(err) => tracing::error!(error = %err, "failed to encode sync status"),
        }
    }

    /// The current status, defaulting to `initializing` before the
    /// first publication.
    pub fn current(&self) -> (SyncStatus, String) {
        self.slot
            .get(STATUS_KEY)
            .and_then(|value| decode(&value))
            .unwrap_or((SyncStatus::Initializing, "Initializing database...".into()))
    }

    /// Subscribes to status transitions.
    ///
    /// The callback fires immediately with the current status, then on
    /// every later publication.
    pub fn subscribe(&self, callback: StatusCallback) {
        let (status, message) = self.current();
        callback(status, &message);
        self.slot.subscribe(
            STATUS_KEY,
            Box::new(move |value| {
                if let Some((status, message)) = decode(value) {
                    callback(status, &message);
                }
            }),
        );
    }

    /// Blocks until the engine reports `ready`, at most `timeout`.
    ///
    /// Resolves exactly once per caller: `ready` yields `Ok`, a
    /// published `error` or the timeout yields `Err`.
    pub fn wait_until_ready(&self, timeout: Duration) -> SyncResult<()> {
        let deadline = Instant::now() + timeout;
        let (tx, rx) = mpsc::channel();
        let tx = Mutex::new(tx);
        self.subscribe(Box::new(move |status, message| {
            let _ = tx.lock().send((status, message.to_string()));
        }));

        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match rx.recv_timeout(remaining) {
                Ok((SyncStatus::Ready, _)) => return Ok(()),
                Ok((SyncStatus::Error, message)) => return Err(SyncError::Bootstrap(message)),
                Ok(_) => continue,
                Err(_) => {
                    return Err(SyncError::Bootstrap(format!(
                        "database not ready after {timeout:?}"
                    )))
                }
            }
        }
    }
}

fn decode(value: &str) -> Option<(SyncStatus, String)> {
    serde_json::from_str(value).ok()
}
