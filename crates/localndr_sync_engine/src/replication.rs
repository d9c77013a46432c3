//! The replication-stream seam.
//!
//! The pull controller consumes a shape subscription through the
//! [`ReplicationStream`] trait. A production implementation bridges to
//! an HTTP long-poll shape endpoint; tests drive the
//! [`MockReplicationStream`].

use crate::error::{SyncError, SyncResult};
use localndr_protocol::ShapeOptions;
use localndr_replica::Event;
use parking_lot::Mutex;

/// One delivery from the replication stream.
#[derive(Debug, Clone)]
pub enum StreamMessage {
    /// Rows inserted or updated upstream, in commit order.
    Upsert(Vec<Event>),
    /// Identifiers of rows deleted upstream.
    Delete(Vec<String>),
    /// The subscription has replayed everything up to the current
    /// upstream position.
    UpToDate,
}

/// Callbacks a subscriber hands to the stream.
pub struct StreamHandler {
    /// Invoked for every stream delivery, in order.
    pub on_message: Box<dyn Fn(StreamMessage) + Send + Sync>,
    /// Invoked when the subscription fails after it was established.
    pub on_error: Box<dyn Fn(SyncError) + Send + Sync>,
}

/// A source of replicated rows for one shape.
pub trait ReplicationStream: Send + Sync {
    /// Establishes the subscription and begins delivering messages.
    ///
    /// Messages may be delivered from the caller's thread (before this
    /// returns) or from a background thread; the handler must cope with
    /// both.
    fn subscribe(&self, shape: &ShapeOptions, handler: StreamHandler) -> SyncResult<()>;
}

/// Scripted stream for tests.
///
/// Messages queued before `subscribe` are replayed synchronously inside
/// the `subscribe` call; messages pushed afterwards are delivered to
/// the stored handler inline.
#[derive(Default)]
pub struct MockReplicationStream {
    queued: Mutex<Vec<StreamMessage>>,
    handler: Mutex<Option<StreamHandler>>,
    shapes: Mutex<Vec<ShapeOptions>>,
    subscribe_error: Mutex<Option<String>>,
    queued_error: Mutex<Option<String>>,
}

impl MockReplicationStream {
    /// Creates an empty stream.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a message for replay during `subscribe`.
    pub fn queue(&self, message: StreamMessage) {
        self.queued.lock().push(message);
    }

    /// Delivers a message to the live handler.
    ///
    /// Returns false if nobody has subscribed yet.
    pub fn push(&self, message: StreamMessage) -> bool {
        let handler = self.handler.lock();
        match handler.as_ref() {
            Some(handler) => {
                (handler.on_message)(message);
                true
            }
            None => false,
        }
    }

    /// Delivers a stream failure to the live handler.
    pub fn emit_error(&self, message: impl Into<String>) -> bool {
        let handler = self.handler.lock();
        match handler.as_ref() {
            Some(handler) => {
                (handler.on_error)(SyncError::Bootstrap(message.into()));
                true
            }
            None => false,
        }
    }

    /// Makes the next `subscribe` call fail.
    pub fn fail_next_subscribe(&self, message: impl Into<String>) {
        *self.subscribe_error.lock() = Some(message.into());
    }

    /// Queues a stream failure delivered right after the queued
    /// messages replay.
    pub fn queue_error(&self, message: impl Into<String>) {
        *self.queued_error.lock() = Some(message.into());
    }

    /// Shapes passed to `subscribe` so far.
    pub fn subscribed_shapes(&self) -> Vec<ShapeOptions> {
        self.shapes.lock().clone()
    }
}

impl ReplicationStream for MockReplicationStream {
    fn subscribe(&self, shape: &ShapeOptions, handler: StreamHandler) -> SyncResult<()> {
        if let Some(message) = self.subscribe_error.lock().take() {
            return Err(SyncError::Bootstrap(message));
        }
        self.shapes.lock().push(shape.clone());

        let queued: Vec<StreamMessage> = self.queued.lock().drain(..).collect();
        for message in queued {
            (handler.on_message)(message);
        }
        if let Some(message) = self.queued_error.lock().take() {
            (handler.on_error)(SyncError::Bootstrap(message));
        }
        *self.handler.lock() = Some(handler);
        Ok(())
    }
}
