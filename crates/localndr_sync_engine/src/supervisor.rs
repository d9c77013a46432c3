//! Leader arbitration and one-shot engine startup.
//!
//! Exactly one context may run the sync engine against a shared
//! replica. The supervisor subscribes to a [`LeaderElection`] seam and
//! starts the pull path, then the push path, the first time leadership
//! is granted. Repeated or redundant grants are ignored; losing
//! leadership does not stop a running engine (the losing context is
//! assumed to be going away).

use crate::config::SyncConfig;
use crate::error::SyncResult;
use crate::http::{HttpClient, WriteBackClient};
use crate::pull::PullController;
use crate::push::PushController;
use crate::replication::ReplicationStream;
use crate::status::{StatusBroadcaster, SyncStatus};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Decides which context runs the engine.
pub trait LeaderElection: Send + Sync {
    /// Registers a leadership listener.
    ///
    /// The callback receives `true` when this context becomes leader
    /// and may fire any number of times.
    fn subscribe(&self, callback: Box<dyn Fn(bool) + Send + Sync>);
}

/// Election for single-context deployments: the caller always leads.
#[derive(Debug, Default, Clone, Copy)]
pub struct SingleContextLeader;

impl LeaderElection for SingleContextLeader {
    fn subscribe(&self, callback: Box<dyn Fn(bool) + Send + Sync>) {
        callback(true);
    }
}

/// Wires the controllers together and guards engine startup.
pub struct SyncSupervisor<C: HttpClient> {
    pull: PullController,
    push: Arc<PushController<C>>,
    status: Arc<StatusBroadcaster>,
    started: AtomicBool,
}

impl<C: HttpClient + 'static> SyncSupervisor<C> {
    /// Assembles an engine from its seams.
    pub fn new(
        config: &SyncConfig,
        store: Arc<dyn localndr_replica::EventStore>,
        stream: Arc<dyn ReplicationStream>,
        client: C,
        status: Arc<StatusBroadcaster>,
    ) -> Arc<Self> {
        let pull = PullController::new(
            Arc::clone(&store),
            stream,
            Arc::clone(&status),
            config.shape(),
        );
        let push = Arc::new(PushController::new(
            store,
            WriteBackClient::new(client, &config.write_server_url),
        ));
        Arc::new(Self {
            pull,
            push,
            status,
            started: AtomicBool::new(false),
        })
    }

    /// Starts the engine once this context wins the election.
    pub fn start(self: &Arc<Self>, leader: &dyn LeaderElection) {
        let supervisor = Arc::clone(self);
        leader.subscribe(Box::new(move |is_leader| {
            if !is_leader {
                return;
            }
            if supervisor.started.swap(true, Ordering::SeqCst) {
                tracing::debug!("sync already started, ignoring leadership grant");
                return;
            }
            if let Err(err) = supervisor.run() {
                tracing::error!(error = %err, "sync failed");
                supervisor
                    .status
                    .set(SyncStatus::Error, &format!("Sync error: {err}"));
            }
        }));
    }

    /// Whether this supervisor has started the engine.
    pub fn is_started(&self) -> bool {
        self.started.load(Ordering::SeqCst)
    }

    fn run(&self) -> SyncResult<()> {
        self.status
            .set(SyncStatus::Initializing, "Starting sync process...");
        self.pull.start()?;
        self.push.start()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::HttpResponse;
    use crate::replication::{MockReplicationStream, StreamMessage};
    use crate::status::{MemorySlot, SharedSlot};
    use localndr_replica::SqliteEventStore;
    use parking_lot::Mutex;
    use std::time::Duration;

    /// Election that records listeners and lets tests fire them.
    #[derive(Default)]
    struct ScriptedElection {
        listeners: Mutex<Vec<Box<dyn Fn(bool) + Send + Sync>>>,
    }

    impl ScriptedElection {
        fn grant(&self, is_leader: bool) {
            for listener in self.listeners.lock().iter() {
                listener(is_leader);
            }
        }
    }

    impl LeaderElection for ScriptedElection {
        fn subscribe(&self, callback: Box<dyn Fn(bool) + Send + Sync>) {
            self.listeners.lock().push(callback);
        }
    }

    struct OkClient;

    impl HttpClient for OkClient {
        fn post_json(&self, _url: &str, _body: &str) -> SyncResult<HttpResponse> {
            Ok(HttpResponse {
                status: 200,
                body: r#"{"success":true}"#.into(),
            })
        }
    }

    fn supervisor(
        stream: &Arc<MockReplicationStream>,
        status: &Arc<StatusBroadcaster>,
    ) -> Arc<SyncSupervisor<OkClient>> {
        let store = Arc::new(SqliteEventStore::open_in_memory().unwrap());
        SyncSupervisor::new(
            &SyncConfig::new(),
            store as Arc<dyn localndr_replica::EventStore>,
            Arc::clone(stream) as Arc<dyn ReplicationStream>,
            OkClient,
            Arc::clone(status),
        )
    }

    fn status_over_memory_slot() -> Arc<StatusBroadcaster> {
        Arc::new(StatusBroadcaster::new(
            Arc::new(MemorySlot::new()) as Arc<dyn SharedSlot>
        ))
    }

    #[test]
    fn engine_starts_once_per_instance() {
        let stream = Arc::new(MockReplicationStream::new());
        stream.queue(StreamMessage::UpToDate);
        let status = status_over_memory_slot();
        let supervisor = supervisor(&stream, &status);

        let election = ScriptedElection::default();
        supervisor.start(&election);
        assert!(!supervisor.is_started());

        election.grant(true);
        assert!(supervisor.is_started());
        assert_eq!(status.current().0, SyncStatus::Ready);

        // A second grant (a worker re-election, a duplicate signal)
        // must not bootstrap again.
        election.grant(true);
        assert_eq!(stream.subscribed_shapes().len(), 1);
    }

    #[test]
    fn losing_leadership_never_starts_the_engine() {
        let stream = Arc::new(MockReplicationStream::new());
        let status = status_over_memory_slot();
        let supervisor = supervisor(&stream, &status);

        let election = ScriptedElection::default();
        supervisor.start(&election);
        election.grant(false);
        assert!(!supervisor.is_started());
        assert!(stream.subscribed_shapes().is_empty());
    }

    #[test]
    fn single_context_leader_starts_immediately() {
        let stream = Arc::new(MockReplicationStream::new());
        stream.queue(StreamMessage::UpToDate);
        let status = status_over_memory_slot();
        let supervisor = supervisor(&stream, &status);

        supervisor.start(&SingleContextLeader);
        assert!(supervisor.is_started());
        status.wait_until_ready(Duration::from_secs(1)).unwrap();
    }

    #[test]
    fn startup_failure_lands_on_the_broadcast() {
        let stream = Arc::new(MockReplicationStream::new());
        stream.fail_next_subscribe("connection refused");
        let status = status_over_memory_slot();
        let supervisor = supervisor(&stream, &status);

        supervisor.start(&SingleContextLeader);
        let (state, message) = status.current();
        assert_eq!(state, SyncStatus::Error);
        assert!(message.contains("connection refused"));
    }
}
