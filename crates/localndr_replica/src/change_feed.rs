//! Live dirty-count feed.
//!
//! The store pushes a fresh `count(dirty rows)` snapshot to every
//! subscriber after each committed write, instead of making the push
//! path poll. Subscribers receive the current count immediately on
//! subscription so a listener attaching after rows were dirtied still
//! observes them.

use parking_lot::RwLock;
use std::sync::Arc;

/// Callback receiving dirty-count snapshots.
pub type DirtyCountCallback = Box<dyn Fn(i64) + Send + Sync>;

/// Registry of dirty-count subscribers.
#[derive(Default)]
pub struct DirtyCountFeed {
    subscribers: RwLock<Vec<Arc<dyn Fn(i64) + Send + Sync>>>,
}

impl DirtyCountFeed {
    /// Creates an empty feed.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a subscriber. Subscriptions last for the life of the
    /// store; the original write path never detaches either.
    pub fn subscribe(&self, callback: DirtyCountCallback) {
        self.subscribers.write().push(Arc::from(callback));
    }

    /// Emits a snapshot to every subscriber.
    ///
    /// The subscriber list is snapshotted before any callback runs.
    /// Callbacks may re-enter the feed (the push path acknowledges rows
    /// from inside a notification, which emits again) and may register
    /// new subscribers mid-emit; neither blocks on the list lock.
    pub fn emit(&self, count: i64) {
        let subscribers = self.subscribers.read().clone();
        for callback in &subscribers {
            callback(count);
        }
    }

    /// Number of registered subscribers.
    pub fn len(&self) -> usize {
        self.subscribers.read().len()
    }

    /// Returns true if nobody is listening.
    pub fn is_empty(&self) -> bool {
        self.subscribers.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
    use std::sync::Arc;

    #[test]
    fn emits_to_all_subscribers() {
        let feed = DirtyCountFeed::new();
        let seen_a = Arc::new(AtomicI64::new(-1));
        let seen_b = Arc::new(AtomicI64::new(-1));

        let a = Arc::clone(&seen_a);
        feed.subscribe(Box::new(move |count| a.store(count, Ordering::SeqCst)));
        let b = Arc::clone(&seen_b);
        feed.subscribe(Box::new(move |count| b.store(count, Ordering::SeqCst)));

        feed.emit(3);
        assert_eq!(seen_a.load(Ordering::SeqCst), 3);
        assert_eq!(seen_b.load(Ordering::SeqCst), 3);
        assert_eq!(feed.len(), 2);
    }

    #[test]
    fn empty_feed_emits_to_nobody() {
        let feed = DirtyCountFeed::new();
        assert!(feed.is_empty());
        feed.emit(1);
    }

    // An acknowledge running inside a notification emits again and may
    // coincide with a new context subscribing. Both must go through
    // while the outer emit is still delivering.
    #[test]
    fn callbacks_may_reenter_the_feed() {
        let feed = Arc::new(DirtyCountFeed::new());
        let hits = Arc::new(AtomicI64::new(0));
        let late_hits = Arc::new(AtomicI64::new(0));

        let reentrant = Arc::clone(&feed);
        let once = Arc::new(AtomicBool::new(false));
        let counter = Arc::clone(&hits);
        let late = Arc::clone(&late_hits);
        feed.subscribe(Box::new(move |count| {
            counter.fetch_add(1, Ordering::SeqCst);
            if !once.swap(true, Ordering::SeqCst) {
                let late = Arc::clone(&late);
                reentrant.subscribe(Box::new(move |_| {
                    late.fetch_add(1, Ordering::SeqCst);
                }));
                reentrant.emit(count - 1);
            }
        }));

        feed.emit(1);

        assert_eq!(feed.len(), 2);
        // Original subscriber saw the outer and the nested emit.
        assert_eq!(hits.load(Ordering::SeqCst), 2);
        // The mid-emit subscriber only saw emissions after it attached.
        assert_eq!(late_hits.load(Ordering::SeqCst), 1);
    }
}
