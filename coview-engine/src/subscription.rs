//! Subscription cache: one store subscription per handle, many consumers.
//!
//! Every consumer gets its own channel, but all consumers of one handle
//! share a single store-level subscription. When the last consumer leaves,
//! teardown is deferred by a grace window so that rapid unsubscribe/
//! resubscribe churn (repeated reads of the same object, re-render cycles)
//! reuses the still-live subscription instead of thrashing the store.

use coview_store::{RawHandle, SubscriptionHandle};
use coview_types::ObjectId;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, warn};

type SubscriberMap = Arc<Mutex<HashMap<u64, mpsc::UnboundedSender<Value>>>>;
type EntryMap = Arc<Mutex<HashMap<ObjectId, SubEntry>>>;

struct SubEntry {
    /// Logical subscriber count.
    refcount: usize,
    /// Bumped on every zero-crossing; lets a stale grace timer detect that
    /// the entry was re-acquired and torn down again since it was armed.
    epoch: u64,
    next_key: u64,
    subscribers: SubscriberMap,
    /// The single store-level subscription. Dropping it (by removing the
    /// entry) is the only teardown path.
    _store_sub: SubscriptionHandle,
    /// When the count last reached zero.
    last_unsubscribe: Option<Instant>,
}

/// Deduplicating cache of store subscriptions.
pub struct SubscriptionCache {
    entries: EntryMap,
    grace: Duration,
}

impl SubscriptionCache {
    /// Creates a cache with the given grace window.
    #[must_use]
    pub fn new(grace: Duration) -> Self {
        Self {
            entries: Arc::new(Mutex::new(HashMap::new())),
            grace,
        }
    }

    /// Registers `sender` for change snapshots of `handle`.
    ///
    /// The first subscriber for a handle opens the store subscription and a
    /// fan-out task; later subscribers (and subscribers arriving within the
    /// grace window after the count hits zero) share it. Snapshots are
    /// forwarded in store-report order per handle; no cross-handle ordering
    /// is implied.
    pub fn subscribe(&self, handle: &RawHandle, sender: mpsc::UnboundedSender<Value>) -> SubToken {
        let id = handle.id().clone();
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());

        let entry = entries.entry(id.clone()).or_insert_with(|| {
            let subscribers: SubscriberMap = Arc::new(Mutex::new(HashMap::new()));
            let (tx, mut rx) = mpsc::unbounded_channel::<Value>();
            let store_sub = handle.subscribe(tx);
            debug!(%id, "store subscription opened through cache");

            // Fan-out: forward each snapshot to every registered consumer.
            // Ends on its own once the store-side sender is dropped.
            let fanout_subscribers = Arc::clone(&subscribers);
            tokio::spawn(async move {
                while let Some(snapshot) = rx.recv().await {
                    let mut subs = fanout_subscribers
                        .lock()
                        .unwrap_or_else(|e| e.into_inner());
                    subs.retain(|_, consumer| consumer.send(snapshot.clone()).is_ok());
                }
            });

            SubEntry {
                refcount: 0,
                epoch: 0,
                next_key: 0,
                subscribers,
                _store_sub: store_sub,
                last_unsubscribe: None,
            }
        });

        entry.refcount += 1;
        entry.last_unsubscribe = None;
        let key = entry.next_key;
        entry.next_key += 1;
        entry
            .subscribers
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(key, sender);

        SubToken {
            entries: Arc::clone(&self.entries),
            grace: self.grace,
            id,
            key,
            released: false,
        }
    }

    /// Number of handles with a live store subscription (including those in
    /// their grace window).
    #[must_use]
    pub fn active_count(&self) -> usize {
        self.entries.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// True while the store subscription for `id` is live.
    #[must_use]
    pub fn is_live(&self, id: &ObjectId) -> bool {
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .contains_key(id)
    }

    /// Current logical subscriber count for `id`.
    #[must_use]
    pub fn refcount(&self, id: &ObjectId) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(id)
            .map_or(0, |e| e.refcount)
    }

    /// When the count for `id` last reached zero, if it is currently zero
    /// (i.e. the subscription is idling through its grace window).
    #[must_use]
    pub fn idle_since(&self, id: &ObjectId) -> Option<Instant> {
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(id)
            .and_then(|e| e.last_unsubscribe)
    }
}

/// One logical subscription. Dropping it (or calling
/// [`SubToken::unsubscribe`]) decrements the shared count; the store
/// subscription is only released after the grace window elapses with the
/// count still at zero.
pub struct SubToken {
    entries: EntryMap,
    grace: Duration,
    id: ObjectId,
    key: u64,
    released: bool,
}

impl SubToken {
    /// The handle this token subscribes to.
    #[must_use]
    pub fn id(&self) -> &ObjectId {
        &self.id
    }

    /// Explicitly releases this subscription.
    pub fn unsubscribe(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if self.released {
            return;
        }
        self.released = true;

        let armed = {
            let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
            let Some(entry) = entries.get_mut(&self.id) else {
                return;
            };
            entry
                .subscribers
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .remove(&self.key);
            entry.refcount = entry.refcount.saturating_sub(1);
            if entry.refcount > 0 {
                return;
            }
            entry.epoch += 1;
            entry.last_unsubscribe = Some(Instant::now());
            entry.epoch
        };

        debug!(id = %self.id, "last subscriber gone, grace window started");
        let entries = Arc::clone(&self.entries);
        let id = self.id.clone();
        let grace = self.grace;
        match tokio::runtime::Handle::try_current() {
            Ok(rt) => {
                rt.spawn(async move {
                    tokio::time::sleep(grace).await;
                    let mut map = entries.lock().unwrap_or_else(|e| e.into_inner());
                    let expired = map
                        .get(&id)
                        .is_some_and(|e| e.refcount == 0 && e.epoch == armed);
                    if expired {
                        map.remove(&id);
                        debug!(%id, "grace window elapsed, store subscription released");
                    }
                });
            }
            Err(_) => {
                // No runtime to defer on; tear down immediately.
                warn!(id = %id, "no async runtime, releasing subscription without grace window");
                let mut map = entries.lock().unwrap_or_else(|e| e.into_inner());
                if map.get(&id).is_some_and(|e| e.refcount == 0) {
                    map.remove(&id);
                }
            }
        }
    }
}

impl Drop for SubToken {
    fn drop(&mut self) {
        self.release();
    }
}
