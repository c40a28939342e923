//! Traits describing the external collaborative engine.

use crate::error::StoreResult;
use async_trait::async_trait;
use coview_types::{CoKind, ObjectId};
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::mpsc;

/// A shared, live handle to one collaborative object.
pub type RawHandle = Arc<dyn RawPrimitive>;

/// Store-side subscription registration. Dropping it releases the
/// subscription with the engine; there is no other teardown path.
pub struct SubscriptionHandle {
    release: Option<Box<dyn FnOnce() + Send>>,
}

impl SubscriptionHandle {
    /// Wraps the engine's release closure.
    pub fn new(release: impl FnOnce() + Send + 'static) -> Self {
        Self {
            release: Some(Box::new(release)),
        }
    }
}

impl Drop for SubscriptionHandle {
    fn drop(&mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }
}

impl std::fmt::Debug for SubscriptionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubscriptionHandle").finish_non_exhaustive()
    }
}

/// One live handle into the external store.
///
/// Mutation is only meaningful for keyed kinds; sequence kinds are written
/// through the engine's own CRDT operations, which are out of scope here —
/// this layer reads them via [`RawPrimitive::as_array`].
#[async_trait]
pub trait RawPrimitive: Send + Sync + std::fmt::Debug {
    /// The object's identifier.
    fn id(&self) -> &ObjectId;

    /// Which collaborative primitive this handle addresses.
    fn kind(&self) -> CoKind;

    /// Reads one key. `None` when the key is absent (or the kind is unkeyed).
    async fn get(&self, key: &str) -> Option<Value>;

    /// Writes one key. Keyed kinds only.
    async fn set(&self, key: &str, value: Value) -> StoreResult<()>;

    /// Removes one key. Keyed kinds only. Removing an absent key is a no-op.
    async fn delete(&self, key: &str) -> StoreResult<()>;

    /// The object's contents as a sequence. Keyed kinds yield their values
    /// in key order.
    async fn as_array(&self) -> Vec<Value>;

    /// Full JSON projection of the current contents.
    async fn snapshot(&self) -> Value;

    /// Registers a change subscription. The store pushes a full snapshot
    /// into `sender` after every mutation, in mutation order for this
    /// handle. Dropping the returned handle releases the subscription.
    fn subscribe(&self, sender: mpsc::UnboundedSender<Value>) -> SubscriptionHandle;
}

/// Outcome of a fetch-by-identifier.
#[derive(Debug, Clone)]
pub enum Fetch {
    /// The object is locally available.
    Ready(RawHandle),
    /// The object is known but still syncing; ask again.
    Pending,
    /// The object does not exist here or is inaccessible.
    Unavailable,
}

/// The external collaborative engine.
#[async_trait]
pub trait CoStore: Send + Sync {
    /// Creates a new primitive with the given initial contents and returns
    /// its live handle. The store mints the identifier.
    async fn create_primitive(&self, kind: CoKind, initial: Value) -> StoreResult<RawHandle>;

    /// Fetches the handle for `id`. Absence is a normal outcome
    /// ([`Fetch::Unavailable`]), never an error.
    async fn get_primitive(&self, id: &ObjectId) -> StoreResult<Fetch>;
}
