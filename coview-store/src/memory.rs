//! In-memory reference implementation of the store boundary.
//!
//! `MemStore` keeps every object in process memory and pushes a full
//! snapshot to subscribers after each mutation, in mutation order per
//! handle. It also exposes test hooks that simulate the eventually-
//! consistent behaviors of a real engine: held objects report
//! [`Fetch::Pending`], dropped objects report [`Fetch::Unavailable`], and
//! subscription counters make dedup observable.

use crate::error::{StoreError, StoreResult};
use crate::handle::{CoStore, Fetch, RawHandle, RawPrimitive, SubscriptionHandle};
use async_trait::async_trait;
use coview_types::{CoKind, ObjectId};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use tokio::sync::{mpsc, RwLock};
use tracing::debug;

/// Contents of one in-memory object, shaped by its kind.
#[derive(Debug)]
enum Content {
    Map(BTreeMap<String, Value>),
    Seq(Vec<Value>),
    Scalar(Value),
}

#[derive(Debug, Default)]
struct Subscribers {
    next_id: u64,
    senders: HashMap<u64, mpsc::UnboundedSender<Value>>,
}

#[derive(Debug)]
struct MemPrimitive {
    id: ObjectId,
    kind: CoKind,
    content: RwLock<Content>,
    subscribers: Arc<StdMutex<Subscribers>>,
    /// Total store-level subscriptions ever opened on this handle.
    subscribe_total: AtomicUsize,
}

impl MemPrimitive {
    fn new(id: ObjectId, kind: CoKind, initial: Value) -> StoreResult<Self> {
        let content = match kind {
            CoKind::KeyedMap | CoKind::Identity | CoKind::Group => match initial {
                Value::Object(map) => Content::Map(map.into_iter().collect()),
                Value::Null => Content::Map(BTreeMap::new()),
                _ => {
                    return Err(StoreError::BadInitial {
                        kind,
                        expected: "an object",
                    })
                }
            },
            CoKind::OrderedList | CoKind::AppendStream => match initial {
                Value::Array(items) => Content::Seq(items),
                Value::Null => Content::Seq(Vec::new()),
                _ => {
                    return Err(StoreError::BadInitial {
                        kind,
                        expected: "an array",
                    })
                }
            },
            CoKind::BinaryStream | CoKind::Text => match initial {
                v @ (Value::String(_) | Value::Null) => Content::Scalar(v),
                _ => {
                    return Err(StoreError::BadInitial {
                        kind,
                        expected: "a string",
                    })
                }
            },
        };
        Ok(Self {
            id,
            kind,
            content: RwLock::new(content),
            subscribers: Arc::new(StdMutex::new(Subscribers::default())),
            subscribe_total: AtomicUsize::new(0),
        })
    }

    fn snapshot_of(content: &Content) -> Value {
        match content {
            Content::Map(map) => Value::Object(map.clone().into_iter().collect()),
            Content::Seq(items) => Value::Array(items.clone()),
            Content::Scalar(v) => v.clone(),
        }
    }

    /// Pushes the current snapshot to every live subscriber, pruning
    /// disconnected ones.
    fn notify(&self, snapshot: Value) {
        let mut subs = self.subscribers.lock().unwrap_or_else(|e| e.into_inner());
        subs.senders
            .retain(|_, sender| sender.send(snapshot.clone()).is_ok());
    }
}

#[async_trait]
impl RawPrimitive for MemPrimitive {
    fn id(&self) -> &ObjectId {
        &self.id
    }

    fn kind(&self) -> CoKind {
        self.kind
    }

    async fn get(&self, key: &str) -> Option<Value> {
        match &*self.content.read().await {
            Content::Map(map) => map.get(key).cloned(),
            Content::Seq(_) | Content::Scalar(_) => None,
        }
    }

    async fn set(&self, key: &str, value: Value) -> StoreResult<()> {
        let snapshot = {
            let mut content = self.content.write().await;
            match &mut *content {
                Content::Map(map) => {
                    map.insert(key.to_string(), value);
                }
                _ => {
                    return Err(StoreError::WrongKind {
                        id: self.id.clone(),
                        kind: self.kind,
                        op: "set",
                    })
                }
            }
            Self::snapshot_of(&content)
        };
        self.notify(snapshot);
        Ok(())
    }

    async fn delete(&self, key: &str) -> StoreResult<()> {
        let snapshot = {
            let mut content = self.content.write().await;
            match &mut *content {
                Content::Map(map) => {
                    map.remove(key);
                }
                _ => {
                    return Err(StoreError::WrongKind {
                        id: self.id.clone(),
                        kind: self.kind,
                        op: "delete",
                    })
                }
            }
            Self::snapshot_of(&content)
        };
        self.notify(snapshot);
        Ok(())
    }

    async fn as_array(&self) -> Vec<Value> {
        match &*self.content.read().await {
            Content::Map(map) => map.values().cloned().collect(),
            Content::Seq(items) => items.clone(),
            Content::Scalar(v) => vec![v.clone()],
        }
    }

    async fn snapshot(&self) -> Value {
        Self::snapshot_of(&*self.content.read().await)
    }

    fn subscribe(&self, sender: mpsc::UnboundedSender<Value>) -> SubscriptionHandle {
        self.subscribe_total.fetch_add(1, Ordering::Relaxed);
        let key = {
            let mut subs = self.subscribers.lock().unwrap_or_else(|e| e.into_inner());
            let key = subs.next_id;
            subs.next_id += 1;
            subs.senders.insert(key, sender);
            key
        };
        debug!(id = %self.id, key, "store subscription opened");
        let subscribers = Arc::clone(&self.subscribers);
        let id = self.id.clone();
        SubscriptionHandle::new(move || {
            let mut subs = subscribers.lock().unwrap_or_else(|e| e.into_inner());
            subs.senders.remove(&key);
            debug!(id = %id, key, "store subscription released");
        })
    }
}

/// In-memory collaborative store.
#[derive(Default)]
pub struct MemStore {
    objects: RwLock<HashMap<ObjectId, Arc<MemPrimitive>>>,
    /// Ids forced to report `Pending` until released.
    held: RwLock<HashSet<ObjectId>>,
}

impl MemStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Forces `get_primitive(id)` to report [`Fetch::Pending`] until
    /// [`MemStore::release`] is called. Simulates an object that exists but
    /// has not finished syncing.
    pub async fn hold(&self, id: &ObjectId) {
        self.held.write().await.insert(id.clone());
    }

    /// Lifts a [`MemStore::hold`].
    pub async fn release(&self, id: &ObjectId) {
        self.held.write().await.remove(id);
    }

    /// Removes an object entirely, so fetches report [`Fetch::Unavailable`].
    pub async fn drop_object(&self, id: &ObjectId) {
        self.objects.write().await.remove(id);
    }

    /// Total store-level subscriptions ever opened on `id`. Zero for
    /// unknown ids.
    pub async fn subscribe_count(&self, id: &ObjectId) -> usize {
        match self.objects.read().await.get(id) {
            Some(obj) => obj.subscribe_total.load(Ordering::Relaxed),
            None => 0,
        }
    }

    /// Store-level subscriptions currently live on `id`.
    pub async fn live_subscriber_count(&self, id: &ObjectId) -> usize {
        match self.objects.read().await.get(id) {
            Some(obj) => {
                let subs = obj.subscribers.lock().unwrap_or_else(|e| e.into_inner());
                subs.senders.len()
            }
            None => 0,
        }
    }
}

#[async_trait]
impl CoStore for MemStore {
    async fn create_primitive(&self, kind: CoKind, initial: Value) -> StoreResult<RawHandle> {
        let id = ObjectId::generate();
        let primitive = Arc::new(MemPrimitive::new(id.clone(), kind, initial)?);
        self.objects
            .write()
            .await
            .insert(id.clone(), Arc::clone(&primitive));
        debug!(%id, %kind, "created primitive");
        Ok(primitive)
    }

    async fn get_primitive(&self, id: &ObjectId) -> StoreResult<Fetch> {
        if self.held.read().await.contains(id) {
            return Ok(Fetch::Pending);
        }
        match self.objects.read().await.get(id) {
            Some(obj) => Ok(Fetch::Ready(Arc::clone(obj) as RawHandle)),
            None => Ok(Fetch::Unavailable),
        }
    }
}
