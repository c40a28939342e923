//! The local projection of one collaborative object.

use crate::subscription::SubToken;
use coview_schema::SchemaNode;
use coview_store::RawHandle;
use coview_types::{CoKind, LoadState, ObjectId};
use serde_json::Value;
use std::sync::{Arc, Mutex, RwLock};

/// A local, schema-typed projection of one store handle.
///
/// At most one `CoObject` exists per identifier process-wide (enforced by
/// the identity cache), so `Arc::ptr_eq` is a valid change-detection
/// primitive. The wrapper never owns the underlying handle's lifetime — it
/// holds the handle only as long as the wrapper itself is referenced.
///
/// Availability oscillates for the object's whole lifetime:
/// `Loading → {Loaded, Unavailable}`, `Loaded → Loading` on staleness,
/// `Unavailable → Loading` on retry. There is no terminal state.
pub struct CoObject {
    id: ObjectId,
    schema: RwLock<Arc<SchemaNode>>,
    state: RwLock<LoadState>,
    kind: RwLock<Option<CoKind>>,
    raw: RwLock<Option<RawHandle>>,
    /// The engine-internal watcher subscription. Dropped with the wrapper,
    /// which releases the logical subscription and starts the grace window.
    watch: Mutex<Option<SubToken>>,
}

impl CoObject {
    /// A wrapper whose handle is already available.
    pub(crate) fn new_loaded(
        id: ObjectId,
        kind: CoKind,
        schema: Arc<SchemaNode>,
        raw: RawHandle,
    ) -> Self {
        Self {
            id,
            schema: RwLock::new(schema),
            state: RwLock::new(LoadState::Loaded),
            kind: RwLock::new(Some(kind)),
            raw: RwLock::new(Some(raw)),
            watch: Mutex::new(None),
        }
    }

    /// A placeholder wrapper for an object still being fetched.
    pub(crate) fn new_loading(id: ObjectId, schema: Arc<SchemaNode>) -> Self {
        Self {
            id,
            schema: RwLock::new(schema),
            state: RwLock::new(LoadState::Loading),
            kind: RwLock::new(None),
            raw: RwLock::new(None),
            watch: Mutex::new(None),
        }
    }

    /// The object's identifier.
    #[must_use]
    pub fn id(&self) -> &ObjectId {
        &self.id
    }

    /// Current availability.
    #[must_use]
    pub fn load_state(&self) -> LoadState {
        *self.state.read().unwrap_or_else(|e| e.into_inner())
    }

    /// True when the object's value is available and current.
    #[must_use]
    pub fn is_loaded(&self) -> bool {
        self.load_state().is_loaded()
    }

    /// The collaborative kind, once known.
    #[must_use]
    pub fn kind(&self) -> Option<CoKind> {
        *self.kind.read().unwrap_or_else(|e| e.into_inner())
    }

    /// The preprocessed schema governing this object's shape.
    #[must_use]
    pub fn schema(&self) -> Arc<SchemaNode> {
        Arc::clone(&self.schema.read().unwrap_or_else(|e| e.into_inner()))
    }

    /// Escape hatch: the underlying store handle, for advanced callers.
    #[must_use]
    pub fn raw(&self) -> Option<RawHandle> {
        self.raw.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Reads one declared field from the underlying handle. `None` when the
    /// field is absent or the object is not loaded.
    pub async fn get(&self, key: &str) -> Option<Value> {
        let raw = self.raw()?;
        raw.get(key).await
    }

    /// Full JSON projection of the current contents, when loaded.
    pub async fn snapshot(&self) -> Option<Value> {
        let raw = self.raw()?;
        Some(raw.snapshot().await)
    }

    /// The value a reference field stores for this object: its identifier.
    #[must_use]
    pub fn ref_value(&self) -> Value {
        Value::String(self.id.to_string())
    }

    // ── Engine-internal transitions ──────────────────────────────

    pub(crate) fn set_state(&self, state: LoadState) {
        *self.state.write().unwrap_or_else(|e| e.into_inner()) = state;
    }

    pub(crate) fn attach(&self, raw: RawHandle) {
        *self.kind.write().unwrap_or_else(|e| e.into_inner()) = Some(raw.kind());
        *self.raw.write().unwrap_or_else(|e| e.into_inner()) = Some(raw);
        self.set_state(LoadState::Loaded);
    }

    pub(crate) fn set_schema(&self, schema: Arc<SchemaNode>) {
        *self.schema.write().unwrap_or_else(|e| e.into_inner()) = schema;
    }

    pub(crate) fn has_handle(&self) -> bool {
        self.raw.read().unwrap_or_else(|e| e.into_inner()).is_some()
    }

    pub(crate) fn has_watch(&self) -> bool {
        self.watch.lock().unwrap_or_else(|e| e.into_inner()).is_some()
    }

    /// Installs the watcher token; false when one is already installed, in
    /// which case the caller's token is simply dropped (releasing its count).
    pub(crate) fn install_watch(&self, token: SubToken) -> bool {
        let mut watch = self.watch.lock().unwrap_or_else(|e| e.into_inner());
        if watch.is_some() {
            return false;
        }
        *watch = Some(token);
        true
    }
}

impl std::fmt::Debug for CoObject {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoObject")
            .field("id", &self.id)
            .field("state", &self.load_state())
            .field("kind", &self.kind())
            .finish_non_exhaustive()
    }
}
