//! The CRUD engine: orchestrates schema validation, the identity cache, the
//! subscription cache, and the store boundary.

use crate::error::{EngineError, EngineResult};
use crate::identity::IdentityCache;
use crate::subscription::{SubToken, SubscriptionCache};
use crate::wrapper::CoObject;
use coview_schema::{validate, validate_partial, SchemaNode};
use coview_store::{CoStore, Fetch, RawHandle};
use coview_types::{CoKind, LoadState, ObjectId};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{sleep, Instant};
use tracing::{debug, info};

/// Tuning knobs for the engine.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// How long an unreferenced store subscription stays live before
    /// teardown.
    pub grace_window: Duration,
    /// Delay between fetch attempts while the store reports an object
    /// pending.
    pub read_poll_interval: Duration,
    /// Default maximum reference-resolution depth. `None` is unbounded;
    /// cycles terminate either way.
    pub resolve_depth: Option<usize>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            grace_window: Duration::from_secs(5),
            read_poll_interval: Duration::from_millis(10),
            resolve_depth: None,
        }
    }
}

/// Parameters for [`CoEngine::create`].
#[derive(Debug, Clone)]
pub struct CreateRequest {
    pub kind: CoKind,
    /// Schema document (raw or canonical).
    pub schema: Value,
    pub data: Value,
}

/// Parameters for [`CoEngine::read`].
#[derive(Debug, Clone)]
pub struct ReadRequest {
    pub id: ObjectId,
    /// Schema document; falls back to the schema remembered for this id.
    pub schema: Option<Value>,
    /// Deadline after which a still-pending object is reported
    /// `Unavailable`. `None` waits indefinitely.
    pub timeout: Option<Duration>,
    /// Validate the loaded snapshot against the schema (consistency audit).
    pub validate: bool,
}

impl ReadRequest {
    /// A read with no schema override, no deadline, no audit.
    #[must_use]
    pub fn new(id: ObjectId) -> Self {
        Self {
            id,
            schema: None,
            timeout: None,
            validate: false,
        }
    }

    /// Supplies an explicit schema document.
    #[must_use]
    pub fn with_schema(mut self, schema: Value) -> Self {
        self.schema = Some(schema);
        self
    }

    /// Bounds the wait for a pending object.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Requests snapshot validation after load.
    #[must_use]
    pub fn validated(mut self) -> Self {
        self.validate = true;
        self
    }
}

/// Parameters for [`CoEngine::update`].
#[derive(Debug, Clone)]
pub struct UpdateRequest {
    pub id: ObjectId,
    /// Only the supplied keys are validated and written; absent keys are
    /// never touched.
    pub data: Value,
    /// Schema override; falls back to the schema remembered for this id.
    pub schema: Option<Value>,
}

/// The schema-validated projection engine over an external store.
pub struct CoEngine {
    store: Arc<dyn CoStore>,
    config: EngineConfig,
    identity: IdentityCache,
    subscriptions: SubscriptionCache,
    /// Last known schema per identifier, for schema-less update/delete.
    schemas: RwLock<HashMap<ObjectId, Arc<SchemaNode>>>,
}

impl CoEngine {
    /// Creates an engine with default configuration.
    #[must_use]
    pub fn new(store: Arc<dyn CoStore>) -> Self {
        Self::with_config(store, EngineConfig::default())
    }

    /// Creates an engine with explicit configuration.
    #[must_use]
    pub fn with_config(store: Arc<dyn CoStore>, config: EngineConfig) -> Self {
        Self {
            store,
            subscriptions: SubscriptionCache::new(config.grace_window),
            config,
            identity: IdentityCache::new(),
            schemas: RwLock::new(HashMap::new()),
        }
    }

    /// The identity cache (one wrapper per id).
    #[must_use]
    pub fn identity(&self) -> &IdentityCache {
        &self.identity
    }

    /// The subscription cache.
    #[must_use]
    pub fn subscriptions(&self) -> &SubscriptionCache {
        &self.subscriptions
    }

    /// The engine configuration.
    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub(crate) fn store(&self) -> &Arc<dyn CoStore> {
        &self.store
    }

    // ── CRUD surface ─────────────────────────────────────────────

    /// Validates `data` against `schema` and creates a new object.
    ///
    /// Fails with [`EngineError::Validation`] before any store call when the
    /// data does not satisfy the schema; nothing is written or cached in
    /// that case.
    pub async fn create(&self, req: CreateRequest) -> EngineResult<Arc<CoObject>> {
        let node = Arc::new(SchemaNode::parse(&req.schema)?);
        if let Some(declared) = node.co_kind() {
            if declared != req.kind {
                return Err(EngineError::structural(format!(
                    "schema declares {declared} but create was asked for {}",
                    req.kind
                )));
            }
        }

        let data = coerce_refs(req.data, &node);
        validate(&data, &node)?;

        let handle = self.store.create_primitive(req.kind, data).await?;
        let id = handle.id().clone();
        self.remember_schema(&id, Arc::clone(&node));

        let (wrapper, _) = self.identity.get_or_create(&id, || {
            CoObject::new_loaded(id.clone(), req.kind, Arc::clone(&node), Arc::clone(&handle))
        });
        self.ensure_watcher(&wrapper, &handle);
        info!(%id, kind = %req.kind, "object created");
        Ok(wrapper)
    }

    /// Returns the wrapper for `id`, fetching the handle if necessary.
    ///
    /// A pending object keeps the wrapper at `Loading` until the store
    /// reports it ready or the deadline elapses. Absence and timeout resolve
    /// to a wrapper in `Unavailable` — never an error for a simply-missing
    /// object; only malformed input errors.
    pub async fn read(&self, req: ReadRequest) -> EngineResult<Arc<CoObject>> {
        let node = self.schema_for(&req.id, req.schema.as_ref())?;

        let (wrapper, created) = self
            .identity
            .get_or_create(&req.id, || CoObject::new_loading(req.id.clone(), Arc::clone(&node)));
        if !created && req.schema.is_some() {
            wrapper.set_schema(Arc::clone(&node));
        }

        if wrapper.is_loaded() && wrapper.has_handle() {
            // Staleness check: the store may have started re-syncing this
            // object since it was loaded. A pending report flaps the wrapper
            // back to Loading and re-enters the wait below.
            if let Fetch::Ready(handle) = self.store.get_primitive(&req.id).await? {
                self.ensure_watcher(&wrapper, &handle);
                if req.validate {
                    let snapshot = handle.snapshot().await;
                    validate(&snapshot, &node)?;
                }
                return Ok(wrapper);
            }
            debug!(id = %req.id, "loaded wrapper reported stale by the store");
        }

        wrapper.set_state(LoadState::Loading);
        let deadline = req.timeout.map(|t| Instant::now() + t);
        let handle = loop {
            match self.store.get_primitive(&req.id).await? {
                Fetch::Ready(handle) => break handle,
                Fetch::Unavailable => {
                    debug!(id = %req.id, "store reports object unavailable");
                    wrapper.set_state(LoadState::Unavailable);
                    return Ok(wrapper);
                }
                Fetch::Pending => {
                    if deadline.is_some_and(|d| Instant::now() >= d) {
                        debug!(id = %req.id, "read deadline elapsed");
                        wrapper.set_state(LoadState::Unavailable);
                        return Ok(wrapper);
                    }
                    sleep(self.config.read_poll_interval).await;
                }
            }
        };

        wrapper.attach(Arc::clone(&handle));
        self.ensure_watcher(&wrapper, &handle);
        debug!(id = %req.id, "object loaded");

        if req.validate {
            let snapshot = handle.snapshot().await;
            validate(&snapshot, &node)?;
        }

        // Warm wrappers for every declared reference target.
        self.resolve_references(&wrapper).await?;
        Ok(wrapper)
    }

    /// Merges the supplied keys into the object. Keys absent from
    /// `req.data` are never touched. The subset is validated against the
    /// per-field subschemas before any write; writes for one caller are
    /// applied in key order.
    pub async fn update(&self, req: UpdateRequest) -> EngineResult<()> {
        let node = match &req.schema {
            Some(doc) => {
                let node = Arc::new(SchemaNode::parse(doc)?);
                self.remember_schema(&req.id, Arc::clone(&node));
                node
            }
            None => self.known_schema(&req.id)?,
        };

        let data = coerce_refs(req.data, &node);
        validate_partial(&data, &node)?;

        let wrapper = self.read(ReadRequest::new(req.id.clone())).await?;
        let Some(handle) = wrapper.raw() else {
            return Err(EngineError::structural(format!(
                "object {} is not available for update",
                req.id
            )));
        };

        let Value::Object(fields) = data else {
            // validate_partial already rejected non-objects
            return Err(EngineError::structural("update data must be an object"));
        };
        for (key, value) in fields {
            handle.set(&key, value).await?;
        }
        debug!(id = %req.id, "update applied");
        Ok(())
    }

    /// Clears every key declared in the object's schema `properties`.
    ///
    /// This is a field-level clear, not identifier destruction: the id stays
    /// resolvable and a later read still reports the object loaded, with all
    /// declared fields absent. Whether the identifier could ever be reclaimed
    /// is store-defined and outside this layer's control.
    pub async fn delete(&self, id: &ObjectId) -> EngineResult<()> {
        let node = self.known_schema(id)?;
        let Some(properties) = node.properties() else {
            return Err(EngineError::structural(format!(
                "delete requires a keyed schema for {id}"
            )));
        };

        let wrapper = self.read(ReadRequest::new(id.clone())).await?;
        let Some(handle) = wrapper.raw() else {
            return Err(EngineError::structural(format!(
                "object {id} is not available for delete"
            )));
        };
        if !handle.kind().is_keyed() {
            return Err(EngineError::structural(format!(
                "delete does not apply to {} object {id}",
                handle.kind()
            )));
        }

        for key in properties.keys() {
            handle.delete(key).await?;
        }
        info!(%id, "declared fields cleared");
        Ok(())
    }

    /// Caller-facing change feed for `id`. Snapshots arrive through
    /// `sender` in store-report order; all feeds for one handle share a
    /// single store subscription.
    pub async fn subscribe(
        &self,
        id: &ObjectId,
        sender: mpsc::UnboundedSender<Value>,
    ) -> EngineResult<SubToken> {
        let wrapper = self.read(ReadRequest::new(id.clone())).await?;
        let Some(handle) = wrapper.raw() else {
            return Err(EngineError::structural(format!(
                "object {id} is not available to subscribe"
            )));
        };
        Ok(self.subscriptions.subscribe(&handle, sender))
    }

    // ── Internals ────────────────────────────────────────────────

    /// Resolves the schema to use for `id`: an explicit document wins, then
    /// the remembered schema, then unconstrained.
    pub(crate) fn schema_for(
        &self,
        id: &ObjectId,
        explicit: Option<&Value>,
    ) -> EngineResult<Arc<SchemaNode>> {
        if let Some(doc) = explicit {
            let node = Arc::new(SchemaNode::parse(doc)?);
            self.remember_schema(id, Arc::clone(&node));
            return Ok(node);
        }
        let schemas = self.schemas.read().unwrap_or_else(|e| e.into_inner());
        Ok(schemas
            .get(id)
            .cloned()
            .unwrap_or_else(|| Arc::new(SchemaNode::Any)))
    }

    fn known_schema(&self, id: &ObjectId) -> EngineResult<Arc<SchemaNode>> {
        let schemas = self.schemas.read().unwrap_or_else(|e| e.into_inner());
        schemas.get(id).cloned().ok_or_else(|| {
            EngineError::structural(format!("no schema known for {id}; supply one"))
        })
    }

    fn remember_schema(&self, id: &ObjectId, node: Arc<SchemaNode>) {
        self.schemas
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(id.clone(), node);
    }

    /// Keeps one engine-internal subscription per loaded wrapper, applying
    /// store snapshots to the wrapper's state. The wrapper itself owns the
    /// subscription token: dropping the last external reference drops the
    /// token, which starts the grace window and closes the watcher's channel,
    /// ending the task.
    pub(crate) fn ensure_watcher(&self, wrapper: &Arc<CoObject>, handle: &RawHandle) {
        if wrapper.has_watch() {
            return;
        }
        let (tx, mut rx) = mpsc::unbounded_channel();
        let token = self.subscriptions.subscribe(handle, tx);
        if !wrapper.install_watch(token) {
            // Lost an install race; the extra token releases on drop.
            return;
        }

        let weak = Arc::downgrade(wrapper);
        let id = wrapper.id().clone();
        tokio::spawn(async move {
            while let Some(_snapshot) = rx.recv().await {
                match weak.upgrade() {
                    // A fresh snapshot means the value is current again.
                    Some(obj) => obj.set_state(LoadState::Loaded),
                    None => break,
                }
            }
            debug!(%id, "watcher stopped");
        });
    }
}

/// Collapses wrapper-shaped values in reference fields to their identifier
/// string. A reference field accepts either the id itself or a serialized
/// wrapper (`{"id": "co_z…"}`); at rest the store only ever sees the id.
fn coerce_refs(value: Value, node: &SchemaNode) -> Value {
    match node {
        SchemaNode::Reference { .. } => match value {
            Value::Object(map) => match map.get("id").and_then(Value::as_str) {
                Some(id) if ObjectId::is_valid_str(id) => Value::String(id.to_string()),
                _ => Value::Object(map),
            },
            other => other,
        },
        SchemaNode::OrderedList(items) | SchemaNode::AppendStream(items) => match value {
            Value::Array(elements) => Value::Array(
                elements
                    .into_iter()
                    .map(|e| coerce_refs(e, items))
                    .collect(),
            ),
            other => other,
        },
        SchemaNode::Array { items: Some(items) } => match value {
            Value::Array(elements) => Value::Array(
                elements
                    .into_iter()
                    .map(|e| coerce_refs(e, items))
                    .collect(),
            ),
            other => other,
        },
        _ => match (value, node.properties()) {
            (Value::Object(map), Some(properties)) => Value::Object(
                map.into_iter()
                    .map(|(key, field)| {
                        let coerced = match properties.get(&key) {
                            Some(sub) => coerce_refs(field, sub),
                            None => field,
                        };
                        (key, coerced)
                    })
                    .collect(),
            ),
            (other, _) => other,
        },
    }
}
