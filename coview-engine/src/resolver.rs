//! Typed reference resolution.
//!
//! A reference field's stored value is always the target's identifier
//! string. Resolution turns that identifier into the target's wrapper,
//! fetching it through the engine when necessary, and then walks the
//! target's own reference fields. The active resolution path guards against
//! cycles: a target already being resolved on the current chain is handed
//! back as its in-progress wrapper instead of recursing, which makes
//! resolution terminate for self- and mutually-referential graphs of any
//! size.

use crate::engine::CoEngine;
use crate::error::EngineResult;
use crate::wrapper::CoObject;
use coview_schema::SchemaNode;
use coview_store::Fetch;
use coview_types::{LoadState, ObjectId};
use serde_json::Value;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use tracing::debug;

/// Outcome of resolving one reference field.
#[derive(Debug)]
pub enum ResolvedRef {
    /// The target's wrapper; inspect its [`CoObject::load_state`] for
    /// availability. An inaccessible target resolves to a wrapper in
    /// `Unavailable` rather than failing the read.
    Wrapper(Arc<CoObject>),
    /// The stored value does not have the identifier shape. Reported
    /// inline; never thrown across a read boundary.
    Malformed { value: String, reason: String },
}

impl ResolvedRef {
    /// The target wrapper, when the reference was well-formed.
    #[must_use]
    pub fn wrapper(&self) -> Option<&Arc<CoObject>> {
        match self {
            ResolvedRef::Wrapper(w) => Some(w),
            ResolvedRef::Malformed { .. } => None,
        }
    }

    /// True when the stored value was not a valid identifier.
    #[must_use]
    pub fn is_malformed(&self) -> bool {
        matches!(self, ResolvedRef::Malformed { .. })
    }
}

/// State carried along one resolution call chain.
#[derive(Debug, Default)]
pub struct ResolveContext {
    /// Identifiers currently being resolved, root first.
    path: Vec<ObjectId>,
    /// Hop budget; `None` is unbounded (cycles terminate regardless).
    max_depth: Option<usize>,
}

impl ResolveContext {
    /// An unbounded context with an empty path.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A context that stops resolving past `max_depth` hops; targets beyond
    /// the budget are left `Unavailable` instead of fetched.
    #[must_use]
    pub fn with_max_depth(max_depth: usize) -> Self {
        Self {
            path: Vec::new(),
            max_depth: Some(max_depth),
        }
    }

    pub(crate) fn rooted(root: ObjectId, max_depth: Option<usize>) -> Self {
        Self {
            path: vec![root],
            max_depth,
        }
    }

    /// The active resolution path.
    #[must_use]
    pub fn path(&self) -> &[ObjectId] {
        &self.path
    }
}

type BoxedResolve<'a> =
    Pin<Box<dyn Future<Output = EngineResult<Option<ResolvedRef>>> + Send + 'a>>;

impl CoEngine {
    /// Resolves one field value against its schema node.
    ///
    /// Returns `None` when the schema is not reference-typed or the value is
    /// null/absent. Fetching is a single attempt: a still-pending target
    /// comes back as a wrapper in `Loading` rather than blocking the chain.
    pub async fn resolve(
        &self,
        value: &Value,
        schema: &SchemaNode,
        ctx: &mut ResolveContext,
    ) -> EngineResult<Option<ResolvedRef>> {
        self.resolve_inner(value.clone(), schema.clone(), ctx).await
    }

    /// Resolves every declared reference field of a loaded wrapper,
    /// returning `(JSON pointer, outcome)` pairs. Used by `read` to warm
    /// target wrappers.
    pub async fn resolve_references(
        &self,
        wrapper: &Arc<CoObject>,
    ) -> EngineResult<Vec<(String, ResolvedRef)>> {
        let schema = wrapper.schema();
        let Some(properties) = schema.properties() else {
            return Ok(Vec::new());
        };
        let Some(snapshot) = wrapper.snapshot().await else {
            return Ok(Vec::new());
        };

        let mut ctx = ResolveContext::rooted(wrapper.id().clone(), self.config().resolve_depth);
        let mut resolved = Vec::new();
        for (key, sub) in properties {
            if !sub.is_reference() {
                continue;
            }
            let field = snapshot.get(key).cloned().unwrap_or(Value::Null);
            if let Some(outcome) = self.resolve(&field, sub, &mut ctx).await? {
                resolved.push((format!("/{key}"), outcome));
            }
        }
        Ok(resolved)
    }

    fn resolve_inner<'a>(
        &'a self,
        value: Value,
        schema: SchemaNode,
        ctx: &'a mut ResolveContext,
    ) -> BoxedResolve<'a> {
        Box::pin(async move {
            let SchemaNode::Reference { target } = schema else {
                return Ok(None);
            };

            let raw = match value {
                Value::Null => return Ok(None),
                Value::String(s) => s,
                other => {
                    return Ok(Some(ResolvedRef::Malformed {
                        value: other.to_string(),
                        reason: "reference value must be an identifier string".into(),
                    }))
                }
            };
            let id = match ObjectId::parse(&raw) {
                Ok(id) => id,
                Err(e) => {
                    return Ok(Some(ResolvedRef::Malformed {
                        value: raw,
                        reason: e.to_string(),
                    }))
                }
            };

            // Already on the active chain: hand back the in-progress wrapper
            // instead of recursing. This is what makes cyclic graphs finite.
            if ctx.path.contains(&id) {
                let node = self.schema_for(&id, None)?;
                let (wrapper, _) = self
                    .identity()
                    .get_or_create(&id, || CoObject::new_loading(id.clone(), node));
                debug!(%id, "reference target already resolving, reusing wrapper");
                return Ok(Some(ResolvedRef::Wrapper(wrapper)));
            }

            let target_node = match target {
                Some(t) => Arc::new(*t),
                None => self.schema_for(&id, None)?,
            };

            // Past the hop budget: stop here and leave the target marked
            // unavailable rather than fetching further.
            if ctx.max_depth.is_some_and(|max| ctx.path.len() > max) {
                let (wrapper, created) = self.identity().get_or_create(&id, || {
                    CoObject::new_loading(id.clone(), Arc::clone(&target_node))
                });
                if created {
                    wrapper.set_state(LoadState::Unavailable);
                }
                debug!(%id, depth = ctx.path.len(), "resolution depth exhausted");
                return Ok(Some(ResolvedRef::Wrapper(wrapper)));
            }

            let (wrapper, _) = self.identity().get_or_create(&id, || {
                CoObject::new_loading(id.clone(), Arc::clone(&target_node))
            });

            // Single fetch attempt; pending targets stay Loading so one slow
            // object never stalls the whole resolution.
            if !wrapper.has_handle() {
                match self.store().get_primitive(&id).await? {
                    Fetch::Ready(handle) => {
                        wrapper.attach(Arc::clone(&handle));
                        self.ensure_watcher(&wrapper, &handle);
                    }
                    Fetch::Pending => wrapper.set_state(LoadState::Loading),
                    Fetch::Unavailable => wrapper.set_state(LoadState::Unavailable),
                }
            }

            // Walk the target's own reference fields under the extended path.
            if wrapper.is_loaded() {
                if let (Some(snapshot), Some(properties)) =
                    (wrapper.snapshot().await, target_node.properties())
                {
                    ctx.path.push(id.clone());
                    for (key, sub) in properties {
                        if !sub.is_reference() {
                            continue;
                        }
                        if let Some(field) = snapshot.get(key) {
                            self.resolve_inner(field.clone(), sub.clone(), ctx).await?;
                        }
                    }
                    ctx.path.pop();
                }
            }

            Ok(Some(ResolvedRef::Wrapper(wrapper)))
        })
    }
}
