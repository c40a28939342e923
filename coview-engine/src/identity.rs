//! Identity cache: one wrapper per identifier, process-wide.

use crate::wrapper::CoObject;
use coview_types::ObjectId;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, Weak};
use tracing::debug;

/// Weak memoization of wrappers by identifier.
///
/// Entries are `Weak`, so the cache never extends the lifetime of a wrapper
/// (and therefore never of the handle the wrapper holds). Once every
/// external reference to a wrapper is gone, its entry is dead and is purged
/// on the next access.
///
/// The lock is a plain `Mutex` held only for map operations, never across an
/// await point, which keeps the cache safe under interleaved async callers.
#[derive(Default)]
pub struct IdentityCache {
    inner: Mutex<HashMap<ObjectId, Weak<CoObject>>>,
}

impl IdentityCache {
    /// Creates an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached wrapper for `id`, or stores and returns the one
    /// produced by `init`. `init` runs at most once per live identifier:
    /// callers racing on the same id during one orchestration step observe a
    /// single wrapper instance.
    ///
    /// The second tuple element is true when `init` ran.
    pub fn get_or_create(
        &self,
        id: &ObjectId,
        init: impl FnOnce() -> CoObject,
    ) -> (Arc<CoObject>, bool) {
        let mut map = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(existing) = map.get(id).and_then(Weak::upgrade) {
            return (existing, false);
        }
        map.retain(|_, weak| weak.strong_count() > 0);
        let wrapper = Arc::new(init());
        map.insert(id.clone(), Arc::downgrade(&wrapper));
        debug!(%id, "wrapper created");
        (wrapper, true)
    }

    /// Returns the live wrapper for `id`, if any.
    #[must_use]
    pub fn get(&self, id: &ObjectId) -> Option<Arc<CoObject>> {
        let map = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        map.get(id).and_then(Weak::upgrade)
    }

    /// Number of live entries.
    #[must_use]
    pub fn len(&self) -> usize {
        let map = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        map.values().filter(|w| w.strong_count() > 0).count()
    }

    /// True when no live entries exist.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use coview_schema::SchemaNode;

    fn placeholder(id: &ObjectId) -> CoObject {
        CoObject::new_loading(id.clone(), Arc::new(SchemaNode::Any))
    }

    #[test]
    fn second_call_returns_same_instance_without_init() {
        let cache = IdentityCache::new();
        let id = ObjectId::generate();

        let mut f_ran = false;
        let (a, created_a) = cache.get_or_create(&id, || {
            f_ran = true;
            placeholder(&id)
        });
        let mut g_ran = false;
        let (b, created_b) = cache.get_or_create(&id, || {
            g_ran = true;
            placeholder(&id)
        });

        assert!(Arc::ptr_eq(&a, &b));
        assert!(created_a && !created_b);
        // f and g together executed at most once
        assert!(f_ran && !g_ran);
    }

    #[test]
    fn distinct_ids_get_distinct_wrappers() {
        let cache = IdentityCache::new();
        let id_a = ObjectId::generate();
        let id_b = ObjectId::generate();
        let (a, _) = cache.get_or_create(&id_a, || placeholder(&id_a));
        let (b, _) = cache.get_or_create(&id_b, || placeholder(&id_b));
        assert!(!Arc::ptr_eq(&a, &b));
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn entries_die_with_their_wrappers() {
        let cache = IdentityCache::new();
        let id = ObjectId::generate();
        let (wrapper, _) = cache.get_or_create(&id, || placeholder(&id));
        assert_eq!(cache.len(), 1);

        drop(wrapper);
        assert!(cache.get(&id).is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn dead_entry_is_replaced_by_a_fresh_wrapper() {
        let cache = IdentityCache::new();
        let id = ObjectId::generate();
        let (first, _) = cache.get_or_create(&id, || placeholder(&id));
        drop(first);

        let (second, created) = cache.get_or_create(&id, || placeholder(&id));
        assert!(created);
        assert_eq!(second.id(), &id);
    }

    #[test]
    fn get_does_not_create() {
        let cache = IdentityCache::new();
        assert!(cache.get(&ObjectId::generate()).is_none());
        assert!(cache.is_empty());
    }
}
