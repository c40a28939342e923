//! Store boundary for coview.
//!
//! The external collaborative (CRDT) engine is consumed as a black box
//! behind two traits:
//!
//! - [`CoStore`] — creates primitives and fetches handles by identifier.
//!   A fetch returns [`Fetch::Pending`] while the object is still syncing,
//!   reflecting the store's eventual consistency.
//! - [`RawPrimitive`] — one live handle: key access, mutation, array view,
//!   and change subscription. Handles are shared as [`RawHandle`]
//!   (`Arc<dyn RawPrimitive>`); this layer never frees them.
//!
//! [`MemStore`] is the in-memory reference implementation used by the test
//! suites and by embedders that want a purely local store. It adds hooks to
//! simulate pending and unavailable objects.

mod error;
mod handle;
mod memory;

pub use error::{StoreError, StoreResult};
pub use handle::{CoStore, Fetch, RawHandle, RawPrimitive, SubscriptionHandle};
pub use memory::MemStore;
