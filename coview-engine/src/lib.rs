//! Projection engine for coview.
//!
//! Orchestrates the schema layer and the store boundary into a uniform
//! create/read/update/delete surface:
//!
//! - [`CoObject`] — the local, schema-typed projection of one store handle.
//!   Exactly one instance exists per identifier process-wide, so consumers
//!   can use pointer identity for change detection.
//! - [`IdentityCache`] — enforces that uniqueness.
//! - [`SubscriptionCache`] — deduplicates live store subscriptions per
//!   handle and defers teardown through a grace window.
//! - [`ResolvedRef`] / [`CoEngine::resolve`] — typed reference resolution
//!   with cycle termination.
//! - [`CoEngine`] — the CRUD surface itself.

mod engine;
mod error;
mod identity;
mod resolver;
mod subscription;
mod wrapper;

pub use engine::{CoEngine, CreateRequest, EngineConfig, ReadRequest, UpdateRequest};
pub use error::{EngineError, EngineResult};
pub use identity::IdentityCache;
pub use resolver::{ResolveContext, ResolvedRef};
pub use subscription::{SubToken, SubscriptionCache};
pub use wrapper::CoObject;
