//! Error types for the store boundary.

use coview_types::{CoKind, ObjectId};
use thiserror::Error;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors surfaced across the store boundary.
///
/// "Not there yet" is deliberately *not* an error — absence and pending sync
/// are normal outcomes reported through [`crate::Fetch`].
#[derive(Debug, Error)]
pub enum StoreError {
    /// The operation does not apply to this primitive kind
    /// (e.g. `set` on an ordered list).
    #[error("{op} not supported on {kind} object {id}")]
    WrongKind {
        id: ObjectId,
        kind: CoKind,
        op: &'static str,
    },

    /// Initial data does not have the shape the kind requires
    /// (e.g. a non-object for a keyed map).
    #[error("initial data for {kind} must be {expected}")]
    BadInitial {
        kind: CoKind,
        expected: &'static str,
    },

    /// The backing engine reported a failure.
    #[error("store backend error: {0}")]
    Backend(String),
}
