//! Error taxonomy for the projection engine.
//!
//! Only caller-recoverable or caller-caused failures become errors here.
//! "Not available yet" — a pending fetch, a missing object, an elapsed read
//! deadline — is absorbed into [`coview_types::LoadState::Unavailable`]
//! because the store's eventual consistency makes it a normal outcome.
//! Malformed reference targets are likewise reported inline in resolution
//! results, never thrown across a read boundary.

use coview_schema::{SchemaError, ValidationError};
use coview_store::StoreError;
use thiserror::Error;

/// Result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

/// Errors surfaced by the CRUD engine.
#[derive(Debug, Error)]
pub enum EngineError {
    /// A create/update payload failed validation. Raised before any store
    /// mutation; nothing was applied or cached.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// The supplied schema document could not be parsed.
    #[error(transparent)]
    Schema(#[from] SchemaError),

    /// The store boundary reported a failure.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Caller misuse: malformed identifier input, missing schema context,
    /// or an operation that does not apply to the object's kind.
    #[error("structural error: {0}")]
    Structural(String),
}

impl EngineError {
    pub(crate) fn structural(msg: impl Into<String>) -> Self {
        EngineError::Structural(msg.into())
    }
}
