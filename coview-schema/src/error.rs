//! Error types for the schema layer.

use thiserror::Error;

/// Result type for schema operations.
pub type SchemaResult<T> = Result<T, SchemaError>;

/// Errors raised while parsing a schema document.
///
/// Value-vs-schema mismatches are *not* errors at this level; those are
/// [`crate::ValidationError`]s produced by the validator.
#[derive(Debug, Error)]
pub enum SchemaError {
    /// The document is not a JSON object where one was required.
    #[error("malformed schema: {0}")]
    Malformed(String),

    /// `type` names neither a JSON primitive nor a known co-type tag.
    #[error("unknown schema type: {0:?}")]
    UnknownType(String),

    /// A `pattern` keyword does not compile as a regular expression.
    #[error("invalid pattern {pattern:?}: {source}")]
    BadPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },
}
