//! Schema layer for coview.
//!
//! Schemas are JSON-Schema-like documents extended with collaborative-type
//! tags (`keyed-map`, `ordered-list`, `append-only-stream`, `binary-stream`,
//! `identity`, `permission-group`, `collaborative-text`, `reference`). This
//! crate provides:
//!
//! - [`preprocess`] — rewrites co-type tags into a canonical, generic
//!   JSON-Schema form while preserving the original tag in a `coType` field.
//!   Pure and idempotent.
//! - [`SchemaNode`] — the parsed, exhaustively-matchable form of a canonical
//!   schema document.
//! - [`validate`] / [`validate_partial`] — structured validation producing
//!   JSON-pointer-addressed violations, run before every write.

mod error;
mod node;
mod preprocess;
mod validate;

pub use error::{SchemaError, SchemaResult};
pub use node::{MapShape, SchemaNode};
pub use preprocess::{is_canonical, preprocess, REFERENCE_TAG};
pub use validate::{validate, validate_partial, ValidationError, Violation, ViolationReason};
