//! Core type definitions for coview.
//!
//! This crate defines the fundamental types shared by every layer of the
//! projection stack:
//! - [`ObjectId`] — opaque collaborative-object identifier (`co_z` prefix + base58 payload)
//! - [`CoKind`] — which collaborative primitive an object represents
//! - [`LoadState`] — the three-valued availability status of a projection
//!
//! Everything store- or engine-specific lives in the higher crates; these
//! types are the contract between them.

mod ids;
mod kind;
mod loading;

pub use ids::{IdError, ObjectId};
pub use kind::CoKind;
pub use loading::LoadState;
