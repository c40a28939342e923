//! Identifier type for collaborative objects.
//!
//! Identifiers are opaque strings issued by the external store: a reserved
//! `co_z` prefix followed by a base58-encoded payload. The payload is
//! content-derived in a real store; the in-memory engine derives it from
//! random bytes. This layer only ever checks shape, never decodes meaning.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Reserved prefix every collaborative-object identifier carries.
pub const ID_PREFIX: &str = "co_z";

/// Error parsing an [`ObjectId`] from a string.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IdError {
    /// Missing the reserved `co_z` prefix.
    #[error("identifier missing reserved prefix `co_z`: {0:?}")]
    MissingPrefix(String),

    /// Payload is empty or contains characters outside the base58 alphabet.
    #[error("identifier payload is not base58: {0:?}")]
    BadPayload(String),
}

/// Opaque identifier of one collaborative object in the external store.
///
/// Shape: `co_z` + base58 payload (Bitcoin alphabet, no `0OIl`). Identifiers
/// are unique and content-derived; two equal strings always address the same
/// underlying object.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ObjectId(String);

impl ObjectId {
    /// Anchored regex source matching the identifier shape. Reference fields
    /// in preprocessed schemas constrain their string value with this.
    pub const PATTERN: &'static str = "^co_z[1-9A-HJ-NP-Za-km-z]+$";

    /// Generates a fresh identifier from 16 random bytes.
    ///
    /// Only the store side should mint identifiers; this exists for store
    /// implementations and tests.
    #[must_use]
    pub fn generate() -> Self {
        let payload = bs58::encode(Uuid::new_v4().as_bytes()).into_string();
        Self(format!("{ID_PREFIX}{payload}"))
    }

    /// Parses an identifier, checking prefix and payload alphabet.
    pub fn parse(s: &str) -> Result<Self, IdError> {
        let payload = s
            .strip_prefix(ID_PREFIX)
            .ok_or_else(|| IdError::MissingPrefix(s.to_string()))?;
        if payload.is_empty() || !payload.chars().all(is_base58_char) {
            return Err(IdError::BadPayload(s.to_string()));
        }
        Ok(Self(s.to_string()))
    }

    /// Returns true if `s` has the reserved identifier shape.
    #[must_use]
    pub fn is_valid_str(s: &str) -> bool {
        Self::parse(s).is_ok()
    }

    /// The identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

fn is_base58_char(c: char) -> bool {
    c.is_ascii_alphanumeric() && !matches!(c, '0' | 'O' | 'I' | 'l')
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for ObjectId {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}
