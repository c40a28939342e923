use serde::{Deserialize, Serialize};
use std::fmt;

/// Which collaborative primitive an object (or schema node) represents.
///
/// These are the co-type tags layered on top of plain JSON-Schema types.
/// The serde representation matches the tag strings used in schema
/// documents (`"keyed-map"`, `"ordered-list"`, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CoKind {
    /// Multi-writer key/value map.
    KeyedMap,
    /// Ordered, insert-anywhere list.
    OrderedList,
    /// Append-only stream of entries.
    #[serde(rename = "append-only-stream")]
    AppendStream,
    /// Append-only stream of binary chunks.
    BinaryStream,
    /// An account/identity object.
    Identity,
    /// A permission group.
    #[serde(rename = "permission-group")]
    Group,
    /// Collaboratively edited plain text.
    #[serde(rename = "collaborative-text")]
    Text,
}

impl CoKind {
    /// All kinds, in tag order.
    pub const ALL: [CoKind; 7] = [
        CoKind::KeyedMap,
        CoKind::OrderedList,
        CoKind::AppendStream,
        CoKind::BinaryStream,
        CoKind::Identity,
        CoKind::Group,
        CoKind::Text,
    ];

    /// The schema tag string for this kind.
    #[must_use]
    pub fn tag(&self) -> &'static str {
        match self {
            CoKind::KeyedMap => "keyed-map",
            CoKind::OrderedList => "ordered-list",
            CoKind::AppendStream => "append-only-stream",
            CoKind::BinaryStream => "binary-stream",
            CoKind::Identity => "identity",
            CoKind::Group => "permission-group",
            CoKind::Text => "collaborative-text",
        }
    }

    /// Parses a schema tag string into a kind.
    #[must_use]
    pub fn from_tag(tag: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|k| k.tag() == tag)
    }

    /// True for kinds whose contents are addressed by string keys.
    #[must_use]
    pub fn is_keyed(&self) -> bool {
        matches!(self, CoKind::KeyedMap | CoKind::Identity | CoKind::Group)
    }

    /// True for kinds whose contents form a sequence.
    #[must_use]
    pub fn is_sequence(&self) -> bool {
        matches!(
            self,
            CoKind::OrderedList | CoKind::AppendStream | CoKind::BinaryStream
        )
    }
}

impl fmt::Display for CoKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}
