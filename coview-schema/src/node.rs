//! Parsed schema representation.
//!
//! [`SchemaNode`] is the exhaustively-matchable form of a canonical schema
//! document. The validator and the reference resolver both work on this type
//! rather than probing JSON documents at runtime.

use crate::error::{SchemaError, SchemaResult};
use crate::preprocess::{preprocess, REFERENCE_TAG};
use coview_types::CoKind;
use regex::Regex;
use serde_json::Value;
use std::collections::BTreeMap;

/// Properties and required-key list shared by the map-shaped variants.
#[derive(Debug, Clone, Default)]
pub struct MapShape {
    pub properties: BTreeMap<String, SchemaNode>,
    pub required: Vec<String>,
}

/// One node of a parsed schema.
#[derive(Debug, Clone)]
pub enum SchemaNode {
    /// Multi-writer key/value map (`keyed-map`).
    KeyedMap(MapShape),
    /// Account/identity object (`identity`).
    Identity(MapShape),
    /// Permission group (`permission-group`).
    Group(MapShape),
    /// Ordered list (`ordered-list`); element schema.
    OrderedList(Box<SchemaNode>),
    /// Append-only stream (`append-only-stream`); entry schema.
    AppendStream(Box<SchemaNode>),
    /// Binary stream (`binary-stream`); chunks are encoded strings at rest.
    BinaryStream,
    /// Collaborative plain text (`collaborative-text`).
    Text,
    /// Typed reference to another object. The stored value is always the
    /// target's identifier string. `target` optionally declares the target
    /// object's own schema, enabling nested resolution.
    Reference { target: Option<Box<SchemaNode>> },
    /// Plain string, optionally pattern- or enum-constrained.
    Str {
        pattern: Option<String>,
        enum_values: Option<Vec<String>>,
    },
    /// Plain number (integer or float).
    Number,
    /// Plain boolean.
    Boolean,
    /// Plain JSON object.
    Object(MapShape),
    /// Plain JSON array with an optional element schema.
    Array { items: Option<Box<SchemaNode>> },
    /// JSON null.
    Null,
    /// No constraint (absent or empty schema).
    Any,
}

impl SchemaNode {
    /// Parses a schema document. Raw (co-type-tagged) and canonical input
    /// are both accepted; raw input is preprocessed first.
    pub fn parse(schema: &Value) -> SchemaResult<Self> {
        Self::from_canonical(&preprocess(schema))
    }

    fn from_canonical(schema: &Value) -> SchemaResult<Self> {
        let map = match schema {
            Value::Object(m) if m.is_empty() => return Ok(SchemaNode::Any),
            Value::Object(m) => m,
            Value::Bool(true) => return Ok(SchemaNode::Any),
            other => {
                return Err(SchemaError::Malformed(format!(
                    "expected schema object, got {other}"
                )))
            }
        };

        // Canonical nodes carry the original tag in `coType`.
        if let Some(tag) = map.get("coType").and_then(Value::as_str) {
            if tag == REFERENCE_TAG {
                let target = map
                    .get("target")
                    .map(Self::from_canonical)
                    .transpose()?
                    .map(Box::new);
                return Ok(SchemaNode::Reference { target });
            }
            return match CoKind::from_tag(tag) {
                Some(CoKind::KeyedMap) => Ok(SchemaNode::KeyedMap(Self::map_shape(map)?)),
                Some(CoKind::Identity) => Ok(SchemaNode::Identity(Self::map_shape(map)?)),
                Some(CoKind::Group) => Ok(SchemaNode::Group(Self::map_shape(map)?)),
                Some(CoKind::OrderedList) => {
                    Ok(SchemaNode::OrderedList(Box::new(Self::items_of(map)?)))
                }
                Some(CoKind::AppendStream) => {
                    Ok(SchemaNode::AppendStream(Box::new(Self::items_of(map)?)))
                }
                Some(CoKind::BinaryStream) => Ok(SchemaNode::BinaryStream),
                Some(CoKind::Text) => Ok(SchemaNode::Text),
                None => Err(SchemaError::UnknownType(tag.to_string())),
            };
        }

        match map.get("type").and_then(Value::as_str) {
            Some("string") => {
                let pattern = map
                    .get("pattern")
                    .and_then(Value::as_str)
                    .map(str::to_string);
                if let Some(p) = &pattern {
                    Regex::new(p).map_err(|source| SchemaError::BadPattern {
                        pattern: p.clone(),
                        source,
                    })?;
                }
                let enum_values = map.get("enum").and_then(Value::as_array).map(|vals| {
                    vals.iter()
                        .filter_map(Value::as_str)
                        .map(str::to_string)
                        .collect()
                });
                Ok(SchemaNode::Str {
                    pattern,
                    enum_values,
                })
            }
            Some("number") | Some("integer") => Ok(SchemaNode::Number),
            Some("boolean") => Ok(SchemaNode::Boolean),
            Some("object") => Ok(SchemaNode::Object(Self::map_shape(map)?)),
            Some("array") => {
                let items = map
                    .get("items")
                    .map(Self::from_canonical)
                    .transpose()?
                    .map(Box::new);
                Ok(SchemaNode::Array { items })
            }
            Some("null") => Ok(SchemaNode::Null),
            Some(other) => Err(SchemaError::UnknownType(other.to_string())),
            // No `type`: an object with bare `properties` still describes a shape.
            None if map.contains_key("properties") => {
                Ok(SchemaNode::Object(Self::map_shape(map)?))
            }
            None => Ok(SchemaNode::Any),
        }
    }

    fn map_shape(map: &serde_json::Map<String, Value>) -> SchemaResult<MapShape> {
        let mut properties = BTreeMap::new();
        if let Some(props) = map.get("properties").and_then(Value::as_object) {
            for (key, sub) in props {
                properties.insert(key.clone(), Self::from_canonical(sub)?);
            }
        }
        let required = map
            .get("required")
            .and_then(Value::as_array)
            .map(|vals| {
                vals.iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();
        Ok(MapShape {
            properties,
            required,
        })
    }

    fn items_of(map: &serde_json::Map<String, Value>) -> SchemaResult<SchemaNode> {
        match map.get("items") {
            Some(items) => Self::from_canonical(items),
            None => Ok(SchemaNode::Any),
        }
    }

    /// The collaborative kind this node projects to, if it is an object-level
    /// co-type.
    #[must_use]
    pub fn co_kind(&self) -> Option<CoKind> {
        match self {
            SchemaNode::KeyedMap(_) => Some(CoKind::KeyedMap),
            SchemaNode::Identity(_) => Some(CoKind::Identity),
            SchemaNode::Group(_) => Some(CoKind::Group),
            SchemaNode::OrderedList(_) => Some(CoKind::OrderedList),
            SchemaNode::AppendStream(_) => Some(CoKind::AppendStream),
            SchemaNode::BinaryStream => Some(CoKind::BinaryStream),
            SchemaNode::Text => Some(CoKind::Text),
            _ => None,
        }
    }

    /// The declared properties, for map-shaped nodes.
    #[must_use]
    pub fn properties(&self) -> Option<&BTreeMap<String, SchemaNode>> {
        match self {
            SchemaNode::KeyedMap(shape)
            | SchemaNode::Identity(shape)
            | SchemaNode::Group(shape)
            | SchemaNode::Object(shape) => Some(&shape.properties),
            _ => None,
        }
    }

    /// True for reference nodes.
    #[must_use]
    pub fn is_reference(&self) -> bool {
        matches!(self, SchemaNode::Reference { .. })
    }
}
