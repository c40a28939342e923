//! Schema preprocessing: co-type tags → canonical JSON-Schema form.
//!
//! A raw schema may use a collaborative type directly, e.g.
//! `{"type": "reference"}`. Standard validators know nothing about co-types,
//! so preprocessing rewrites each tagged node into a generic shape and
//! records the original tag under `coType`:
//!
//! ```json
//! {"type": "string", "pattern": "^co_z[1-9A-HJ-NP-Za-km-z]+$", "coType": "reference"}
//! ```
//!
//! Downstream components (validator, resolver) recover "this is actually a
//! reference/list/stream" from `coType` without re-parsing. The rewrite is
//! pure and idempotent: canonical input passes through byte-identical
//! (serde_json's default map ordering keeps serialization deterministic).

use coview_types::{CoKind, ObjectId};
use serde_json::{Map, Value};

/// The field-level co-type tag for typed references. Not a [`CoKind`]:
/// references are a property of fields, not a primitive an object can be.
pub const REFERENCE_TAG: &str = "reference";

/// Key under which the original co-type tag is preserved.
const CO_TYPE_KEY: &str = "coType";

/// Returns true if `schema` is already in canonical form (preprocessing it
/// would be a no-op).
#[must_use]
pub fn is_canonical(schema: &Value) -> bool {
    preprocess(schema) == *schema
}

/// Rewrites every co-type-tagged node in `schema` into canonical form.
///
/// Non-object input is returned unchanged; unknown keys are preserved.
#[must_use]
pub fn preprocess(schema: &Value) -> Value {
    let Value::Object(map) = schema else {
        return schema.clone();
    };

    let mut out = map.clone();

    // Rewrite this node if its `type` is a co-type tag. A node that already
    // carries `coType` has been rewritten before; only its children need
    // visiting.
    if !out.contains_key(CO_TYPE_KEY) {
        if let Some(tag) = map.get("type").and_then(Value::as_str) {
            if tag == REFERENCE_TAG {
                out.insert("type".into(), Value::String("string".into()));
                out.insert("pattern".into(), Value::String(ObjectId::PATTERN.into()));
                out.insert(CO_TYPE_KEY.into(), Value::String(REFERENCE_TAG.into()));
            } else if let Some(kind) = CoKind::from_tag(tag) {
                let generic = match kind {
                    CoKind::KeyedMap | CoKind::Identity | CoKind::Group => "object",
                    CoKind::OrderedList | CoKind::AppendStream => "array",
                    CoKind::BinaryStream | CoKind::Text => "string",
                };
                out.insert("type".into(), Value::String(generic.into()));
                out.insert(CO_TYPE_KEY.into(), Value::String(tag.into()));
            }
        }
    }

    // Recurse into the schema-bearing children only; everything else
    // (`required`, `enum`, `pattern`, vendor keys) is data, not schema.
    if let Some(props) = out.get("properties").and_then(Value::as_object) {
        let rewritten: Map<String, Value> = props
            .iter()
            .map(|(k, v)| (k.clone(), preprocess(v)))
            .collect();
        out.insert("properties".into(), Value::Object(rewritten));
    }
    if let Some(items) = out.get("items") {
        let rewritten = preprocess(items);
        out.insert("items".into(), rewritten);
    }
    if let Some(target) = out.get("target") {
        let rewritten = preprocess(target);
        out.insert("target".into(), rewritten);
    }

    Value::Object(out)
}
