//! Value validation against parsed schemas.
//!
//! Validation never mutates anything and always runs before a write reaches
//! the store. Failures come back as an ordered list of violations, each with
//! a JSON-pointer path and a machine-readable reason.

use crate::node::{MapShape, SchemaNode};
use coview_types::ObjectId;
use regex::Regex;
use serde_json::Value;
use std::fmt;
use thiserror::Error;

/// Why a value failed validation at one path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViolationReason {
    /// A `required` field is absent.
    MissingRequired,
    /// The value's JSON type does not match the schema's.
    TypeMismatch {
        expected: &'static str,
        actual: &'static str,
    },
    /// A string failed its `pattern` constraint.
    PatternMismatch { pattern: String },
    /// A string is not one of the allowed `enum` values.
    EnumMismatch { allowed: Vec<String> },
    /// The field is not declared in the schema's properties.
    UnknownField,
}

impl fmt::Display for ViolationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ViolationReason::MissingRequired => write!(f, "missing required field"),
            ViolationReason::TypeMismatch { expected, actual } => {
                write!(f, "expected {expected}, got {actual}")
            }
            ViolationReason::PatternMismatch { pattern } => {
                write!(f, "does not match pattern {pattern:?}")
            }
            ViolationReason::EnumMismatch { allowed } => {
                write!(f, "not one of {allowed:?}")
            }
            ViolationReason::UnknownField => write!(f, "field not declared in schema"),
        }
    }
}

/// One validation failure: JSON-pointer path plus reason.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    /// JSON-pointer-style path to the offending value (`""` is the root).
    pub path: String,
    pub reason: ViolationReason,
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let path = if self.path.is_empty() { "/" } else { &self.path };
        write!(f, "{path}: {}", self.reason)
    }
}

/// A value failed validation. Carries every violation found, in walk order.
#[derive(Debug, Clone, Error)]
pub struct ValidationError {
    pub violations: Vec<Violation>,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "validation failed:")?;
        for v in &self.violations {
            write!(f, "\n  {v}")?;
        }
        Ok(())
    }
}

/// Validates `value` fully against `schema`: every `required` field must be
/// present, every present field must match its subschema.
pub fn validate(value: &Value, schema: &SchemaNode) -> Result<(), ValidationError> {
    let mut violations = Vec::new();
    check(value, schema, String::new(), &mut violations);
    finish(violations)
}

/// Validates only the fields present in `value` (an object) against their
/// per-field subschemas. Absent fields are not violations; fields the schema
/// never declares still are. Used for partial updates.
pub fn validate_partial(value: &Value, schema: &SchemaNode) -> Result<(), ValidationError> {
    let mut violations = Vec::new();
    match (value, schema.properties()) {
        (Value::Object(map), Some(properties)) => {
            for (key, field_value) in map {
                let path = format!("/{key}");
                match properties.get(key) {
                    Some(sub) => check(field_value, sub, path, &mut violations),
                    None => violations.push(Violation {
                        path,
                        reason: ViolationReason::UnknownField,
                    }),
                }
            }
        }
        (Value::Object(_), None) => {
            // Schema is not map-shaped; fall back to full validation.
            check(value, schema, String::new(), &mut violations);
        }
        (other, _) => violations.push(Violation {
            path: String::new(),
            reason: ViolationReason::TypeMismatch {
                expected: "object",
                actual: json_type_name(other),
            },
        }),
    }
    finish(violations)
}

fn finish(violations: Vec<Violation>) -> Result<(), ValidationError> {
    if violations.is_empty() {
        Ok(())
    } else {
        Err(ValidationError { violations })
    }
}

fn check(value: &Value, schema: &SchemaNode, path: String, out: &mut Vec<Violation>) {
    match schema {
        SchemaNode::Any => {}

        SchemaNode::Null => expect_type(value, path, "null", Value::is_null, out),
        SchemaNode::Boolean => expect_type(value, path, "boolean", Value::is_boolean, out),
        SchemaNode::Number => expect_type(value, path, "number", Value::is_number, out),

        SchemaNode::Str {
            pattern,
            enum_values,
        } => match value.as_str() {
            None => push_type_mismatch(value, path, "string", out),
            Some(s) => {
                if let Some(p) = pattern {
                    // Pattern validity is enforced at parse time.
                    let matched = Regex::new(p).map(|re| re.is_match(s)).unwrap_or(true);
                    if !matched {
                        out.push(Violation {
                            path: path.clone(),
                            reason: ViolationReason::PatternMismatch { pattern: p.clone() },
                        });
                    }
                }
                if let Some(allowed) = enum_values {
                    if !allowed.iter().any(|a| a == s) {
                        out.push(Violation {
                            path,
                            reason: ViolationReason::EnumMismatch {
                                allowed: allowed.clone(),
                            },
                        });
                    }
                }
            }
        },

        // Text and binary streams project to strings at rest.
        SchemaNode::Text | SchemaNode::BinaryStream => {
            expect_type(value, path, "string", Value::is_string, out)
        }

        // At rest a reference is always the target's identifier string.
        SchemaNode::Reference { .. } => match value.as_str() {
            None => push_type_mismatch(value, path, "string", out),
            Some(s) if ObjectId::is_valid_str(s) => {}
            Some(_) => out.push(Violation {
                path,
                reason: ViolationReason::PatternMismatch {
                    pattern: ObjectId::PATTERN.to_string(),
                },
            }),
        },

        SchemaNode::OrderedList(items) | SchemaNode::AppendStream(items) => {
            check_array(value, Some(items), path, out)
        }
        SchemaNode::Array { items } => check_array(value, items.as_deref(), path, out),

        SchemaNode::KeyedMap(shape)
        | SchemaNode::Identity(shape)
        | SchemaNode::Group(shape)
        | SchemaNode::Object(shape) => check_map(value, shape, path, out),
    }
}

fn check_array(
    value: &Value,
    items: Option<&SchemaNode>,
    path: String,
    out: &mut Vec<Violation>,
) {
    match value.as_array() {
        None => push_type_mismatch(value, path, "array", out),
        Some(elements) => {
            if let Some(item_schema) = items {
                for (i, element) in elements.iter().enumerate() {
                    check(element, item_schema, format!("{path}/{i}"), out);
                }
            }
        }
    }
}

fn check_map(value: &Value, shape: &MapShape, path: String, out: &mut Vec<Violation>) {
    let Some(map) = value.as_object() else {
        push_type_mismatch(value, path, "object", out);
        return;
    };

    for required in &shape.required {
        if !map.contains_key(required) {
            out.push(Violation {
                path: format!("{path}/{required}"),
                reason: ViolationReason::MissingRequired,
            });
        }
    }

    for (key, field_value) in map {
        let field_path = format!("{path}/{key}");
        match shape.properties.get(key) {
            Some(sub) => check(field_value, sub, field_path, out),
            None => out.push(Violation {
                path: field_path,
                reason: ViolationReason::UnknownField,
            }),
        }
    }
}

fn expect_type(
    value: &Value,
    path: String,
    expected: &'static str,
    pred: impl Fn(&Value) -> bool,
    out: &mut Vec<Violation>,
) {
    if !pred(value) {
        push_type_mismatch(value, path, expected, out);
    }
}

fn push_type_mismatch(
    value: &Value,
    path: String,
    expected: &'static str,
    out: &mut Vec<Violation>,
) {
    out.push(Violation {
        path,
        reason: ViolationReason::TypeMismatch {
            expected,
            actual: json_type_name(value),
        },
    });
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
