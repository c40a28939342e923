//! Property-based tests for schema preprocessing.
//!
//! The central algebraic property: preprocessing is idempotent. For any
//! generated schema document, `preprocess(preprocess(s)) == preprocess(s)`,
//! byte for byte once serialized.

use coview_schema::{preprocess, SchemaNode};
use proptest::prelude::*;
use serde_json::{json, Value};

fn leaf_strategy() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(json!({"type": "string"})),
        Just(json!({"type": "number"})),
        Just(json!({"type": "boolean"})),
        Just(json!({"type": "null"})),
        Just(json!({"type": "reference"})),
        Just(json!({"type": "collaborative-text"})),
        Just(json!({"type": "binary-stream"})),
        Just(json!({"type": "string", "enum": ["a", "b", "c"]})),
    ]
}

fn field_name_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-z][a-z_]{0,10}").unwrap()
}

/// Schemas up to three levels deep, mixing co-types and generic types.
fn schema_strategy() -> impl Strategy<Value = Value> {
    leaf_strategy().prop_recursive(3, 24, 4, |inner| {
        prop_oneof![
            // Map-shaped co-types with generated properties.
            (
                prop_oneof![
                    Just("keyed-map"),
                    Just("identity"),
                    Just("permission-group"),
                    Just("object"),
                ],
                prop::collection::btree_map(field_name_strategy(), inner.clone(), 0..4),
            )
                .prop_map(|(tag, props)| {
                    let properties: serde_json::Map<String, Value> =
                        props.into_iter().collect();
                    json!({"type": tag, "properties": properties})
                }),
            // Sequence-shaped co-types.
            (
                prop_oneof![
                    Just("ordered-list"),
                    Just("append-only-stream"),
                    Just("array"),
                ],
                inner.clone(),
            )
                .prop_map(|(tag, items)| json!({"type": tag, "items": items})),
            // References with a declared target schema.
            inner.prop_map(|target| json!({"type": "reference", "target": target})),
        ]
    })
}

proptest! {
    /// preprocess(preprocess(s)) == preprocess(s), byte for byte.
    #[test]
    fn preprocessing_is_idempotent(schema in schema_strategy()) {
        let once = preprocess(&schema);
        let twice = preprocess(&once);
        prop_assert_eq!(
            serde_json::to_string(&once).unwrap(),
            serde_json::to_string(&twice).unwrap()
        );
    }

    /// Every canonical document parses into a SchemaNode.
    #[test]
    fn canonical_documents_parse(schema in schema_strategy()) {
        let canonical = preprocess(&schema);
        prop_assert!(SchemaNode::parse(&canonical).is_ok());
    }

    /// Preprocessing canonical input changes nothing.
    #[test]
    fn canonical_fixpoint(schema in schema_strategy()) {
        let canonical = preprocess(&schema);
        prop_assert_eq!(preprocess(&canonical), canonical);
    }
}
