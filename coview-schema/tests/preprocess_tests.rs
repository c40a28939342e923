use coview_schema::{is_canonical, preprocess};
use coview_types::ObjectId;
use pretty_assertions::assert_eq;
use serde_json::json;

// ── Co-type rewrites ─────────────────────────────────────────────

#[test]
fn reference_becomes_pattern_constrained_string() {
    let raw = json!({"type": "reference"});
    let canonical = preprocess(&raw);
    assert_eq!(
        canonical,
        json!({
            "type": "string",
            "pattern": ObjectId::PATTERN,
            "coType": "reference",
        })
    );
}

#[test]
fn keyed_map_becomes_object_with_preserved_tag() {
    let raw = json!({
        "type": "keyed-map",
        "properties": {
            "title": {"type": "string"},
            "author": {"type": "reference"},
        },
        "required": ["title"],
    });
    let canonical = preprocess(&raw);
    assert_eq!(canonical["type"], "object");
    assert_eq!(canonical["coType"], "keyed-map");
    assert_eq!(canonical["required"], json!(["title"]));
    // Nested reference was rewritten too.
    assert_eq!(canonical["properties"]["author"]["type"], "string");
    assert_eq!(canonical["properties"]["author"]["coType"], "reference");
    // Plain fields pass through untouched.
    assert_eq!(canonical["properties"]["title"], json!({"type": "string"}));
}

#[test]
fn list_and_stream_become_arrays() {
    let list = preprocess(&json!({"type": "ordered-list", "items": {"type": "number"}}));
    assert_eq!(list["type"], "array");
    assert_eq!(list["coType"], "ordered-list");
    assert_eq!(list["items"], json!({"type": "number"}));

    let stream = preprocess(&json!({"type": "append-only-stream", "items": {"type": "reference"}}));
    assert_eq!(stream["type"], "array");
    assert_eq!(stream["coType"], "append-only-stream");
    assert_eq!(stream["items"]["coType"], "reference");
}

#[test]
fn text_and_binary_become_strings() {
    let text = preprocess(&json!({"type": "collaborative-text"}));
    assert_eq!(text, json!({"type": "string", "coType": "collaborative-text"}));

    let binary = preprocess(&json!({"type": "binary-stream"}));
    assert_eq!(binary, json!({"type": "string", "coType": "binary-stream"}));
}

#[test]
fn identity_and_group_become_objects() {
    let identity = preprocess(&json!({"type": "identity"}));
    assert_eq!(identity, json!({"type": "object", "coType": "identity"}));

    let group = preprocess(&json!({"type": "permission-group"}));
    assert_eq!(group, json!({"type": "object", "coType": "permission-group"}));
}

#[test]
fn reference_target_subschema_is_preprocessed() {
    let raw = json!({
        "type": "reference",
        "target": {
            "type": "keyed-map",
            "properties": {"name": {"type": "string"}},
        },
    });
    let canonical = preprocess(&raw);
    assert_eq!(canonical["target"]["type"], "object");
    assert_eq!(canonical["target"]["coType"], "keyed-map");
}

// ── Pass-through behavior ────────────────────────────────────────

#[test]
fn generic_types_pass_through() {
    for schema in [
        json!({"type": "string"}),
        json!({"type": "number"}),
        json!({"type": "boolean"}),
        json!({"type": "null"}),
        json!({"type": "string", "enum": ["a", "b"]}),
    ] {
        assert_eq!(preprocess(&schema), schema);
    }
}

#[test]
fn unknown_keys_are_preserved() {
    let raw = json!({"type": "reference", "description": "points at the author"});
    let canonical = preprocess(&raw);
    assert_eq!(canonical["description"], "points at the author");
}

#[test]
fn non_object_input_is_unchanged() {
    assert_eq!(preprocess(&json!(true)), json!(true));
    assert_eq!(preprocess(&json!("string")), json!("string"));
}

// ── Idempotence ──────────────────────────────────────────────────

#[test]
fn preprocessing_is_idempotent_byte_for_byte() {
    let raw = json!({
        "type": "keyed-map",
        "properties": {
            "title": {"type": "string"},
            "author": {"type": "reference", "target": {"type": "identity"}},
            "comments": {"type": "append-only-stream", "items": {"type": "reference"}},
            "body": {"type": "collaborative-text"},
        },
        "required": ["title", "author"],
    });
    let once = preprocess(&raw);
    let twice = preprocess(&once);
    assert_eq!(
        serde_json::to_string(&once).unwrap(),
        serde_json::to_string(&twice).unwrap()
    );
}

#[test]
fn canonical_input_is_a_no_op() {
    let canonical = preprocess(&json!({"type": "reference"}));
    assert!(is_canonical(&canonical));
}
