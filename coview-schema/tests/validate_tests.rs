use coview_schema::{validate, validate_partial, SchemaNode, ViolationReason};
use coview_types::ObjectId;
use serde_json::json;

fn post_schema() -> SchemaNode {
    SchemaNode::parse(&json!({
        "type": "keyed-map",
        "properties": {
            "title": {"type": "string"},
            "likes": {"type": "number"},
            "done": {"type": "boolean"},
            "author": {"type": "reference"},
            "status": {"type": "string", "enum": ["draft", "published"]},
        },
        "required": ["title"],
    }))
    .unwrap()
}

// ── Full validation ──────────────────────────────────────────────

#[test]
fn valid_document_passes() {
    let schema = post_schema();
    let doc = json!({
        "title": "Hello",
        "likes": 3,
        "done": false,
        "author": ObjectId::generate().as_str(),
        "status": "draft",
    });
    assert!(validate(&doc, &schema).is_ok());
}

#[test]
fn missing_required_field_is_reported_with_path() {
    let schema = post_schema();
    let err = validate(&json!({"likes": 42}), &schema).unwrap_err();
    let v = &err.violations[0];
    assert_eq!(v.path, "/title");
    assert_eq!(v.reason, ViolationReason::MissingRequired);
}

#[test]
fn type_mismatch_names_both_types() {
    let schema = post_schema();
    let err = validate(&json!({"title": "x", "likes": "many"}), &schema).unwrap_err();
    assert_eq!(err.violations.len(), 1);
    assert_eq!(err.violations[0].path, "/likes");
    assert_eq!(
        err.violations[0].reason,
        ViolationReason::TypeMismatch {
            expected: "number",
            actual: "string"
        }
    );
}

#[test]
fn enum_mismatch_lists_allowed_values() {
    let schema = post_schema();
    let err = validate(&json!({"title": "x", "status": "retracted"}), &schema).unwrap_err();
    assert!(matches!(
        &err.violations[0].reason,
        ViolationReason::EnumMismatch { allowed } if allowed == &["draft", "published"]
    ));
}

#[test]
fn reference_field_rejects_malformed_identifier() {
    let schema = post_schema();
    let err = validate(&json!({"title": "x", "author": "not-an-id"}), &schema).unwrap_err();
    assert_eq!(err.violations[0].path, "/author");
    assert!(matches!(
        &err.violations[0].reason,
        ViolationReason::PatternMismatch { .. }
    ));
}

#[test]
fn reference_field_rejects_embedded_object() {
    let schema = post_schema();
    let err = validate(
        &json!({"title": "x", "author": {"name": "inline"}}),
        &schema,
    )
    .unwrap_err();
    assert!(matches!(
        err.violations[0].reason,
        ViolationReason::TypeMismatch { expected: "string", .. }
    ));
}

#[test]
fn undeclared_field_is_a_violation() {
    let schema = post_schema();
    let err = validate(&json!({"title": "x", "rogue": 1}), &schema).unwrap_err();
    assert_eq!(err.violations[0].path, "/rogue");
    assert_eq!(err.violations[0].reason, ViolationReason::UnknownField);
}

#[test]
fn nested_violations_carry_full_pointer() {
    let schema = SchemaNode::parse(&json!({
        "type": "keyed-map",
        "properties": {
            "tags": {"type": "ordered-list", "items": {"type": "string"}},
        },
    }))
    .unwrap();
    let err = validate(&json!({"tags": ["ok", 7]}), &schema).unwrap_err();
    assert_eq!(err.violations[0].path, "/tags/1");
}

#[test]
fn violations_come_back_in_walk_order() {
    let schema = post_schema();
    let err = validate(&json!({"likes": "many", "done": 1}), &schema).unwrap_err();
    let paths: Vec<&str> = err.violations.iter().map(|v| v.path.as_str()).collect();
    // Required check first, then present fields in key order.
    assert_eq!(paths, ["/title", "/done", "/likes"]);
}

// ── Partial validation ───────────────────────────────────────────

#[test]
fn partial_ignores_absent_required_fields() {
    let schema = post_schema();
    assert!(validate_partial(&json!({"likes": 42}), &schema).is_ok());
}

#[test]
fn partial_still_checks_provided_fields() {
    let schema = post_schema();
    let err = validate_partial(&json!({"likes": "many"}), &schema).unwrap_err();
    assert_eq!(err.violations[0].path, "/likes");
}

#[test]
fn partial_rejects_undeclared_fields() {
    let schema = post_schema();
    let err = validate_partial(&json!({"rogue": true}), &schema).unwrap_err();
    assert_eq!(err.violations[0].reason, ViolationReason::UnknownField);
}

#[test]
fn partial_rejects_non_object_input() {
    let schema = post_schema();
    let err = validate_partial(&json!(42), &schema).unwrap_err();
    assert!(matches!(
        err.violations[0].reason,
        ViolationReason::TypeMismatch { expected: "object", .. }
    ));
}

// ── Display ──────────────────────────────────────────────────────

#[test]
fn error_display_lists_path_and_reason() {
    let schema = post_schema();
    let err = validate(&json!({"likes": 42}), &schema).unwrap_err();
    let rendered = err.to_string();
    assert!(rendered.contains("/title"));
    assert!(rendered.contains("missing required field"));
}
