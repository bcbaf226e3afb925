//! Unit tests for values, expressions, edge labels, versions and records.
use keiro::error::RecordError;
use keiro::parser::{compare_versions, parse_expression};
use keiro::prelude::*;
use serde_json::json;
use std::cmp::Ordering;

fn expr(value: serde_json::Value) -> Expression {
    parse_expression("test", &value).expect("Invalid expression")
}

#[test]
fn test_value_display() {
    assert_eq!(Value::Number(2.0).to_string(), "2");
    assert_eq!(Value::Number(-0.0).to_string(), "0");
    assert_eq!(Value::Number(2.5).to_string(), "2.5");
    assert_eq!(Value::from("hi").to_string(), "\"hi\"");
    assert_eq!(Value::Bool(true).to_string(), "true");
    assert_eq!(Value::Null.to_string(), "null");
}

#[test]
fn test_value_string_coercion() {
    assert_eq!(Value::Number(200.0).coerce_to_string(), "200");
    assert_eq!(Value::Number(0.25).coerce_to_string(), "0.25");
    assert_eq!(Value::Bool(false).coerce_to_string(), "false");
    assert_eq!(Value::Null.coerce_to_string(), "");
    assert_eq!(Value::from("MiXeD Case").coerce_lowercase(), "mixed case");
    assert_eq!(Value::Bool(true).coerce_lowercase(), "true");
}

#[test]
fn test_value_ordering_is_type_strict() {
    assert_eq!(
        Value::Number(1.0).compare(&Value::Number(2.0)),
        Some(Ordering::Less)
    );
    assert_eq!(
        Value::from("b").compare(&Value::from("a")),
        Some(Ordering::Greater)
    );
    assert_eq!(Value::Number(1.0).compare(&Value::from("1")), None);
    assert_eq!(Value::Bool(true).compare(&Value::Bool(false)), None);
    assert_eq!(Value::Number(f64::NAN).compare(&Value::Number(1.0)), None);
}

#[test]
fn test_value_json_conversion() {
    assert_eq!(Value::from_json(&json!(3)), Some(Value::Number(3.0)));
    assert_eq!(Value::from_json(&json!(null)), Some(Value::Null));
    assert_eq!(Value::from_json(&json!([1])), None);
    assert_eq!(Value::from_json(&json!({"a": 1})), None);
    assert_eq!(Value::Number(3.0).to_json(), json!(3));
    assert_eq!(Value::Number(3.5).to_json(), json!(3.5));
    assert_eq!(Value::Number(f64::NAN).to_json(), json!(null));
}

#[test]
fn test_input_source_display() {
    assert_eq!(
        InputSource::Field {
            name: "age".to_string()
        }
        .to_string(),
        "$age"
    );
    assert_eq!(
        InputSource::Node {
            id: "table.note".to_string()
        }
        .to_string(),
        "@table.note"
    );
}

#[test]
fn test_expression_forms() {
    assert_eq!(expr(json!(5)), Expression::literal(5));
    assert_eq!(expr(json!("text")), Expression::literal("text"));
    assert_eq!(expr(json!({"literal": true})), Expression::literal(true));
    assert_eq!(expr(json!(null)), Expression::Literal(Value::Null));
    assert_eq!(expr(json!({"field": "age"})), Expression::field("age"));
    assert_eq!(expr(json!({"node": "calc"})), Expression::node("calc"));
    assert_eq!(
        expr(json!({"op": "-", "args": [{"field": "a"}, 1]})),
        Expression::Subtract(
            Box::new(Expression::field("a")),
            Box::new(Expression::literal(1))
        )
    );
}

#[test]
fn test_logical_operators_fold_left() {
    let folded = expr(json!({"op": "and", "args": [true, false, {"field": "x"}]}));
    assert_eq!(
        folded,
        Expression::And(
            Box::new(Expression::And(
                Box::new(Expression::literal(true)),
                Box::new(Expression::literal(false))
            )),
            Box::new(Expression::field("x"))
        )
    );
    assert_eq!(
        expr(json!({"op": "not", "args": [{"field": "flag"}]})),
        Expression::Not(Box::new(Expression::field("flag")))
    );
}

#[test]
fn test_expression_errors_name_the_problem() {
    let message = |value: serde_json::Value| match parse_expression("calc", &value) {
        Err(SchemaError::InvalidExpression { node_id, message }) => {
            assert_eq!(node_id, "calc");
            message
        }
        other => panic!("Expected InvalidExpression, got {:?}", other),
    };

    assert!(message(json!({"op": "*", "args": [1, 2, 3]})).contains("'*'"));
    assert!(message(json!({"op": "pow", "args": [1, 2]})).contains("pow"));
    assert!(message(json!({"op": ">"})).contains("args"));
    assert!(message(json!({"literal": 1, "op": "+"})).contains("ambiguous"));
    assert!(message(json!({"literal": [1]})).contains("scalar"));
}

#[test]
fn test_expression_display() {
    let e = expr(json!({"op": "*", "args": [
        {"op": "+", "args": [{"field": "a"}, 1]},
        {"node": "rate"}
    ]}));
    assert_eq!(e.to_string(), "($a + 1) * @rate");

    let e = expr(json!({"op": "-", "args": [
        {"field": "a"},
        {"op": "-", "args": [{"field": "b"}, {"field": "c"}]}
    ]}));
    assert_eq!(e.to_string(), "$a - ($b - $c)");

    let e = expr(json!({"op": "or", "args": [
        {"op": "not", "args": [{"field": "x"}]},
        {"op": "==", "args": [{"field": "name"}, "bob"]}
    ]}));
    assert_eq!(e.to_string(), "not $x or $name == \"bob\"");
}

#[test]
fn test_expression_json_round_trip() {
    let source = json!({"op": "and", "args": [
        {"op": ">=", "args": [{"field": "age"}, 18]},
        {"op": "!=", "args": [{"node": "lookup.note"}, null]}
    ]});
    let parsed = expr(source);
    assert_eq!(expr(parsed.to_json()), parsed);
}

#[test]
fn test_edge_label_resolution() {
    assert_eq!(EdgeLabel::resolve(Some("then"), true), Some(EdgeLabel::Then));
    assert_eq!(EdgeLabel::resolve(Some("else"), true), Some(EdgeLabel::Else));
    assert_eq!(EdgeLabel::resolve(Some("default"), true), Some(EdgeLabel::Else));
    assert_eq!(EdgeLabel::resolve(None, true), None);
    assert_eq!(EdgeLabel::resolve(None, false), Some(EdgeLabel::Next));
    assert_eq!(EdgeLabel::resolve(Some("default"), false), Some(EdgeLabel::Next));
    assert_eq!(EdgeLabel::resolve(Some("then"), false), None);
    assert_eq!(EdgeLabel::resolve(Some("sideways"), true), None);
}

#[test]
fn test_version_requests() {
    assert_eq!(VersionReq::parse(None), VersionReq::Any);
    assert_eq!(VersionReq::parse(Some("*")), VersionReq::Any);
    assert_eq!(VersionReq::parse(Some("  ")), VersionReq::Any);
    assert_eq!(
        VersionReq::parse(Some("1.0.0")),
        VersionReq::Exact("1.0.0".to_string())
    );
    assert!(VersionReq::Any.matches("0.0.1"));
    assert!(VersionReq::Exact("1".to_string()).matches("1"));
    assert!(!VersionReq::Exact("1".to_string()).matches("1.0"));
}

#[test]
fn test_compare_versions() {
    assert_eq!(compare_versions("1.10.0", "1.9.0"), Ordering::Greater);
    assert_eq!(compare_versions("2", "10"), Ordering::Less);
    assert_eq!(compare_versions("1.0", "1.0.0"), Ordering::Less);
    assert_eq!(compare_versions("1.0.0", "1.0.0"), Ordering::Equal);
    assert_eq!(compare_versions("1.0-beta", "1.0-alpha"), Ordering::Greater);
}

#[test]
fn test_record_from_json() {
    let record = Record::from_json(&json!({"a": 1, "b": "x", "c": null})).expect("Invalid record");
    assert_eq!(record.len(), 3);
    assert_eq!(record.get("a"), Some(&Value::Number(1.0)));
    assert_eq!(record.get("c"), Some(&Value::Null));
    assert_eq!(record.to_json(), json!({"a": 1, "b": "x", "c": null}));

    assert!(matches!(
        Record::from_json(&json!([1, 2])),
        Err(RecordError::NotAnObject(0))
    ));
    assert!(matches!(
        Record::from_json(&json!({"nested": {"a": 1}})),
        Err(RecordError::UnsupportedValue(ref field)) if field == "nested"
    ));
}

#[test]
fn test_record_batch_layouts() {
    let by_rows = RecordBatch::from_json_value(&json!([{"a": 1, "b": 2}, {"a": 3, "b": 4}]))
        .expect("Invalid rows");
    let by_columns =
        RecordBatch::from_json_value(&json!({"a": [1, 3], "b": [2, 4]})).expect("Invalid columns");
    assert_eq!(by_rows.len(), 2);
    assert_eq!(by_rows.records(), by_columns.records());

    assert!(matches!(
        RecordBatch::from_json_value(&json!({"a": [1, 2], "b": [1]})),
        Err(RecordError::ColumnLengthMismatch { ref column, expected: 2, found: 1 }) if column == "b"
    ));
    assert!(matches!(
        RecordBatch::from_json_value(&json!([{"a": 1}, 2])),
        Err(RecordError::NotAnObject(1))
    ));
    assert!(matches!(
        RecordBatch::from_json_value(&json!("rows")),
        Err(RecordError::InvalidShape)
    ));
    assert!(RecordBatch::from_json_value(&json!([])).expect("Empty batch").is_empty());
}
