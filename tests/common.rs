//! Common test utilities for loading flow fixtures and building records.
use keiro::prelude::*;
use serde_json::json;

/// Absolute path of a flow fixture under `tests/resources/`.
#[allow(dead_code)]
pub fn resource_path(name: &str) -> String {
    format!("{}/tests/resources/{}.json", env!("CARGO_MANIFEST_DIR"), name)
}

/// Parses a fixture as a raw JSON document.
#[allow(dead_code)]
pub fn load_document(name: &str) -> serde_json::Value {
    let text = std::fs::read_to_string(resource_path(name))
        .unwrap_or_else(|e| panic!("Failed to read fixture '{}': {}", name, e));
    serde_json::from_str(&text).expect("Fixture is not valid JSON")
}

/// Builds a runner for a fixture, resolving sub-flows from sibling files.
#[allow(dead_code)]
pub fn load_runner(name: &str) -> Runner {
    Runner::from_json(resource_path(name)).expect("Failed to build runner from fixture")
}

/// Builds a record batch from a JSON array of row objects.
#[allow(dead_code)]
pub fn rows(value: serde_json::Value) -> RecordBatch {
    RecordBatch::from_json_value(&value).expect("Invalid record rows")
}

/// Runs `rows` through a fixture and returns `(output, message)` pairs.
#[allow(dead_code)]
pub fn run_fixture(name: &str, records: serde_json::Value) -> Vec<(Value, Value)> {
    let results = load_runner(name)
        .execute(&rows(records))
        .expect("Batch execution failed");
    results
        .rows()
        .iter()
        .map(|row| {
            let row = row.as_ref().expect("Record evaluation failed");
            (row.output.clone(), row.message.clone())
        })
        .collect()
}

/// A minimal flow: `score >= 50` yields "pass", anything else "fail".
#[allow(dead_code)]
pub fn create_simple_flow() -> FlowDefinition {
    FlowDefinition {
        id: "pass-fail".to_string(),
        version: "1".to_string(),
        nodes: vec![
            NodeDefinition::new("start", "start"),
            NodeDefinition::new("check", "conditional").with_param(
                "predicate",
                json!({"op": ">=", "args": [{"field": "score"}, 50]}),
            ),
            NodeDefinition::new("pass", "output")
                .with_param("output", json!("pass"))
                .with_param("message", json!({"field": "name"})),
            NodeDefinition::new("fail", "output").with_param("output", json!("fail")),
        ],
        edges: vec![
            EdgeDefinition::new("start", "check"),
            EdgeDefinition::labeled("check", "then", "pass"),
            EdgeDefinition::labeled("check", "else", "fail"),
        ],
        subflows: vec![],
    }
}

/// Wraps node and edge JSON into a flow document with the given id.
#[allow(dead_code)]
pub fn document(id: &str, nodes: serde_json::Value, edges: serde_json::Value) -> serde_json::Value {
    json!({"id": id, "version": "1", "nodes": nodes, "edges": edges})
}

/// Parses a document and returns the error it is expected to produce.
#[allow(dead_code)]
pub fn parse_error(document: serde_json::Value) -> ParseError {
    match Parser::from_value(&document).and_then(|parser| parser.parse()) {
        Ok(graph) => panic!("Expected a parse error, got graph '{}'", graph.id()),
        Err(e) => e,
    }
}
