//! Parser tests: schema checks, graph invariants, sub-flow resolution and
//! the document round trip.
mod common;
use common::*;
use keiro::parser::ParseContext;
use keiro::parser::parsing::required_str;
use keiro::prelude::*;
use serde_json::json;

fn linear_edges() -> serde_json::Value {
    json!([
        {"source": "start", "target": "calc"},
        {"source": "calc", "target": "out"}
    ])
}

#[test]
fn test_parse_simple_flow() {
    let graph = Parser::new(create_simple_flow()).parse().expect("Parse failed");
    assert_eq!(graph.id(), "pass-fail");
    assert_eq!(graph.version(), "1");
    assert_eq!(graph.nodes().len(), 4);
    assert_eq!(graph.edges().len(), 3);
    assert_eq!(graph.start().id, "start");
    assert!(matches!(
        graph.node("check").map(|n| &n.kind),
        Some(NodeKind::Conditional { .. })
    ));
    assert_eq!(
        graph.input_fields().into_iter().collect::<Vec<_>>(),
        vec!["name".to_string(), "score".to_string()]
    );
}

#[test]
fn test_parse_all_fixtures() {
    for name in [
        "multiple-ifs",
        "age-negative",
        "age-categorizer",
        "rule-with-version",
        "to-lowercase",
        "round-node",
        "rule-of-rules",
        "csv-table-with-if",
    ] {
        let runner = load_runner(name);
        assert!(!runner.graph().nodes().is_empty(), "fixture '{}' is empty", name);
    }
}

#[test]
fn test_malformed_json_is_a_schema_error() {
    assert!(matches!(
        Parser::from_str("{\"id\": \"broken\", \"nodes\": [").err(),
        Some(ParseError::Schema(SchemaError::JsonParseError(_)))
    ));
    assert!(matches!(
        Parser::from_value(&json!({"id": "no-nodes", "version": "1"})).err(),
        Some(ParseError::Schema(SchemaError::JsonParseError(_)))
    ));
}

#[test]
fn test_unknown_kind() {
    let error = parse_error(document(
        "unknown",
        json!([
            {"id": "start", "kind": "start"},
            {"id": "calc", "kind": "teleport"},
            {"id": "out", "kind": "end", "output": 1}
        ]),
        linear_edges(),
    ));
    match error {
        ParseError::Schema(SchemaError::UnknownKind { node_id, kind }) => {
            assert_eq!(node_id, "calc");
            assert_eq!(kind, "teleport");
        }
        other => panic!("Expected UnknownKind, got {:?}", other),
    }
}

#[test]
fn test_missing_required_parameter() {
    let error = parse_error(document(
        "missing-predicate",
        json!([
            {"id": "start", "kind": "start"},
            {"id": "calc", "kind": "arithmetic"},
            {"id": "out", "kind": "end", "output": 1}
        ]),
        linear_edges(),
    ));
    match error {
        ParseError::Schema(SchemaError::MissingField { context, field }) => {
            assert!(context.contains("calc"));
            assert_eq!(field, "expression");
        }
        other => panic!("Expected MissingField, got {:?}", other),
    }
}

#[test]
fn test_null_output_is_accepted() {
    let graph = Parser::from_value(&document(
        "null-output",
        json!([
            {"id": "start", "kind": "start"},
            {"id": "calc", "kind": "input", "field": "x"},
            {"id": "out", "kind": "end", "output": null}
        ]),
        linear_edges(),
    ))
    .and_then(|parser| parser.parse())
    .expect("A null output is a literal");
    assert_eq!(graph.nodes().len(), 3);
}

#[test]
fn test_invalid_expression() {
    for bad in [
        json!({"op": "%", "args": [1, 2]}),
        json!({"op": "+", "args": [1]}),
        json!({"op": "not", "args": [true, false]}),
        json!({"op": "and", "args": [true]}),
        json!({"field": "a", "node": "b"}),
        json!({"field": ""}),
        json!({"something": 1}),
        json!([1, 2]),
    ] {
        let error = parse_error(document(
            "bad-expression",
            json!([
                {"id": "start", "kind": "start"},
                {"id": "calc", "kind": "arithmetic", "expression": bad.clone()},
                {"id": "out", "kind": "end", "output": 1}
            ]),
            linear_edges(),
        ));
        assert!(
            matches!(error, ParseError::Schema(SchemaError::InvalidExpression { .. })),
            "{} gave {:?}",
            bad,
            error
        );
    }
}

#[test]
fn test_round_precision_out_of_range() {
    let error = parse_error(document(
        "bad-round",
        json!([
            {"id": "start", "kind": "start"},
            {"id": "calc", "kind": "round", "precision": 40, "expression": 1.5},
            {"id": "out", "kind": "end", "output": {"node": "calc"}}
        ]),
        linear_edges(),
    ));
    assert!(matches!(
        error,
        ParseError::Schema(SchemaError::InvalidField { ref field, .. }) if field == "precision"
    ));
}

#[test]
fn test_invalid_table() {
    let table_node = |params: serde_json::Value| {
        let mut node = json!({"id": "calc", "kind": "table_lookup"});
        for (key, value) in params.as_object().unwrap() {
            node[key] = value.clone();
        }
        document(
            "bad-table",
            json!([
                {"id": "start", "kind": "start"},
                node,
                {"id": "out", "kind": "end", "output": {"node": "calc"}}
            ]),
            linear_edges(),
        )
    };

    // Target column missing from the data.
    let error = parse_error(table_node(json!({
        "keys": ["a"], "target": "b", "csv": "a,c\n1,2\n"
    })));
    assert!(matches!(error, ParseError::Schema(SchemaError::InvalidTable { .. })));

    // Ragged CSV row.
    let error = parse_error(table_node(json!({
        "keys": ["a"], "target": "b", "csv": "a,b\n1,2,3\n"
    })));
    assert!(matches!(error, ParseError::Schema(SchemaError::InvalidTable { .. })));

    // No key columns.
    let error = parse_error(table_node(json!({
        "keys": [], "target": "b", "rows": [{"b": 1}]
    })));
    assert!(matches!(error, ParseError::Schema(SchemaError::InvalidTable { .. })));
}

#[test]
fn test_graph_without_start() {
    let error = parse_error(document(
        "no-start",
        json!([{"id": "out", "kind": "end", "output": 1}]),
        json!([]),
    ));
    assert!(matches!(error, ParseError::Graph(GraphError::NoStartNode)));
}

#[test]
fn test_graph_with_two_starts() {
    let error = parse_error(document(
        "two-starts",
        json!([
            {"id": "a", "kind": "start"},
            {"id": "b", "kind": "start"},
            {"id": "out", "kind": "end", "output": 1}
        ]),
        json!([
            {"source": "a", "target": "out"},
            {"source": "b", "target": "out"}
        ]),
    ));
    match error {
        ParseError::Graph(GraphError::MultipleStartNodes(ids)) => {
            assert_eq!(ids, vec!["a".to_string(), "b".to_string()]);
        }
        other => panic!("Expected MultipleStartNodes, got {:?}", other),
    }
}

#[test]
fn test_duplicate_node_id() {
    let error = parse_error(document(
        "duplicate",
        json!([
            {"id": "start", "kind": "start"},
            {"id": "calc", "kind": "input", "field": "x"},
            {"id": "calc", "kind": "input", "field": "y"},
            {"id": "out", "kind": "end", "output": 1}
        ]),
        linear_edges(),
    ));
    assert!(matches!(error, ParseError::Graph(GraphError::DuplicateNode(ref id)) if id == "calc"));
}

#[test]
fn test_dangling_edge() {
    let error = parse_error(document(
        "dangling",
        json!([
            {"id": "start", "kind": "start"},
            {"id": "out", "kind": "end", "output": 1}
        ]),
        json!([{"source": "start", "target": "nowhere"}]),
    ));
    match error {
        ParseError::Graph(GraphError::NodeNotFound {
            missing_node_id,
            source_node_id,
        }) => {
            assert_eq!(missing_node_id, "nowhere");
            assert_eq!(source_node_id, "start");
        }
        other => panic!("Expected NodeNotFound, got {:?}", other),
    }
}

#[test]
fn test_conditional_missing_else() {
    let error = parse_error(document(
        "missing-else",
        json!([
            {"id": "start", "kind": "start"},
            {"id": "check", "kind": "if", "predicate": true},
            {"id": "out", "kind": "end", "output": 1}
        ]),
        json!([
            {"source": "start", "target": "check"},
            {"source": "check", "target": "out", "label": "then"}
        ]),
    ));
    match error {
        ParseError::Graph(GraphError::MissingEdge { node_id, label }) => {
            assert_eq!(node_id, "check");
            assert_eq!(label, "else");
        }
        other => panic!("Expected MissingEdge, got {:?}", other),
    }
}

#[test]
fn test_non_terminal_without_successor() {
    let error = parse_error(document(
        "dead-end",
        json!([
            {"id": "start", "kind": "start"},
            {"id": "calc", "kind": "input", "field": "x"},
            {"id": "out", "kind": "end", "output": 1}
        ]),
        json!([{"source": "start", "target": "calc"}]),
    ));
    assert!(matches!(
        error,
        ParseError::Graph(GraphError::MissingEdge { ref node_id, .. }) if node_id == "calc"
    ));
}

#[test]
fn test_terminal_with_outgoing_edge() {
    let error = parse_error(document(
        "terminal-edge",
        json!([
            {"id": "start", "kind": "start"},
            {"id": "calc", "kind": "end", "output": 1},
            {"id": "out", "kind": "end", "output": 2}
        ]),
        linear_edges(),
    ));
    assert!(matches!(error, ParseError::Graph(GraphError::TerminalWithEdges(ref id)) if id == "calc"));
}

#[test]
fn test_invalid_and_duplicate_labels() {
    let error = parse_error(document(
        "then-on-linear",
        json!([
            {"id": "start", "kind": "start"},
            {"id": "calc", "kind": "input", "field": "x"},
            {"id": "out", "kind": "end", "output": 1}
        ]),
        json!([
            {"source": "start", "target": "calc", "label": "then"},
            {"source": "calc", "target": "out"}
        ]),
    ));
    assert!(matches!(error, ParseError::Graph(GraphError::InvalidLabel { .. })));

    let error = parse_error(document(
        "two-thens",
        json!([
            {"id": "start", "kind": "start"},
            {"id": "check", "kind": "if", "predicate": true},
            {"id": "a", "kind": "end", "output": 1},
            {"id": "b", "kind": "end", "output": 2}
        ]),
        json!([
            {"source": "start", "target": "check"},
            {"source": "check", "target": "a", "label": "then"},
            {"source": "check", "target": "b", "label": "then"}
        ]),
    ));
    match error {
        ParseError::Graph(GraphError::DuplicateEdge { node_id, label }) => {
            assert_eq!(node_id, "check");
            assert_eq!(label, "then");
        }
        other => panic!("Expected DuplicateEdge, got {:?}", other),
    }
}

#[test]
fn test_default_label_means_else_on_conditionals() {
    let graph = load_runner("multiple-ifs").graph().clone();
    assert!(
        graph
            .edges()
            .iter()
            .all(|edge| edge.label != EdgeLabel::Next || edge.source == "start")
    );
}

#[test]
fn test_cycle_is_rejected() {
    let error = parse_error(document(
        "loop",
        json!([
            {"id": "start", "kind": "start"},
            {"id": "a", "kind": "if", "predicate": {"field": "flag"}},
            {"id": "b", "kind": "input", "field": "x"},
            {"id": "out", "kind": "end", "output": 1}
        ]),
        json!([
            {"source": "start", "target": "a"},
            {"source": "a", "target": "b", "label": "then"},
            {"source": "a", "target": "out", "label": "else"},
            {"source": "b", "target": "a"}
        ]),
    ));
    match error {
        ParseError::Graph(GraphError::CycleDetected(path)) => {
            assert!(path.contains(&"a".to_string()));
            assert!(path.contains(&"b".to_string()));
        }
        other => panic!("Expected CycleDetected, got {:?}", other),
    }
}

#[test]
fn test_unknown_node_reference() {
    let error = parse_error(document(
        "bad-ref",
        json!([
            {"id": "start", "kind": "start"},
            {"id": "calc", "kind": "math", "expression": {"op": "+", "args": [{"node": "ghost"}, 1]}},
            {"id": "out", "kind": "end", "output": {"node": "calc"}}
        ]),
        linear_edges(),
    ));
    match error {
        ParseError::Graph(GraphError::UnknownNodeReference { node_id, reference }) => {
            assert_eq!(node_id, "calc");
            assert_eq!(reference, "ghost");
        }
        other => panic!("Expected UnknownNodeReference, got {:?}", other),
    }
}

#[test]
fn test_unresolved_sub_flow() {
    let error = parse_error(document(
        "caller",
        json!([
            {"id": "start", "kind": "start"},
            {"id": "calc", "kind": "subflow", "flow": "absent", "version": "2"},
            {"id": "out", "kind": "end", "output": {"node": "calc"}}
        ]),
        linear_edges(),
    ));
    match error {
        ParseError::Reference(ReferenceError::Unresolved { flow_id, version }) => {
            assert_eq!(flow_id, "absent");
            assert_eq!(version, "2");
        }
        other => panic!("Expected Unresolved, got {:?}", other),
    }
}

#[test]
fn test_embedded_version_mismatch_is_unresolved() {
    let mut main = load_document("rule-with-version");
    main["nodes"][1]["version"] = json!("3.0.0");
    let error = parse_error(main);
    assert!(matches!(
        error,
        ParseError::Reference(ReferenceError::Unresolved { ref version, .. }) if version == "3.0.0"
    ));
}

#[test]
fn test_numeric_flow_version() {
    let mut leaf = document(
        "leaf",
        json!([
            {"id": "start", "kind": "start"},
            {"id": "calc", "kind": "input", "field": "unused"},
            {"id": "out", "kind": "end", "output": 7}
        ]),
        linear_edges(),
    );
    leaf["version"] = json!(1);
    let mut main = document(
        "caller",
        json!([
            {"id": "start", "kind": "start"},
            {"id": "calc", "kind": "subflow", "flow": "leaf", "version": 1},
            {"id": "out", "kind": "end", "output": {"node": "calc"}}
        ]),
        linear_edges(),
    );
    main["version"] = json!(2.5);
    main["subflows"] = json!([leaf]);

    let graph = Parser::from_value(&main).expect("Invalid document").parse().expect("Parse failed");
    assert_eq!(graph.version(), "2.5");
    let result = Runner::from_json(main)
        .expect("Failed to build runner")
        .evaluate(&Record::new())
        .expect("Evaluation failed");
    assert_eq!(result.output, Value::Number(7.0));

    let mut flagged = document("flagged", json!([]), json!([]));
    flagged["version"] = json!(true);
    assert!(matches!(
        FlowDefinition::from_value(&flagged),
        Err(SchemaError::JsonParseError(ref message)) if message.contains("version")
    ));
}

fn calling(id: &str, callee: &str) -> FlowDefinition {
    FlowDefinition::from_value(&document(
        id,
        json!([
            {"id": "start", "kind": "start"},
            {"id": "calc", "kind": "subflow", "flow": callee},
            {"id": "out", "kind": "end", "output": {"node": "calc"}}
        ]),
        linear_edges(),
    ))
    .expect("Invalid document")
}

#[test]
fn test_circular_sub_flow_reference() {
    let registry = FlowRegistry::new()
        .with(calling("b", "c"))
        .with(calling("c", "a"));
    let parser = Parser::builder(calling("a", "b")).with_resolver(registry).build();
    match parser.parse() {
        Err(ParseError::Reference(ReferenceError::CircularReference(path))) => {
            assert_eq!(path, vec!["a@1", "b@1", "c@1", "a@1"]);
        }
        other => panic!("Expected CircularReference, got {:?}", other),
    }
}

#[test]
fn test_self_reference_is_circular() {
    let error = parse_error(calling("selfish", "selfish").to_value());
    assert!(matches!(
        error,
        ParseError::Reference(ReferenceError::CircularReference(_))
    ));
}

#[test]
fn test_shared_sub_flow_is_compiled_once() {
    let mut definition = FlowDefinition::from_value(&document(
        "diamond",
        json!([
            {"id": "start", "kind": "start"},
            {"id": "first", "kind": "rule", "flow": "leaf", "inputs": {"x": 1}},
            {"id": "second", "kind": "rule", "flow": "leaf", "inputs": {"x": 2}},
            {"id": "out", "kind": "end", "output": {"op": "+", "args": [{"node": "first"}, {"node": "second"}]}}
        ]),
        json!([
            {"source": "start", "target": "first"},
            {"source": "first", "target": "second"},
            {"source": "second", "target": "out"}
        ]),
    ))
    .expect("Invalid document");
    definition.subflows.push(
        FlowDefinition::from_value(&document(
            "leaf",
            json!([
                {"id": "start", "kind": "start"},
                {"id": "calc", "kind": "input", "field": "x"},
                {"id": "out", "kind": "end", "output": {"node": "calc"}}
            ]),
            linear_edges(),
        ))
        .expect("Invalid document"),
    );

    let graph = Parser::new(definition).parse().expect("Parse failed");
    assert_eq!(graph.subflows().len(), 1);
    let calls = graph
        .nodes()
        .iter()
        .filter_map(|node| match &node.kind {
            NodeKind::SubFlowCall(call) => Some(&call.graph),
            _ => None,
        })
        .collect::<Vec<_>>();
    assert_eq!(calls.len(), 2);
    assert!(std::sync::Arc::ptr_eq(calls[0], calls[1]));

    let result = Runner::new(graph).evaluate(&Record::new()).expect("Evaluation failed");
    assert_eq!(result.output, Value::Number(3.0));
}

#[test]
fn test_any_version_picks_highest() {
    let registry = FlowRegistry::new()
        .with(versioned_leaf("1.2.0", 12))
        .with(versioned_leaf("1.10.0", 110))
        .with(versioned_leaf("1.9.0", 19));
    let parser = Parser::builder(calling("caller", "leaf")).with_resolver(registry).build();
    let result = Runner::from_parser(&parser)
        .expect("Parse failed")
        .evaluate(&Record::new())
        .expect("Evaluation failed");
    assert_eq!(result.output, Value::Number(110.0));
}

fn versioned_leaf(version: &str, output: i64) -> FlowDefinition {
    let mut value = document(
        "leaf",
        json!([
            {"id": "start", "kind": "start"},
            {"id": "calc", "kind": "input", "field": "unused"},
            {"id": "out", "kind": "end", "output": output}
        ]),
        linear_edges(),
    );
    value["version"] = json!(version);
    FlowDefinition::from_value(&value).expect("Invalid document")
}

struct WrongVersionResolver;

impl FlowResolver for WrongVersionResolver {
    fn resolve(
        &self,
        _flow_id: &str,
        _version: &VersionReq,
    ) -> std::result::Result<Option<FlowDefinition>, ReferenceError> {
        Ok(Some(versioned_leaf("9", 9)))
    }
}

#[test]
fn test_resolver_returning_wrong_version_fails() {
    let mut main = calling("caller", "leaf");
    main.nodes[1] = main.nodes[1].clone().with_param("version", json!("1"));
    let parser = Parser::builder(main).with_resolver(WrongVersionResolver).build();
    assert!(matches!(
        parser.parse(),
        Err(ParseError::Reference(ReferenceError::ResolverFailed { .. }))
    ));
}

#[test]
fn test_kind_alias() {
    let mut definition = create_simple_flow();
    definition.nodes[1].kind = "decide".to_string();

    assert!(matches!(
        Parser::new(definition.clone()).parse(),
        Err(ParseError::Schema(SchemaError::UnknownKind { .. }))
    ));

    let graph = Parser::builder(definition)
        .with_kind_alias("decide", "conditional")
        .build()
        .parse()
        .expect("Alias should resolve");
    assert!(matches!(
        graph.node("check").map(|n| &n.kind),
        Some(NodeKind::Conditional { .. })
    ));
}

/// Desugars `{"kind": "double", "field": "x"}` into `x * 2`.
struct DoubleParser;

impl NodeParser for DoubleParser {
    fn kind(&self) -> &str {
        "double"
    }

    fn parse(
        &self,
        node: &NodeDefinition,
        _ctx: &mut ParseContext<'_>,
    ) -> std::result::Result<NodeKind, ParseError> {
        let field = required_str(node, "field")?;
        Ok(NodeKind::Arithmetic {
            expression: Expression::Multiply(
                Box::new(Expression::field(field)),
                Box::new(Expression::literal(2)),
            ),
            rounding: None,
        })
    }
}

#[test]
fn test_custom_node_parser() {
    let definition = FlowDefinition::from_value(&document(
        "custom",
        json!([
            {"id": "start", "kind": "start"},
            {"id": "calc", "kind": "double", "field": "x"},
            {"id": "out", "kind": "end", "output": {"node": "calc"}}
        ]),
        linear_edges(),
    ))
    .expect("Invalid document");

    let parser = Parser::builder(definition)
        .with_custom_parser(Box::new(DoubleParser))
        .build();
    let runner = Runner::from_parser(&parser).expect("Parse failed");
    let result = runner.evaluate(&Record::new().with("x", 21)).expect("Evaluation failed");
    assert_eq!(result.output, Value::Number(42.0));
}

#[test]
fn test_round_trip_through_definition() {
    for name in [
        "multiple-ifs",
        "rule-with-version",
        "to-lowercase",
        "round-node",
        "rule-of-rules",
        "csv-table-with-if",
    ] {
        let graph = load_runner(name).graph().clone();
        let reparsed = Parser::new(graph.to_definition())
            .parse()
            .unwrap_or_else(|e| panic!("Re-parsing '{}' failed: {}", name, e));
        assert_eq!(*graph, reparsed, "round trip changed '{}'", name);
    }
}

#[test]
fn test_parameter_order_does_not_matter() {
    let forward = json!({
        "id": "ordered", "version": "1",
        "nodes": [
            {"id": "start", "kind": "start"},
            {"id": "out", "kind": "end", "output": 1, "extras": {"a": 1, "b": 2}}
        ],
        "edges": [{"source": "start", "target": "out"}]
    });
    let backward = json!({
        "version": "1", "id": "ordered",
        "edges": [{"target": "out", "source": "start"}],
        "nodes": [
            {"kind": "start", "id": "start"},
            {"extras": {"b": 2, "a": 1}, "output": 1, "kind": "end", "id": "out"}
        ]
    });
    let parse = |value: &serde_json::Value| {
        Parser::from_value(value)
            .and_then(|parser| parser.parse())
            .expect("Parse failed")
    };
    assert_eq!(parse(&forward), parse(&backward));
}

/// A flat list of `field == value` checks, tried in order.
struct DecisionList {
    field: String,
    cases: Vec<(i64, String)>,
    fallback: String,
}

impl IntoFlow for DecisionList {
    fn into_flow(self) -> std::result::Result<FlowDefinition, keiro::error::FlowConversionError> {
        if self.cases.is_empty() {
            return Err(keiro::error::FlowConversionError::ValidationError(
                "a decision list needs at least one case".to_string(),
            ));
        }
        let mut nodes = vec![NodeDefinition::new("start", "start")];
        let mut edges = Vec::new();
        let mut previous = EdgeDefinition::new("start", "");
        for (i, (value, output)) in self.cases.into_iter().enumerate() {
            let check = format!("check-{}", i);
            let out = format!("out-{}", i);
            nodes.push(NodeDefinition::new(&check, "if").with_param(
                "predicate",
                json!({"op": "==", "args": [{"field": self.field}, value]}),
            ));
            nodes.push(NodeDefinition::new(&out, "end").with_param("output", json!(output)));
            previous.target = check.clone();
            edges.push(previous);
            edges.push(EdgeDefinition::labeled(&check, "then", &out));
            previous = EdgeDefinition::labeled(&check, "else", "");
        }
        nodes.push(NodeDefinition::new("fallback", "end").with_param("output", json!(self.fallback)));
        previous.target = "fallback".to_string();
        edges.push(previous);

        Ok(FlowDefinition {
            id: "decision-list".to_string(),
            version: "1".to_string(),
            nodes,
            edges,
            subflows: vec![],
        })
    }
}

#[test]
fn test_custom_format_through_into_flow() {
    let list = DecisionList {
        field: "code".to_string(),
        cases: vec![(1, "one".to_string()), (2, "two".to_string())],
        fallback: "many".to_string(),
    };
    let runner = Runner::new(
        Parser::new(list.into_flow().expect("Conversion failed"))
            .parse()
            .expect("Parse failed"),
    );
    let results = runner
        .execute(&rows(json!({"code": [2, 1, 7]})))
        .expect("Batch failed");
    assert_eq!(
        results.outputs(),
        vec![Value::from("two"), Value::from("one"), Value::from("many")]
    );

    let empty = DecisionList {
        field: "code".to_string(),
        cases: vec![],
        fallback: "none".to_string(),
    };
    assert!(empty.into_flow().is_err());
}
