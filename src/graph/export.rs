use super::{EdgeLabel, FlowGraph, NodeKind};
use crate::ast::Expression;
use crate::flow::{EdgeDefinition, FlowDefinition, NodeDefinition};
use ahash::AHashSet;
use serde_json::{Map, Value as Json};

impl FlowGraph {
    /// Turns the graph back into a flow document.
    ///
    /// Every sub-flow reachable from this graph is embedded once, so the
    /// result parses on its own into an equal graph.
    pub fn to_definition(&self) -> FlowDefinition {
        let mut definition = self.to_plain_definition();
        let mut seen = AHashSet::new();
        seen.insert(definition.key());
        let mut pending = self.subflows();
        while let Some(graph) = pending.pop() {
            let embedded = graph.to_plain_definition();
            if seen.insert(embedded.key()) {
                pending.extend(graph.subflows());
                definition.subflows.push(embedded);
            }
        }
        definition
    }

    fn to_plain_definition(&self) -> FlowDefinition {
        let nodes = self
            .nodes
            .iter()
            .map(|node| {
                let mut definition = NodeDefinition::new(&node.id, node.kind.name());
                definition.params = node_params(&node.kind);
                definition
            })
            .collect();
        let edges = self
            .edges
            .iter()
            .map(|edge| match edge.label {
                EdgeLabel::Next => EdgeDefinition::new(&edge.source, &edge.target),
                label => EdgeDefinition::labeled(&edge.source, label.as_str(), &edge.target),
            })
            .collect();

        FlowDefinition {
            id: self.id.clone(),
            version: self.version.clone(),
            nodes,
            edges,
            subflows: Vec::new(),
        }
    }
}

fn named(pairs: &[(String, Expression)]) -> Json {
    Json::Object(
        pairs
            .iter()
            .map(|(name, expression)| (name.clone(), expression.to_json()))
            .collect(),
    )
}

fn node_params(kind: &NodeKind) -> Map<String, Json> {
    let mut params = Map::new();
    match kind {
        NodeKind::Start => {}
        NodeKind::Input { field } => {
            params.insert("field".into(), Json::from(field.as_str()));
        }
        NodeKind::Conditional { predicate } => {
            params.insert("predicate".into(), predicate.to_json());
        }
        NodeKind::Arithmetic {
            expression,
            rounding,
        } => {
            params.insert("expression".into(), expression.to_json());
            if let Some(precision) = rounding {
                params.insert("precision".into(), Json::from(*precision));
            }
        }
        NodeKind::StringTransform { transform, source } => {
            params.insert("transform".into(), Json::from(transform.name()));
            params.insert("source".into(), source.to_json());
        }
        NodeKind::TableLookup(lookup) => {
            let (columns, rows) = lookup.table.to_json();
            params.insert("keys".into(), named(&lookup.keys));
            params.insert("target".into(), Json::from(lookup.target.as_str()));
            if !lookup.extra_targets.is_empty() {
                params.insert("extra_targets".into(), Json::from(lookup.extra_targets.clone()));
            }
            params.insert("columns".into(), columns);
            params.insert("rows".into(), rows);
        }
        NodeKind::SubFlowCall(call) => {
            params.insert("flow".into(), Json::from(call.flow_id.as_str()));
            params.insert("version".into(), Json::from(call.version.to_string()));
            params.insert("inputs".into(), named(&call.inputs));
        }
        NodeKind::Output(spec) => {
            params.insert("output".into(), spec.output.to_json());
            if let Some(message) = &spec.message {
                params.insert("message".into(), message.to_json());
            }
            if !spec.extras.is_empty() {
                params.insert("extras".into(), named(&spec.extras));
            }
        }
    }
    params
}
