//! The compiled, immutable flow graph and the builder that validates it.

mod export;
mod node;

pub use node::*;

use crate::error::GraphError;
use ahash::{AHashMap, AHashSet};
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, VecDeque};
use std::sync::Arc;

/// A directed, labeled connection between two nodes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edge {
    pub source: String,
    pub label: EdgeLabel,
    pub target: String,
}

/// Outgoing edges of one node, as indices into the node list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
struct Successors {
    next: Option<usize>,
    then: Option<usize>,
    otherwise: Option<usize>,
}

impl Successors {
    fn get(&self, label: EdgeLabel) -> Option<usize> {
        match label {
            EdgeLabel::Next => self.next,
            EdgeLabel::Then => self.then,
            EdgeLabel::Else => self.otherwise,
        }
    }

    fn slot(&mut self, label: EdgeLabel) -> &mut Option<usize> {
        match label {
            EdgeLabel::Next => &mut self.next,
            EdgeLabel::Then => &mut self.then,
            EdgeLabel::Else => &mut self.otherwise,
        }
    }
}

/// A validated decision graph.
///
/// Construction goes through [`GraphBuilder`], so a `FlowGraph` always has
/// exactly one start node, no dangling or missing edges and no cycles. It is
/// never mutated afterwards and can be shared freely across threads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowGraph {
    id: String,
    version: String,
    nodes: Vec<Node>,
    edges: Vec<Edge>,
    index: AHashMap<String, usize>,
    successors: Vec<Successors>,
    start: usize,
}

impl FlowGraph {
    pub fn builder(id: impl Into<String>, version: impl Into<String>) -> GraphBuilder {
        GraphBuilder::new(id, version)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    pub fn node(&self, id: &str) -> Option<&Node> {
        self.index.get(id).map(|&i| &self.nodes[i])
    }

    pub(crate) fn node_at(&self, index: usize) -> &Node {
        &self.nodes[index]
    }

    pub(crate) fn start_index(&self) -> usize {
        self.start
    }

    pub fn start(&self) -> &Node {
        &self.nodes[self.start]
    }

    /// Index of the node reached from `index` over the edge labeled `label`.
    pub(crate) fn successor(&self, index: usize, label: EdgeLabel) -> Option<usize> {
        self.successors[index].get(label)
    }

    /// Record fields the flow reads, from input nodes and field references.
    pub fn input_fields(&self) -> BTreeSet<String> {
        let mut fields = BTreeSet::new();
        for node in &self.nodes {
            if let NodeKind::Input { field } = &node.kind {
                fields.insert(field.clone());
            }
            for expression in node.kind.expressions() {
                expression.collect_fields(&mut fields);
            }
        }
        fields
    }

    /// Sub-flows called directly by this flow, without duplicates.
    pub fn subflows(&self) -> Vec<&Arc<FlowGraph>> {
        self.nodes
            .iter()
            .filter_map(|node| match &node.kind {
                NodeKind::SubFlowCall(call) => Some(&call.graph),
                _ => None,
            })
            .unique_by(|graph| (graph.id.clone(), graph.version.clone()))
            .collect()
    }
}

/// Raw edge as declared, before its label is checked against the source kind.
#[derive(Debug, Clone)]
struct PendingEdge {
    source: String,
    label: Option<String>,
    target: String,
}

/// Mutable accumulator for nodes and edges; `build` validates and freezes it.
#[derive(Debug, Clone)]
pub struct GraphBuilder {
    id: String,
    version: String,
    nodes: Vec<Node>,
    edges: Vec<PendingEdge>,
}

impl GraphBuilder {
    pub fn new(id: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            version: version.into(),
            nodes: Vec::new(),
            edges: Vec::new(),
        }
    }

    pub fn node(mut self, node: Node) -> Self {
        self.add_node(node);
        self
    }

    pub fn edge(mut self, source: &str, label: Option<&str>, target: &str) -> Self {
        self.add_edge(source, label, target);
        self
    }

    pub fn add_node(&mut self, node: Node) {
        self.nodes.push(node);
    }

    pub fn add_edge(&mut self, source: &str, label: Option<&str>, target: &str) {
        self.edges.push(PendingEdge {
            source: source.to_string(),
            label: label.map(str::to_string),
            target: target.to_string(),
        });
    }

    pub fn build(self) -> Result<FlowGraph, GraphError> {
        if let Some(duplicate) = self.nodes.iter().map(|n| &n.id).duplicates().next() {
            return Err(GraphError::DuplicateNode(duplicate.clone()));
        }
        let index: AHashMap<String, usize> = self
            .nodes
            .iter()
            .enumerate()
            .map(|(i, n)| (n.id.clone(), i))
            .collect();

        let starts = self
            .nodes
            .iter()
            .filter(|n| matches!(n.kind, NodeKind::Start))
            .map(|n| n.id.clone())
            .collect::<Vec<_>>();
        let start = match starts.as_slice() {
            [] => return Err(GraphError::NoStartNode),
            [only] => index[only],
            _ => return Err(GraphError::MultipleStartNodes(starts)),
        };

        let mut successors = vec![Successors::default(); self.nodes.len()];
        let mut edges = Vec::with_capacity(self.edges.len());
        for pending in self.edges {
            let source = *index
                .get(&pending.source)
                .ok_or_else(|| GraphError::NodeNotFound {
                    missing_node_id: pending.source.clone(),
                    source_node_id: pending.target.clone(),
                })?;
            let target = *index
                .get(&pending.target)
                .ok_or_else(|| GraphError::NodeNotFound {
                    missing_node_id: pending.target.clone(),
                    source_node_id: pending.source.clone(),
                })?;

            let source_kind = &self.nodes[source].kind;
            if source_kind.is_terminal() {
                return Err(GraphError::TerminalWithEdges(pending.source));
            }
            let label = EdgeLabel::resolve(pending.label.as_deref(), source_kind.is_branching())
                .ok_or_else(|| GraphError::InvalidLabel {
                    node_id: pending.source.clone(),
                    label: pending.label.clone().unwrap_or_default(),
                })?;

            let slot = successors[source].slot(label);
            if slot.is_some() {
                return Err(GraphError::DuplicateEdge {
                    node_id: pending.source,
                    label: label.to_string(),
                });
            }
            *slot = Some(target);
            edges.push(Edge {
                source: pending.source,
                label,
                target: pending.target,
            });
        }

        for (node, outgoing) in self.nodes.iter().zip(&successors) {
            let required: &[EdgeLabel] = match node.kind {
                NodeKind::Output(_) => &[],
                NodeKind::Conditional { .. } => &[EdgeLabel::Then, EdgeLabel::Else],
                _ => &[EdgeLabel::Next],
            };
            for label in required {
                if outgoing.get(*label).is_none() {
                    return Err(GraphError::MissingEdge {
                        node_id: node.id.clone(),
                        label: label.to_string(),
                    });
                }
            }

            let mut references = BTreeSet::new();
            for expression in node.kind.expressions() {
                expression.collect_node_refs(&mut references);
            }
            if let Some(unknown) = references.into_iter().find(|r| !index.contains_key(r)) {
                return Err(GraphError::UnknownNodeReference {
                    node_id: node.id.clone(),
                    reference: unknown,
                });
            }
        }

        let graph = FlowGraph {
            id: self.id,
            version: self.version,
            nodes: self.nodes,
            edges,
            index,
            successors,
            start,
        };
        graph.check_acyclic()?;
        graph.warn_unreachable();
        Ok(graph)
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mark {
    Unvisited,
    InProgress,
    Done,
}

impl FlowGraph {
    fn outgoing(&self, index: usize) -> impl Iterator<Item = usize> + '_ {
        let s = &self.successors[index];
        [s.next, s.then, s.otherwise].into_iter().flatten()
    }

    /// Depth-first search with an explicit stack; a back edge is a cycle.
    fn check_acyclic(&self) -> Result<(), GraphError> {
        let mut marks = vec![Mark::Unvisited; self.nodes.len()];
        for root in 0..self.nodes.len() {
            if marks[root] != Mark::Unvisited {
                continue;
            }
            let mut stack: Vec<(usize, Vec<usize>)> = vec![(root, self.outgoing(root).collect())];
            marks[root] = Mark::InProgress;
            while let Some((current, pending)) = stack.last_mut() {
                let current = *current;
                match pending.pop() {
                    Some(next) => match marks[next] {
                        Mark::Unvisited => {
                            marks[next] = Mark::InProgress;
                            stack.push((next, self.outgoing(next).collect()));
                        }
                        Mark::InProgress => {
                            let from = stack.iter().position(|(n, _)| *n == next).unwrap_or(0);
                            let mut path = stack[from..]
                                .iter()
                                .map(|(n, _)| self.nodes[*n].id.clone())
                                .collect::<Vec<_>>();
                            path.push(self.nodes[next].id.clone());
                            return Err(GraphError::CycleDetected(path));
                        }
                        Mark::Done => {}
                    },
                    None => {
                        marks[current] = Mark::Done;
                        stack.pop();
                    }
                }
            }
        }
        Ok(())
    }

    fn warn_unreachable(&self) {
        let mut seen = AHashSet::new();
        let mut queue = VecDeque::from([self.start]);
        while let Some(current) = queue.pop_front() {
            if seen.insert(current) {
                queue.extend(self.outgoing(current));
            }
        }
        if seen.len() < self.nodes.len() {
            let unreachable = self
                .nodes
                .iter()
                .enumerate()
                .filter(|(i, _)| !seen.contains(i))
                .map(|(_, n)| n.id.as_str())
                .join(", ");
            log::warn!(
                "Flow '{}' has nodes unreachable from start: {}",
                self.id,
                unreachable
            );
        }
    }
}
