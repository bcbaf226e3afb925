use super::FlowGraph;
use crate::ast::Expression;
use crate::parser::VersionReq;
use crate::table::DecisionTable;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// A single evaluation step of a flow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: String,
    pub kind: NodeKind,
}

impl Node {
    pub fn new(id: impl Into<String>, kind: NodeKind) -> Self {
        Self {
            id: id.into(),
            kind,
        }
    }
}

/// The closed catalog of node variants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum NodeKind {
    Start,
    Input {
        field: String,
    },
    Conditional {
        predicate: Expression,
    },
    /// A numeric expression, optionally rounded half away from zero to
    /// `rounding` decimal places.
    Arithmetic {
        expression: Expression,
        rounding: Option<i32>,
    },
    StringTransform {
        transform: StringTransform,
        source: Expression,
    },
    TableLookup(TableLookup),
    SubFlowCall(SubFlowCall),
    Output(OutputSpec),
}

impl NodeKind {
    /// Name of the built-in kind this variant is parsed from.
    pub fn name(&self) -> &'static str {
        match self {
            NodeKind::Start => "start",
            NodeKind::Input { .. } => "input",
            NodeKind::Conditional { .. } => "conditional",
            NodeKind::Arithmetic { rounding: None, .. } => "arithmetic",
            NodeKind::Arithmetic { rounding: Some(_), .. } => "round",
            NodeKind::StringTransform { .. } => "string_transform",
            NodeKind::TableLookup(_) => "table_lookup",
            NodeKind::SubFlowCall(_) => "subflow",
            NodeKind::Output(_) => "output",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, NodeKind::Output(_))
    }

    pub fn is_branching(&self) -> bool {
        matches!(self, NodeKind::Conditional { .. })
    }

    /// Every expression evaluated by this node.
    pub fn expressions(&self) -> Vec<&Expression> {
        match self {
            NodeKind::Start | NodeKind::Input { .. } => Vec::new(),
            NodeKind::Conditional { predicate } => vec![predicate],
            NodeKind::Arithmetic { expression, .. } => vec![expression],
            NodeKind::StringTransform { source, .. } => vec![source],
            NodeKind::TableLookup(lookup) => lookup.keys.iter().map(|(_, e)| e).collect(),
            NodeKind::SubFlowCall(call) => call.inputs.iter().map(|(_, e)| e).collect(),
            NodeKind::Output(spec) => {
                let mut expressions = vec![&spec.output];
                expressions.extend(spec.message.iter());
                expressions.extend(spec.extras.iter().map(|(_, e)| e));
                expressions
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StringTransform {
    Lowercase,
    Uppercase,
    Trim,
}

impl StringTransform {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "lowercase" => Some(StringTransform::Lowercase),
            "uppercase" => Some(StringTransform::Uppercase),
            "trim" => Some(StringTransform::Trim),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            StringTransform::Lowercase => "lowercase",
            StringTransform::Uppercase => "uppercase",
            StringTransform::Trim => "trim",
        }
    }
}

/// Parameters of a decision table lookup node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableLookup {
    /// Key column name paired with the expression producing its lookup value.
    pub keys: Vec<(String, Expression)>,
    /// Column whose value becomes the node's value.
    pub target: String,
    /// Further columns bound as `<node>.<column>`.
    pub extra_targets: Vec<String>,
    pub table: DecisionTable,
}

/// Parameters of a sub-flow call, with the target resolved at parse time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubFlowCall {
    pub flow_id: String,
    pub version: VersionReq,
    /// Sub-flow field name paired with the parent expression feeding it.
    pub inputs: Vec<(String, Expression)>,
    pub graph: Arc<FlowGraph>,
}

/// What a terminal node emits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputSpec {
    pub output: Expression,
    pub message: Option<Expression>,
    pub extras: Vec<(String, Expression)>,
}

/// The label on an edge, chosen by the node's evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EdgeLabel {
    /// The single implicit edge of a non-branching node.
    Next,
    Then,
    Else,
}

impl EdgeLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            EdgeLabel::Next => "next",
            EdgeLabel::Then => "then",
            EdgeLabel::Else => "else",
        }
    }

    /// Interprets a raw label for a source node of the given kind.
    ///
    /// `default` is the false branch of a conditional and the implicit edge
    /// of anything else.
    pub fn resolve(label: Option<&str>, branching: bool) -> Option<Self> {
        match (label, branching) {
            (Some("then"), true) => Some(EdgeLabel::Then),
            (Some("else") | Some("default"), true) => Some(EdgeLabel::Else),
            (None | Some("next") | Some("default"), false) => Some(EdgeLabel::Next),
            _ => None,
        }
    }
}

impl fmt::Display for EdgeLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
