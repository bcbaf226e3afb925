use super::{InputSource, Value};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// An operand, predicate or arithmetic expression attached to a node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Expression {
    // Arithmetic
    Sum(Box<Expression>, Box<Expression>),
    Subtract(Box<Expression>, Box<Expression>),
    Multiply(Box<Expression>, Box<Expression>),
    Divide(Box<Expression>, Box<Expression>),

    // Logical
    Not(Box<Expression>),
    And(Box<Expression>, Box<Expression>),
    Or(Box<Expression>, Box<Expression>),

    // Comparison
    Equal(Box<Expression>, Box<Expression>),
    NotEqual(Box<Expression>, Box<Expression>),
    GreaterThan(Box<Expression>, Box<Expression>),
    GreaterThanOrEqual(Box<Expression>, Box<Expression>),
    SmallerThan(Box<Expression>, Box<Expression>),
    SmallerThanOrEqual(Box<Expression>, Box<Expression>),

    // Leaf nodes
    Literal(Value),
    Input(InputSource),
}

impl Expression {
    pub fn field(name: &str) -> Self {
        Expression::Input(InputSource::Field {
            name: name.to_string(),
        })
    }

    pub fn node(id: &str) -> Self {
        Expression::Input(InputSource::Node { id: id.to_string() })
    }

    pub fn literal(value: impl Into<Value>) -> Self {
        Expression::Literal(value.into())
    }

    /// Operator symbol and operands of a binary expression.
    pub fn as_binary(&self) -> Option<(&'static str, &Expression, &Expression)> {
        let parts = match self {
            Expression::Sum(l, r) => ("+", l, r),
            Expression::Subtract(l, r) => ("-", l, r),
            Expression::Multiply(l, r) => ("*", l, r),
            Expression::Divide(l, r) => ("/", l, r),
            Expression::And(l, r) => ("and", l, r),
            Expression::Or(l, r) => ("or", l, r),
            Expression::Equal(l, r) => ("==", l, r),
            Expression::NotEqual(l, r) => ("!=", l, r),
            Expression::GreaterThan(l, r) => (">", l, r),
            Expression::GreaterThanOrEqual(l, r) => (">=", l, r),
            Expression::SmallerThan(l, r) => ("<", l, r),
            Expression::SmallerThanOrEqual(l, r) => ("<=", l, r),
            Expression::Not(_) | Expression::Literal(_) | Expression::Input(_) => return None,
        };
        Some((parts.0, parts.1.as_ref(), parts.2.as_ref()))
    }

    /// Collects the ids of all nodes this expression reads from.
    ///
    /// A `node.column` reference contributes only the node part.
    pub fn collect_node_refs(&self, refs: &mut BTreeSet<String>) {
        match self {
            Expression::Input(InputSource::Node { id }) => {
                let node_id = id.split_once('.').map_or(id.as_str(), |(node, _)| node);
                refs.insert(node_id.to_string());
            }
            Expression::Not(v) => v.collect_node_refs(refs),
            Expression::Literal(_) | Expression::Input(InputSource::Field { .. }) => {}
            other => {
                if let Some((_, l, r)) = other.as_binary() {
                    l.collect_node_refs(refs);
                    r.collect_node_refs(refs);
                }
            }
        }
    }

    /// Collects the record fields this expression reads.
    pub fn collect_fields(&self, fields: &mut BTreeSet<String>) {
        match self {
            Expression::Input(InputSource::Field { name }) => {
                fields.insert(name.clone());
            }
            Expression::Not(v) => v.collect_fields(fields),
            Expression::Literal(_) | Expression::Input(InputSource::Node { .. }) => {}
            other => {
                if let Some((_, l, r)) = other.as_binary() {
                    l.collect_fields(fields);
                    r.collect_fields(fields);
                }
            }
        }
    }

    /// The JSON form accepted by the parser.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Expression::Literal(v) => serde_json::json!({ "literal": v.to_json() }),
            Expression::Input(InputSource::Field { name }) => serde_json::json!({ "field": name }),
            Expression::Input(InputSource::Node { id }) => serde_json::json!({ "node": id }),
            Expression::Not(v) => serde_json::json!({ "op": "not", "args": [v.to_json()] }),
            other => match other.as_binary() {
                Some((op, l, r)) => serde_json::json!({ "op": op, "args": [l.to_json(), r.to_json()] }),
                None => serde_json::Value::Null,
            },
        }
    }

    fn precedence(&self) -> u8 {
        match self {
            Expression::Or(..) => 1,
            Expression::And(..) => 2,
            Expression::Equal(..) | Expression::NotEqual(..) => 4,
            Expression::GreaterThan(..)
            | Expression::GreaterThanOrEqual(..)
            | Expression::SmallerThan(..)
            | Expression::SmallerThanOrEqual(..) => 5,
            Expression::Sum(..) | Expression::Subtract(..) => 6,
            Expression::Multiply(..) | Expression::Divide(..) => 7,
            Expression::Not(_) => 8,
            Expression::Literal(_) | Expression::Input(_) => 9,
        }
    }

    fn fmt_with_parent(&self, f: &mut fmt::Formatter<'_>, parent_precedence: u8) -> fmt::Result {
        let precedence = self.precedence();
        let needs_parens = precedence < parent_precedence;
        if needs_parens {
            write!(f, "(")?;
        }
        match self {
            Expression::Literal(v) => write!(f, "{}", v)?,
            Expression::Input(source) => write!(f, "{}", source)?,
            Expression::Not(v) => {
                write!(f, "not ")?;
                v.fmt_with_parent(f, precedence)?;
            }
            other => {
                if let Some((op, l, r)) = other.as_binary() {
                    l.fmt_with_parent(f, precedence)?;
                    write!(f, " {} ", op)?;
                    // Right operands bind tighter so `a - (b - c)` keeps its parentheses.
                    r.fmt_with_parent(f, precedence + 1)?;
                }
            }
        }
        if needs_parens {
            write!(f, ")")?;
        }
        Ok(())
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.fmt_with_parent(f, 0)
    }
}
