use super::bindings::Bindings;
use super::expression::{ExpressionEngine, type_mismatch};
use crate::ast::Value;
use crate::data::{Record, ResultRecord};
use crate::error::EvaluationError;
use crate::graph::{EdgeLabel, FlowGraph, Node, NodeKind, OutputSpec, StringTransform};

/// Walks `graph` for one record, from the start node to the first output.
pub(super) fn run_graph(graph: &FlowGraph, record: &Record) -> Result<ResultRecord, EvaluationError> {
    let mut bindings = Bindings::new(record);
    let mut index = graph.start_index();
    // A validated graph is acyclic, so no path visits more nodes than it has.
    let hop_limit = graph.nodes().len();

    for _ in 0..hop_limit {
        let node = graph.node_at(index);
        if let NodeKind::Output(spec) = &node.kind {
            log::trace!("[{}] output '{}'", graph.id(), node.id);
            return emit(spec, &bindings);
        }

        let (label, value) = step(node, &mut bindings)?;
        log::trace!("[{}] {} -> {} ({})", graph.id(), node.id, value, label);
        bindings.bind(node.id.clone(), value);

        index = graph
            .successor(index, label)
            .ok_or_else(|| EvaluationError::MissingEdge {
                node_id: node.id.clone(),
                label: label.to_string(),
            })?;
    }
    Err(EvaluationError::HopLimitExceeded(hop_limit))
}

/// Evaluates one non-terminal node, returning the label to follow and its value.
fn step(node: &Node, bindings: &mut Bindings<'_>) -> Result<(EdgeLabel, Value), EvaluationError> {
    let engine = ExpressionEngine::new(bindings);
    let value = match &node.kind {
        NodeKind::Start => Value::Null,
        NodeKind::Input { field } => bindings.field(field),
        NodeKind::Conditional { predicate } => {
            return match engine.evaluate(predicate)? {
                Value::Bool(true) => Ok((EdgeLabel::Then, Value::Bool(true))),
                Value::Bool(false) => Ok((EdgeLabel::Else, Value::Bool(false))),
                other => Err(type_mismatch("conditional", "Bool", other)),
            };
        }
        NodeKind::Arithmetic {
            expression,
            rounding,
        } => match (engine.evaluate(expression)?, rounding) {
            (Value::Number(n), None) => Value::Number(n),
            (Value::Number(n), Some(precision)) => Value::Number(round_half_away(n, *precision)),
            (other, None) => return Err(type_mismatch("arithmetic", "Number", other)),
            (other, Some(_)) => return Err(type_mismatch("round", "Number", other)),
        },
        NodeKind::StringTransform { transform, source } => {
            let source = engine.evaluate(source)?;
            Value::String(match transform {
                StringTransform::Lowercase => source.coerce_lowercase(),
                StringTransform::Uppercase => source.coerce_to_string().to_uppercase(),
                StringTransform::Trim => source.coerce_to_string().trim().to_string(),
            })
        }
        NodeKind::TableLookup(lookup) => {
            let key_values = lookup
                .keys
                .iter()
                .map(|(column, expression)| Ok((column.as_str(), engine.evaluate(expression)?)))
                .collect::<Result<Vec<_>, EvaluationError>>()?;
            let keys = key_values
                .iter()
                .map(|(column, value)| (*column, value))
                .collect::<Vec<_>>();
            let row = lookup
                .table
                .lookup(&keys)
                .map_err(|source| EvaluationError::Lookup {
                    node_id: node.id.clone(),
                    source,
                })?;

            for column in &lookup.extra_targets {
                let value = lookup.table.value(row, column).unwrap_or(Value::Null);
                bindings.bind(format!("{}.{}", node.id, column), value);
            }
            lookup.table.value(row, &lookup.target).unwrap_or(Value::Null)
        }
        NodeKind::SubFlowCall(call) => {
            let sub_record = call
                .inputs
                .iter()
                .map(|(name, expression)| Ok((name.clone(), engine.evaluate(expression)?)))
                .collect::<Result<Record, EvaluationError>>()?;
            let result = run_graph(&call.graph, &sub_record).map_err(|source| {
                EvaluationError::SubFlow {
                    node_id: node.id.clone(),
                    source: Box::new(source),
                }
            })?;
            result.output
        }
        NodeKind::Output(spec) => engine.evaluate(&spec.output)?,
    };
    Ok((EdgeLabel::Next, value))
}

fn emit(spec: &OutputSpec, bindings: &Bindings<'_>) -> Result<ResultRecord, EvaluationError> {
    let engine = ExpressionEngine::new(bindings);
    let mut result = ResultRecord::new(engine.evaluate(&spec.output)?);
    if let Some(message) = &spec.message {
        result.message = engine.evaluate(message)?;
    }
    for (name, expression) in &spec.extras {
        result.extras.insert(name.clone(), engine.evaluate(expression)?);
    }
    Ok(result)
}

/// Largest magnitude below which an `f64` can still carry a fractional part.
const FRACTION_LIMIT: f64 = 4_503_599_627_370_496.0;

/// Rounds half away from zero to `precision` decimal places.
///
/// Values already integral at the requested scale come back unchanged, so
/// scaling never overflows into infinity.
pub(super) fn round_half_away(value: f64, precision: i32) -> f64 {
    if precision == 0 {
        return value.round();
    }
    let factor = 10f64.powi(precision);
    let scaled = value * factor;
    if !scaled.is_finite() || scaled.abs() >= FRACTION_LIMIT {
        return value;
    }
    scaled.round() / factor
}
