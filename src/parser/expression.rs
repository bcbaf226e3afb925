use crate::ast::{Expression, Value};
use crate::error::SchemaError;

/// Parses the JSON form of an expression.
///
/// Bare scalars are literals. Objects carry exactly one of `literal`,
/// `field`, `node` or `op` (the latter with an `args` array).
pub fn parse_expression(node_id: &str, json: &serde_json::Value) -> Result<Expression, SchemaError> {
    let invalid = |message: String| SchemaError::InvalidExpression {
        node_id: node_id.to_string(),
        message,
    };

    let object = match json {
        serde_json::Value::Array(_) => {
            return Err(invalid("an array is not an expression".to_string()));
        }
        serde_json::Value::Object(object) => object,
        scalar => {
            return Value::from_json(scalar)
                .map(Expression::Literal)
                .ok_or_else(|| invalid(format!("unsupported literal {}", scalar)));
        }
    };

    let markers = ["literal", "field", "node", "op"]
        .into_iter()
        .filter(|key| object.contains_key(*key))
        .collect::<Vec<_>>();
    let marker = match markers.as_slice() {
        [one] => *one,
        [] => {
            return Err(invalid(format!(
                "expected one of 'literal', 'field', 'node' or 'op' in {}",
                json
            )));
        }
        _ => {
            return Err(invalid(format!(
                "ambiguous expression with keys {}",
                markers.join(", ")
            )));
        }
    };

    match marker {
        "literal" => Value::from_json(&object[marker])
            .map(Expression::Literal)
            .ok_or_else(|| invalid("literal must be a scalar".to_string())),
        "field" | "node" => {
            let name = object[marker]
                .as_str()
                .filter(|name| !name.is_empty())
                .ok_or_else(|| invalid(format!("'{}' must be a non-empty string", marker)))?;
            Ok(if marker == "field" {
                Expression::field(name)
            } else {
                Expression::node(name)
            })
        }
        _ => parse_operation(node_id, object),
    }
}

fn parse_operation(
    node_id: &str,
    object: &serde_json::Map<String, serde_json::Value>,
) -> Result<Expression, SchemaError> {
    let invalid = |message: String| SchemaError::InvalidExpression {
        node_id: node_id.to_string(),
        message,
    };

    let op = object["op"]
        .as_str()
        .ok_or_else(|| invalid("'op' must be a string".to_string()))?;
    let args = object
        .get("args")
        .and_then(|args| args.as_array())
        .ok_or_else(|| invalid(format!("operator '{}' needs an 'args' array", op)))?
        .iter()
        .map(|arg| parse_expression(node_id, arg))
        .collect::<Result<Vec<_>, _>>()?;

    let arity_error = |expected: &str| {
        invalid(format!(
            "operator '{}' expects {} arguments, got {}",
            op,
            expected,
            args.len()
        ))
    };

    let binary = |variant: fn(Box<Expression>, Box<Expression>) -> Expression| {
        match <[Expression; 2]>::try_from(args.clone()) {
            Ok([l, r]) => Ok(variant(Box::new(l), Box::new(r))),
            Err(_) => Err(arity_error("2")),
        }
    };

    match op {
        "+" => binary(Expression::Sum),
        "-" => binary(Expression::Subtract),
        "*" => binary(Expression::Multiply),
        "/" => binary(Expression::Divide),
        "==" => binary(Expression::Equal),
        "!=" => binary(Expression::NotEqual),
        ">" => binary(Expression::GreaterThan),
        ">=" => binary(Expression::GreaterThanOrEqual),
        "<" => binary(Expression::SmallerThan),
        "<=" => binary(Expression::SmallerThanOrEqual),
        "and" | "or" => {
            if args.len() < 2 {
                return Err(arity_error("at least 2"));
            }
            let combine = if op == "and" {
                Expression::And
            } else {
                Expression::Or
            };
            // Folding left keeps left-to-right evaluation and short-circuiting.
            Ok(args
                .iter()
                .cloned()
                .reduce(|acc, next| combine(Box::new(acc), Box::new(next)))
                .unwrap_or(Expression::Literal(Value::Null)))
        }
        "not" => match <[Expression; 1]>::try_from(args.clone()) {
            Ok([inner]) => Ok(Expression::Not(Box::new(inner))),
            Err(_) => Err(arity_error("1")),
        },
        other => Err(invalid(format!("unknown operator '{}'", other))),
    }
}
