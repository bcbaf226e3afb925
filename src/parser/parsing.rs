use super::ParseContext;
use super::expression::parse_expression;
use super::resolver::VersionReq;
use crate::ast::Expression;
use crate::error::{ParseError, SchemaError};
use crate::flow::NodeDefinition;
use crate::graph::{NodeKind, OutputSpec, StringTransform, SubFlowCall, TableLookup};
use crate::table::DecisionTable;
use ahash::AHashMap;

/// Defines the contract for turning one node `kind` into a [`NodeKind`].
///
/// Register an implementation with
/// [`ParserBuilder::with_custom_parser`](super::ParserBuilder::with_custom_parser)
/// to teach the parser a new kind, usually by desugaring it into one of the
/// built-in variants.
pub trait NodeParser: Send + Sync {
    fn kind(&self) -> &str;
    fn parse(
        &self,
        node: &NodeDefinition,
        ctx: &mut ParseContext<'_>,
    ) -> Result<NodeKind, ParseError>;
}

fn context(node: &NodeDefinition) -> String {
    format!("node '{}'", node.id)
}

/// Fetches a parameter the kind cannot do without.
pub fn required<'n>(
    node: &'n NodeDefinition,
    field: &str,
) -> Result<&'n serde_json::Value, SchemaError> {
    node.params
        .get(field)
        .ok_or_else(|| SchemaError::MissingField {
            context: context(node),
            field: field.to_string(),
        })
}

fn invalid(node: &NodeDefinition, field: &str, message: impl Into<String>) -> SchemaError {
    SchemaError::InvalidField {
        context: context(node),
        field: field.to_string(),
        message: message.into(),
    }
}

pub fn required_str<'n>(node: &'n NodeDefinition, field: &str) -> Result<&'n str, SchemaError> {
    required(node, field)?
        .as_str()
        .ok_or_else(|| invalid(node, field, "expected a string"))
}

pub fn optional_str<'n>(
    node: &'n NodeDefinition,
    field: &str,
) -> Result<Option<&'n str>, SchemaError> {
    match node.params.get(field) {
        None | Some(serde_json::Value::Null) => Ok(None),
        Some(serde_json::Value::String(text)) => Ok(Some(text)),
        Some(_) => Err(invalid(node, field, "expected a string")),
    }
}

pub fn expression(node: &NodeDefinition, field: &str) -> Result<Expression, SchemaError> {
    parse_expression(&node.id, required(node, field)?)
}

pub fn optional_expression(
    node: &NodeDefinition,
    field: &str,
) -> Result<Option<Expression>, SchemaError> {
    node.params
        .get(field)
        .filter(|value| !value.is_null())
        .map(|value| parse_expression(&node.id, value))
        .transpose()
}

/// Reads `{name: expression, ...}` into name-sorted pairs.
pub fn named_expressions(
    node: &NodeDefinition,
    field: &str,
) -> Result<Vec<(String, Expression)>, SchemaError> {
    match node.params.get(field) {
        None | Some(serde_json::Value::Null) => Ok(Vec::new()),
        Some(serde_json::Value::Object(map)) => {
            let mut pairs = map
                .iter()
                .map(|(name, value)| Ok((name.clone(), parse_expression(&node.id, value)?)))
                .collect::<Result<Vec<_>, SchemaError>>()?;
            pairs.sort_by(|a, b| a.0.cmp(&b.0));
            Ok(pairs)
        }
        Some(_) => Err(invalid(node, field, "expected an object of expressions")),
    }
}

fn string_list(node: &NodeDefinition, field: &str) -> Result<Vec<String>, SchemaError> {
    match node.params.get(field) {
        None | Some(serde_json::Value::Null) => Ok(Vec::new()),
        Some(serde_json::Value::Array(items)) => items
            .iter()
            .map(|item| {
                item.as_str()
                    .map(str::to_string)
                    .ok_or_else(|| invalid(node, field, "expected an array of strings"))
            })
            .collect(),
        Some(_) => Err(invalid(node, field, "expected an array of strings")),
    }
}

fn parse_start(_node: &NodeDefinition, _ctx: &mut ParseContext<'_>) -> Result<NodeKind, ParseError> {
    Ok(NodeKind::Start)
}

fn parse_input(node: &NodeDefinition, _ctx: &mut ParseContext<'_>) -> Result<NodeKind, ParseError> {
    let field = required_str(node, "field")?;
    if field.is_empty() {
        return Err(invalid(node, "field", "must not be empty").into());
    }
    Ok(NodeKind::Input {
        field: field.to_string(),
    })
}

fn parse_conditional(
    node: &NodeDefinition,
    _ctx: &mut ParseContext<'_>,
) -> Result<NodeKind, ParseError> {
    Ok(NodeKind::Conditional {
        predicate: expression(node, "predicate")?,
    })
}

fn parse_arithmetic(
    node: &NodeDefinition,
    _ctx: &mut ParseContext<'_>,
) -> Result<NodeKind, ParseError> {
    Ok(NodeKind::Arithmetic {
        expression: expression(node, "expression")?,
        rounding: None,
    })
}

fn parse_round(node: &NodeDefinition, _ctx: &mut ParseContext<'_>) -> Result<NodeKind, ParseError> {
    let precision = match node.params.get("precision") {
        None | Some(serde_json::Value::Null) => 0,
        Some(value) => value
            .as_i64()
            .and_then(|p| i32::try_from(p).ok())
            .filter(|p| (-15..=15).contains(p))
            .ok_or_else(|| invalid(node, "precision", "expected an integer between -15 and 15"))?,
    };
    Ok(NodeKind::Arithmetic {
        expression: expression(node, "expression")?,
        rounding: Some(precision),
    })
}

fn parse_string_transform(
    node: &NodeDefinition,
    _ctx: &mut ParseContext<'_>,
) -> Result<NodeKind, ParseError> {
    let name = required_str(node, "transform")?;
    let transform = StringTransform::from_name(name)
        .ok_or_else(|| invalid(node, "transform", format!("unknown transform '{}'", name)))?;
    Ok(NodeKind::StringTransform {
        transform,
        source: expression(node, "source")?,
    })
}

fn parse_lowercase(
    node: &NodeDefinition,
    _ctx: &mut ParseContext<'_>,
) -> Result<NodeKind, ParseError> {
    Ok(NodeKind::StringTransform {
        transform: StringTransform::Lowercase,
        source: expression(node, "source")?,
    })
}

fn parse_table_lookup(
    node: &NodeDefinition,
    _ctx: &mut ParseContext<'_>,
) -> Result<NodeKind, ParseError> {
    let table_error = |message: String| SchemaError::InvalidTable {
        node_id: node.id.clone(),
        message,
    };

    // Keys are either `{column: expression}` or a list of columns fed by the
    // record fields of the same name.
    let mut keys: Vec<(String, Expression)> = match required(node, "keys")? {
        serde_json::Value::Array(_) => string_list(node, "keys")?
            .into_iter()
            .map(|column| {
                let lookup = Expression::field(&column);
                (column, lookup)
            })
            .collect(),
        serde_json::Value::Object(_) => named_expressions(node, "keys")?,
        _ => return Err(invalid(node, "keys", "expected an object or an array").into()),
    };
    keys.sort_by(|a, b| a.0.cmp(&b.0));
    if keys.is_empty() {
        return Err(table_error("at least one key column is required".to_string()).into());
    }

    let target = required_str(node, "target")?.to_string();
    let extra_targets = string_list(node, "extra_targets")?;

    let loaded = if let Some(csv) = optional_str(node, "csv")? {
        DecisionTable::from_csv_str(csv)
    } else {
        let rows = required(node, "rows")?
            .as_array()
            .ok_or_else(|| invalid(node, "rows", "expected an array"))?;
        let columns = match node.params.get("columns") {
            Some(serde_json::Value::Array(_)) => Some(string_list(node, "columns")?),
            _ => None,
        };
        DecisionTable::from_json_rows(columns, rows)
    };
    let table = loaded.map_err(|e| table_error(e.to_string()))?;

    table
        .require_columns(
            keys.iter()
                .map(|(column, _)| column.as_str())
                .chain(std::iter::once(target.as_str()))
                .chain(extra_targets.iter().map(String::as_str)),
        )
        .map_err(|e| table_error(e.to_string()))?;

    Ok(NodeKind::TableLookup(TableLookup {
        keys,
        target,
        extra_targets,
        table,
    }))
}

fn parse_subflow(node: &NodeDefinition, ctx: &mut ParseContext<'_>) -> Result<NodeKind, ParseError> {
    let flow_id = required_str(node, "flow")?.to_string();
    let version = match node.params.get("version") {
        None | Some(serde_json::Value::Null) => VersionReq::Any,
        Some(serde_json::Value::String(text)) => VersionReq::parse(Some(text)),
        Some(serde_json::Value::Number(number)) => VersionReq::Exact(number.to_string()),
        Some(_) => return Err(invalid(node, "version", "expected a string").into()),
    };
    let inputs = named_expressions(node, "inputs")?;
    let graph = ctx.resolve_subflow(&flow_id, &version)?;

    Ok(NodeKind::SubFlowCall(SubFlowCall {
        flow_id,
        version,
        inputs,
        graph,
    }))
}

fn parse_output(node: &NodeDefinition, _ctx: &mut ParseContext<'_>) -> Result<NodeKind, ParseError> {
    Ok(NodeKind::Output(OutputSpec {
        output: expression(node, "output")?,
        message: optional_expression(node, "message")?,
        extras: named_expressions(node, "extras")?,
    }))
}

/// Defines the built-in parsers, their registration and their lookup by name.
macro_rules! define_node_parsers {
    ( $( ($struct_name:ident, $kind:literal, $parse_fn:ident) ),* $(,)? ) => {
        $(
            struct $struct_name;
            impl NodeParser for $struct_name {
                fn kind(&self) -> &str { $kind }
                fn parse(&self, node: &NodeDefinition, ctx: &mut ParseContext<'_>) -> Result<NodeKind, ParseError> {
                    $parse_fn(node, ctx)
                }
            }
        )*

        pub(super) fn register_default_parsers(registry: &mut AHashMap<String, Box<dyn NodeParser>>) {
            $( registry.insert($kind.to_string(), Box::new($struct_name)); )*
        }

        pub(super) fn create_parser_by_name(name: &str) -> Option<Box<dyn NodeParser>> {
            match name {
                $( $kind => Some(Box::new($struct_name)), )*
                _ => None,
            }
        }
    };
}

define_node_parsers! {
    (StartParser, "start", parse_start),
    (InputParser, "input", parse_input),
    (ConditionalParser, "conditional", parse_conditional),
    (ArithmeticParser, "arithmetic", parse_arithmetic),
    (RoundParser, "round", parse_round),
    (StringTransformParser, "string_transform", parse_string_transform),
    (LowercaseParser, "lowercase", parse_lowercase),
    (TableLookupParser, "table_lookup", parse_table_lookup),
    (SubFlowParser, "subflow", parse_subflow),
    (OutputParser, "output", parse_output),
}

/// Alternate kind names accepted out of the box.
pub(super) const DEFAULT_ALIASES: &[(&str, &str)] = &[
    ("if", "conditional"),
    ("end", "output"),
    ("rule", "subflow"),
    ("table", "table_lookup"),
    ("math", "arithmetic"),
];
