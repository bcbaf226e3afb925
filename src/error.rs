use crate::ast::Value;
use itertools::Itertools;
use thiserror::Error;

/// The flow document is malformed or incomplete.
#[derive(Error, Debug, Clone)]
pub enum SchemaError {
    #[error("Failed to parse flow JSON: {0}")]
    JsonParseError(String),

    #[error("Missing required field '{field}' in {context}")]
    MissingField { context: String, field: String },

    #[error("Invalid value for '{field}' in {context}: {message}")]
    InvalidField {
        context: String,
        field: String,
        message: String,
    },

    #[error("Node '{node_id}' has an unregistered or invalid kind: '{kind}'")]
    UnknownKind { node_id: String, kind: String },

    #[error("Invalid expression in node '{node_id}': {message}")]
    InvalidExpression { node_id: String, message: String },

    #[error("Invalid decision table in node '{node_id}': {message}")]
    InvalidTable { node_id: String, message: String },
}

/// A structural invariant of the flow graph does not hold.
#[derive(Error, Debug, Clone)]
pub enum GraphError {
    #[error("Node id '{0}' is declared more than once")]
    DuplicateNode(String),

    #[error("Flow has no start node")]
    NoStartNode,

    #[error("Flow has more than one start node: {}", .0.iter().join(", "))]
    MultipleStartNodes(Vec<String>),

    #[error(
        "Node '{missing_node_id}' not found, which is required by a connection from node '{source_node_id}'"
    )]
    NodeNotFound {
        missing_node_id: String,
        source_node_id: String,
    },

    #[error("Node '{node_id}' references unknown node '{reference}'")]
    UnknownNodeReference { node_id: String, reference: String },

    #[error("Edge label '{label}' is not valid for node '{node_id}'")]
    InvalidLabel { node_id: String, label: String },

    #[error("Node '{node_id}' has more than one '{label}' edge")]
    DuplicateEdge { node_id: String, label: String },

    #[error("Node '{node_id}' is missing its '{label}' edge")]
    MissingEdge { node_id: String, label: String },

    #[error("Terminal node '{0}' must not have outgoing edges")]
    TerminalWithEdges(String),

    #[error("Flow contains a cycle: {}", .0.iter().join(" -> "))]
    CycleDetected(Vec<String>),
}

/// A sub-flow reference could not be resolved.
#[derive(Error, Debug, Clone)]
pub enum ReferenceError {
    #[error("Sub-flow '{flow_id}' with version '{version}' could not be resolved")]
    Unresolved { flow_id: String, version: String },

    #[error("Circular sub-flow reference: {}", .0.iter().join(" -> "))]
    CircularReference(Vec<String>),

    #[error("Resolver failed to load sub-flow '{flow_id}': {message}")]
    ResolverFailed { flow_id: String, message: String },
}

/// Errors that can occur while compiling a flow document. Nothing is returned
/// on failure, so a graph is never partially built.
#[derive(Error, Debug, Clone)]
pub enum ParseError {
    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error(transparent)]
    Graph(#[from] GraphError),

    #[error(transparent)]
    Reference(#[from] ReferenceError),
}

/// Errors raised at the construction API boundary.
#[derive(Error, Debug, Clone)]
pub enum ConstructionError {
    #[error("Expected a file path, a flow object or a flow array, but found {found}")]
    InvalidSource { found: &'static str },

    #[error("Could not read flow file '{path}': {message}")]
    Io { path: String, message: String },

    #[error(transparent)]
    Parse(#[from] ParseError),
}

/// The decision table has no row matching the lookup keys.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LookupError {
    #[error("No table row matches {keys} and the table has no default row")]
    NoMatch { keys: String },

    #[error("Lookup key column '{0}' does not exist in the table")]
    MissingKey(String),
}

/// The decision table data is malformed.
#[derive(Error, Debug, Clone)]
pub enum TableError {
    #[error("Failed to read CSV table: {0}")]
    Csv(String),

    #[error("Table has no columns")]
    NoColumns,

    #[error("Column '{0}' is declared more than once")]
    DuplicateColumn(String),

    #[error("Row {row} has {found} cells, expected {expected}")]
    RaggedRow {
        row: usize,
        expected: usize,
        found: usize,
    },

    #[error("Row {row} is neither an object nor an array")]
    InvalidRow { row: usize },

    #[error("Row {row} has a non-scalar value in column '{column}'")]
    InvalidCell { row: usize, column: String },

    #[error("Column '{0}' does not exist in the table")]
    UnknownColumn(String),
}

/// Errors that can occur while evaluating a single record.
#[derive(Error, Debug, Clone)]
pub enum EvaluationError {
    #[error(
        "Type mismatch during operation '{operation}': expected {expected}, but found value '{found}'"
    )]
    TypeMismatch {
        operation: String,
        expected: String,
        found: Value,
    },

    #[error("Table lookup in node '{node_id}' failed: {source}")]
    Lookup {
        node_id: String,
        #[source]
        source: LookupError,
    },

    #[error("Sub-flow call in node '{node_id}' failed: {source}")]
    SubFlow {
        node_id: String,
        #[source]
        source: Box<EvaluationError>,
    },

    #[error("Node '{node_id}' has no outgoing '{label}' edge")]
    MissingEdge { node_id: String, label: String },

    #[error("Traversal exceeded {0} hops without reaching a terminal node")]
    HopLimitExceeded(usize),

    #[error("Batch deadline expired before the record was evaluated")]
    DeadlineExceeded,
}

/// Batch-level failures, raised only by the strict error policy or the deadline.
#[derive(Error, Debug, Clone)]
pub enum ExecutionError {
    #[error("Record {index} failed: {source}")]
    RecordFailed {
        index: usize,
        #[source]
        source: EvaluationError,
    },

    #[error("Batch deadline expired after {completed} of {total} records")]
    Timeout { completed: usize, total: usize },
}

/// Errors that can occur when building records from JSON.
#[derive(Error, Debug, Clone)]
pub enum RecordError {
    #[error("Failed to read records: {0}")]
    Io(String),

    #[error("Failed to parse records JSON: {0}")]
    JsonParseError(String),

    #[error("Expected an array of objects or an object of columns")]
    InvalidShape,

    #[error("Row {0} is not an object")]
    NotAnObject(usize),

    #[error("Field '{0}' holds an array or object, which has no scalar value")]
    UnsupportedValue(String),

    #[error("Column '{column}' has {found} values, expected {expected}")]
    ColumnLengthMismatch {
        column: String,
        expected: usize,
        found: usize,
    },
}

/// Errors that can occur while loading a runner configuration.
#[derive(Error, Debug, Clone)]
pub enum ConfigError {
    #[error("Could not read config file '{path}': {message}")]
    Io { path: String, message: String },

    #[error("Failed to parse config JSON: {0}")]
    JsonParseError(String),
}

/// Errors that can occur when converting a custom user format into a `FlowDefinition`.
#[derive(Error, Debug, Clone)]
pub enum FlowConversionError {
    #[error("Invalid custom data: {0}")]
    ValidationError(String),
}

/// Errors that can occur while saving or loading compiled artifacts.
#[derive(Error, Debug, Clone)]
pub enum ArtifactError {
    #[error("Artifact error: {0}")]
    Generic(String),
}
