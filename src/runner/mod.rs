//! Executes compiled flows against records.

mod bindings;
mod config;
mod engine;
mod expression;

pub use config::{ErrorPolicy, ExecutionStrategy, RunnerConfig};

use crate::data::{Record, RecordBatch, ResultBatch, ResultRecord};
use crate::error::{ConstructionError, EvaluationError, ExecutionError, ParseError, SchemaError};
use crate::flow::{CompiledFlow, FlowDefinition};
use crate::graph::FlowGraph;
use crate::parser::{DirectoryResolver, FlowResolver, NoResolver, Parser};
use rayon::prelude::*;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Evaluates record batches against one compiled flow.
///
/// A `Runner` holds its graph behind an `Arc` and never mutates it, so it can
/// be cloned cheaply and used from many threads at once. Every record gets a
/// fresh set of bindings; nothing carries over between records.
#[derive(Debug, Clone)]
pub struct Runner {
    graph: Arc<FlowGraph>,
    config: RunnerConfig,
}

impl Runner {
    pub fn new(graph: impl Into<Arc<FlowGraph>>) -> Self {
        Self::with_config(graph, RunnerConfig::default())
    }

    pub fn with_config(graph: impl Into<Arc<FlowGraph>>, config: RunnerConfig) -> Self {
        Self {
            graph: graph.into(),
            config,
        }
    }

    pub fn from_parser(parser: &Parser) -> Result<Self, ParseError> {
        Ok(Self::new(parser.parse()?))
    }

    pub fn from_artifact(artifact: CompiledFlow) -> Self {
        Self::new(artifact.into_graph())
    }

    /// Builds a runner from a path or an in-memory document.
    ///
    /// A string is read as a file path, and sub-flows the file does not embed
    /// are looked up next to it. An object is a flow document. An array is a
    /// main flow followed by the sub-flows it calls. Anything else is rejected.
    pub fn from_json(source: impl Into<serde_json::Value>) -> Result<Self, ConstructionError> {
        match source.into() {
            serde_json::Value::String(path) => {
                let path = Path::new(&path);
                // A bare file name has an empty parent, which names no directory.
                let directory = path
                    .parent()
                    .filter(|parent| !parent.as_os_str().is_empty())
                    .unwrap_or_else(|| Path::new("."));
                let resolver = Arc::new(DirectoryResolver::new(directory));
                Self::from_path(path, resolver)
            }
            document => Self::from_document(document, Arc::new(NoResolver)),
        }
    }

    /// Like [`Runner::from_json`], with an explicit resolver for sub-flows.
    pub fn from_json_with_resolver(
        source: impl Into<serde_json::Value>,
        resolver: Arc<dyn FlowResolver>,
    ) -> Result<Self, ConstructionError> {
        match source.into() {
            serde_json::Value::String(path) => Self::from_path(Path::new(&path), resolver),
            document => Self::from_document(document, resolver),
        }
    }

    fn from_path(path: &Path, resolver: Arc<dyn FlowResolver>) -> Result<Self, ConstructionError> {
        let content = fs::read_to_string(path).map_err(|e| ConstructionError::Io {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        let document: serde_json::Value = serde_json::from_str(&content)
            .map_err(|e| ParseError::from(SchemaError::JsonParseError(e.to_string())))?;
        if document.is_string() {
            return Err(ConstructionError::InvalidSource { found: "a string" });
        }
        Self::from_document(document, resolver)
    }

    fn from_document(
        document: serde_json::Value,
        resolver: Arc<dyn FlowResolver>,
    ) -> Result<Self, ConstructionError> {
        let definition = match document {
            serde_json::Value::Object(_) => {
                FlowDefinition::from_value(&document).map_err(ParseError::from)?
            }
            serde_json::Value::Array(items) => {
                let mut items = items.iter();
                let main = items.next().ok_or(ConstructionError::InvalidSource {
                    found: "an empty array",
                })?;
                let mut definition = FlowDefinition::from_value(main).map_err(ParseError::from)?;
                for item in items {
                    definition
                        .subflows
                        .push(FlowDefinition::from_value(item).map_err(ParseError::from)?);
                }
                definition
            }
            other => {
                return Err(ConstructionError::InvalidSource {
                    found: json_type_name(&other),
                });
            }
        };

        let parser = Parser::builder(definition)
            .with_shared_resolver(resolver)
            .build();
        Ok(Self::from_parser(&parser)?)
    }

    pub fn graph(&self) -> &Arc<FlowGraph> {
        &self.graph
    }

    pub fn config(&self) -> &RunnerConfig {
        &self.config
    }

    pub fn set_config(&mut self, config: RunnerConfig) {
        self.config = config;
    }

    /// Evaluates a single record.
    pub fn evaluate(&self, record: &Record) -> Result<ResultRecord, EvaluationError> {
        engine::run_graph(&self.graph, record)
    }

    /// Evaluates every record of `batch`, keeping input order in the result.
    pub fn execute(&self, batch: &RecordBatch) -> Result<ResultBatch, ExecutionError> {
        let started = Instant::now();
        let deadline = self.config.timeout().map(|timeout| started + timeout);
        log::debug!(
            "Executing {} records of '{}@{}' ({:?}, {:?})",
            batch.len(),
            self.graph.id(),
            self.graph.version(),
            self.config.strategy,
            self.config.error_policy
        );

        let run_one = |record: &Record| -> Result<ResultRecord, EvaluationError> {
            if deadline.is_some_and(|deadline| Instant::now() >= deadline) {
                return Err(EvaluationError::DeadlineExceeded);
            }
            self.evaluate(record)
        };

        let strict = self.config.error_policy == ErrorPolicy::Strict;
        let rows = match self.config.strategy {
            ExecutionStrategy::Sequential => {
                let mut rows = Vec::with_capacity(batch.len());
                for record in batch {
                    let row = run_one(record);
                    let failed = row.is_err();
                    rows.push(row);
                    if strict && failed {
                        break;
                    }
                }
                rows
            }
            ExecutionStrategy::Parallel => {
                batch.records().par_iter().map(run_one).collect::<Vec<_>>()
            }
        };

        let results = ResultBatch::new(rows);
        if strict {
            check_strict(&results, batch.len())?;
        }
        for (index, e) in results.failures() {
            log::warn!("Record {} failed: {}", index, e);
        }
        log::debug!(
            "Executed {} of {} records in {:?}",
            results.completed(),
            batch.len(),
            started.elapsed()
        );
        Ok(results)
    }

    /// Shorthand for a runner with a deadline.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.config = self.config.with_timeout(timeout);
        self
    }
}

/// Turns the first failing slot into a batch error.
fn check_strict(results: &ResultBatch, total: usize) -> Result<(), ExecutionError> {
    let first_failure = results
        .rows()
        .iter()
        .enumerate()
        .find_map(|(index, row)| row.as_ref().err().map(|e| (index, e)));
    match first_failure {
        None => Ok(()),
        Some((_, EvaluationError::DeadlineExceeded)) => Err(ExecutionError::Timeout {
            completed: results.completed(),
            total,
        }),
        Some((index, source)) => Err(ExecutionError::RecordFailed {
            index,
            source: source.clone(),
        }),
    }
}

fn json_type_name(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "a boolean",
        serde_json::Value::Number(_) => "a number",
        serde_json::Value::String(_) => "a string",
        serde_json::Value::Array(_) => "an array",
        serde_json::Value::Object(_) => "an object",
    }
}
