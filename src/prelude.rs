//! Prelude module for convenient imports
//!
//! This module re-exports the most commonly used types and traits from the keiro crate.
//!
//! # Example
//!
//! ```rust,no_run
//! use keiro::prelude::*;
//!
//! # fn run_example() -> Result<()> {
//! let runner = Runner::from_json("path/to/flow.json")?;
//! let records = RecordBatch::from_file("path/to/records.json")?;
//! let results = runner.execute(&records)?;
//! println!("Outputs: {:?}", results.outputs());
//! # Ok(())
//! # }
//! ```

// Parsing and running
pub use crate::parser::{
    DirectoryResolver, FlowRegistry, FlowResolver, NodeParser, Parser, ParserBuilder, VersionReq,
};
pub use crate::runner::{ErrorPolicy, ExecutionStrategy, Runner, RunnerConfig};

// Flow documents and compiled graphs
pub use crate::flow::{CompiledFlow, EdgeDefinition, FlowDefinition, IntoFlow, NodeDefinition};
pub use crate::graph::{EdgeLabel, FlowGraph, GraphBuilder, Node, NodeKind};
pub use crate::table::{Cell, DecisionTable};

// Values and expressions
pub use crate::ast::{Expression, InputSource, Value};

// Records
pub use crate::data::{Record, RecordBatch, ResultBatch, ResultRecord};

// Error types
pub use crate::error::{
    ConstructionError, EvaluationError, ExecutionError, GraphError, LookupError, ParseError,
    ReferenceError, SchemaError,
};

// Result type alias for convenience
pub type Result<T> = std::result::Result<T, Box<dyn std::error::Error>>;
