//! # Keiro - Rule Flow Compiler and Batch Runner
//!
//! **Keiro** turns JSON-described decision graphs into validated, immutable
//! flow graphs and runs batches of records through them. Each record walks
//! the graph from its start node, taking a branch at every conditional, until
//! it reaches an output node whose value becomes that record's result.
//!
//! ## Core Workflow
//!
//! 1.  **Describe a flow**: a JSON document with `nodes`, `edges` and,
//!     optionally, the `subflows` it calls. Other authoring formats can be
//!     translated by implementing [`flow::IntoFlow`].
//! 2.  **Parse**: [`parser::Parser`] checks the document and every graph
//!     invariant up front, resolves sub-flow calls, and produces a
//!     [`graph::FlowGraph`]. Anything wrong is a [`error::ParseError`]; no
//!     partially built graph ever escapes.
//! 3.  **Run**: [`runner::Runner`] evaluates a [`data::RecordBatch`] and
//!     returns a [`data::ResultBatch`] in input order, sequentially or on the
//!     rayon thread pool.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use keiro::prelude::*;
//! use serde_json::json;
//!
//! fn main() -> Result<()> {
//!     let runner = Runner::from_json(json!({
//!         "id": "age-check",
//!         "version": "1",
//!         "nodes": [
//!             {"id": "start", "kind": "start"},
//!             {"id": "adult", "kind": "if",
//!              "predicate": {"op": ">=", "args": [{"field": "age"}, 18]}},
//!             {"id": "yes", "kind": "end", "output": true, "message": "valid age"},
//!             {"id": "no", "kind": "end", "output": false, "message": "underage"}
//!         ],
//!         "edges": [
//!             {"source": "start", "target": "adult"},
//!             {"source": "adult", "target": "yes", "label": "then"},
//!             {"source": "adult", "target": "no", "label": "else"}
//!         ]
//!     }))?;
//!
//!     let records = RecordBatch::from_json_value(&json!({"age": [10, 18, 42]}))?;
//!     let results = runner.execute(&records)?;
//!     println!("{}", results.to_json());
//!     Ok(())
//! }
//! ```

pub mod ast;
pub mod data;
pub mod error;
pub mod flow;
pub mod graph;
pub mod parser;
pub mod prelude;
pub mod runner;
pub mod table;
