use super::definition::FlowDefinition;
use crate::error::FlowConversionError;

/// A trait for custom data models that can be converted into a `FlowDefinition`.
///
/// This is the extension point for authoring formats other than the native
/// JSON document. Implement it on your own structs to translate them into the
/// canonical node/edge model, then hand the result to [`crate::parser::Parser`].
///
/// # Example
///
/// ```rust,no_run
/// use keiro::prelude::*;
/// use keiro::error::FlowConversionError;
/// use std::result::Result;
///
/// // A flat "if field == value then output" list, checked in order.
/// struct DecisionList {
///     field: String,
///     cases: Vec<(f64, String)>,
///     fallback: String,
/// }
///
/// impl IntoFlow for DecisionList {
///     fn into_flow(self) -> Result<FlowDefinition, FlowConversionError> {
///         let mut nodes = vec![NodeDefinition::new("start", "start")];
///         let mut edges = Vec::new();
///         let mut previous = ("start".to_string(), None);
///         for (i, (value, output)) in self.cases.into_iter().enumerate() {
///             let check = format!("check-{}", i);
///             let out = format!("out-{}", i);
///             nodes.push(NodeDefinition::new(&check, "conditional").with_param(
///                 "predicate",
///                 serde_json::json!({"op": "==", "args": [{"field": self.field}, value]}),
///             ));
///             nodes.push(NodeDefinition::new(&out, "output").with_param("output", output.into()));
///             edges.push(EdgeDefinition { source: previous.0, target: check.clone(), label: previous.1 });
///             edges.push(EdgeDefinition::labeled(&check, "then", &out));
///             previous = (check, Some("else".to_string()));
///         }
///         nodes.push(NodeDefinition::new("fallback", "output").with_param("output", self.fallback.into()));
///         edges.push(EdgeDefinition { source: previous.0, target: "fallback".into(), label: previous.1 });
///
///         Ok(FlowDefinition {
///             id: "decision-list".to_string(),
///             version: "1".to_string(),
///             nodes,
///             edges,
///             subflows: vec![],
///         })
///     }
/// }
/// ```
pub trait IntoFlow {
    /// Consumes the object and converts it into a flow definition.
    fn into_flow(self) -> Result<FlowDefinition, FlowConversionError>;
}

impl IntoFlow for FlowDefinition {
    fn into_flow(self) -> Result<FlowDefinition, FlowConversionError> {
        Ok(self)
    }
}
