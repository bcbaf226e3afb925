use crate::error::SchemaError;
use serde::{Deserialize, Deserializer, Serialize};

/// The JSON flow document: the contract between authoring tools and the parser.
///
/// Node parameters are kept as raw JSON here; the kind-specific parsers
/// validate them when the flow is compiled.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowDefinition {
    pub id: String,
    /// Written as a string or a bare number; kept as text either way.
    #[serde(deserialize_with = "version_text")]
    pub version: String,
    pub nodes: Vec<NodeDefinition>,
    #[serde(default)]
    pub edges: Vec<EdgeDefinition>,
    /// Flows referenced by sub-flow calls, shipped inside this document.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub subflows: Vec<FlowDefinition>,
}

/// Defines a single node: its id, its kind and the kind's parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeDefinition {
    pub id: String,
    pub kind: String,
    #[serde(flatten)]
    pub params: serde_json::Map<String, serde_json::Value>,
}

/// Defines a connection between two nodes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EdgeDefinition {
    pub source: String,
    pub target: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

impl FlowDefinition {
    pub fn from_json_str(json: &str) -> Result<Self, SchemaError> {
        serde_json::from_str(json).map_err(|e| SchemaError::JsonParseError(e.to_string()))
    }

    pub fn from_value(value: &serde_json::Value) -> Result<Self, SchemaError> {
        Self::deserialize(value).map_err(|e| SchemaError::JsonParseError(e.to_string()))
    }

    pub fn to_value(&self) -> serde_json::Value {
        // Every field is plain JSON already, so serialization cannot fail.
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }

    /// The `id@version` key used in diagnostics and cycle detection.
    pub fn key(&self) -> String {
        format!("{}@{}", self.id, self.version)
    }
}

impl NodeDefinition {
    pub fn new(id: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind: kind.into(),
            params: serde_json::Map::new(),
        }
    }

    pub fn with_param(mut self, name: &str, value: serde_json::Value) -> Self {
        self.params.insert(name.to_string(), value);
        self
    }
}

impl EdgeDefinition {
    pub fn new(source: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            label: None,
        }
    }

    pub fn labeled(source: impl Into<String>, label: &str, target: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            label: Some(label.to_string()),
        }
    }
}

/// Reads a flow version written either as text or as a bare JSON number,
/// matching how sub-flow calls accept their version request.
fn version_text<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Version {
        Text(String),
        Number(serde_json::Number),
    }

    let version = Version::deserialize(deserializer).map_err(|_| {
        <D::Error as serde::de::Error>::custom("version must be a string or a number")
    })?;
    match version {
        Version::Text(text) => Ok(text),
        Version::Number(number) => Ok(number.to_string()),
    }
}
