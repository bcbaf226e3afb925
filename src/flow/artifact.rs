use crate::error::ArtifactError;
use crate::graph::FlowGraph;
use bincode::config::standard;
use bincode::serde::{decode_from_slice, encode_to_vec};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{Read, Write};
use std::path::Path;

/// Bumped whenever the serialized graph layout changes.
const ARTIFACT_FORMAT: u32 = 1;

/// A compiled flow, ready to be stored and reloaded without re-parsing.
#[derive(Serialize, Deserialize, Debug)]
pub struct CompiledFlow {
    format: u32,
    pub graph: FlowGraph,
}

impl CompiledFlow {
    pub fn new(graph: FlowGraph) -> Self {
        Self {
            format: ARTIFACT_FORMAT,
            graph,
        }
    }

    pub fn into_graph(self) -> FlowGraph {
        self.graph
    }

    /// Saves the compiled flow to a file using the bincode format.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ArtifactError> {
        let path = path.as_ref();
        let bytes = self.to_bytes()?;
        let mut file = fs::File::create(path).map_err(|e| {
            ArtifactError::Generic(format!("Could not create file '{}': {}", path.display(), e))
        })?;
        file.write_all(&bytes).map_err(|e| {
            ArtifactError::Generic(format!("Could not write to file '{}': {}", path.display(), e))
        })?;
        log::debug!(
            "Saved compiled flow '{}@{}' ({} bytes) to {}",
            self.graph.id(),
            self.graph.version(),
            bytes.len(),
            path.display()
        );
        Ok(())
    }

    /// Loads a compiled flow from a file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ArtifactError> {
        let path = path.as_ref();
        let mut file = fs::File::open(path).map_err(|e| {
            ArtifactError::Generic(format!("Could not open file '{}': {}", path.display(), e))
        })?;
        let mut bytes = Vec::new();
        file.read_to_end(&mut bytes).map_err(|e| {
            ArtifactError::Generic(format!(
                "Could not read from file '{}': {}",
                path.display(),
                e
            ))
        })?;
        Self::from_bytes(&bytes)
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, ArtifactError> {
        encode_to_vec(self, standard())
            .map_err(|e| ArtifactError::Generic(format!("Serialization failed: {}", e)))
    }

    /// Deserializes a compiled flow from a byte slice.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ArtifactError> {
        let artifact: Self = decode_from_slice(bytes, standard())
            .map(|(artifact, _)| artifact) // bincode 2 returns a tuple (data, bytes_read)
            .map_err(|e| ArtifactError::Generic(format!("Deserialization failed: {}", e)))?;
        if artifact.format != ARTIFACT_FORMAT {
            return Err(ArtifactError::Generic(format!(
                "Unsupported artifact format {} (expected {})",
                artifact.format, ARTIFACT_FORMAT
            )));
        }
        Ok(artifact)
    }
}
