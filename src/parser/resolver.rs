use crate::error::ReferenceError;
use crate::flow::FlowDefinition;
use ahash::AHashMap;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::fs;
use std::path::PathBuf;

/// The version a sub-flow call asks for.
///
/// Versions are opaque strings: a request either names one exactly or, with
/// `*`, accepts any version and takes the highest one available.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VersionReq {
    Exact(String),
    Any,
}

impl VersionReq {
    pub fn parse(text: Option<&str>) -> Self {
        match text.map(str::trim) {
            None | Some("") | Some("*") => VersionReq::Any,
            Some(version) => VersionReq::Exact(version.to_string()),
        }
    }

    pub fn matches(&self, version: &str) -> bool {
        match self {
            VersionReq::Exact(wanted) => wanted == version,
            VersionReq::Any => true,
        }
    }
}

impl fmt::Display for VersionReq {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VersionReq::Exact(version) => write!(f, "{}", version),
            VersionReq::Any => write!(f, "*"),
        }
    }
}

/// Orders version strings component-wise: numeric parts numerically, other
/// parts as text.
pub fn compare_versions(a: &str, b: &str) -> Ordering {
    let mut left = a.split('.');
    let mut right = b.split('.');
    loop {
        match (left.next(), right.next()) {
            (None, None) => return Ordering::Equal,
            (Some(_), None) => return Ordering::Greater,
            (None, Some(_)) => return Ordering::Less,
            (Some(l), Some(r)) => {
                let ordering = match (l.parse::<u64>(), r.parse::<u64>()) {
                    (Ok(l), Ok(r)) => l.cmp(&r),
                    _ => l.cmp(r),
                };
                if ordering != Ordering::Equal {
                    return ordering;
                }
            }
        }
    }
}

/// Supplies flow definitions for sub-flow calls.
///
/// The parser asks for each `(id, version)` once and compiles what it gets
/// back; returning `Ok(None)` means "not here" and ends in a
/// `ReferenceError::Unresolved`.
pub trait FlowResolver: Send + Sync {
    fn resolve(
        &self,
        flow_id: &str,
        version: &VersionReq,
    ) -> Result<Option<FlowDefinition>, ReferenceError>;
}

/// A resolver that never finds anything.
pub struct NoResolver;

impl FlowResolver for NoResolver {
    fn resolve(&self, _: &str, _: &VersionReq) -> Result<Option<FlowDefinition>, ReferenceError> {
        Ok(None)
    }
}

/// In-memory flow definitions keyed by id, each id holding any number of versions.
#[derive(Debug, Clone, Default)]
pub struct FlowRegistry {
    flows: AHashMap<String, Vec<FlowDefinition>>,
}

impl FlowRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a definition, replacing one with the same id and version.
    pub fn register(&mut self, definition: FlowDefinition) {
        let versions = self.flows.entry(definition.id.clone()).or_default();
        versions.retain(|existing| existing.version != definition.version);
        versions.push(definition);
    }

    /// Registers a definition and, recursively, the sub-flows it embeds.
    pub fn register_with_embedded(&mut self, mut definition: FlowDefinition) {
        for embedded in std::mem::take(&mut definition.subflows) {
            self.register_with_embedded(embedded);
        }
        self.register(definition);
    }

    pub fn with(mut self, definition: FlowDefinition) -> Self {
        self.register(definition);
        self
    }

    pub fn len(&self) -> usize {
        self.flows.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.flows.is_empty()
    }

    pub fn get(&self, flow_id: &str, version: &VersionReq) -> Option<&FlowDefinition> {
        self.flows
            .get(flow_id)?
            .iter()
            .filter(|definition| version.matches(&definition.version))
            .max_by(|a, b| compare_versions(&a.version, &b.version))
    }
}

impl FlowResolver for FlowRegistry {
    fn resolve(
        &self,
        flow_id: &str,
        version: &VersionReq,
    ) -> Result<Option<FlowDefinition>, ReferenceError> {
        Ok(self.get(flow_id, version).cloned())
    }
}

/// Loads flows from `<root>/<id>.json` and `<root>/<id>@<version>.json` files.
#[derive(Debug, Clone)]
pub struct DirectoryResolver {
    root: PathBuf,
}

impl DirectoryResolver {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn failed(flow_id: &str, message: String) -> ReferenceError {
        ReferenceError::ResolverFailed {
            flow_id: flow_id.to_string(),
            message,
        }
    }
}

impl FlowResolver for DirectoryResolver {
    fn resolve(
        &self,
        flow_id: &str,
        version: &VersionReq,
    ) -> Result<Option<FlowDefinition>, ReferenceError> {
        let entries = match fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) => {
                return Err(Self::failed(
                    flow_id,
                    format!("cannot list '{}': {}", self.root.display(), e),
                ));
            }
        };

        let plain = format!("{}.json", flow_id);
        let versioned_prefix = format!("{}@", flow_id);
        let mut candidates = FlowRegistry::new();
        for entry in entries.flatten() {
            let name = entry.file_name().to_string_lossy().into_owned();
            if name != plain && !(name.starts_with(&versioned_prefix) && name.ends_with(".json")) {
                continue;
            }
            let path = entry.path();
            let text = fs::read_to_string(&path)
                .map_err(|e| Self::failed(flow_id, format!("{}: {}", path.display(), e)))?;
            let definition = FlowDefinition::from_json_str(&text)
                .map_err(|e| Self::failed(flow_id, format!("{}: {}", path.display(), e)))?;
            if definition.id == flow_id {
                candidates.register(definition);
            }
        }
        Ok(candidates.get(flow_id, version).cloned())
    }
}
