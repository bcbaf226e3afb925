//! Compiles flow documents into validated [`FlowGraph`]s.
//!
//! Each node definition is handed to the [`NodeParser`] registered for its
//! `kind`; sub-flow calls are resolved eagerly, first against the sub-flows
//! embedded in the document and then against the injected [`FlowResolver`].

mod expression;
pub mod parsing;
mod resolver;

pub use expression::parse_expression;
pub use parsing::NodeParser;
pub use resolver::{
    DirectoryResolver, FlowRegistry, FlowResolver, NoResolver, VersionReq, compare_versions,
};

use crate::error::{ParseError, ReferenceError, SchemaError};
use crate::flow::FlowDefinition;
use crate::graph::{FlowGraph, Node};
use ahash::AHashMap;
use parsing::{DEFAULT_ALIASES, create_parser_by_name, register_default_parsers};
use std::sync::Arc;

pub struct Parser {
    definition: FlowDefinition,
    registry: AHashMap<String, Box<dyn NodeParser>>,
    resolver: Arc<dyn FlowResolver>,
}

pub struct ParserBuilder {
    definition: FlowDefinition,
    registry: AHashMap<String, Box<dyn NodeParser>>,
    resolver: Arc<dyn FlowResolver>,
}

impl ParserBuilder {
    pub fn new(definition: FlowDefinition) -> Self {
        let mut registry: AHashMap<String, Box<dyn NodeParser>> = AHashMap::new();
        register_default_parsers(&mut registry);
        for (alias, builtin) in DEFAULT_ALIASES {
            if let Some(parser) = create_parser_by_name(builtin) {
                registry.insert(alias.to_string(), parser);
            }
        }
        Self {
            definition,
            registry,
            resolver: Arc::new(NoResolver),
        }
    }

    /// Consulted for sub-flows the document does not embed.
    pub fn with_resolver(self, resolver: impl FlowResolver + 'static) -> Self {
        self.with_shared_resolver(Arc::new(resolver))
    }

    pub fn with_shared_resolver(mut self, resolver: Arc<dyn FlowResolver>) -> Self {
        self.resolver = resolver;
        self
    }

    /// Lets documents use `user_kind` for the built-in `builtin_kind`.
    pub fn with_kind_alias(mut self, user_kind: &str, builtin_kind: &str) -> Self {
        match create_parser_by_name(builtin_kind) {
            Some(parser) => {
                self.registry.insert(user_kind.to_string(), parser);
            }
            None => log::warn!(
                "Ignoring alias '{}': '{}' is not a built-in node kind",
                user_kind,
                builtin_kind
            ),
        }
        self
    }

    pub fn with_custom_parser(mut self, parser: Box<dyn NodeParser>) -> Self {
        self.registry.insert(parser.kind().to_string(), parser);
        self
    }

    pub fn build(self) -> Parser {
        Parser {
            definition: self.definition,
            registry: self.registry,
            resolver: self.resolver,
        }
    }
}

impl Parser {
    pub fn builder(definition: FlowDefinition) -> ParserBuilder {
        ParserBuilder::new(definition)
    }

    /// A parser with the built-in kinds and no external resolver.
    pub fn new(definition: FlowDefinition) -> Self {
        ParserBuilder::new(definition).build()
    }

    pub fn from_value(value: &serde_json::Value) -> Result<Self, ParseError> {
        Ok(Self::new(FlowDefinition::from_value(value)?))
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(json: &str) -> Result<Self, ParseError> {
        Ok(Self::new(FlowDefinition::from_json_str(json)?))
    }

    pub fn definition(&self) -> &FlowDefinition {
        &self.definition
    }

    /// Compiles the document, its sub-flows included, into a validated graph.
    pub fn parse(&self) -> Result<FlowGraph, ParseError> {
        let mut ctx = ParseContext {
            registry: &self.registry,
            resolver: self.resolver.as_ref(),
            embedded: FlowRegistry::new(),
            cache: AHashMap::new(),
            stack: Vec::new(),
        };

        // A sub-flow calling back into the main flow must show up as a cycle.
        let mut main = self.definition.clone();
        main.subflows.clear();
        ctx.embedded.register(main);

        let graph = ctx.compile(&self.definition)?;
        log::debug!(
            "Parsed flow '{}@{}': {} nodes, {} compiled sub-flows",
            graph.id(),
            graph.version(),
            graph.nodes().len(),
            ctx.cache.len()
        );
        Ok(graph)
    }
}

/// State shared by every node parser during one [`Parser::parse`] call.
pub struct ParseContext<'a> {
    registry: &'a AHashMap<String, Box<dyn NodeParser>>,
    resolver: &'a dyn FlowResolver,
    embedded: FlowRegistry,
    cache: AHashMap<String, Arc<FlowGraph>>,
    /// `id@version` of the flows currently being compiled, outermost first.
    stack: Vec<String>,
}

impl ParseContext<'_> {
    fn compile(&mut self, definition: &FlowDefinition) -> Result<FlowGraph, ParseError> {
        if definition.id.trim().is_empty() {
            return Err(SchemaError::MissingField {
                context: "flow".to_string(),
                field: "id".to_string(),
            }
            .into());
        }
        for embedded in &definition.subflows {
            self.embedded.register_with_embedded(embedded.clone());
        }

        self.stack.push(definition.key());
        let result = self.compile_nodes(definition);
        self.stack.pop();
        result
    }

    fn compile_nodes(&mut self, definition: &FlowDefinition) -> Result<FlowGraph, ParseError> {
        let registry = self.registry;
        let mut builder = FlowGraph::builder(&definition.id, &definition.version);
        for node in &definition.nodes {
            let parser = registry
                .get(&node.kind)
                .ok_or_else(|| SchemaError::UnknownKind {
                    node_id: node.id.clone(),
                    kind: node.kind.clone(),
                })?;
            let kind = parser.parse(node, self)?;
            builder.add_node(Node::new(&node.id, kind));
        }
        for edge in &definition.edges {
            builder.add_edge(&edge.source, edge.label.as_deref(), &edge.target);
        }
        Ok(builder.build()?)
    }

    /// Finds, compiles and caches the flow a sub-flow call refers to.
    pub fn resolve_subflow(
        &mut self,
        flow_id: &str,
        version: &VersionReq,
    ) -> Result<Arc<FlowGraph>, ParseError> {
        let definition = match self.embedded.get(flow_id, version) {
            Some(definition) => definition.clone(),
            None => self.resolver.resolve(flow_id, version)?.ok_or_else(|| {
                ReferenceError::Unresolved {
                    flow_id: flow_id.to_string(),
                    version: version.to_string(),
                }
            })?,
        };
        if definition.id != flow_id || !version.matches(&definition.version) {
            return Err(ReferenceError::ResolverFailed {
                flow_id: flow_id.to_string(),
                message: format!(
                    "asked for version '{}' but got '{}'",
                    version,
                    definition.key()
                ),
            }
            .into());
        }

        let key = definition.key();
        if let Some(position) = self.stack.iter().position(|entry| *entry == key) {
            let mut cycle = self.stack[position..].to_vec();
            cycle.push(key);
            return Err(ReferenceError::CircularReference(cycle).into());
        }
        if let Some(graph) = self.cache.get(&key) {
            return Ok(Arc::clone(graph));
        }

        log::debug!("Resolving sub-flow '{}' for '{}'", key, version);
        let graph = Arc::new(self.compile(&definition)?);
        self.cache.insert(key, Arc::clone(&graph));
        Ok(graph)
    }
}
