//! Name resolution for pipeline parts.
//!
//! A [`Registry`] owns the stages a pipeline expression can refer to, split
//! into the three namespaces of [`ResolvedStage`]. The engine is handed a
//! registry instead of reaching for global state, so tests and embedders can
//! assemble their own stage sets.

use crate::env::Env;
use crate::errors::PipelineError;
use crate::parse::PipelinePart;
use crate::stages::{
    ChunkFlow, CountFlow, Dependencies, DesireFlow, EchoSource, EnvSource, FlattenFlow, FlowPart,
    ListSink, MarkDeleteFlow, MatchSource, ResolvedStage, SinkFn, SinkPart, SourcePart, UniqFlow,
};
use std::collections::HashMap;

/// The namespace a registered part belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PartKind {
    /// Produces the element stream; first position only.
    Source,
    /// Transforms the element stream.
    Flow,
    /// Drives the stream; last position only.
    Sink,
}

/// Maps command names to the stages they resolve to.
///
/// [`Registry::new`] registers the built-in stages; embedders can add their
/// own parts on top. Names are looked up source first, then flow, then sink.
pub struct Registry {
    sources: HashMap<&'static str, Box<dyn SourcePart>>,
    flows: HashMap<&'static str, Box<dyn FlowPart>>,
    sinks: HashMap<&'static str, Box<dyn SinkPart>>,
}

impl Registry {
    /// Creates a registry holding the built-in stages.
    #[must_use]
    pub fn new(deps: &Dependencies) -> Self {
        let mut registry = Self {
            sources: HashMap::new(),
            flows: HashMap::new(),
            sinks: HashMap::new(),
        };
        registry.register_source(Box::new(EchoSource));
        registry.register_source(Box::new(EnvSource));
        registry.register_source(Box::new(MatchSource::new(deps.clone())));
        registry.register_flow(Box::new(CountFlow));
        registry.register_flow(Box::new(ChunkFlow));
        registry.register_flow(Box::new(FlattenFlow));
        registry.register_flow(Box::new(UniqFlow));
        registry.register_flow(Box::new(DesireFlow::new(deps.clone())));
        registry.register_flow(Box::new(MarkDeleteFlow::new(deps.clone())));
        registry.register_sink(Box::new(ListSink));
        registry
    }

    /// Registers a source part under its name, replacing any previous one.
    pub fn register_source(&mut self, part: Box<dyn SourcePart>) {
        self.sources.insert(part.name(), part);
    }

    /// Registers a flow part under its name, replacing any previous one.
    pub fn register_flow(&mut self, part: Box<dyn FlowPart>) {
        self.flows.insert(part.name(), part);
    }

    /// Registers a sink part under its name, replacing any previous one.
    pub fn register_sink(&mut self, part: Box<dyn SinkPart>) {
        self.sinks.insert(part.name(), part);
    }

    /// Resolves one pipeline part against the registered stages, running its
    /// parse-time validation.
    pub fn resolve(&self, part: &PipelinePart, env: &Env) -> Result<ResolvedStage, PipelineError> {
        if let Some(source) = self.sources.get(part.name.as_str()) {
            return Ok(ResolvedStage::Source(source.parse(part.arg(), env)?));
        }
        if let Some(flow) = self.flows.get(part.name.as_str()) {
            return Ok(ResolvedStage::Flow(flow.parse(part.arg(), env)?));
        }
        if let Some(sink) = self.sinks.get(part.name.as_str()) {
            return Ok(ResolvedStage::Sink(sink.parse(part.arg(), env)?));
        }
        Err(PipelineError::unknown_command(&part.name))
    }

    /// The sink appended when a pipeline does not end in one.
    pub fn default_sink(&self, env: &Env) -> Result<SinkFn, PipelineError> {
        ListSink.parse(None, env)
    }

    /// The namespace a command name is registered in, if any.
    #[must_use]
    pub fn kind_of(&self, name: &str) -> Option<PartKind> {
        if self.sources.contains_key(name) {
            Some(PartKind::Source)
        } else if self.flows.contains_key(name) {
            Some(PartKind::Flow)
        } else if self.sinks.contains_key(name) {
            Some(PartKind::Sink)
        } else {
            None
        }
    }

    /// All registered command names, sorted.
    #[must_use]
    pub fn part_names(&self) -> Vec<&'static str> {
        let mut names: Vec<&'static str> = self
            .sources
            .keys()
            .chain(self.flows.keys())
            .chain(self.sinks.keys())
            .copied()
            .collect();
        names.sort_unstable();
        names
    }

    /// The usage line of a command, if it is registered.
    #[must_use]
    pub fn usage_of(&self, name: &str) -> Option<&'static str> {
        if let Some(source) = self.sources.get(name) {
            Some(source.usage())
        } else if let Some(flow) = self.flows.get(name) {
            Some(flow.usage())
        } else {
            self.sinks.get(name).map(|sink| sink.usage())
        }
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("parts", &self.part_names())
            .finish()
    }
}
