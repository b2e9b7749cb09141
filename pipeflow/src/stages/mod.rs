//! Stage contracts and the built-in stages.
//!
//! Every stage belongs to exactly one of three namespaces: a source produces
//! the element stream, a flow transforms it and a sink drives it to the
//! pipeline result. `parse` runs while the pipeline is assembled and must
//! validate everything it can up front; the stream or closure it returns
//! does the actual work lazily, pulled by the sink.

mod desired;
mod flows;
mod sinks;
mod sources;

pub use desired::{DesireFlow, MarkDeleteFlow};
pub use flows::{ChunkFlow, CountFlow, FlattenFlow, UniqFlow};
pub use sinks::ListSink;
pub use sources::{EchoSource, EnvSource, MatchSource};

use crate::env::Env;
use crate::errors::PipelineError;
use crate::store::GraphAccess;
use crate::value::JsonElement;
use futures::future::BoxFuture;
use futures::stream::BoxStream;
use std::sync::Arc;

/// The stream of JSON elements flowing between stages.
pub type JsStream = BoxStream<'static, Result<JsonElement, PipelineError>>;

/// A transformation from one element stream to another.
pub type FlowFn = Box<dyn FnOnce(JsStream) -> JsStream + Send>;

/// A terminal driver turning a stream into the pipeline result.
pub type SinkFn =
    Box<dyn FnOnce(JsStream) -> BoxFuture<'static, Result<Vec<JsonElement>, PipelineError>> + Send>;

/// Collaborators handed to stages when the registry is built.
#[derive(Clone)]
pub struct Dependencies {
    /// Graph store access, keyed by graph name.
    pub graphs: Arc<dyn GraphAccess>,
}

impl Dependencies {
    /// Creates a dependency bundle.
    #[must_use]
    pub fn new(graphs: Arc<dyn GraphAccess>) -> Self {
        Self { graphs }
    }
}

impl std::fmt::Debug for Dependencies {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dependencies").finish_non_exhaustive()
    }
}

/// A stage that produces elements. Only valid as the first pipeline part.
pub trait SourcePart: Send + Sync {
    /// The command name this stage registers under.
    fn name(&self) -> &'static str;

    /// One-line usage summary.
    fn usage(&self) -> &'static str;

    /// Validates the argument and builds the element stream.
    fn parse(&self, arg: Option<&str>, env: &Env) -> Result<JsStream, PipelineError>;
}

/// A stage that transforms the element stream.
pub trait FlowPart: Send + Sync {
    /// The command name this stage registers under.
    fn name(&self) -> &'static str;

    /// One-line usage summary.
    fn usage(&self) -> &'static str;

    /// Validates the argument and builds the stream transformation.
    fn parse(&self, arg: Option<&str>, env: &Env) -> Result<FlowFn, PipelineError>;
}

/// A stage that drives the stream. Only valid as the last pipeline part.
pub trait SinkPart: Send + Sync {
    /// The command name this stage registers under.
    fn name(&self) -> &'static str;

    /// One-line usage summary.
    fn usage(&self) -> &'static str;

    /// Validates the argument and builds the sink driver.
    fn parse(&self, arg: Option<&str>, env: &Env) -> Result<SinkFn, PipelineError>;
}

/// A stage resolved against its namespace, ready to be composed.
pub enum ResolvedStage {
    /// Produces the stream.
    Source(JsStream),
    /// Transforms the stream.
    Flow(FlowFn),
    /// Terminates the pipeline.
    Sink(SinkFn),
}

/// Rejects an argument for stages that take none.
pub(crate) fn expect_no_arg(name: &str, arg: Option<&str>) -> Result<(), PipelineError> {
    match arg {
        Some(text) => Err(PipelineError::parse(format!(
            "'{name}' takes no argument, got '{text}'"
        ))),
        None => Ok(()),
    }
}
