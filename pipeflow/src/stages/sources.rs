//! Source stages: they start a pipeline by producing elements.

use super::{expect_no_arg, Dependencies, JsStream, SourcePart};
use crate::env::{self, Env};
use crate::errors::PipelineError;
use crate::query::{parse_query, QueryModel};
use crate::value::JsonElement;
use futures::{future, stream, StreamExt, TryStreamExt};

/// `echo <json>`: emits the given JSON literal.
///
/// An array argument is unrolled into its elements; any other value becomes
/// a single element.
#[derive(Debug, Default)]
pub struct EchoSource;

impl SourcePart for EchoSource {
    fn name(&self) -> &'static str {
        "echo"
    }

    fn usage(&self) -> &'static str {
        "echo <json> - emit the given JSON literal"
    }

    fn parse(&self, arg: Option<&str>, _env: &Env) -> Result<JsStream, PipelineError> {
        let Some(arg) = arg else {
            return Err(PipelineError::parse("echo needs a JSON literal argument"));
        };
        let value: JsonElement = serde_json::from_str(arg).map_err(|err| {
            PipelineError::parse(format!("echo argument is not valid JSON: {err}"))
        })?;
        let stream = match value {
            JsonElement::Array(items) => stream::iter(items).map(Ok).boxed(),
            single => stream::once(future::ready(Ok(single))).boxed(),
        };
        Ok(stream)
    }
}

/// `env`: emits the effective environment as a single mapping.
#[derive(Debug, Default)]
pub struct EnvSource;

impl SourcePart for EnvSource {
    fn name(&self) -> &'static str {
        "env"
    }

    fn usage(&self) -> &'static str {
        "env - emit the effective environment as a single mapping"
    }

    fn parse(&self, arg: Option<&str>, env: &Env) -> Result<JsStream, PipelineError> {
        expect_no_arg("env", arg)?;
        let snapshot = JsonElement::Object(env.as_json());
        Ok(stream::once(future::ready(Ok(snapshot))).boxed())
    }
}

/// `match <query>`: streams the graph nodes matching a query.
///
/// Requires `graph` in the environment and evaluates against the section
/// selected there (`reported` unless overridden). The store call happens
/// when the sink first polls the stream, not at parse time.
pub struct MatchSource {
    deps: Dependencies,
}

impl MatchSource {
    /// Creates the match source over the given dependencies.
    #[must_use]
    pub fn new(deps: Dependencies) -> Self {
        Self { deps }
    }
}

impl SourcePart for MatchSource {
    fn name(&self) -> &'static str {
        "match"
    }

    fn usage(&self) -> &'static str {
        "match <query> - stream the graph nodes matching the query"
    }

    fn parse(&self, arg: Option<&str>, env: &Env) -> Result<JsStream, PipelineError> {
        let Some(arg) = arg else {
            return Err(PipelineError::parse("match needs a query to execute"));
        };
        let graph = env.require(self.name(), env::GRAPH)?;
        let store = self.deps.graphs.graph_store(graph)?;
        let model = QueryModel::new(parse_query(arg)?, env.section());
        let deferred = async move {
            match store.query_list(model, true).await {
                Ok(nodes) => nodes
                    .map_ok(JsonElement::Object)
                    .map_err(PipelineError::from)
                    .boxed(),
                Err(err) => stream::once(future::ready(Err(PipelineError::from(err)))).boxed(),
            }
        };
        Ok(stream::once(deferred).flatten().boxed())
    }
}
