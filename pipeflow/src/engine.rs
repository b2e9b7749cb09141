//! The pipeline engine.
//!
//! [`Cli`] turns pipeline text into an [`ExecutablePipeline`]: it parses the
//! line, merges the environment layers, resolves every part through the
//! registry and validates positions. All of that happens before a single
//! element flows; running the pipeline afterwards is one composed pull
//! through the sink.

use crate::cancellation::CancellationToken;
use crate::env::Env;
use crate::errors::PipelineError;
use crate::parse::{parse_pipeline, PipelinePart};
use crate::registry::Registry;
use crate::stages::{Dependencies, FlowFn, JsStream, ResolvedStage, SinkFn};
use crate::value::JsonElement;
use uuid::Uuid;

/// The pipeline interpreter over one registry and session environment.
#[derive(Debug)]
pub struct Cli {
    registry: Registry,
    env: Env,
}

impl Cli {
    /// Creates an interpreter with the built-in stages.
    #[must_use]
    pub fn new(deps: Dependencies, env: Env) -> Self {
        Self::with_registry(Registry::new(&deps), env)
    }

    /// Creates an interpreter over a custom registry.
    #[must_use]
    pub fn with_registry(registry: Registry, env: Env) -> Self {
        Self { registry, env }
    }

    /// The session environment invocations start from.
    #[must_use]
    pub fn env(&self) -> &Env {
        &self.env
    }

    /// The registry behind this interpreter.
    #[must_use]
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Parses, resolves and validates a pipeline without running it.
    ///
    /// The effective environment is the session environment, overridden by
    /// `overrides`, overridden by assignments written in the line itself.
    /// The first part must be a source, middle parts must be flows and the
    /// last part may be a flow or a sink; without a trailing sink the
    /// list-collecting default is appended.
    pub fn evaluate(
        &self,
        line: &str,
        overrides: &Env,
    ) -> Result<ExecutablePipeline, PipelineError> {
        let parsed = parse_pipeline(line)?;
        let env = self
            .env
            .merged(overrides)
            .merged(&Env::from_pairs(parsed.env));

        let Some((first, rest)) = parsed.parts.split_first() else {
            return Err(PipelineError::parse("the pipeline expression is empty"));
        };
        let source = match self.registry.resolve(first, &env)? {
            ResolvedStage::Source(stream) => stream,
            ResolvedStage::Flow(_) | ResolvedStage::Sink(_) => {
                return Err(position_error(first, "no source data given"));
            }
        };

        let mut flows: Vec<FlowFn> = Vec::with_capacity(rest.len());
        let mut sink: Option<SinkFn> = None;
        for (offset, part) in rest.iter().enumerate() {
            match self.registry.resolve(part, &env)? {
                ResolvedStage::Source(_) => {
                    return Err(position_error(part, "must be the first command"));
                }
                ResolvedStage::Flow(flow) => flows.push(flow),
                ResolvedStage::Sink(resolved) => {
                    if offset + 1 != rest.len() {
                        return Err(position_error(part, "must be the last command"));
                    }
                    sink = Some(resolved);
                }
            }
        }
        let sink = match sink {
            Some(sink) => sink,
            None => self.registry.default_sink(&env)?,
        };

        let run_id = Uuid::new_v4();
        tracing::debug!(%run_id, line = %line, parts = parsed.parts.len(), "pipeline resolved");
        Ok(ExecutablePipeline {
            run_id,
            line: line.to_string(),
            source,
            flows,
            sink,
        })
    }

    /// Evaluates and runs a pipeline in one step.
    pub async fn execute(
        &self,
        line: &str,
        overrides: &Env,
    ) -> Result<Vec<JsonElement>, PipelineError> {
        self.evaluate(line, overrides)?.run().await
    }

    /// Like [`execute`](Self::execute), aborting when `token` is cancelled.
    ///
    /// Cancellation drops the composed stream at its current suspension
    /// point. A batch already handed to the store is not rolled back, but
    /// nothing further is pulled or written.
    pub async fn execute_with_token(
        &self,
        line: &str,
        overrides: &Env,
        token: &CancellationToken,
    ) -> Result<Vec<JsonElement>, PipelineError> {
        let pipeline = self.evaluate(line, overrides)?;
        let run_id = pipeline.run_id();
        tokio::select! {
            biased;
            reason = token.cancelled() => {
                tracing::info!(%run_id, reason = %reason, "pipeline cancelled");
                Err(PipelineError::cancelled(reason))
            }
            result = pipeline.run() => result,
        }
    }
}

fn position_error(part: &PipelinePart, message: &str) -> PipelineError {
    PipelineError::parse(format!(
        "Command '{}' can not be used in this position: {message}",
        part.name
    ))
}

/// A fully resolved pipeline, ready to run once.
///
/// Nothing has been pulled yet: dropping it without calling
/// [`run`](Self::run) makes no store calls.
pub struct ExecutablePipeline {
    run_id: Uuid,
    line: String,
    source: JsStream,
    flows: Vec<FlowFn>,
    sink: SinkFn,
}

impl ExecutablePipeline {
    /// The id tying this run's log events together.
    #[must_use]
    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// The pipeline text this was evaluated from.
    #[must_use]
    pub fn line(&self) -> &str {
        &self.line
    }

    /// Composes the stages and drives the stream through the sink.
    pub async fn run(self) -> Result<Vec<JsonElement>, PipelineError> {
        let Self {
            run_id,
            line,
            source,
            flows,
            sink,
        } = self;
        tracing::debug!(%run_id, line = %line, "pipeline started");
        let composed = flows
            .into_iter()
            .fold(source, |stream, flow| flow(stream));
        match sink(composed).await {
            Ok(elements) => {
                tracing::info!(%run_id, elements = elements.len(), "pipeline finished");
                Ok(elements)
            }
            Err(error) => {
                tracing::warn!(%run_id, %error, "pipeline failed");
                Err(error)
            }
        }
    }
}

impl std::fmt::Debug for ExecutablePipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutablePipeline")
            .field("run_id", &self.run_id)
            .field("line", &self.line)
            .field("flows", &self.flows.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryGraphAccess;
    use crate::value::section;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::sync::Arc;

    fn cli() -> Cli {
        let deps = Dependencies::new(Arc::new(MemoryGraphAccess::new()));
        Cli::new(deps, Env::new())
    }

    async fn run(line: &str) -> Result<Vec<JsonElement>, PipelineError> {
        cli().execute(line, &Env::new()).await
    }

    #[tokio::test]
    async fn test_execute_appends_the_implicit_sink() {
        assert_eq!(run("echo [1, 2]").await.unwrap(), vec![json!(1), json!(2)]);
    }

    #[tokio::test]
    async fn test_execute_with_explicit_sink() {
        assert_eq!(run("echo 1 | out").await.unwrap(), vec![json!(1)]);
    }

    #[tokio::test]
    async fn test_execute_composes_flows_in_order() {
        assert_eq!(
            run("echo [1, 2, 3, 1] | uniq | chunk 2").await.unwrap(),
            vec![json!([1, 2]), json!([3])]
        );
    }

    #[tokio::test]
    async fn test_flow_in_first_position_fails() {
        let err = run("count").await.unwrap_err();
        assert_eq!(
            err.to_string(),
            "Command 'count' can not be used in this position: no source data given"
        );
    }

    #[tokio::test]
    async fn test_source_after_first_position_fails() {
        let err = run("echo [1] | env").await.unwrap_err();
        assert_eq!(
            err.to_string(),
            "Command 'env' can not be used in this position: must be the first command"
        );
    }

    #[tokio::test]
    async fn test_sink_before_last_position_fails() {
        let err = run("echo [1] | out | count").await.unwrap_err();
        assert_eq!(
            err.to_string(),
            "Command 'out' can not be used in this position: must be the last command"
        );
    }

    #[tokio::test]
    async fn test_unknown_command_fails() {
        let err = run("echo [1] | tail 5").await.unwrap_err();
        assert_eq!(err.to_string(), "Command 'tail' is not known");
    }

    #[tokio::test]
    async fn test_environment_layers_merge_in_order() {
        let deps = Dependencies::new(Arc::new(MemoryGraphAccess::new()));
        let session = Env::new().with("graph", "prod").with("section", "reported");
        let cli = Cli::new(deps, session);
        let overrides = Env::new().with("section", "desired");

        let result = cli
            .execute("section=metadata env", &overrides)
            .await
            .unwrap();
        assert_eq!(
            result,
            vec![json!({"graph": "prod", "section": "metadata"})]
        );

        // the parsed assignments lived for that one invocation only
        let result = cli.execute("env", &overrides).await.unwrap();
        assert_eq!(result, vec![json!({"graph": "prod", "section": "desired"})]);

        let result = cli.execute("env", &Env::new()).await.unwrap();
        assert_eq!(
            result,
            vec![json!({"graph": "prod", "section": "reported"})]
        );
    }

    #[tokio::test]
    async fn test_evaluate_makes_no_store_calls() {
        let access = Arc::new(MemoryGraphAccess::new());
        let store = access.add_graph("prod");
        store.insert_node(
            "n1",
            json!({"kind": "volume"})
                .as_object()
                .cloned()
                .unwrap_or_default(),
        );
        let cli = Cli::new(
            Dependencies::new(access),
            Env::new().with("graph", "prod"),
        );

        let pipeline = cli.evaluate("match all | mark_delete", &Env::new()).unwrap();
        assert_eq!(pipeline.line(), "match all | mark_delete");
        drop(pipeline);

        assert_eq!(
            store.node("n1").unwrap().get(section::DESIRED),
            Some(&json!({}))
        );
    }

    #[test]
    fn test_run_ids_are_unique() {
        let cli = cli();
        let a = cli.evaluate("echo 1", &Env::new()).unwrap();
        let b = cli.evaluate("echo 1", &Env::new()).unwrap();
        assert_ne!(a.run_id(), b.run_id());
    }

    #[tokio::test]
    async fn test_cancelled_token_wins_over_the_run() {
        let token = CancellationToken::new();
        token.cancel("shutdown requested");
        let err = cli()
            .execute_with_token("echo [1]", &Env::new(), &token)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Pipeline cancelled: shutdown requested");
    }

    #[tokio::test]
    async fn test_uncancelled_token_lets_the_run_finish() {
        let token = CancellationToken::new();
        let result = cli()
            .execute_with_token("echo [1, 2] | count", &Env::new(), &token)
            .await
            .unwrap();
        assert_eq!(result, vec![json!({"matched": 2, "not_matched": 0})]);
    }
}
