//! Desired-state stages: flows that patch graph nodes while streaming.

use super::{expect_no_arg, Dependencies, FlowFn, FlowPart};
use crate::env::{self, Env};
use crate::errors::PipelineError;
use crate::parse::parse_key_values;
use crate::value::{Json, JsonElement, NODE_ID};
use futures::{StreamExt, TryStreamExt};
use std::sync::Arc;

/// Elements buffered per desired-state store call.
const UPDATE_BATCH_SIZE: usize = 1000;

/// `desire [key=value ...]`: merges the assignments into the desired section
/// of each incoming node.
///
/// Accepts node mappings (the id is read from `_id`) as well as plain id
/// strings. Nodes are patched in batches with one store call per batch, and
/// one result document per updated node is emitted, holding the sections
/// named by `result_section`. A null value deletes the key from the desired
/// section.
pub struct DesireFlow {
    deps: Dependencies,
}

impl DesireFlow {
    /// Creates the desire flow over the given dependencies.
    #[must_use]
    pub fn new(deps: Dependencies) -> Self {
        Self { deps }
    }
}

impl FlowPart for DesireFlow {
    fn name(&self) -> &'static str {
        "desire"
    }

    fn usage(&self) -> &'static str {
        "desire [key=value ...] - merge the assignments into each node's desired section"
    }

    fn parse(&self, arg: Option<&str>, env: &Env) -> Result<FlowFn, PipelineError> {
        let patch = match arg {
            Some(text) => parse_key_values(text)?,
            None => Json::new(),
        };
        desired_update_flow(self.name(), &self.deps, env, patch)
    }
}

/// `mark_delete`: marks each incoming node for deletion.
///
/// Shorthand for `desire delete=true`; cleanup machinery later picks up the
/// flag from the desired section.
pub struct MarkDeleteFlow {
    deps: Dependencies,
}

impl MarkDeleteFlow {
    /// Creates the mark_delete flow over the given dependencies.
    #[must_use]
    pub fn new(deps: Dependencies) -> Self {
        Self { deps }
    }
}

impl FlowPart for MarkDeleteFlow {
    fn name(&self) -> &'static str {
        "mark_delete"
    }

    fn usage(&self) -> &'static str {
        "mark_delete - mark each incoming node for deletion"
    }

    fn parse(&self, arg: Option<&str>, env: &Env) -> Result<FlowFn, PipelineError> {
        expect_no_arg(self.name(), arg)?;
        let mut patch = Json::new();
        patch.insert("delete".to_string(), JsonElement::Bool(true));
        desired_update_flow(self.name(), &self.deps, env, patch)
    }
}

/// Builds a flow that applies `patch` to the desired section of every
/// incoming node. The graph is resolved here so a bad environment fails
/// before any element flows.
fn desired_update_flow(
    name: &'static str,
    deps: &Dependencies,
    env: &Env,
    patch: Json,
) -> Result<FlowFn, PipelineError> {
    let graph = env.require(name, env::GRAPH)?;
    let store = deps.graphs.graph_store(graph)?;
    let result_sections = env.result_sections();
    Ok(Box::new(move |input| {
        input
            .try_chunks(UPDATE_BATCH_SIZE)
            .map_err(|err| err.1)
            .and_then(move |batch| {
                let store = Arc::clone(&store);
                let patch = patch.clone();
                let result_sections = result_sections.clone();
                async move {
                    let ids = batch
                        .iter()
                        .map(|element| node_id(name, element))
                        .collect::<Result<Vec<String>, PipelineError>>()?;
                    tracing::debug!(stage = name, nodes = ids.len(), "updating desired state");
                    let updated = store
                        .update_nodes_desired(patch, ids, result_sections, true)
                        .await?;
                    Ok(updated
                        .map_ok(JsonElement::Object)
                        .map_err(PipelineError::from)
                        .boxed())
                }
            })
            .try_flatten()
            .boxed()
    }))
}

/// Reads the node id out of a stream element: either the element is the id
/// string itself or a mapping carrying `_id`.
fn node_id(stage: &str, element: &JsonElement) -> Result<String, PipelineError> {
    match element {
        JsonElement::String(id) => Ok(id.clone()),
        JsonElement::Object(node) => match node.get(NODE_ID) {
            Some(JsonElement::String(id)) => Ok(id.clone()),
            Some(other) => Err(PipelineError::data_shape(
                stage,
                format!("the '{NODE_ID}' property must be a string, got {other}"),
            )),
            None => Err(PipelineError::data_shape(
                stage,
                format!("mapping has no '{NODE_ID}' property"),
            )),
        },
        other => Err(PipelineError::data_shape(
            stage,
            format!("expected a node mapping or an id string, got {other}"),
        )),
    }
}
