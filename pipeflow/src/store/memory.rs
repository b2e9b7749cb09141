//! In-memory graph store used by tests and small setups.

use super::{GraphAccess, GraphStore, NodeStream};
use crate::errors::StoreError;
use crate::query::QueryModel;
use crate::value::{
    apply_patch, is_system_prop, section, Json, JsonElement, NODE_ID, NODE_REVISION,
};
use async_trait::async_trait;
use dashmap::DashMap;
use futures::{stream, StreamExt};
use std::sync::Arc;

/// A [`GraphStore`] holding node documents in a concurrent map.
///
/// Documents carry the `reported`, `desired` and `metadata` sections plus
/// the `_id` and `_rev` system properties. Query results are ordered by node
/// id so pipeline runs are deterministic.
#[derive(Debug, Default)]
pub struct MemoryGraphStore {
    nodes: DashMap<String, Json>,
}

impl MemoryGraphStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a node with the given reported section. The desired and
    /// metadata sections start empty and the revision starts at 1.
    pub fn insert_node(&self, id: impl Into<String>, reported: Json) {
        let id = id.into();
        let mut doc = Json::new();
        doc.insert(NODE_ID.to_string(), JsonElement::String(id.clone()));
        doc.insert(NODE_REVISION.to_string(), JsonElement::from(1));
        doc.insert(section::REPORTED.to_string(), JsonElement::Object(reported));
        doc.insert(
            section::DESIRED.to_string(),
            JsonElement::Object(Json::new()),
        );
        doc.insert(
            section::METADATA.to_string(),
            JsonElement::Object(Json::new()),
        );
        self.nodes.insert(id, doc);
    }

    /// Returns a copy of a node document.
    #[must_use]
    pub fn node(&self, id: &str) -> Option<Json> {
        self.nodes.get(id).map(|entry| entry.value().clone())
    }

    /// Number of stored nodes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// True if the store holds no nodes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

#[async_trait]
impl GraphStore for MemoryGraphStore {
    async fn query_list(
        &self,
        model: QueryModel,
        with_system_props: bool,
    ) -> Result<NodeStream, StoreError> {
        let mut matched: Vec<(String, Json)> = self
            .nodes
            .iter()
            .filter(|entry| model.matches_node(entry.value()))
            .map(|entry| {
                let mut doc = entry.value().clone();
                if !with_system_props {
                    doc.retain(|key, _| !is_system_prop(key));
                }
                (entry.key().clone(), doc)
            })
            .collect();
        matched.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(stream::iter(matched.into_iter().map(|(_, doc)| Ok(doc))).boxed())
    }

    async fn update_nodes_desired(
        &self,
        patch: Json,
        node_ids: Vec<String>,
        result_sections: Vec<String>,
        with_system_props: bool,
    ) -> Result<NodeStream, StoreError> {
        let mut results = Vec::with_capacity(node_ids.len());
        for id in node_ids {
            let Some(mut entry) = self.nodes.get_mut(&id) else {
                // ids without a stored node are skipped, not an error
                continue;
            };
            let doc = entry.value_mut();
            let mut desired = doc
                .get(section::DESIRED)
                .and_then(JsonElement::as_object)
                .cloned()
                .unwrap_or_default();
            apply_patch(&mut desired, &patch);
            doc.insert(section::DESIRED.to_string(), JsonElement::Object(desired));
            bump_revision(doc);

            let mut result = Json::new();
            if with_system_props {
                for key in [NODE_ID, NODE_REVISION] {
                    if let Some(value) = doc.get(key) {
                        result.insert(key.to_string(), value.clone());
                    }
                }
            }
            for name in &result_sections {
                if let Some(value) = doc.get(name.as_str()) {
                    result.insert(name.clone(), value.clone());
                }
            }
            results.push(Ok(result));
        }
        Ok(stream::iter(results).boxed())
    }
}

fn bump_revision(doc: &mut Json) {
    let next = doc
        .get(NODE_REVISION)
        .and_then(JsonElement::as_i64)
        .unwrap_or(0)
        + 1;
    doc.insert(NODE_REVISION.to_string(), JsonElement::from(next));
}

/// A [`GraphAccess`] over named [`MemoryGraphStore`]s.
#[derive(Debug, Default)]
pub struct MemoryGraphAccess {
    graphs: DashMap<String, Arc<MemoryGraphStore>>,
}

impl MemoryGraphAccess {
    /// Creates an access layer with no graphs.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an empty graph and returns its store.
    pub fn add_graph(&self, name: impl Into<String>) -> Arc<MemoryGraphStore> {
        let store = Arc::new(MemoryGraphStore::new());
        self.graphs.insert(name.into(), Arc::clone(&store));
        store
    }
}

impl GraphAccess for MemoryGraphAccess {
    fn graph_store(&self, name: &str) -> Result<Arc<dyn GraphStore>, StoreError> {
        self.graphs
            .get(name)
            .map(|entry| Arc::clone(entry.value()) as Arc<dyn GraphStore>)
            .ok_or_else(|| StoreError::unknown_graph(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::parse_query;
    use futures::TryStreamExt;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn reported(value: serde_json::Value) -> Json {
        value.as_object().cloned().unwrap_or_default()
    }

    fn seeded() -> MemoryGraphStore {
        let store = MemoryGraphStore::new();
        store.insert_node("n2", reported(json!({"kind": "volume", "age": 10})));
        store.insert_node("n1", reported(json!({"kind": "volume", "age": 40})));
        store.insert_node("n3", reported(json!({"kind": "instance", "age": 5})));
        store
    }

    fn model(query: &str) -> QueryModel {
        QueryModel::new(parse_query(query).unwrap(), section::REPORTED)
    }

    async fn collect(stream: NodeStream) -> Vec<Json> {
        stream.try_collect().await.unwrap()
    }

    #[tokio::test]
    async fn test_query_list_is_sorted_by_id() {
        let store = seeded();
        let nodes = collect(store.query_list(model("all"), true).await.unwrap()).await;
        let ids: Vec<&str> = nodes
            .iter()
            .filter_map(|node| node.get(NODE_ID).and_then(JsonElement::as_str))
            .collect();
        assert_eq!(ids, vec!["n1", "n2", "n3"]);
    }

    #[tokio::test]
    async fn test_query_list_filters_on_the_reported_section() {
        let store = seeded();
        let nodes = collect(
            store
                .query_list(model("is(volume) and age > 30"), true)
                .await
                .unwrap(),
        )
        .await;
        assert_eq!(nodes.len(), 1);
        assert_eq!(nodes[0].get(NODE_ID), Some(&json!("n1")));
    }

    #[tokio::test]
    async fn test_query_list_can_strip_system_props() {
        let store = seeded();
        let nodes = collect(store.query_list(model("is(instance)"), false).await.unwrap()).await;
        assert_eq!(nodes.len(), 1);
        assert!(nodes[0].get(NODE_ID).is_none());
        assert!(nodes[0].get(NODE_REVISION).is_none());
        assert!(nodes[0].get(section::REPORTED).is_some());
    }

    #[tokio::test]
    async fn test_update_nodes_desired_merges_and_bumps_revision() {
        let store = seeded();
        let patch = reported(json!({"clean": true, "owner": "team-a"}));
        let results = collect(
            store
                .update_nodes_desired(
                    patch,
                    vec!["n1".to_string(), "n2".to_string()],
                    vec![section::DESIRED.to_string()],
                    true,
                )
                .await
                .unwrap(),
        )
        .await;

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].get(NODE_ID), Some(&json!("n1")));
        assert_eq!(results[0].get(NODE_REVISION), Some(&json!(2)));
        assert_eq!(
            results[0].get(section::DESIRED),
            Some(&json!({"clean": true, "owner": "team-a"}))
        );

        let node = store.node("n1").unwrap();
        assert_eq!(
            node.get(section::DESIRED),
            Some(&json!({"clean": true, "owner": "team-a"}))
        );
    }

    #[tokio::test]
    async fn test_update_nodes_desired_null_deletes_keys() {
        let store = seeded();
        store
            .update_nodes_desired(
                reported(json!({"clean": true, "owner": "team-a"})),
                vec!["n1".to_string()],
                vec![section::DESIRED.to_string()],
                true,
            )
            .await
            .unwrap();

        let results = collect(
            store
                .update_nodes_desired(
                    reported(json!({"owner": null})),
                    vec!["n1".to_string()],
                    vec![section::DESIRED.to_string()],
                    true,
                )
                .await
                .unwrap(),
        )
        .await;
        assert_eq!(
            results[0].get(section::DESIRED),
            Some(&json!({"clean": true}))
        );
    }

    #[tokio::test]
    async fn test_update_nodes_desired_skips_unknown_ids() {
        let store = seeded();
        let results = collect(
            store
                .update_nodes_desired(
                    reported(json!({"clean": true})),
                    vec!["n1".to_string(), "ghost".to_string()],
                    vec![section::REPORTED.to_string(), section::DESIRED.to_string()],
                    true,
                )
                .await
                .unwrap(),
        )
        .await;
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].get(NODE_ID), Some(&json!("n1")));
        // requested sections come back alongside the system props
        assert!(results[0].get(section::REPORTED).is_some());
        assert!(results[0].get(section::DESIRED).is_some());
    }

    #[tokio::test]
    async fn test_update_is_idempotent() {
        let store = seeded();
        let patch = reported(json!({"clean": true}));
        for _ in 0..2 {
            store
                .update_nodes_desired(
                    patch.clone(),
                    vec!["n1".to_string()],
                    vec![section::DESIRED.to_string()],
                    true,
                )
                .await
                .unwrap();
        }
        let node = store.node("n1").unwrap();
        assert_eq!(node.get(section::DESIRED), Some(&json!({"clean": true})));
    }

    #[test]
    fn test_graph_access_resolves_known_graphs() {
        let access = MemoryGraphAccess::new();
        access.add_graph("prod");
        assert!(access.graph_store("prod").is_ok());
        let err = access.graph_store("staging").err().unwrap();
        assert_eq!(err.to_string(), "Graph 'staging' is not known");
    }
}
