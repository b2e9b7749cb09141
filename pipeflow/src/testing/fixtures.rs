//! Graph fixtures shared by unit and integration tests.

use crate::env::{Env, GRAPH};
use crate::errors::StoreError;
use crate::stages::Dependencies;
use crate::store::{GraphAccess, GraphStore, MemoryGraphAccess, MemoryGraphStore};
use crate::value::{Json, JsonElement};
use std::sync::Arc;

/// The graph name the fixtures register their store under.
pub const TEST_GRAPH: &str = "prod";

/// A reported section for a volume node.
#[must_use]
pub fn volume(name: &str, age: i64) -> Json {
    let mut reported = Json::new();
    reported.insert("kind".to_string(), JsonElement::from("volume"));
    reported.insert("name".to_string(), JsonElement::from(name));
    reported.insert("age".to_string(), JsonElement::from(age));
    reported
}

/// A reported section for an instance node.
#[must_use]
pub fn instance(name: &str, cores: i64) -> Json {
    let mut reported = Json::new();
    reported.insert("kind".to_string(), JsonElement::from("instance"));
    reported.insert("name".to_string(), JsonElement::from(name));
    reported.insert("cores".to_string(), JsonElement::from(cores));
    reported
}

/// Dependencies over a single empty in-memory graph.
#[must_use]
pub fn deps_with_graph(graph: &str) -> (Dependencies, Arc<MemoryGraphStore>) {
    let access = Arc::new(MemoryGraphAccess::new());
    let store = access.add_graph(graph);
    (Dependencies::new(access), store)
}

/// Dependencies over a seeded [`TEST_GRAPH`] holding three volumes and one
/// instance. Node ids equal the `name` property.
#[must_use]
pub fn seeded_deps() -> (Dependencies, Arc<MemoryGraphStore>) {
    let (deps, store) = deps_with_graph(TEST_GRAPH);
    store.insert_node("vol-1", volume("vol-1", 40));
    store.insert_node("vol-2", volume("vol-2", 12));
    store.insert_node("vol-3", volume("vol-3", 95));
    store.insert_node("api-1", instance("api-1", 4));
    (deps, store)
}

/// An environment selecting [`TEST_GRAPH`].
#[must_use]
pub fn graph_env() -> Env {
    Env::new().with(GRAPH, TEST_GRAPH)
}

/// A [`GraphAccess`] serving one fixed store under one name.
///
/// Lets tests wire a mock [`GraphStore`] into the engine.
pub struct FixedGraphAccess {
    name: String,
    store: Arc<dyn GraphStore>,
}

impl FixedGraphAccess {
    /// Creates an access layer serving `store` under `name`.
    #[must_use]
    pub fn new(name: impl Into<String>, store: Arc<dyn GraphStore>) -> Self {
        Self {
            name: name.into(),
            store,
        }
    }
}

impl GraphAccess for FixedGraphAccess {
    fn graph_store(&self, name: &str) -> Result<Arc<dyn GraphStore>, StoreError> {
        if name == self.name {
            Ok(Arc::clone(&self.store))
        } else {
            Err(StoreError::unknown_graph(name))
        }
    }
}

impl std::fmt::Debug for FixedGraphAccess {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FixedGraphAccess")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}
