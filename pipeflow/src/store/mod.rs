//! Graph store access.
//!
//! The engine talks to node storage through [`GraphStore`], a narrow
//! interface with the two calls the built-in stages need. [`GraphAccess`]
//! resolves the `graph` environment value to a store handle, so one engine
//! can serve pipelines over several graphs. The in-memory implementation
//! backs tests and small setups; a production deployment implements the same
//! traits over a document database.

mod memory;

pub use memory::{MemoryGraphAccess, MemoryGraphStore};

use crate::errors::StoreError;
use crate::query::QueryModel;
use crate::value::Json;
use async_trait::async_trait;
use futures::stream::BoxStream;
use std::sync::Arc;

/// A stream of node documents coming out of the store.
pub type NodeStream = BoxStream<'static, Result<Json, StoreError>>;

/// Storage operations the pipeline stages consume.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait GraphStore: Send + Sync {
    /// Streams the node documents matching the query, in a stable order.
    ///
    /// With `with_system_props` the documents keep `_id` and `_rev`.
    async fn query_list(
        &self,
        model: QueryModel,
        with_system_props: bool,
    ) -> Result<NodeStream, StoreError>;

    /// Merges `patch` into the desired section of the nodes named by
    /// `node_ids` and streams one result document per updated node, holding
    /// the sections named in `result_sections`. Unknown ids are skipped.
    async fn update_nodes_desired(
        &self,
        patch: Json,
        node_ids: Vec<String>,
        result_sections: Vec<String>,
        with_system_props: bool,
    ) -> Result<NodeStream, StoreError>;
}

/// Resolves graph names to store handles.
pub trait GraphAccess: Send + Sync {
    /// Returns the store holding the named graph.
    fn graph_store(&self, name: &str) -> Result<Arc<dyn GraphStore>, StoreError>;
}
