//! Test support for pipeflow pipelines.
//!
//! This module provides:
//! - Graph fixtures with seeded volume and instance nodes
//! - A [`GraphAccess`](crate::store::GraphAccess) wrapper for injecting
//!   custom or mock stores
//! - One-time tracing setup for test output

mod fixtures;

pub use fixtures::{
    deps_with_graph, graph_env, instance, seeded_deps, volume, FixedGraphAccess, TEST_GRAPH,
};

use std::sync::Once;
use tracing_subscriber::EnvFilter;

static TRACING: Once = Once::new();

/// Installs a tracing subscriber honoring `RUST_LOG`, once per process.
///
/// Safe to call from every test; only the first call installs anything.
pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}
