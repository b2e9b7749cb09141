//! # Pipeflow
//!
//! A streaming pipeline interpreter for cloud resource graph data.
//!
//! Pipeflow parses textual pipeline expressions like
//! `graph=prod match is(volume) | mark_delete | count` into composable
//! streaming stages and executes them against a graph store:
//!
//! - **Sources** produce the element stream: `echo`, `env`, `match`
//! - **Flows** transform it lazily: `count`, `chunk`, `flatten`, `uniq`,
//!   `desire`, `mark_delete`
//! - **Sinks** drive it and collect the result: `out`
//!
//! Validation is eager. A bad argument, an unknown command, a missing
//! environment value or a part in the wrong position fails at evaluation
//! time, before any element flows. Execution is lazy: the sink pulls the
//! composed stream and nothing runs ahead of demand.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use pipeflow::prelude::*;
//! use std::sync::Arc;
//!
//! let access = Arc::new(MemoryGraphAccess::new());
//! access.add_graph("prod");
//! let cli = Cli::new(
//!     Dependencies::new(access),
//!     Env::new().with("graph", "prod"),
//! );
//!
//! let marked = cli
//!     .execute("match is(volume) and age > 30 | mark_delete", &Env::new())
//!     .await?;
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod cancellation;
pub mod engine;
pub mod env;
pub mod errors;
pub mod parse;
pub mod query;
pub mod registry;
pub mod stages;
pub mod store;
pub mod testing;
pub mod value;


/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::cancellation::CancellationToken;
    pub use crate::engine::{Cli, ExecutablePipeline};
    pub use crate::env::Env;
    pub use crate::errors::{
        DataShapeError, MissingEnvironmentError, ParseError, PipelineError, StoreError,
        UnknownCommandError,
    };
    pub use crate::parse::{parse_pipeline, ParsedPipeline, PipelinePart};
    pub use crate::query::{parse_query, CompareOp, Query, QueryModel};
    pub use crate::registry::{PartKind, Registry};
    pub use crate::stages::{
        Dependencies, FlowFn, FlowPart, JsStream, ResolvedStage, SinkFn, SinkPart, SourcePart,
    };
    pub use crate::store::{
        GraphAccess, GraphStore, MemoryGraphAccess, MemoryGraphStore, NodeStream,
    };
    pub use crate::value::{Json, JsonElement};
}
