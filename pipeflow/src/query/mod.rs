//! Query predicates over node documents.
//!
//! The `match` stage parses its argument with [`parse_query`] into a
//! [`Query`] tree, binds it to a section as a [`QueryModel`] and hands it to
//! the graph store. The in-memory store evaluates predicates with
//! [`Query::matches`]; a real backend would translate the same tree to its
//! native query language.

mod model;
mod parser;

pub use model::{CompareOp, Query, QueryModel};
pub use parser::parse_query;
