//! Parsing of pipeline text.
//!
//! Two layers: [`parse_pipeline`] splits a command line into leading
//! environment assignments and `command [argument]` parts along unquoted,
//! unescaped pipes; [`parse_key_values`] reads the `key=value` argument
//! lists used by desired-state stages.

mod key_values;
mod pipeline;

pub use key_values::parse_key_values;
pub use pipeline::{parse_pipeline, ParsedPipeline, PipelinePart};
