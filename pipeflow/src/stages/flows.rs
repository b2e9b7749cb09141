//! Flow stages: they transform the element stream.

use super::{expect_no_arg, FlowFn, FlowPart};
use crate::env::Env;
use crate::errors::PipelineError;
use crate::value::{coerce_i64, fingerprint, JsonElement};
use futures::{future, stream, StreamExt, TryStreamExt};
use serde_json::json;
use std::collections::HashSet;

/// Number of elements per `chunk` batch when no size is given.
const DEFAULT_CHUNK_SIZE: usize = 100;

/// `count [property]`: reduces the stream to one matched/not_matched summary.
///
/// Without an argument every element counts as matched. With a property
/// name, mapping elements whose property coerces to an integer add that
/// value to `matched`; everything else increments `not_matched`.
#[derive(Debug, Default)]
pub struct CountFlow;

impl FlowPart for CountFlow {
    fn name(&self) -> &'static str {
        "count"
    }

    fn usage(&self) -> &'static str {
        "count [property] - count elements or sum an integer property"
    }

    fn parse(&self, arg: Option<&str>, _env: &Env) -> Result<FlowFn, PipelineError> {
        let prop = arg.map(str::to_string);
        Ok(Box::new(move |input| {
            let counted = input.try_fold((0_i64, 0_i64), move |(matched, not_matched), element| {
                let next = match &prop {
                    None => (matched + 1, not_matched),
                    Some(prop) => match element
                        .as_object()
                        .and_then(|node| node.get(prop))
                        .and_then(coerce_i64)
                    {
                        Some(value) => (matched + value, not_matched),
                        None => (matched, not_matched + 1),
                    },
                };
                future::ready(Ok(next))
            });
            stream::once(async move {
                let (matched, not_matched) = counted.await?;
                Ok(json!({"matched": matched, "not_matched": not_matched}))
            })
            .boxed()
        }))
    }
}

/// `chunk [size]`: groups elements into arrays of at most `size` elements.
///
/// The last chunk may be shorter; an empty input produces no chunks.
#[derive(Debug, Default)]
pub struct ChunkFlow;

impl FlowPart for ChunkFlow {
    fn name(&self) -> &'static str {
        "chunk"
    }

    fn usage(&self) -> &'static str {
        "chunk [size] - group elements into arrays of at most size elements"
    }

    fn parse(&self, arg: Option<&str>, _env: &Env) -> Result<FlowFn, PipelineError> {
        let size = match arg {
            Some(text) => text
                .parse::<usize>()
                .ok()
                .filter(|parsed| *parsed >= 1)
                .ok_or_else(|| {
                    PipelineError::parse(format!(
                        "chunk size must be a positive integer, got '{text}'"
                    ))
                })?,
            None => DEFAULT_CHUNK_SIZE,
        };
        Ok(Box::new(move |input| {
            input
                .try_chunks(size)
                .map(|result| match result {
                    Ok(items) => Ok(JsonElement::Array(items)),
                    Err(err) => Err(err.1),
                })
                .boxed()
        }))
    }
}

/// `flatten`: expands array elements into their items, one level deep.
#[derive(Debug, Default)]
pub struct FlattenFlow;

impl FlowPart for FlattenFlow {
    fn name(&self) -> &'static str {
        "flatten"
    }

    fn usage(&self) -> &'static str {
        "flatten - expand array elements into their items"
    }

    fn parse(&self, arg: Option<&str>, _env: &Env) -> Result<FlowFn, PipelineError> {
        expect_no_arg(self.name(), arg)?;
        Ok(Box::new(|input| {
            input
                .map_ok(|element| match element {
                    JsonElement::Array(items) => stream::iter(items).map(Ok).boxed(),
                    other => stream::once(future::ready(Ok(other))).boxed(),
                })
                .try_flatten()
                .boxed()
        }))
    }
}

/// `uniq`: drops elements whose identity was seen before.
///
/// Mappings compare independent of key order. Array elements have no
/// identity here and fail the stream.
#[derive(Debug, Default)]
pub struct UniqFlow;

impl FlowPart for UniqFlow {
    fn name(&self) -> &'static str {
        "uniq"
    }

    fn usage(&self) -> &'static str {
        "uniq - drop duplicate elements"
    }

    fn parse(&self, arg: Option<&str>, _env: &Env) -> Result<FlowFn, PipelineError> {
        expect_no_arg(self.name(), arg)?;
        Ok(Box::new(|input| {
            let mut seen = HashSet::new();
            input
                .try_filter_map(move |element| {
                    let result = if element.is_array() {
                        Err(PipelineError::data_shape(
                            "uniq",
                            format!("arrays have no identity: {element}"),
                        ))
                    } else {
                        Ok(seen.insert(fingerprint(&element)).then_some(element))
                    };
                    future::ready(result)
                })
                .boxed()
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stages::JsStream;
    use pretty_assertions::assert_eq;

    fn input(elements: Vec<JsonElement>) -> JsStream {
        stream::iter(elements).map(Ok).boxed()
    }

    fn run(flow: FlowFn, elements: Vec<JsonElement>) -> Result<Vec<JsonElement>, PipelineError> {
        tokio_test::block_on(flow(input(elements)).try_collect())
    }

    fn parse(part: &dyn FlowPart, arg: Option<&str>) -> FlowFn {
        part.parse(arg, &Env::new()).unwrap()
    }

    #[test]
    fn test_count_without_argument_counts_elements() {
        let flow = parse(&CountFlow, None);
        let result = run(flow, vec![json!(1), json!("a"), json!({"b": 2})]).unwrap();
        assert_eq!(result, vec![json!({"matched": 3, "not_matched": 0})]);
    }

    #[test]
    fn test_count_emits_zero_summary_on_empty_input() {
        let flow = parse(&CountFlow, None);
        let result = run(flow, vec![]).unwrap();
        assert_eq!(result, vec![json!({"matched": 0, "not_matched": 0})]);
    }

    #[test]
    fn test_count_sums_a_property() {
        let flow = parse(&CountFlow, Some("size"));
        let result = run(
            flow,
            vec![
                json!({"size": 10}),
                json!({"size": 2.9}),
                json!({"size": true}),
                json!({"size": "4"}),
                json!({"size": "not a number"}),
                json!({"other": 1}),
                json!("no mapping"),
            ],
        )
        .unwrap();
        // 10 + 2 + 1 + 4 matched, three elements without a usable value
        assert_eq!(result, vec![json!({"matched": 17, "not_matched": 3})]);
    }

    #[test]
    fn test_chunk_groups_elements() {
        let flow = parse(&ChunkFlow, Some("2"));
        let result = run(
            flow,
            vec![json!(1), json!(2), json!(3), json!(4), json!(5)],
        )
        .unwrap();
        assert_eq!(result, vec![json!([1, 2]), json!([3, 4]), json!([5])]);
    }

    #[test]
    fn test_chunk_defaults_to_one_hundred() {
        let flow = parse(&ChunkFlow, None);
        let elements: Vec<JsonElement> = (0..250).map(|n| json!(n)).collect();
        let result = run(flow, elements).unwrap();
        assert_eq!(result.len(), 3);
        assert_eq!(result[0].as_array().map(Vec::len), Some(100));
        assert_eq!(result[2].as_array().map(Vec::len), Some(50));
    }

    #[test]
    fn test_chunk_empty_input_produces_no_chunks() {
        let flow = parse(&ChunkFlow, None);
        assert!(run(flow, vec![]).unwrap().is_empty());
    }

    #[test]
    fn test_chunk_rejects_bad_sizes() {
        for bad in ["0", "-1", "two", "1.5"] {
            assert!(matches!(
                ChunkFlow.parse(Some(bad), &Env::new()),
                Err(PipelineError::Parse(_))
            ));
        }
    }

    #[test]
    fn test_flatten_expands_one_level() {
        let flow = parse(&FlattenFlow, None);
        let result = run(
            flow,
            vec![json!([1, [2, 3]]), json!(4), json!([]), json!([5])],
        )
        .unwrap();
        assert_eq!(result, vec![json!(1), json!([2, 3]), json!(4), json!(5)]);
    }

    #[test]
    fn test_flatten_rejects_arguments() {
        assert!(matches!(
            FlattenFlow.parse(Some("deep"), &Env::new()),
            Err(PipelineError::Parse(_))
        ));
    }

    #[test]
    fn test_uniq_drops_duplicates_keeping_first() {
        let flow = parse(&UniqFlow, None);
        let result = run(
            flow,
            vec![
                json!({"a": 1, "b": 2}),
                json!({"b": 2, "a": 1}),
                json!(1),
                json!("1"),
                json!(1),
                json!(null),
            ],
        )
        .unwrap();
        assert_eq!(
            result,
            vec![json!({"a": 1, "b": 2}), json!(1), json!("1"), json!(null)]
        );
    }

    #[test]
    fn test_uniq_fails_on_array_elements() {
        let flow = parse(&UniqFlow, None);
        let err = run(flow, vec![json!(1), json!([2])]).unwrap_err();
        assert!(matches!(err, PipelineError::DataShape(_)));
    }
}
