//! Sink stages: they drive the stream and produce the pipeline result.

use super::{expect_no_arg, SinkFn, SinkPart};
use crate::env::Env;
use crate::errors::PipelineError;
use crate::value::JsonElement;
use futures::TryStreamExt;

/// `out`: pulls the stream to completion and collects every element.
///
/// This is the sink the engine appends when a pipeline does not end in one.
/// A stream error aborts the run; elements collected before the error are
/// discarded.
#[derive(Debug, Default)]
pub struct ListSink;

impl SinkPart for ListSink {
    fn name(&self) -> &'static str {
        "out"
    }

    fn usage(&self) -> &'static str {
        "out - collect every element into the result list"
    }

    fn parse(&self, arg: Option<&str>, _env: &Env) -> Result<SinkFn, PipelineError> {
        expect_no_arg(self.name(), arg)?;
        Ok(Box::new(|input| {
            Box::pin(input.try_collect::<Vec<JsonElement>>())
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stages::JsStream;
    use futures::{stream, StreamExt};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn parse_out() -> SinkFn {
        ListSink.parse(None, &Env::new()).unwrap()
    }

    #[tokio::test]
    async fn test_out_collects_in_order() {
        let input: JsStream = stream::iter(vec![json!(1), json!("a"), json!({"b": 2})])
            .map(Ok)
            .boxed();
        let result = parse_out()(input).await.unwrap();
        assert_eq!(result, vec![json!(1), json!("a"), json!({"b": 2})]);
    }

    #[tokio::test]
    async fn test_out_empty_stream_yields_empty_list() {
        let input: JsStream = stream::empty().boxed();
        assert!(parse_out()(input).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_out_discards_partial_output_on_error() {
        let input: JsStream = stream::iter(vec![
            Ok(json!(1)),
            Err(PipelineError::data_shape("uniq", "boom")),
            Ok(json!(2)),
        ])
        .boxed();
        let err = parse_out()(input).await.unwrap_err();
        assert!(matches!(err, PipelineError::DataShape(_)));
    }

    #[test]
    fn test_out_rejects_arguments() {
        assert!(matches!(
            ListSink.parse(Some("file"), &Env::new()),
            Err(PipelineError::Parse(_))
        ));
    }
}
