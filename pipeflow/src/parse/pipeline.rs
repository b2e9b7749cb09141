//! Splits pipeline text into environment assignments and stage parts.

use super::key_values::parse_assignment_prefix;
use crate::errors::ParseError;
use serde::{Deserialize, Serialize};

/// One `command [argument]` part of a pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelinePart {
    /// The command name.
    pub name: String,
    /// The raw argument text, if any. Quotes are preserved.
    pub arg: Option<String>,
}

impl PipelinePart {
    /// The argument as a borrowed string.
    #[must_use]
    pub fn arg(&self) -> Option<&str> {
        self.arg.as_deref()
    }
}

/// A parsed pipeline expression.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedPipeline {
    /// Environment assignments written before the first command.
    pub env: Vec<(String, String)>,
    /// The stage parts, in pipe order.
    pub parts: Vec<PipelinePart>,
}

/// Parses a pipeline expression like `graph=prod match all | count | out`.
///
/// Segments are split on `|` characters that are neither inside single or
/// double quotes nor escaped as `\|`. Within each segment the first
/// whitespace-delimited token is the command name and the trimmed remainder
/// is its raw argument. Assignments before the first command become
/// per-invocation environment overrides.
pub fn parse_pipeline(input: &str) -> Result<ParsedPipeline, ParseError> {
    if input.trim().is_empty() {
        return Err(ParseError::new("the pipeline expression is empty"));
    }
    let segments = split_segments(input)?;
    let Some((first, tail)) = segments.split_first() else {
        return Err(ParseError::new("the pipeline expression is empty"));
    };

    let (env, command_text) = parse_assignment_prefix(first.trim())?;
    let mut parts = Vec::with_capacity(segments.len());
    push_part(&mut parts, &command_text, 0, !env.is_empty())?;
    for (offset, segment) in tail.iter().enumerate() {
        push_part(&mut parts, segment, offset + 1, false)?;
    }
    Ok(ParsedPipeline { env, parts })
}

fn push_part(
    parts: &mut Vec<PipelinePart>,
    text: &str,
    index: usize,
    after_assignments: bool,
) -> Result<(), ParseError> {
    let text = text.trim();
    if text.is_empty() {
        let message = if after_assignments {
            "the pipeline contains no command after the environment assignments".to_string()
        } else {
            format!("part {} of the pipeline is empty", index + 1)
        };
        return Err(ParseError::new(message));
    }
    let (name, arg) = match text.find(char::is_whitespace) {
        Some(split) => {
            let arg = text[split..].trim();
            (
                text[..split].to_string(),
                (!arg.is_empty()).then(|| arg.to_string()),
            )
        }
        None => (text.to_string(), None),
    };
    parts.push(PipelinePart { name, arg });
    Ok(())
}

/// Splits the input on unquoted, unescaped pipes. Quote characters are kept
/// in the segment text so stage arguments see them unchanged.
fn split_segments(input: &str) -> Result<Vec<String>, ParseError> {
    let mut segments = Vec::new();
    let mut current = String::new();
    let mut quote: Option<char> = None;
    let mut chars = input.chars();

    while let Some(ch) = chars.next() {
        match quote {
            Some(open) => match ch {
                '\\' => {
                    current.push('\\');
                    if let Some(next) = chars.next() {
                        current.push(next);
                    }
                }
                ch if ch == open => {
                    quote = None;
                    current.push(ch);
                }
                ch => current.push(ch),
            },
            None => match ch {
                '\\' => match chars.next() {
                    Some('|') => current.push('|'),
                    Some(next) => {
                        current.push('\\');
                        current.push(next);
                    }
                    None => current.push('\\'),
                },
                '\'' | '"' => {
                    quote = Some(ch);
                    current.push(ch);
                }
                '|' => segments.push(std::mem::take(&mut current)),
                ch => current.push(ch),
            },
        }
    }
    if quote.is_some() {
        return Err(ParseError::new("unbalanced quotes in the pipeline"));
    }
    segments.push(current);
    Ok(segments)
}
