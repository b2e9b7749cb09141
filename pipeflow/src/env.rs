//! The environment a pipeline invocation runs under.
//!
//! An [`Env`] is an insertion-ordered map of string values. The engine merges
//! three layers before resolving stages: the session environment configured on
//! the CLI, per-invocation overrides, and leading `key=value` assignments
//! written in the pipeline text itself. Later layers win.

use crate::errors::MissingEnvironmentError;
use crate::value::{section, Json, JsonElement};

/// Environment key selecting the graph a pipeline operates on.
pub const GRAPH: &str = "graph";

/// Environment key selecting the section queries evaluate against.
pub const SECTION: &str = "section";

/// Environment key selecting the sections desired-state updates return.
pub const RESULT_SECTION: &str = "result_section";

/// The environment of a single pipeline invocation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Env {
    values: Json,
}

impl Env {
    /// Creates an empty environment.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an environment from key/value pairs, later pairs winning.
    #[must_use]
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut env = Self::new();
        for (key, value) in pairs {
            env.set(key, value);
        }
        env
    }

    /// Sets a value, replacing any previous one while keeping its position.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.values
            .insert(key.into(), JsonElement::String(value.into()));
    }

    /// Builder-style variant of [`set`](Self::set).
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.set(key, value);
        self
    }

    /// Looks up a value.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).and_then(JsonElement::as_str)
    }

    /// Looks up a value a command cannot run without.
    pub fn require(&self, command: &str, key: &str) -> Result<&str, MissingEnvironmentError> {
        self.get(key)
            .ok_or_else(|| MissingEnvironmentError::new(command, key))
    }

    /// The section queries evaluate against, `reported` unless overridden.
    #[must_use]
    pub fn section(&self) -> &str {
        self.get(SECTION).unwrap_or(section::REPORTED)
    }

    /// The sections desired-state updates return, parsed from the
    /// comma-separated `result_section` value. Defaults to
    /// `reported,desired`.
    #[must_use]
    pub fn result_sections(&self) -> Vec<String> {
        let configured: Vec<String> = self
            .get(RESULT_SECTION)
            .map(|value| {
                value
                    .split(',')
                    .map(str::trim)
                    .filter(|part| !part.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();
        if configured.is_empty() {
            vec![section::REPORTED.to_string(), section::DESIRED.to_string()]
        } else {
            configured
        }
    }

    /// Returns a copy with all values of `overrides` applied on top.
    #[must_use]
    pub fn merged(&self, overrides: &Env) -> Env {
        let mut merged = self.clone();
        for (key, value) in &overrides.values {
            merged.values.insert(key.clone(), value.clone());
        }
        merged
    }

    /// The environment as a JSON mapping, in insertion order.
    #[must_use]
    pub fn as_json(&self) -> Json {
        self.values.clone()
    }

    /// Number of values set.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// True if no value is set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}
