//! The query tree and its in-memory evaluation.

use crate::value::{value_at, Json, JsonElement};
use regex::Regex;
use std::cmp::Ordering;

/// Comparison operators usable in query predicates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    /// `==` (or `=`).
    Eq,
    /// `!=`.
    Ne,
    /// `<`.
    Lt,
    /// `<=`.
    Le,
    /// `>`.
    Gt,
    /// `>=`.
    Ge,
}

/// A parsed query predicate.
#[derive(Debug, Clone)]
pub enum Query {
    /// Matches every node.
    All,
    /// Matches nodes whose `kind` property equals the given kind.
    IsKind(String),
    /// Compares the value at a dotted property path against a literal.
    Compare {
        /// Dotted property path inside the section.
        path: String,
        /// The comparison operator.
        op: CompareOp,
        /// The literal to compare against.
        value: JsonElement,
    },
    /// Matches the string at a path against a regular expression.
    Match {
        /// Dotted property path inside the section.
        path: String,
        /// The compiled pattern.
        pattern: Regex,
        /// True for `!~`.
        negated: bool,
    },
    /// Logical negation.
    Not(Box<Query>),
    /// Both sides must match.
    And(Box<Query>, Box<Query>),
    /// Either side must match.
    Or(Box<Query>, Box<Query>),
}

impl Query {
    /// Evaluates the predicate against one section mapping.
    ///
    /// A missing property satisfies `!=` and `!~` and nothing else; ordered
    /// comparisons between values of different types are false.
    #[must_use]
    pub fn matches(&self, section: &Json) -> bool {
        match self {
            Self::All => true,
            Self::IsKind(kind) => section
                .get("kind")
                .and_then(JsonElement::as_str)
                .is_some_and(|actual| actual == kind),
            Self::Compare { path, op, value } => compare(value_at(section, path), *op, value),
            Self::Match {
                path,
                pattern,
                negated,
            } => {
                let matched = value_at(section, path)
                    .and_then(JsonElement::as_str)
                    .is_some_and(|text| pattern.is_match(text));
                matched != *negated
            }
            Self::Not(inner) => !inner.matches(section),
            Self::And(left, right) => left.matches(section) && right.matches(section),
            Self::Or(left, right) => left.matches(section) || right.matches(section),
        }
    }
}

impl PartialEq for Query {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::All, Self::All) => true,
            (Self::IsKind(a), Self::IsKind(b)) => a == b,
            (
                Self::Compare {
                    path: a_path,
                    op: a_op,
                    value: a_value,
                },
                Self::Compare {
                    path: b_path,
                    op: b_op,
                    value: b_value,
                },
            ) => a_path == b_path && a_op == b_op && a_value == b_value,
            (
                Self::Match {
                    path: a_path,
                    pattern: a_pattern,
                    negated: a_negated,
                },
                Self::Match {
                    path: b_path,
                    pattern: b_pattern,
                    negated: b_negated,
                },
            ) => {
                a_path == b_path
                    && a_pattern.as_str() == b_pattern.as_str()
                    && a_negated == b_negated
            }
            (Self::Not(a), Self::Not(b)) => a == b,
            (Self::And(a_left, a_right), Self::And(b_left, b_right))
            | (Self::Or(a_left, a_right), Self::Or(b_left, b_right)) => {
                a_left == b_left && a_right == b_right
            }
            _ => false,
        }
    }
}

/// A query bound to the node document section it evaluates against.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryModel {
    /// The predicate tree.
    pub query: Query,
    /// The section the predicate reads (`reported` unless overridden).
    pub section: String,
}

impl QueryModel {
    /// Creates a new query model.
    #[must_use]
    pub fn new(query: Query, section: impl Into<String>) -> Self {
        Self {
            query,
            section: section.into(),
        }
    }

    /// True if the node document matches in this model's section.
    #[must_use]
    pub fn matches_node(&self, node: &Json) -> bool {
        node.get(&self.section)
            .and_then(JsonElement::as_object)
            .is_some_and(|section| self.query.matches(section))
    }
}

fn compare(actual: Option<&JsonElement>, op: CompareOp, expected: &JsonElement) -> bool {
    match op {
        CompareOp::Eq => actual.is_some_and(|value| json_eq(value, expected)),
        CompareOp::Ne => !actual.is_some_and(|value| json_eq(value, expected)),
        CompareOp::Lt | CompareOp::Le | CompareOp::Gt | CompareOp::Ge => actual
            .and_then(|value| json_cmp(value, expected))
            .is_some_and(|ordering| match op {
                CompareOp::Lt => ordering == Ordering::Less,
                CompareOp::Le => ordering != Ordering::Greater,
                CompareOp::Gt => ordering == Ordering::Greater,
                CompareOp::Ge => ordering != Ordering::Less,
                CompareOp::Eq | CompareOp::Ne => false,
            }),
    }
}

/// Numeric-aware equality: `32` equals `32.0`.
fn json_eq(a: &JsonElement, b: &JsonElement) -> bool {
    match (a, b) {
        (JsonElement::Number(x), JsonElement::Number(y)) => match (x.as_i64(), y.as_i64()) {
            (Some(left), Some(right)) => left == right,
            _ => x.as_f64() == y.as_f64(),
        },
        _ => a == b,
    }
}

/// Orders numbers numerically and strings lexicographically; everything else
/// has no defined order.
fn json_cmp(a: &JsonElement, b: &JsonElement) -> Option<Ordering> {
    match (a, b) {
        (JsonElement::Number(x), JsonElement::Number(y)) => x.as_f64().partial_cmp(&y.as_f64()),
        (JsonElement::String(x), JsonElement::String(y)) => Some(x.cmp(y)),
        _ => None,
    }
}
