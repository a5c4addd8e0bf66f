// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Declarative matchers over event JSON
//!
//! A [`JsonPredicate`] is a boolean tree whose leaves are [`JsonMatcher`]s.
//! Each matcher walks `scope` then `key` into the value and applies a
//! [`ValueMatcher`] to whatever it finds (missing paths yield `null`).

use crate::version::VersionMatcher;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Boolean combination of matchers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum JsonPredicate {
    And { and: Vec<JsonPredicate> },
    Or { or: Vec<JsonPredicate> },
    Not { not: Box<JsonPredicate> },
    Matcher(JsonMatcher),
}

impl JsonPredicate {
    pub fn matches(&self, value: &Value) -> bool {
        match self {
            JsonPredicate::And { and } => and.iter().all(|p| p.matches(value)),
            JsonPredicate::Or { or } => or.iter().any(|p| p.matches(value)),
            JsonPredicate::Not { not } => !not.matches(value),
            JsonPredicate::Matcher(matcher) => matcher.matches(value),
        }
    }
}

/// Applies a value matcher at a path inside a JSON document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonMatcher {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub scope: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    pub value: ValueMatcher,
}

impl JsonMatcher {
    pub fn matches(&self, value: &Value) -> bool {
        let mut current = value;
        for segment in self.scope.iter().chain(self.key.iter()) {
            match current.get(segment) {
                Some(next) => current = next,
                None => return self.value.matches(&Value::Null),
            }
        }
        self.value.matches(current)
    }
}

/// Leaf comparison against a single JSON value
///
/// Variant order matters for deserialization: `Range` accepts any object,
/// so it is tried last.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ValueMatcher {
    Equals {
        equals: Value,
        #[serde(default, skip_serializing_if = "std::ops::Not::not")]
        ignore_case: bool,
    },
    Presence {
        is_present: bool,
    },
    Version {
        version_matches: VersionMatcher,
    },
    ArrayContains {
        array_contains: Box<JsonPredicate>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        index: Option<usize>,
    },
    Range {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        at_least: Option<f64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        at_most: Option<f64>,
    },
}

impl ValueMatcher {
    pub fn equals(value: impl Into<Value>) -> Self {
        ValueMatcher::Equals {
            equals: value.into(),
            ignore_case: false,
        }
    }

    pub fn range(at_least: Option<f64>, at_most: Option<f64>) -> Self {
        ValueMatcher::Range { at_least, at_most }
    }

    pub fn matches(&self, value: &Value) -> bool {
        match self {
            ValueMatcher::Equals {
                equals,
                ignore_case,
            } => json_equals(equals, value, *ignore_case),
            ValueMatcher::Presence { is_present } => *is_present != value.is_null(),
            ValueMatcher::Version { version_matches } => match value {
                Value::String(s) => version_matches.matches(s),
                Value::Number(n) => version_matches.matches(&n.to_string()),
                _ => false,
            },
            ValueMatcher::ArrayContains {
                array_contains,
                index,
            } => {
                let Some(items) = value.as_array() else {
                    return false;
                };
                match index {
                    Some(i) => items.get(*i).is_some_and(|v| array_contains.matches(v)),
                    None => items.iter().any(|v| array_contains.matches(v)),
                }
            }
            ValueMatcher::Range { at_least, at_most } => {
                let Some(n) = value.as_f64() else {
                    return false;
                };
                at_least.is_none_or(|min| n >= min) && at_most.is_none_or(|max| n <= max)
            }
        }
    }
}

fn json_equals(expected: &Value, actual: &Value, ignore_case: bool) -> bool {
    if !ignore_case {
        return match (expected.as_f64(), actual.as_f64()) {
            (Some(a), Some(b)) => a == b,
            _ => expected == actual,
        };
    }
    match (expected, actual) {
        (Value::String(a), Value::String(b)) => a.eq_ignore_ascii_case(b),
        (Value::Array(a), Value::Array(b)) => {
            a.len() == b.len() && a.iter().zip(b).all(|(x, y)| json_equals(x, y, true))
        }
        (Value::Object(a), Value::Object(b)) => {
            a.len() == b.len()
                && a.iter()
                    .all(|(k, x)| b.get(k).is_some_and(|y| json_equals(x, y, true)))
        }
        _ => json_equals(expected, actual, false),
    }
}

#[cfg(test)]
#[path = "matcher_tests.rs"]
mod tests;
