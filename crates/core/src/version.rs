// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Ivy-style version constraints
//!
//! Supported forms:
//! - exact: `1.0` (matches `1.0`, `1.0-SNAPSHOT`, ` 1.0 `)
//! - prefix: `1.0.+` or `1.0+`
//! - range: `[1.0,2.0]`, `(1.0,2.0)`, `[1.0,)`, `(,2.0]`

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use thiserror::Error;

/// Errors from parsing a version constraint
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VersionMatcherError {
    #[error("empty version constraint")]
    Empty,
    #[error("invalid version '{0}'")]
    InvalidVersion(String),
    #[error("invalid version range '{0}'")]
    InvalidRange(String),
}

#[derive(Debug, Clone, PartialEq)]
enum Constraint {
    Exact(String),
    Prefix(String),
    Range {
        lower: Option<Bound>,
        upper: Option<Bound>,
    },
}

#[derive(Debug, Clone, PartialEq)]
struct Bound {
    parts: Vec<u64>,
    inclusive: bool,
}

/// A parsed version constraint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct VersionMatcher {
    pattern: String,
    constraint: Constraint,
}

impl VersionMatcher {
    pub fn parse(pattern: &str) -> Result<Self, VersionMatcherError> {
        let trimmed = pattern.trim();
        if trimmed.is_empty() {
            return Err(VersionMatcherError::Empty);
        }

        let constraint = if is_range(trimmed) {
            parse_range(trimmed)?
        } else if let Some(prefix) = trimmed.strip_suffix('+') {
            if !prefix.chars().all(|c| c.is_ascii_digit() || c == '.') {
                return Err(VersionMatcherError::InvalidVersion(pattern.to_string()));
            }
            Constraint::Prefix(prefix.to_string())
        } else {
            let core = strip_qualifier(trimmed);
            parse_parts(core)
                .ok_or_else(|| VersionMatcherError::InvalidVersion(pattern.to_string()))?;
            Constraint::Exact(core.to_string())
        };

        Ok(Self {
            pattern: pattern.to_string(),
            constraint,
        })
    }

    /// Check a version string against the constraint
    pub fn matches(&self, version: &str) -> bool {
        let core = strip_qualifier(version.trim());
        match &self.constraint {
            Constraint::Exact(expected) => core == expected,
            Constraint::Prefix(prefix) => core.starts_with(prefix.as_str()),
            Constraint::Range { lower, upper } => {
                let Some(parts) = parse_parts(core) else {
                    return false;
                };
                let above = lower.as_ref().is_none_or(|b| match compare(&parts, &b.parts) {
                    Ordering::Greater => true,
                    Ordering::Equal => b.inclusive,
                    Ordering::Less => false,
                });
                let below = upper.as_ref().is_none_or(|b| match compare(&parts, &b.parts) {
                    Ordering::Less => true,
                    Ordering::Equal => b.inclusive,
                    Ordering::Greater => false,
                });
                above && below
            }
        }
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }
}

impl TryFrom<String> for VersionMatcher {
    type Error = VersionMatcherError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<VersionMatcher> for String {
    fn from(matcher: VersionMatcher) -> Self {
        matcher.pattern
    }
}

fn is_range(s: &str) -> bool {
    s.starts_with(['[', '(', ']', ')']) || s.ends_with(['[', '(', ']', ')'])
}

fn parse_range(s: &str) -> Result<Constraint, VersionMatcherError> {
    let invalid = || VersionMatcherError::InvalidRange(s.to_string());

    let lower_inclusive = match s.chars().next() {
        Some('[') => true,
        Some('(') => false,
        _ => return Err(invalid()),
    };
    let upper_inclusive = match s.chars().last() {
        Some(']') => true,
        Some(')') => false,
        _ => return Err(invalid()),
    };

    let inner = &s[1..s.len() - 1];
    let (low, high) = inner.split_once(',').ok_or_else(invalid)?;
    if high.contains(',') {
        return Err(invalid());
    }

    let bound = |text: &str, inclusive: bool| -> Result<Option<Bound>, VersionMatcherError> {
        let text = text.trim();
        if text.is_empty() {
            return Ok(None);
        }
        let parts = parse_parts(strip_qualifier(text)).ok_or_else(invalid)?;
        Ok(Some(Bound { parts, inclusive }))
    };

    let lower = bound(low, lower_inclusive)?;
    let upper = bound(high, upper_inclusive)?;
    if lower.is_none() && upper.is_none() {
        return Err(invalid());
    }
    Ok(Constraint::Range { lower, upper })
}

/// Drop a `-SNAPSHOT` style qualifier
fn strip_qualifier(s: &str) -> &str {
    s.split_once('-').map(|(core, _)| core).unwrap_or(s).trim()
}

fn parse_parts(s: &str) -> Option<Vec<u64>> {
    if s.is_empty() {
        return None;
    }
    s.split('.').map(|p| p.trim().parse::<u64>().ok()).collect()
}

/// Component-wise comparison, missing components count as zero
fn compare(a: &[u64], b: &[u64]) -> Ordering {
    let len = a.len().max(b.len());
    for i in 0..len {
        let x = a.get(i).copied().unwrap_or(0);
        let y = b.get(i).copied().unwrap_or(0);
        match x.cmp(&y) {
            Ordering::Equal => continue,
            other => return other,
        }
    }
    Ordering::Equal
}

#[cfg(test)]
#[path = "version_tests.rs"]
mod tests;
