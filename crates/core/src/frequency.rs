// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Rolling-window frequency constraints

use crate::clock::duration_ms;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// A named cap of `count` occurrences per `range`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrequencyConstraint {
    pub id: String,
    #[serde(with = "humantime_serde")]
    pub range: Duration,
    pub count: u32,
}

impl FrequencyConstraint {
    pub fn new(id: impl Into<String>, range: Duration, count: u32) -> Self {
        Self {
            id: id.into(),
            range,
            count,
        }
    }

    /// Whether an occurrence at `timestamp_ms` still counts at `now_ms`
    ///
    /// An occurrence exactly `range` old still counts.
    pub fn in_window(&self, timestamp_ms: i64, now_ms: i64) -> bool {
        now_ms - timestamp_ms <= duration_ms(self.range)
    }

    /// Occurrences inside the window
    pub fn count_in_window(&self, occurrences: &[i64], now_ms: i64) -> usize {
        occurrences
            .iter()
            .filter(|ts| self.in_window(**ts, now_ms))
            .count()
    }

    pub fn is_over_limit(&self, occurrences: &[i64], now_ms: i64) -> bool {
        self.count_in_window(occurrences, now_ms) >= self.count as usize
    }
}

#[cfg(test)]
#[path = "frequency_tests.rs"]
mod tests;
