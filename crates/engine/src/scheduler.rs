// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Durable timer heap keyed by absolute wall-clock deadlines

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};

/// Timer deadlines in epoch milliseconds
///
/// Re-arming an id replaces its deadline; stale heap entries are skipped
/// when they surface.
#[derive(Debug, Default)]
pub struct Scheduler {
    heap: BinaryHeap<Reverse<(i64, String)>>,
    deadlines: HashMap<String, i64>,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arm (or re-arm) a timer
    pub fn set_timer(&mut self, id: String, fire_at_ms: i64) {
        self.deadlines.insert(id.clone(), fire_at_ms);
        self.heap.push(Reverse((fire_at_ms, id)));
    }

    /// Disarm a timer, returning whether it was armed
    pub fn cancel_timer(&mut self, id: &str) -> bool {
        self.deadlines.remove(id).is_some()
    }

    /// Remove and return every timer due at `now_ms`, earliest first
    pub fn fired_timers(&mut self, now_ms: i64) -> Vec<String> {
        let mut fired = Vec::new();
        while let Some(Reverse((fire_at_ms, _))) = self.heap.peek() {
            if *fire_at_ms > now_ms {
                break;
            }
            let Some(Reverse((fire_at_ms, id))) = self.heap.pop() else {
                break;
            };
            // Skip entries that were cancelled or re-armed
            if self.deadlines.get(&id) == Some(&fire_at_ms) {
                self.deadlines.remove(&id);
                fired.push(id);
            }
        }
        fired
    }

    pub fn next_deadline(&self) -> Option<i64> {
        self.deadlines.values().min().copied()
    }

    pub fn has_timers(&self) -> bool {
        !self.deadlines.is_empty()
    }
}

#[cfg(test)]
#[path = "scheduler_tests.rs"]
mod tests;
