// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Frequency limit manager
//!
//! Constraints and their occurrence history live in the schedule store, so
//! they share its WAL and its mutex.

use rota_core::{Clock, FrequencyConstraint, Operation};
use rota_storage::{Store, StoreError};
use std::sync::{Arc, Mutex};

#[derive(Clone)]
pub struct FrequencyLimitManager<K> {
    store: Arc<Mutex<Store>>,
    clock: K,
}

impl<K: Clock> FrequencyLimitManager<K> {
    pub fn new(store: Arc<Mutex<Store>>, clock: K) -> Self {
        Self { store, clock }
    }

    /// Replace the known constraints
    ///
    /// History for constraints that are no longer listed is dropped.
    pub fn update_constraints(&self, constraints: Vec<FrequencyConstraint>) -> Result<(), StoreError> {
        let count = constraints.len();
        self.store
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .apply(&Operation::ConstraintsReplace { constraints })?;
        tracing::info!(count, "frequency constraints updated");
        Ok(())
    }

    /// Checker bound to the current definitions of `ids`; unknown ids are ignored
    pub fn frequency_checker(&self, ids: &[String]) -> FrequencyChecker<K> {
        let store = self.store.lock().unwrap_or_else(|e| e.into_inner());
        let constraints: Vec<_> = ids
            .iter()
            .filter_map(|id| store.state().constraints.get(id).cloned())
            .collect();
        if constraints.len() < ids.len() {
            tracing::debug!(
                requested = ids.len(),
                known = constraints.len(),
                "ignoring unknown frequency constraints"
            );
        }
        FrequencyChecker {
            store: Arc::clone(&self.store),
            clock: self.clock.clone(),
            constraints,
        }
    }
}

/// Constraint snapshot for one schedule execution
#[derive(Clone)]
pub struct FrequencyChecker<K> {
    store: Arc<Mutex<Store>>,
    clock: K,
    constraints: Vec<FrequencyConstraint>,
}

impl<K: Clock> FrequencyChecker<K> {
    /// Whether any bound constraint is already at its count
    pub fn is_over_limit(&self) -> bool {
        let store = self.store.lock().unwrap_or_else(|e| e.into_inner());
        over_limit(&store, &self.constraints, self.clock.now_ms())
    }

    /// Record an occurrence if every constraint permits one
    ///
    /// The check and the write happen under one lock.
    pub fn check_and_increment(&self) -> Result<bool, StoreError> {
        if self.constraints.is_empty() {
            return Ok(true);
        }
        let mut store = self.store.lock().unwrap_or_else(|e| e.into_inner());
        let now_ms = self.clock.now_ms();
        if over_limit(&store, &self.constraints, now_ms) {
            return Ok(false);
        }
        store.apply(&Operation::OccurrenceRecord {
            constraint_ids: self.constraints.iter().map(|c| c.id.clone()).collect(),
            timestamp_ms: now_ms,
        })?;
        Ok(true)
    }
}

fn over_limit(store: &Store, constraints: &[FrequencyConstraint], now_ms: i64) -> bool {
    constraints
        .iter()
        .any(|c| c.is_over_limit(store.state().occurrences_for(&c.id), now_ms))
}

#[cfg(test)]
#[path = "limits_tests.rs"]
mod tests;
