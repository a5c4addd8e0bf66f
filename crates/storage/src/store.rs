// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! WAL-backed schedule store
//!
//! Every mutation is appended to the log before it touches the in-memory
//! state, so a reopened store sees exactly the acknowledged writes.

use crate::state::MaterializedState;
use crate::wal::{Wal, WalError};
use rota_core::{Operation, Schedule, ScheduleType};
use std::path::Path;
use thiserror::Error;

/// Errors from store operations
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("WAL error: {0}")]
    Wal(#[from] WalError),
}

/// Durable schedule store with crash recovery
pub struct Store {
    wal: Wal,
    state: MaterializedState,
    /// WAL sequence right after the last compaction
    compacted_at: u64,
}

impl Store {
    /// Open or create a store, replaying the log into memory
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let mut state = MaterializedState::default();
        let ops = Wal::replay(path)?;
        let replayed = ops.len();
        for op in &ops {
            state.apply(op);
        }
        let wal = Wal::open(path)?;

        tracing::debug!(
            path = %path.display(),
            replayed,
            schedules = state.schedule_count(),
            "store opened"
        );
        Ok(Self {
            wal,
            state,
            compacted_at: 0,
        })
    }

    /// Persist an operation and apply it
    pub fn apply(&mut self, op: &Operation) -> Result<(), StoreError> {
        self.wal.append(op)?;
        self.state.apply(op);
        Ok(())
    }

    /// Rewrite the log as the minimal set of operations for the current state
    pub fn compact(&mut self) -> Result<(), StoreError> {
        let before = self.wal.sequence();
        let ops = self.state.to_operations();
        let path = self.wal.path().to_path_buf();
        self.wal = Wal::rewrite(&path, &ops)?;
        self.compacted_at = self.wal.sequence();
        tracing::info!(before, after = self.compacted_at, "compacted WAL");
        Ok(())
    }

    /// Compact once `threshold` entries were appended since the last compaction
    ///
    /// Returns whether the log was rewritten.
    pub fn compact_if_grown(&mut self, threshold: u64) -> Result<bool, StoreError> {
        if self.appended_since_compaction() < threshold {
            return Ok(false);
        }
        self.compact()?;
        Ok(true)
    }

    /// Entries appended since the last compaction, or since open
    pub fn appended_since_compaction(&self) -> u64 {
        self.wal.sequence().saturating_sub(self.compacted_at)
    }

    pub fn state(&self) -> &MaterializedState {
        &self.state
    }

    pub fn sequence(&self) -> u64 {
        self.wal.sequence()
    }

    pub fn get(&self, id: &str) -> Option<&Schedule> {
        self.state.get_schedule(id)
    }

    pub fn upsert(&mut self, schedule: &Schedule) -> Result<(), StoreError> {
        self.apply(&Operation::upsert(schedule))
    }

    /// Delete a schedule row, returning whether it existed
    pub fn delete(&mut self, id: &str) -> Result<bool, StoreError> {
        if self.state.get_schedule(id).is_none() {
            return Ok(false);
        }
        self.apply(&Operation::ScheduleDelete { id: id.to_string() })?;
        Ok(true)
    }

    pub fn by_group(&self, group: &str, schedule_type: Option<ScheduleType>) -> Vec<Schedule> {
        self.state
            .schedules_in_group(group, schedule_type)
            .into_iter()
            .cloned()
            .collect()
    }

    pub fn by_type(&self, schedule_type: ScheduleType) -> Vec<Schedule> {
        self.state
            .schedules_of_type(schedule_type)
            .into_iter()
            .cloned()
            .collect()
    }

    pub fn all(&self) -> Vec<Schedule> {
        self.state.scan().into_iter().cloned().collect()
    }
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;
