// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Operations for the write-ahead log

use crate::frequency::FrequencyConstraint;
use crate::schedule::Schedule;
use serde::{Deserialize, Serialize};

/// Operations that can be persisted to the WAL
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Operation {
    /// Insert or replace a schedule row
    ScheduleUpsert { schedule: Box<Schedule> },

    /// Remove a schedule row and its timers
    ScheduleDelete { id: String },

    /// Arm a durable timer at an absolute time
    TimerSet { id: String, fire_at_ms: i64 },

    /// Disarm a durable timer
    TimerCancel { id: String },

    /// Replace the known frequency constraints
    ConstraintsReplace { constraints: Vec<FrequencyConstraint> },

    /// Record one occurrence against each listed constraint
    OccurrenceRecord {
        constraint_ids: Vec<String>,
        timestamp_ms: i64,
    },
}

impl Operation {
    pub fn name(&self) -> &'static str {
        match self {
            Operation::ScheduleUpsert { .. } => "schedule_upsert",
            Operation::ScheduleDelete { .. } => "schedule_delete",
            Operation::TimerSet { .. } => "timer_set",
            Operation::TimerCancel { .. } => "timer_cancel",
            Operation::ConstraintsReplace { .. } => "constraints_replace",
            Operation::OccurrenceRecord { .. } => "occurrence_record",
        }
    }

    pub fn upsert(schedule: &Schedule) -> Self {
        Operation::ScheduleUpsert {
            schedule: Box::new(schedule.clone()),
        }
    }
}

#[cfg(test)]
#[path = "operation_tests.rs"]
mod tests;
