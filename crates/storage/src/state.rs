// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Materialized state from WAL replay

use rota_core::{FrequencyConstraint, Operation, Schedule, ScheduleType, TimerKind};
use std::collections::{BTreeSet, HashMap};

/// Materialized state built from WAL operations
#[derive(Debug, Default, Clone)]
pub struct MaterializedState {
    pub schedules: HashMap<String, Schedule>,
    /// Durable timer deadlines by timer id
    pub timers: HashMap<String, i64>,
    pub constraints: HashMap<String, FrequencyConstraint>,
    /// Occurrence timestamps by constraint id
    pub occurrences: HashMap<String, Vec<i64>>,
    by_group: HashMap<String, BTreeSet<String>>,
    by_type: HashMap<ScheduleType, BTreeSet<String>>,
}

impl MaterializedState {
    pub fn get_schedule(&self, id: &str) -> Option<&Schedule> {
        self.schedules.get(id)
    }

    /// Schedules in a group, optionally narrowed to one payload type
    pub fn schedules_in_group(
        &self,
        group: &str,
        schedule_type: Option<ScheduleType>,
    ) -> Vec<&Schedule> {
        self.by_group
            .get(group)
            .into_iter()
            .flatten()
            .filter_map(|id| self.schedules.get(id))
            .filter(|s| match schedule_type {
                Some(t) => s.schedule_type() == t,
                None => true,
            })
            .collect()
    }

    pub fn schedules_of_type(&self, schedule_type: ScheduleType) -> Vec<&Schedule> {
        self.by_type
            .get(&schedule_type)
            .into_iter()
            .flatten()
            .filter_map(|id| self.schedules.get(id))
            .collect()
    }

    /// Full table scan ordered by id
    pub fn scan(&self) -> Vec<&Schedule> {
        let mut all: Vec<_> = self.schedules.values().collect();
        all.sort_by(|a, b| a.id.cmp(&b.id));
        all
    }

    pub fn schedule_count(&self) -> usize {
        self.schedules.len()
    }

    pub fn occurrences_for(&self, constraint_id: &str) -> &[i64] {
        self.occurrences
            .get(constraint_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Apply an operation to update the state
    pub fn apply(&mut self, op: &Operation) {
        match op {
            Operation::ScheduleUpsert { schedule } => {
                self.unindex(&schedule.id);
                if let Some(group) = &schedule.group {
                    self.by_group
                        .entry(group.clone())
                        .or_default()
                        .insert(schedule.id.clone());
                }
                self.by_type
                    .entry(schedule.schedule_type())
                    .or_default()
                    .insert(schedule.id.clone());
                self.schedules
                    .insert(schedule.id.clone(), schedule.as_ref().clone());
            }

            Operation::ScheduleDelete { id } => {
                self.unindex(id);
                self.schedules.remove(id);
                self.timers.remove(&TimerKind::Delay.timer_id(id));
                self.timers.remove(&TimerKind::Interval.timer_id(id));
            }

            Operation::TimerSet { id, fire_at_ms } => {
                self.timers.insert(id.clone(), *fire_at_ms);
            }

            Operation::TimerCancel { id } => {
                self.timers.remove(id);
            }

            Operation::ConstraintsReplace { constraints } => {
                self.constraints = constraints
                    .iter()
                    .map(|c| (c.id.clone(), c.clone()))
                    .collect();
                let known = &self.constraints;
                self.occurrences.retain(|id, _| known.contains_key(id));
            }

            Operation::OccurrenceRecord {
                constraint_ids,
                timestamp_ms,
            } => {
                for id in constraint_ids {
                    let Some(constraint) = self.constraints.get(id) else {
                        continue;
                    };
                    let entries = self.occurrences.entry(id.clone()).or_default();
                    entries.retain(|ts| constraint.in_window(*ts, *timestamp_ms));
                    entries.push(*timestamp_ms);
                }
            }
        }
    }

    /// Operations that rebuild this state from empty
    pub fn to_operations(&self) -> Vec<Operation> {
        let mut ops = Vec::new();

        let mut constraints: Vec<_> = self.constraints.values().cloned().collect();
        constraints.sort_by(|a, b| a.id.cmp(&b.id));
        ops.push(Operation::ConstraintsReplace { constraints });

        let mut history: Vec<_> = self
            .occurrences
            .iter()
            .flat_map(|(id, stamps)| stamps.iter().map(move |ts| (*ts, id.clone())))
            .collect();
        history.sort();
        ops.extend(history.into_iter().map(|(timestamp_ms, id)| {
            Operation::OccurrenceRecord {
                constraint_ids: vec![id],
                timestamp_ms,
            }
        }));

        ops.extend(self.scan().into_iter().map(Operation::upsert));

        let mut timers: Vec<_> = self.timers.iter().collect();
        timers.sort();
        ops.extend(timers.into_iter().map(|(id, fire_at_ms)| Operation::TimerSet {
            id: id.clone(),
            fire_at_ms: *fire_at_ms,
        }));

        ops
    }

    fn unindex(&mut self, id: &str) {
        let Some(existing) = self.schedules.get(id) else {
            return;
        };
        if let Some(group) = &existing.group {
            if let Some(ids) = self.by_group.get_mut(group) {
                ids.remove(id);
                if ids.is_empty() {
                    self.by_group.remove(group);
                }
            }
        }
        if let Some(ids) = self.by_type.get_mut(&existing.schedule_type()) {
            ids.remove(id);
        }
    }
}

#[cfg(test)]
#[path = "state_tests.rs"]
mod tests;
