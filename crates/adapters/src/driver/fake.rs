// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fake driver for testing
#![cfg_attr(coverage_nightly, coverage(off))]

use super::{Driver, DriverError};
use async_trait::async_trait;
use rota_core::{PrepareResult, ReadyResult, Schedule, TriggerContext};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use tokio::sync::watch;

/// Recorded driver call
#[derive(Debug, Clone, PartialEq)]
pub enum DriverCall {
    Prepare {
        id: String,
        priority: i32,
        context: Option<TriggerContext>,
    },
    CheckReadiness {
        id: String,
    },
    Execute {
        id: String,
    },
    Interrupted {
        id: String,
    },
    Discard {
        id: String,
    },
}

#[derive(Default)]
struct Script {
    prepare: HashMap<String, VecDeque<PrepareResult>>,
    readiness: HashMap<String, VecDeque<Result<ReadyResult, String>>>,
}

/// Fake driver with scripted results
///
/// Unscripted calls answer `Continue`.
#[derive(Clone)]
pub struct FakeDriver {
    calls: Arc<Mutex<Vec<DriverCall>>>,
    script: Arc<Mutex<Script>>,
    hold: Arc<watch::Sender<bool>>,
}

impl Default for FakeDriver {
    fn default() -> Self {
        let (hold, _) = watch::channel(false);
        Self {
            calls: Arc::default(),
            script: Arc::default(),
            hold: Arc::new(hold),
        }
    }
}

impl FakeDriver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get all recorded calls
    pub fn calls(&self) -> Vec<DriverCall> {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Ids passed to `execute`, in call order
    pub fn executed(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                DriverCall::Execute { id } => Some(id),
                _ => None,
            })
            .collect()
    }

    /// Ids passed to `discard`, in call order
    pub fn discarded(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                DriverCall::Discard { id } => Some(id),
                _ => None,
            })
            .collect()
    }

    /// Number of `prepare` calls for a schedule
    pub fn prepare_count(&self, id: &str) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, DriverCall::Prepare { id: p, .. } if p == id))
            .count()
    }

    /// Queue prepare results for a schedule, consumed in order
    pub fn push_prepare(&self, id: &str, results: impl IntoIterator<Item = PrepareResult>) {
        self.script
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .prepare
            .entry(id.to_string())
            .or_default()
            .extend(results);
    }

    /// Queue readiness results for a schedule; `Err` makes the check fail
    pub fn push_readiness(
        &self,
        id: &str,
        results: impl IntoIterator<Item = Result<ReadyResult, String>>,
    ) {
        self.script
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .readiness
            .entry(id.to_string())
            .or_default()
            .extend(results);
    }

    /// Block every `prepare` call until [`FakeDriver::release_prepares`]
    pub fn hold_prepares(&self) {
        self.hold.send_replace(true);
    }

    pub fn release_prepares(&self) {
        self.hold.send_replace(false);
    }

    fn record(&self, call: DriverCall) {
        self.calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(call);
    }
}

#[async_trait]
impl Driver for FakeDriver {
    async fn prepare(&self, schedule: &Schedule, context: Option<&TriggerContext>) -> PrepareResult {
        self.record(DriverCall::Prepare {
            id: schedule.id.clone(),
            priority: schedule.priority,
            context: context.cloned(),
        });

        let mut held = self.hold.subscribe();
        // Sender lives in self, so this only errors if the driver is dropped
        let _ = held.wait_for(|h| !*h).await;

        self.script
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .prepare
            .get_mut(&schedule.id)
            .and_then(VecDeque::pop_front)
            .unwrap_or(PrepareResult::Continue)
    }

    fn check_readiness(&self, schedule: &Schedule) -> Result<ReadyResult, DriverError> {
        self.record(DriverCall::CheckReadiness {
            id: schedule.id.clone(),
        });
        self.script
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .readiness
            .get_mut(&schedule.id)
            .and_then(VecDeque::pop_front)
            .unwrap_or(Ok(ReadyResult::Continue))
            .map_err(DriverError::Readiness)
    }

    async fn execute(&self, schedule: &Schedule) {
        self.record(DriverCall::Execute {
            id: schedule.id.clone(),
        });
    }

    fn on_execution_interrupted(&self, schedule: &Schedule) {
        self.record(DriverCall::Interrupted {
            id: schedule.id.clone(),
        });
    }

    fn discard(&self, schedule_id: &str) {
        self.record(DriverCall::Discard {
            id: schedule_id.to_string(),
        });
    }
}

#[cfg(test)]
#[path = "fake_tests.rs"]
mod tests;
