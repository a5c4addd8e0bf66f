// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Recording listener for testing
#![cfg_attr(coverage_nightly, coverage(off))]

use super::ScheduleListener;
use rota_core::Schedule;
use std::sync::{Arc, Mutex};

/// Recorded notification, by schedule id
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListenerCall {
    NewSchedule(String),
    Cancelled(String),
    Expired(String),
    LimitReached(String),
}

/// Listener that records every notification
#[derive(Clone, Default)]
pub struct RecordingListener {
    calls: Arc<Mutex<Vec<ListenerCall>>>,
}

impl RecordingListener {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get all recorded calls
    pub fn calls(&self) -> Vec<ListenerCall> {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Number of recorded calls equal to `call`
    pub fn count(&self, call: &ListenerCall) -> usize {
        self.calls().iter().filter(|c| *c == call).count()
    }

    fn record(&self, call: ListenerCall) {
        self.calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(call);
    }
}

impl ScheduleListener for RecordingListener {
    fn on_new_schedule(&self, schedule: &Schedule) {
        self.record(ListenerCall::NewSchedule(schedule.id.clone()));
    }

    fn on_schedule_cancelled(&self, schedule: &Schedule) {
        self.record(ListenerCall::Cancelled(schedule.id.clone()));
    }

    fn on_schedule_expired(&self, schedule: &Schedule) {
        self.record(ListenerCall::Expired(schedule.id.clone()));
    }

    fn on_schedule_limit_reached(&self, schedule: &Schedule) {
        self.record(ListenerCall::LimitReached(schedule.id.clone()));
    }
}
