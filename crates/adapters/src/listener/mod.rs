// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Schedule lifecycle listeners

mod noop;

pub use noop::NoOpListener;

// Test support - only compiled for tests or when explicitly requested
#[cfg(any(test, feature = "test-support"))]
mod recording;
#[cfg(any(test, feature = "test-support"))]
pub use recording::{ListenerCall, RecordingListener};

use rota_core::Schedule;

/// Observer of schedule lifecycle notifications
///
/// Called from the engine task after the change is durable.
pub trait ScheduleListener: Clone + Send + Sync + 'static {
    fn on_new_schedule(&self, _schedule: &Schedule) {}

    fn on_schedule_cancelled(&self, _schedule: &Schedule) {}

    fn on_schedule_expired(&self, _schedule: &Schedule) {}

    fn on_schedule_limit_reached(&self, _schedule: &Schedule) {}
}

#[cfg(test)]
#[path = "listener_tests.rs"]
mod tests;
