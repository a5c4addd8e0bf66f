// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Schedule execution drivers

// Test support - only compiled for tests or when explicitly requested
#[cfg(any(test, feature = "test-support"))]
mod fake;
#[cfg(any(test, feature = "test-support"))]
pub use fake::{DriverCall, FakeDriver};

use async_trait::async_trait;
use rota_core::{PrepareResult, ReadyResult, Schedule, ScheduleData, TriggerContext};
use thiserror::Error;

/// Errors from driver operations
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DriverError {
    #[error("readiness check failed: {0}")]
    Readiness(String),
    #[error("no delegate registered for {0}")]
    MissingDelegate(&'static str),
}

/// Host-side hooks the engine calls as a schedule moves through execution
///
/// `prepare` and `execute` run off the engine task; `check_readiness` is
/// called inline and must not block.
#[async_trait]
pub trait Driver: Clone + Send + Sync + 'static {
    /// Prepare a triggered schedule for display or action
    async fn prepare(&self, schedule: &Schedule, context: Option<&TriggerContext>) -> PrepareResult;

    /// Whether a prepared schedule can execute right now
    fn check_readiness(&self, schedule: &Schedule) -> Result<ReadyResult, DriverError>;

    /// Run a ready schedule, returning once execution is finished
    async fn execute(&self, schedule: &Schedule);

    /// Called once for a schedule found executing when the engine restarts
    fn on_execution_interrupted(&self, schedule: &Schedule);

    /// Drop anything held from a prepare that will never execute
    ///
    /// Called when a schedule is deleted or leaves the waiting state without
    /// executing.
    fn discard(&self, _schedule_id: &str) {}
}

/// Per-payload-type hooks used by a composite driver
///
/// `data` is the payload to act on. For deferred schedules it is the
/// resolved content rather than the schedule's own data.
#[async_trait]
pub trait PayloadDelegate: Send + Sync + 'static {
    async fn prepare(&self, schedule: &Schedule, data: &ScheduleData) -> PrepareResult;

    fn check_readiness(&self, _schedule: &Schedule, _data: &ScheduleData) -> ReadyResult {
        ReadyResult::Continue
    }

    async fn execute(&self, schedule: &Schedule, data: &ScheduleData);

    fn on_execution_interrupted(&self, _schedule: &Schedule) {}
}
