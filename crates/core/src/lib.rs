// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! rota-core: schedule model and pure decision logic
//!
//! This crate provides:
//! - The schedule model and its validating factory
//! - A pure state machine for schedule execution
//! - Trigger, audience and frequency evaluation
//! - WAL operations and effects consumed by the engine

pub mod clock;
pub mod id;
pub mod traced;

// Matching primitives (order matters for dependencies)
pub mod version;
pub mod matcher;
pub mod trigger;
pub mod audience;
pub mod frequency;

// Schedules and their state machine
pub mod schedule;
pub mod operation;
pub mod effect;
pub mod lifecycle;

// Re-exports
pub use audience::{
    check_audience, test_device_digest, Audience, AudiencePhase, DeviceSnapshot, MissBehavior,
    Platform, TagSelector,
};
pub use clock::{Clock, FakeClock, SystemClock};
pub use effect::{Effect, Notification};
pub use frequency::FrequencyConstraint;
pub use id::{IdGen, SequentialIdGen, UuidIdGen};
pub use lifecycle::{PrepareResult, ReadyResult, ScheduleInput, TimerKind};
pub use matcher::{JsonMatcher, JsonPredicate, ValueMatcher};
pub use operation::Operation;
pub use schedule::{
    AppState, DeferredData, ExecutionState, Schedule, ScheduleData, ScheduleDelay, ScheduleEdits,
    ScheduleError, ScheduleInfo, ScheduleType,
};
pub use traced::TracedEffect;
pub use trigger::{evaluate, EventKind, Trigger, TriggerContext, TriggerType, TRIGGER_LIMIT};
pub use version::{VersionMatcher, VersionMatcherError};
