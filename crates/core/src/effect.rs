// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Effects produced by schedule transitions

use crate::operation::Operation;
use crate::schedule::Schedule;
use crate::traced::TracedEffect;

/// Caller-facing notifications
#[derive(Debug, Clone, PartialEq)]
pub enum Notification {
    NewSchedule(Box<Schedule>),
    Cancelled(Box<Schedule>),
    Expired(Box<Schedule>),
    LimitReached(Box<Schedule>),
    /// Delivered to the driver, not the listener
    ExecutionInterrupted(Box<Schedule>),
}

impl Notification {
    pub fn name(&self) -> &'static str {
        match self {
            Notification::NewSchedule(_) => "new_schedule",
            Notification::Cancelled(_) => "cancelled",
            Notification::Expired(_) => "expired",
            Notification::LimitReached(_) => "limit_reached",
            Notification::ExecutionInterrupted(_) => "execution_interrupted",
        }
    }

    pub fn schedule(&self) -> &Schedule {
        match self {
            Notification::NewSchedule(s)
            | Notification::Cancelled(s)
            | Notification::Expired(s)
            | Notification::LimitReached(s)
            | Notification::ExecutionInterrupted(s) => s,
        }
    }
}

/// Side effects the engine carries out after a transition
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Append to the WAL and apply to materialized state
    Persist { operation: Operation },
    /// Arm a durable timer
    SetTimer { id: String, fire_at_ms: i64 },
    CancelTimer { id: String },
    Notify { notification: Notification },
    /// Hand the current store row to the driver for preparation
    Prepare { schedule_id: String },
    /// Check delay conditions and driver readiness
    AttemptExecution { schedule_id: String },
    Execute { schedule_id: String },
}

impl TracedEffect for Effect {
    fn name(&self) -> &'static str {
        match self {
            Effect::Persist { .. } => "persist",
            Effect::SetTimer { .. } => "set_timer",
            Effect::CancelTimer { .. } => "cancel_timer",
            Effect::Notify { .. } => "notify",
            Effect::Prepare { .. } => "prepare",
            Effect::AttemptExecution { .. } => "attempt_execution",
            Effect::Execute { .. } => "execute",
        }
    }

    fn fields(&self) -> Vec<(&'static str, String)> {
        match self {
            Effect::Persist { operation } => vec![("operation", operation.name().to_string())],
            Effect::SetTimer { id, fire_at_ms } => {
                vec![("id", id.clone()), ("fire_at_ms", fire_at_ms.to_string())]
            }
            Effect::CancelTimer { id } => vec![("id", id.clone())],
            Effect::Notify { notification } => vec![
                ("notification", notification.name().to_string()),
                ("schedule_id", notification.schedule().id.clone()),
            ],
            Effect::Prepare { schedule_id }
            | Effect::AttemptExecution { schedule_id }
            | Effect::Execute { schedule_id } => vec![("schedule_id", schedule_id.clone())],
        }
    }
}
