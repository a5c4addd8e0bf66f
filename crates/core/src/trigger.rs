// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Trigger definitions and evaluation
//!
//! Evaluation is stateless: [`evaluate`] answers how much progress one event
//! contributes to one trigger. Accumulating progress toward `goal` is the
//! engine's job.

use crate::matcher::JsonPredicate;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Maximum number of triggers per schedule
pub const TRIGGER_LIMIT: usize = 10;

/// What a trigger counts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerType {
    CustomEventCount,
    CustomEventValue,
    Foreground,
    Background,
    AppInit,
    Screen,
    RegionEnter,
    RegionExit,
    ActiveSession,
    Version,
}

impl TriggerType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TriggerType::CustomEventCount => "custom_event_count",
            TriggerType::CustomEventValue => "custom_event_value",
            TriggerType::Foreground => "foreground",
            TriggerType::Background => "background",
            TriggerType::AppInit => "app_init",
            TriggerType::Screen => "screen",
            TriggerType::RegionEnter => "region_enter",
            TriggerType::RegionExit => "region_exit",
            TriggerType::ActiveSession => "active_session",
            TriggerType::Version => "version",
        }
    }

    /// The event kind this trigger listens to
    pub fn event_kind(&self) -> EventKind {
        match self {
            TriggerType::CustomEventCount | TriggerType::CustomEventValue => EventKind::CustomEvent,
            TriggerType::Foreground => EventKind::Foreground,
            TriggerType::Background => EventKind::Background,
            TriggerType::AppInit => EventKind::AppInit,
            TriggerType::Screen => EventKind::Screen,
            TriggerType::RegionEnter => EventKind::RegionEnter,
            TriggerType::RegionExit => EventKind::RegionExit,
            TriggerType::ActiveSession => EventKind::ActiveSession,
            TriggerType::Version => EventKind::Version,
        }
    }
}

/// Kinds of events fed to the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    CustomEvent,
    Foreground,
    Background,
    AppInit,
    Screen,
    RegionEnter,
    RegionExit,
    ActiveSession,
    Version,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::CustomEvent => "custom_event",
            EventKind::Foreground => "foreground",
            EventKind::Background => "background",
            EventKind::AppInit => "app_init",
            EventKind::Screen => "screen",
            EventKind::RegionEnter => "region_enter",
            EventKind::RegionExit => "region_exit",
            EventKind::ActiveSession => "active_session",
            EventKind::Version => "version",
        }
    }
}

/// A counter that accumulates progress toward `goal`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trigger {
    #[serde(rename = "type")]
    pub trigger_type: TriggerType,
    pub goal: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub predicate: Option<JsonPredicate>,
}

impl Trigger {
    pub fn new(trigger_type: TriggerType, goal: f64) -> Self {
        Self {
            trigger_type,
            goal,
            predicate: None,
        }
    }

    pub fn with_predicate(mut self, predicate: JsonPredicate) -> Self {
        self.predicate = Some(predicate);
        self
    }
}

/// Trigger that fired together with the event that fired it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriggerContext {
    pub trigger: Trigger,
    pub event: Value,
}

/// Progress one event contributes to a trigger, or `None` when it does not match
pub fn evaluate(trigger: &Trigger, kind: EventKind, event: &Value) -> Option<f64> {
    if trigger.trigger_type.event_kind() != kind {
        return None;
    }
    if let Some(predicate) = &trigger.predicate {
        if !predicate.matches(event) {
            return None;
        }
    }

    match trigger.trigger_type {
        TriggerType::CustomEventValue => event.get("event_value").and_then(Value::as_f64),
        _ => Some(1.0),
    }
}

#[cfg(test)]
#[path = "trigger_tests.rs"]
mod tests;
