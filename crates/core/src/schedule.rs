// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Schedule model
//!
//! A [`Schedule`] is built from a plain [`ScheduleInfo`] through the
//! validating [`Schedule::new`]; invalid definitions never reach the store.

use crate::audience::Audience;
use crate::clock::duration_ms;
use crate::id::IdGen;
use crate::trigger::{Trigger, TriggerContext, TRIGGER_LIMIT};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::time::Duration;
use thiserror::Error;

/// Errors from building or editing a schedule
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ScheduleError {
    #[error("schedule must have at least one trigger")]
    NoTriggers,
    #[error("schedule has {0} triggers, at most {TRIGGER_LIMIT} allowed")]
    TooManyTriggers(usize),
    #[error("delay has {0} cancellation triggers, at most {TRIGGER_LIMIT} allowed")]
    TooManyCancellationTriggers(usize),
    #[error("trigger {index} has invalid goal {goal}, must be greater than zero")]
    InvalidGoal { index: usize, goal: f64 },
    #[error("schedule end {end_ms} must be after start {start_ms}")]
    EndBeforeStart { start_ms: i64, end_ms: i64 },
    #[error("deferred schedule url must not be empty")]
    EmptyDeferredUrl,
}

/// Payload discriminant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScheduleType {
    Actions,
    InAppMessage,
    Deferred,
}

impl ScheduleType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScheduleType::Actions => "actions",
            ScheduleType::InAppMessage => "in_app_message",
            ScheduleType::Deferred => "deferred",
        }
    }
}

/// Remote payload location for deferred schedules
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeferredData {
    pub url: String,
    #[serde(default = "default_true")]
    pub retry_on_timeout: bool,
}

fn default_true() -> bool {
    true
}

/// Schedule payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum ScheduleData {
    Actions(Value),
    InAppMessage(Value),
    Deferred(DeferredData),
}

impl ScheduleData {
    pub fn schedule_type(&self) -> ScheduleType {
        match self {
            ScheduleData::Actions(_) => ScheduleType::Actions,
            ScheduleData::InAppMessage(_) => ScheduleType::InAppMessage,
            ScheduleData::Deferred(_) => ScheduleType::Deferred,
        }
    }
}

/// App state a delayed schedule waits for
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AppState {
    #[default]
    Any,
    Foreground,
    Background,
}

/// Conditions between triggering and execution
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduleDelay {
    pub seconds: u64,
    pub app_state: AppState,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub screens: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub region_id: Option<String>,
    /// Triggers that abort a pending delay and return the schedule to idle
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub cancellation_triggers: Vec<Trigger>,
}

impl ScheduleDelay {
    /// Whether the app/screen/region conditions hold
    pub fn conditions_met(
        &self,
        app_state: AppState,
        screen: Option<&str>,
        region: Option<&str>,
    ) -> bool {
        let app_ok = match self.app_state {
            AppState::Any => true,
            wanted => wanted == app_state,
        };
        let screen_ok =
            self.screens.is_empty() || screen.is_some_and(|s| self.screens.iter().any(|w| w == s));
        let region_ok = match &self.region_id {
            None => true,
            Some(wanted) => region == Some(wanted.as_str()),
        };
        app_ok && screen_ok && region_ok
    }
}

/// Persisted execution state
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionState {
    #[default]
    Idle,
    Triggered,
    TimeDelayed,
    PreparingSchedule,
    WaitingScheduleConditions,
    Executing,
    Paused,
    Finished,
}

impl ExecutionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExecutionState::Idle => "idle",
            ExecutionState::Triggered => "triggered",
            ExecutionState::TimeDelayed => "time_delayed",
            ExecutionState::PreparingSchedule => "preparing_schedule",
            ExecutionState::WaitingScheduleConditions => "waiting_schedule_conditions",
            ExecutionState::Executing => "executing",
            ExecutionState::Paused => "paused",
            ExecutionState::Finished => "finished",
        }
    }
}

impl std::fmt::Display for ExecutionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Caller-supplied schedule definition
#[derive(Debug, Clone, PartialEq)]
pub struct ScheduleInfo {
    pub id: Option<String>,
    pub group: Option<String>,
    pub data: ScheduleData,
    pub triggers: Vec<Trigger>,
    pub delay: Option<ScheduleDelay>,
    pub start_ms: Option<i64>,
    pub end_ms: Option<i64>,
    pub priority: i32,
    pub limit: u32,
    pub interval: Duration,
    pub edit_grace_period: Duration,
    pub audience: Option<Audience>,
    pub frequency_constraint_ids: Vec<String>,
    pub metadata: BTreeMap<String, Value>,
    pub campaigns: Option<Value>,
    pub reporting_context: Option<Value>,
}

impl ScheduleInfo {
    pub fn new(data: ScheduleData, triggers: Vec<Trigger>) -> Self {
        Self {
            id: None,
            group: None,
            data,
            triggers,
            delay: None,
            start_ms: None,
            end_ms: None,
            priority: 0,
            limit: 1,
            interval: Duration::ZERO,
            edit_grace_period: Duration::ZERO,
            audience: None,
            frequency_constraint_ids: Vec::new(),
            metadata: BTreeMap::new(),
            campaigns: None,
            reporting_context: None,
        }
    }
}

/// A persisted unit of "do X when triggers fire" work
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Schedule {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
    pub data: ScheduleData,
    pub triggers: Vec<Trigger>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delay: Option<ScheduleDelay>,
    pub start_ms: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_ms: Option<i64>,
    pub priority: i32,
    /// Maximum executions, 0 for unlimited
    pub limit: u32,
    #[serde(with = "humantime_serde")]
    pub interval: Duration,
    #[serde(with = "humantime_serde")]
    pub edit_grace_period: Duration,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audience: Option<Audience>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub frequency_constraint_ids: Vec<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub campaigns: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reporting_context: Option<Value>,
    pub created_ms: i64,

    pub state: ExecutionState,
    pub state_changed_ms: i64,
    pub count: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub triggered_time_ms: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trigger_context: Option<TriggerContext>,
    #[serde(default)]
    pub execution_invalidated: bool,
}

impl Schedule {
    /// Validate a definition and build an idle schedule
    pub fn new(info: ScheduleInfo, ids: &impl IdGen, now_ms: i64) -> Result<Self, ScheduleError> {
        validate_triggers(&info.triggers)?;
        if let Some(delay) = &info.delay {
            if delay.cancellation_triggers.len() > TRIGGER_LIMIT {
                return Err(ScheduleError::TooManyCancellationTriggers(
                    delay.cancellation_triggers.len(),
                ));
            }
            validate_goals(&delay.cancellation_triggers)?;
        }
        if let ScheduleData::Deferred(deferred) = &info.data {
            if deferred.url.trim().is_empty() {
                return Err(ScheduleError::EmptyDeferredUrl);
            }
        }

        let start_ms = info.start_ms.unwrap_or(now_ms);
        if let Some(end_ms) = info.end_ms {
            if end_ms <= start_ms {
                return Err(ScheduleError::EndBeforeStart { start_ms, end_ms });
            }
        }

        Ok(Self {
            id: info.id.unwrap_or_else(|| ids.next_id()),
            group: info.group,
            data: info.data,
            triggers: info.triggers,
            delay: info.delay,
            start_ms,
            end_ms: info.end_ms,
            priority: info.priority,
            limit: info.limit,
            interval: info.interval,
            edit_grace_period: info.edit_grace_period,
            audience: info.audience,
            frequency_constraint_ids: info.frequency_constraint_ids,
            metadata: info.metadata,
            campaigns: info.campaigns,
            reporting_context: info.reporting_context,
            created_ms: now_ms,
            state: ExecutionState::Idle,
            state_changed_ms: now_ms,
            count: 0,
            triggered_time_ms: None,
            trigger_context: None,
            execution_invalidated: false,
        })
    }

    pub fn schedule_type(&self) -> ScheduleType {
        self.data.schedule_type()
    }

    /// `end` is exclusive
    pub fn is_expired(&self, now_ms: i64) -> bool {
        self.end_ms.is_some_and(|end| end <= now_ms)
    }

    pub fn is_over_limit(&self) -> bool {
        self.limit > 0 && self.count >= self.limit
    }

    pub fn has_started(&self, now_ms: i64) -> bool {
        self.start_ms <= now_ms
    }

    /// Whether a finished schedule can still be revived by an edit
    pub fn within_grace_period(&self, now_ms: i64) -> bool {
        now_ms - self.state_changed_ms <= duration_ms(self.edit_grace_period)
    }

    pub fn delay_seconds(&self) -> u64 {
        self.delay.as_ref().map(|d| d.seconds).unwrap_or(0)
    }

    /// Sort key for eligible schedules: triggered time, then priority
    pub fn execution_order(&self) -> (i64, i32) {
        (self.triggered_time_ms.unwrap_or(i64::MAX), self.priority)
    }
}

/// Partial overwrite of a schedule's definition fields
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScheduleEdits {
    pub data: Option<ScheduleData>,
    pub start_ms: Option<i64>,
    pub end_ms: Option<i64>,
    pub priority: Option<i32>,
    pub limit: Option<u32>,
    pub interval: Option<Duration>,
    pub edit_grace_period: Option<Duration>,
    pub audience: Option<Audience>,
    pub frequency_constraint_ids: Option<Vec<String>>,
    pub metadata: Option<BTreeMap<String, Value>>,
    pub campaigns: Option<Value>,
    pub reporting_context: Option<Value>,
}

impl ScheduleEdits {
    /// Check the edited bounds before applying
    pub fn validate(&self, current: &Schedule) -> Result<(), ScheduleError> {
        let start_ms = self.start_ms.unwrap_or(current.start_ms);
        if let Some(end_ms) = self.end_ms.or(current.end_ms) {
            if end_ms <= start_ms {
                return Err(ScheduleError::EndBeforeStart { start_ms, end_ms });
            }
        }
        if let Some(ScheduleData::Deferred(deferred)) = &self.data {
            if deferred.url.trim().is_empty() {
                return Err(ScheduleError::EmptyDeferredUrl);
            }
        }
        Ok(())
    }

    /// Overwrite only the provided fields
    pub fn apply_to(&self, schedule: &mut Schedule) {
        if let Some(data) = &self.data {
            schedule.data = data.clone();
        }
        if let Some(start_ms) = self.start_ms {
            schedule.start_ms = start_ms;
        }
        if let Some(end_ms) = self.end_ms {
            schedule.end_ms = Some(end_ms);
        }
        if let Some(priority) = self.priority {
            schedule.priority = priority;
        }
        if let Some(limit) = self.limit {
            schedule.limit = limit;
        }
        if let Some(interval) = self.interval {
            schedule.interval = interval;
        }
        if let Some(grace) = self.edit_grace_period {
            schedule.edit_grace_period = grace;
        }
        if let Some(audience) = &self.audience {
            schedule.audience = Some(audience.clone());
        }
        if let Some(ids) = &self.frequency_constraint_ids {
            schedule.frequency_constraint_ids = ids.clone();
        }
        if let Some(metadata) = &self.metadata {
            schedule.metadata = metadata.clone();
        }
        if let Some(campaigns) = &self.campaigns {
            schedule.campaigns = Some(campaigns.clone());
        }
        if let Some(context) = &self.reporting_context {
            schedule.reporting_context = Some(context.clone());
        }
    }
}

fn validate_triggers(triggers: &[Trigger]) -> Result<(), ScheduleError> {
    if triggers.is_empty() {
        return Err(ScheduleError::NoTriggers);
    }
    if triggers.len() > TRIGGER_LIMIT {
        return Err(ScheduleError::TooManyTriggers(triggers.len()));
    }
    validate_goals(triggers)
}

fn validate_goals(triggers: &[Trigger]) -> Result<(), ScheduleError> {
    for (index, trigger) in triggers.iter().enumerate() {
        if trigger.goal.is_nan() || trigger.goal <= 0.0 {
            return Err(ScheduleError::InvalidGoal {
                index,
                goal: trigger.goal,
            });
        }
    }
    Ok(())
}

#[cfg(test)]
#[path = "schedule_tests.rs"]
mod tests;
