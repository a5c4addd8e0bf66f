// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Schedule state machine
//!
//! `transition` is pure: it returns the next schedule row and the effects
//! the engine must carry out (persist, timers, driver calls, notifications).
//! Inputs that do not apply to the current state are no-ops.

use crate::clock::duration_ms;
use crate::effect::{Effect, Notification};
use crate::operation::Operation;
use crate::schedule::{ExecutionState, Schedule, ScheduleEdits};
use crate::trigger::TriggerContext;
use serde::{Deserialize, Serialize};

/// Driver verdict after preparing a schedule
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrepareResult {
    Continue,
    Skip,
    Cancel,
    Penalize,
    Invalidate,
}

/// Driver verdict on whether a prepared schedule may run now
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReadyResult {
    Continue,
    NotReady,
    Skip,
    Invalidate,
}

/// Durable timers owned by a schedule
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerKind {
    Delay,
    Interval,
}

impl TimerKind {
    fn prefix(&self) -> &'static str {
        match self {
            TimerKind::Delay => "delay",
            TimerKind::Interval => "interval",
        }
    }

    /// Timer id for a schedule, e.g. `interval:welcome`
    pub fn timer_id(&self, schedule_id: &str) -> String {
        format!("{}:{}", self.prefix(), schedule_id)
    }

    /// Split a timer id into its kind and schedule id
    pub fn parse(timer_id: &str) -> Option<(TimerKind, &str)> {
        let (prefix, schedule_id) = timer_id.split_once(':')?;
        let kind = match prefix {
            "delay" => TimerKind::Delay,
            "interval" => TimerKind::Interval,
            _ => return None,
        };
        Some((kind, schedule_id))
    }
}

/// Inputs that drive a schedule between states
#[derive(Debug, Clone, PartialEq)]
pub enum ScheduleInput {
    /// A trigger reached its goal
    Triggered { context: TriggerContext },
    DelayElapsed,
    Prepared { result: PrepareResult },
    Readiness { result: ReadyResult },
    ExecutionFinished,
    IntervalElapsed,
    /// Found executing at start-up
    Interrupted,
    /// Restart preparation from the stored row
    Reprepare,
    CancellationTriggered,
    Cancel,
    Edited { edits: ScheduleEdits },
    /// Expiry and grace-period sweep
    Sweep,
}

impl Schedule {
    pub fn transition(&self, input: ScheduleInput, now_ms: i64) -> (Schedule, Vec<Effect>) {
        use ExecutionState as S;

        match (self.state, input) {
            (S::Idle, ScheduleInput::Triggered { context }) => {
                if self.is_expired(now_ms) {
                    return finish_expired(self.clone(), now_ms);
                }
                if !self.has_started(now_ms) || self.is_over_limit() {
                    return (self.clone(), vec![]);
                }
                let mut next = self.clone();
                next.triggered_time_ms = Some(now_ms);
                next.trigger_context = Some(context);
                next.execution_invalidated = false;

                let delay = self.delay_seconds();
                if delay > 0 {
                    let next = moved(next, S::TimeDelayed, now_ms);
                    let delay_ms = i64::try_from(delay.saturating_mul(1_000)).unwrap_or(i64::MAX);
                    let fire_at_ms = now_ms.saturating_add(delay_ms);
                    let effects = vec![
                        Effect::Persist {
                            operation: Operation::upsert(&next),
                        },
                        Effect::SetTimer {
                            id: TimerKind::Delay.timer_id(&next.id),
                            fire_at_ms,
                        },
                    ];
                    (next, effects)
                } else {
                    start_preparing(next, now_ms)
                }
            }

            (S::TimeDelayed | S::Triggered, ScheduleInput::DelayElapsed) => {
                if self.is_expired(now_ms) {
                    return finish_expired(self.clone(), now_ms);
                }
                start_preparing(self.clone(), now_ms)
            }

            (S::PreparingSchedule, ScheduleInput::Prepared { result }) => {
                if self.execution_invalidated {
                    let mut next = self.clone();
                    next.execution_invalidated = false;
                    return start_preparing(next, now_ms);
                }
                if self.is_expired(now_ms) {
                    return finish_expired(self.clone(), now_ms);
                }
                match result {
                    PrepareResult::Continue => {
                        let next = moved(self.clone(), S::WaitingScheduleConditions, now_ms);
                        let effects = vec![
                            Effect::Persist {
                                operation: Operation::upsert(&next),
                            },
                            Effect::AttemptExecution {
                                schedule_id: next.id.clone(),
                            },
                        ];
                        (next, effects)
                    }
                    PrepareResult::Skip => back_to_idle(self.clone(), now_ms),
                    PrepareResult::Penalize => pause_or_idle(self.clone(), now_ms),
                    PrepareResult::Cancel => cancelled(self.clone()),
                    PrepareResult::Invalidate => {
                        let effects = vec![Effect::Prepare {
                            schedule_id: self.id.clone(),
                        }];
                        (self.clone(), effects)
                    }
                }
            }

            (S::WaitingScheduleConditions, ScheduleInput::Readiness { result }) => {
                if self.is_expired(now_ms) {
                    return finish_expired(self.clone(), now_ms);
                }
                match result {
                    ReadyResult::Continue => {
                        let next = moved(self.clone(), S::Executing, now_ms);
                        let effects = vec![
                            Effect::Persist {
                                operation: Operation::upsert(&next),
                            },
                            Effect::Execute {
                                schedule_id: next.id.clone(),
                            },
                        ];
                        (next, effects)
                    }
                    ReadyResult::NotReady => (self.clone(), vec![]),
                    ReadyResult::Skip => back_to_idle(self.clone(), now_ms),
                    ReadyResult::Invalidate => start_preparing(self.clone(), now_ms),
                }
            }

            (S::Executing, ScheduleInput::ExecutionFinished) => {
                let mut next = self.clone();
                next.count = next.count.saturating_add(1);
                if next.is_expired(now_ms) {
                    finish_expired(next, now_ms)
                } else if next.is_over_limit() {
                    limit_reached(next, now_ms)
                } else {
                    pause_or_idle(next, now_ms)
                }
            }

            (S::Paused, ScheduleInput::IntervalElapsed) => {
                if self.is_expired(now_ms) {
                    return finish_expired(self.clone(), now_ms);
                }
                back_to_idle(self.clone(), now_ms)
            }

            (S::Executing, ScheduleInput::Interrupted) => {
                let (next, mut effects) = back_to_idle(self.clone(), now_ms);
                effects.push(Effect::Notify {
                    notification: Notification::ExecutionInterrupted(Box::new(self.clone())),
                });
                (next, effects)
            }

            (
                S::Triggered | S::PreparingSchedule | S::WaitingScheduleConditions,
                ScheduleInput::Reprepare,
            ) => start_preparing(self.clone(), now_ms),

            (
                S::TimeDelayed | S::PreparingSchedule | S::WaitingScheduleConditions,
                ScheduleInput::CancellationTriggered,
            ) => {
                let (next, mut effects) = back_to_idle(self.clone(), now_ms);
                effects.push(Effect::CancelTimer {
                    id: TimerKind::Delay.timer_id(&self.id),
                });
                (next, effects)
            }

            (_, ScheduleInput::Cancel) => cancelled(self.clone()),

            (state, ScheduleInput::Edited { edits }) => {
                let mut next = self.clone();
                edits.apply_to(&mut next);

                if state == S::Finished {
                    let revivable = self.within_grace_period(now_ms)
                        && !next.is_expired(now_ms)
                        && !next.is_over_limit();
                    if revivable {
                        return back_to_idle(next, now_ms);
                    }
                    return persisted(next);
                }

                if next.is_expired(now_ms) {
                    finish_expired(next, now_ms)
                } else if next.is_over_limit() {
                    limit_reached(next, now_ms)
                } else {
                    if state == S::PreparingSchedule {
                        next.execution_invalidated = true;
                    }
                    persisted(next)
                }
            }

            (S::Finished, ScheduleInput::Sweep) => {
                if self.edit_grace_period.is_zero() || !self.within_grace_period(now_ms) {
                    deleted(self.clone())
                } else {
                    (self.clone(), vec![])
                }
            }

            (_, ScheduleInput::Sweep) if self.is_expired(now_ms) => {
                finish_expired(self.clone(), now_ms)
            }

            _ => (self.clone(), vec![]),
        }
    }
}

fn moved(mut schedule: Schedule, state: ExecutionState, now_ms: i64) -> Schedule {
    schedule.state = state;
    schedule.state_changed_ms = now_ms;
    schedule
}

/// Clear per-cycle fields when a cycle ends
fn end_cycle(mut schedule: Schedule, state: ExecutionState, now_ms: i64) -> Schedule {
    schedule.triggered_time_ms = None;
    schedule.trigger_context = None;
    schedule.execution_invalidated = false;
    moved(schedule, state, now_ms)
}

fn persisted(schedule: Schedule) -> (Schedule, Vec<Effect>) {
    let effects = vec![Effect::Persist {
        operation: Operation::upsert(&schedule),
    }];
    (schedule, effects)
}

fn start_preparing(schedule: Schedule, now_ms: i64) -> (Schedule, Vec<Effect>) {
    let next = moved(schedule, ExecutionState::PreparingSchedule, now_ms);
    let effects = vec![
        Effect::Persist {
            operation: Operation::upsert(&next),
        },
        Effect::Prepare {
            schedule_id: next.id.clone(),
        },
    ];
    (next, effects)
}

fn back_to_idle(schedule: Schedule, now_ms: i64) -> (Schedule, Vec<Effect>) {
    persisted(end_cycle(schedule, ExecutionState::Idle, now_ms))
}

/// Interval pause when configured, idle otherwise; count is untouched
fn pause_or_idle(schedule: Schedule, now_ms: i64) -> (Schedule, Vec<Effect>) {
    if schedule.interval.is_zero() {
        return back_to_idle(schedule, now_ms);
    }
    let next = end_cycle(schedule, ExecutionState::Paused, now_ms);
    let fire_at_ms = now_ms.saturating_add(duration_ms(next.interval));
    let effects = vec![
        Effect::Persist {
            operation: Operation::upsert(&next),
        },
        Effect::SetTimer {
            id: TimerKind::Interval.timer_id(&next.id),
            fire_at_ms,
        },
    ];
    (next, effects)
}

fn cancel_timers(schedule_id: &str) -> [Effect; 2] {
    [
        Effect::CancelTimer {
            id: TimerKind::Delay.timer_id(schedule_id),
        },
        Effect::CancelTimer {
            id: TimerKind::Interval.timer_id(schedule_id),
        },
    ]
}

fn deleted(schedule: Schedule) -> (Schedule, Vec<Effect>) {
    let mut effects = vec![Effect::Persist {
        operation: Operation::ScheduleDelete {
            id: schedule.id.clone(),
        },
    }];
    effects.extend(cancel_timers(&schedule.id));
    (schedule, effects)
}

fn cancelled(schedule: Schedule) -> (Schedule, Vec<Effect>) {
    let (schedule, mut effects) = deleted(schedule);
    effects.push(Effect::Notify {
        notification: Notification::Cancelled(Box::new(schedule.clone())),
    });
    (schedule, effects)
}

/// Move to FINISHED, keeping the row only while an edit could revive it
fn finish(
    schedule: Schedule,
    now_ms: i64,
    notification: fn(Box<Schedule>) -> Notification,
) -> (Schedule, Vec<Effect>) {
    let next = end_cycle(schedule, ExecutionState::Finished, now_ms);
    let mut effects = if next.edit_grace_period.is_zero() {
        vec![Effect::Persist {
            operation: Operation::ScheduleDelete {
                id: next.id.clone(),
            },
        }]
    } else {
        vec![Effect::Persist {
            operation: Operation::upsert(&next),
        }]
    };
    effects.extend(cancel_timers(&next.id));
    effects.push(Effect::Notify {
        notification: notification(Box::new(next.clone())),
    });
    (next, effects)
}

fn finish_expired(schedule: Schedule, now_ms: i64) -> (Schedule, Vec<Effect>) {
    finish(schedule, now_ms, Notification::Expired)
}

fn limit_reached(schedule: Schedule, now_ms: i64) -> (Schedule, Vec<Effect>) {
    finish(schedule, now_ms, Notification::LimitReached)
}

#[cfg(test)]
#[path = "lifecycle_tests.rs"]
mod tests;
