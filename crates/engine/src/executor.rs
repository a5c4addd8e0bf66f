// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Effect executor

use crate::Scheduler;
use rota_adapters::{Driver, ScheduleListener};
use rota_core::{
    AppState, Effect, Notification, Operation, PrepareResult, Schedule, ScheduleInput,
};
use rota_storage::{Store, StoreError};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tokio::sync::mpsc;

/// Errors that can occur during effect execution
#[derive(Debug, Error)]
pub enum ExecuteError {
    #[error("storage error: {0}")]
    Storage(#[from] StoreError),
}

/// Device conditions observed from events
#[derive(Debug, Clone, PartialEq)]
pub struct Conditions {
    pub app_state: AppState,
    pub screen: Option<String>,
    pub region: Option<String>,
    /// Global pause: no trigger evaluation or readiness checks
    pub paused: bool,
}

impl Default for Conditions {
    fn default() -> Self {
        Self {
            app_state: AppState::Background,
            screen: None,
            region: None,
            paused: false,
        }
    }
}

/// Result of a driver call made off the engine task
#[derive(Debug, Clone, PartialEq)]
pub enum Completion {
    Prepared {
        schedule_id: String,
        generation: u64,
        result: PrepareResult,
    },
    Executed {
        schedule_id: String,
        generation: u64,
    },
}

impl Completion {
    pub fn schedule_id(&self) -> &str {
        match self {
            Completion::Prepared { schedule_id, .. } | Completion::Executed { schedule_id, .. } => {
                schedule_id
            }
        }
    }

    pub fn generation(&self) -> u64 {
        match self {
            Completion::Prepared { generation, .. } | Completion::Executed { generation, .. } => {
                *generation
            }
        }
    }

    pub fn into_input(self) -> ScheduleInput {
        match self {
            Completion::Prepared { result, .. } => ScheduleInput::Prepared { result },
            Completion::Executed { .. } => ScheduleInput::ExecutionFinished,
        }
    }
}

/// Input fed back to a schedule after an effect
pub type Feedback = (String, ScheduleInput);

/// Executes effects against the store, timers, driver and listener
pub struct Executor<D, L> {
    driver: D,
    listener: L,
    store: Arc<Mutex<Store>>,
    scheduler: Arc<Mutex<Scheduler>>,
    conditions: Arc<Mutex<Conditions>>,
    completions: mpsc::UnboundedSender<Completion>,
    /// Latest driver call per schedule; older completions are stale
    generations: Mutex<HashMap<String, u64>>,
    next_generation: Mutex<u64>,
}

impl<D, L> Executor<D, L>
where
    D: Driver,
    L: ScheduleListener,
{
    pub fn new(
        driver: D,
        listener: L,
        store: Arc<Mutex<Store>>,
        completions: mpsc::UnboundedSender<Completion>,
    ) -> Self {
        Self {
            driver,
            listener,
            store,
            scheduler: Arc::new(Mutex::new(Scheduler::new())),
            conditions: Arc::default(),
            completions,
            generations: Mutex::new(HashMap::new()),
            next_generation: Mutex::new(0),
        }
    }

    /// Execute a single effect with tracing
    ///
    /// Returns an optional input that should be fed back to a schedule.
    pub fn execute(&self, effect: Effect) -> Result<Option<Feedback>, ExecuteError> {
        use rota_core::TracedEffect;

        let op_name = effect.name();
        let span = tracing::info_span!("effect", effect = op_name);
        let _guard = span.enter();

        tracing::info!(fields = ?effect.fields(), "executing");

        let start = std::time::Instant::now();
        let result = self.execute_inner(effect);
        let elapsed = start.elapsed();

        match &result {
            Ok(feedback) => tracing::info!(
                elapsed_ms = elapsed.as_millis() as u64,
                has_feedback = feedback.is_some(),
                "completed"
            ),
            Err(e) => tracing::error!(
                elapsed_ms = elapsed.as_millis() as u64,
                error = %e,
                "failed"
            ),
        }

        result
    }

    /// Inner execution logic for a single effect
    fn execute_inner(&self, effect: Effect) -> Result<Option<Feedback>, ExecuteError> {
        match effect {
            Effect::Persist { operation } => {
                if let Operation::ScheduleDelete { id } = &operation {
                    self.forget(id);
                }
                self.store
                    .lock()
                    .unwrap_or_else(|e| e.into_inner())
                    .apply(&operation)?;
                Ok(None)
            }

            Effect::SetTimer { id, fire_at_ms } => {
                self.store
                    .lock()
                    .unwrap_or_else(|e| e.into_inner())
                    .apply(&Operation::TimerSet {
                        id: id.clone(),
                        fire_at_ms,
                    })?;
                self.scheduler
                    .lock()
                    .unwrap_or_else(|e| e.into_inner())
                    .set_timer(id, fire_at_ms);
                Ok(None)
            }

            Effect::CancelTimer { id } => {
                let armed = self
                    .scheduler
                    .lock()
                    .unwrap_or_else(|e| e.into_inner())
                    .cancel_timer(&id);
                let mut store = self.store.lock().unwrap_or_else(|e| e.into_inner());
                if armed || store.state().timers.contains_key(&id) {
                    store.apply(&Operation::TimerCancel { id })?;
                }
                Ok(None)
            }

            Effect::Notify { notification } => {
                match &notification {
                    Notification::NewSchedule(s) => self.listener.on_new_schedule(s),
                    Notification::Cancelled(s) => self.listener.on_schedule_cancelled(s),
                    Notification::Expired(s) => self.listener.on_schedule_expired(s),
                    Notification::LimitReached(s) => self.listener.on_schedule_limit_reached(s),
                    Notification::ExecutionInterrupted(s) => {
                        self.driver.on_execution_interrupted(s)
                    }
                }
                Ok(None)
            }

            Effect::Prepare { schedule_id } => {
                let Some(schedule) = self.current(&schedule_id) else {
                    return Ok(None);
                };
                let generation = self.bump(&schedule_id);
                let driver = self.driver.clone();
                let completions = self.completions.clone();
                tokio::spawn(async move {
                    let result = driver
                        .prepare(&schedule, schedule.trigger_context.as_ref())
                        .await;
                    // Receiver is gone only once the engine stopped
                    let _ = completions.send(Completion::Prepared {
                        schedule_id: schedule.id.clone(),
                        generation,
                        result,
                    });
                });
                Ok(None)
            }

            Effect::AttemptExecution { schedule_id } => {
                let Some(schedule) = self.current(&schedule_id) else {
                    return Ok(None);
                };
                Ok(self.attempt(&schedule).map(|input| (schedule_id, input)))
            }

            Effect::Execute { schedule_id } => {
                let Some(schedule) = self.current(&schedule_id) else {
                    return Ok(None);
                };
                let generation = self.bump(&schedule_id);
                let driver = self.driver.clone();
                let completions = self.completions.clone();
                tokio::spawn(async move {
                    driver.execute(&schedule).await;
                    let _ = completions.send(Completion::Executed {
                        schedule_id: schedule.id.clone(),
                        generation,
                    });
                });
                Ok(None)
            }
        }
    }

    /// Execute multiple effects in order
    ///
    /// Returns any inputs produced by effects (to be fed back to schedules).
    pub fn execute_all(&self, effects: Vec<Effect>) -> Result<Vec<Feedback>, ExecuteError> {
        let mut feedback = Vec::new();
        for effect in effects {
            if let Some(input) = self.execute(effect)? {
                feedback.push(input);
            }
        }
        Ok(feedback)
    }

    /// Check delay conditions and driver readiness for a waiting schedule
    fn attempt(&self, schedule: &Schedule) -> Option<ScheduleInput> {
        {
            let conditions = self.conditions.lock().unwrap_or_else(|e| e.into_inner());
            if conditions.paused {
                return None;
            }
            if let Some(delay) = &schedule.delay {
                let met = delay.conditions_met(
                    conditions.app_state,
                    conditions.screen.as_deref(),
                    conditions.region.as_deref(),
                );
                if !met {
                    tracing::debug!(id = %schedule.id, "delay conditions not met");
                    return None;
                }
            }
        }

        match self.driver.check_readiness(schedule) {
            Ok(result) => Some(ScheduleInput::Readiness { result }),
            Err(e) => {
                tracing::warn!(id = %schedule.id, error = %e, "readiness failed, cancelling");
                Some(ScheduleInput::Cancel)
            }
        }
    }

    /// Release driver state held for a schedule that will not execute
    pub fn discard(&self, schedule_id: &str) {
        self.driver.discard(schedule_id);
    }

    /// Whether a completion belongs to the latest driver call for its schedule
    pub fn is_current(&self, completion: &Completion) -> bool {
        self.generations
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(completion.schedule_id())
            == Some(&completion.generation())
    }

    fn bump(&self, schedule_id: &str) -> u64 {
        let mut next = self
            .next_generation
            .lock()
            .unwrap_or_else(|e| e.into_inner());
        *next += 1;
        self.generations
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(schedule_id.to_string(), *next);
        *next
    }

    fn forget(&self, schedule_id: &str) {
        self.generations
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(schedule_id);
    }

    fn current(&self, schedule_id: &str) -> Option<Schedule> {
        self.store
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(schedule_id)
            .cloned()
    }

    /// Get a reference to the store
    pub fn store(&self) -> Arc<Mutex<Store>> {
        Arc::clone(&self.store)
    }

    /// Get a reference to the scheduler
    pub fn scheduler(&self) -> Arc<Mutex<Scheduler>> {
        Arc::clone(&self.scheduler)
    }

    pub fn conditions(&self) -> Arc<Mutex<Conditions>> {
        Arc::clone(&self.conditions)
    }
}

#[cfg(test)]
#[path = "executor_tests.rs"]
mod tests;
