// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Automation engine
//!
//! A single task owns schedule state. [`AutomationEngine`] is a cheap
//! handle that sends commands to it and awaits the reply. Driver calls run
//! in spawned tasks and re-enter the loop as completions.

use crate::executor::{Completion, Executor, Feedback};
use crate::{EngineConfig, EngineError};
use rota_adapters::{Driver, ScheduleListener};
use rota_core::{
    evaluate, AppState, Clock, Effect, EventKind, ExecutionState, IdGen, Notification, Operation,
    Schedule, ScheduleEdits, ScheduleInfo, ScheduleInput, ScheduleType, TimerKind, Trigger,
    TriggerContext,
};
use rota_storage::Store;
use serde_json::Value;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

const COMMAND_BUFFER: usize = 64;

/// Collaborators the engine runs against
pub struct EngineDeps<D, L, C, I> {
    pub driver: D,
    pub listener: L,
    pub clock: C,
    pub ids: I,
    /// Shared with the frequency limit manager
    pub store: Arc<Mutex<Store>>,
}

type Reply<T> = oneshot::Sender<Result<T, EngineError>>;

enum Query {
    One(String),
    Group(String, Option<ScheduleType>),
    Type(ScheduleType),
    All,
}

enum Command {
    Schedule {
        infos: Vec<ScheduleInfo>,
        reply: Reply<Vec<Schedule>>,
    },
    Cancel {
        ids: Vec<String>,
        reply: Reply<bool>,
    },
    CancelGroup {
        group: String,
        reply: Reply<bool>,
    },
    CancelByType {
        schedule_type: ScheduleType,
        reply: Reply<bool>,
    },
    Edit {
        id: String,
        edits: ScheduleEdits,
        reply: Reply<Option<Schedule>>,
    },
    Query {
        query: Query,
        reply: Reply<Vec<Schedule>>,
    },
    Event {
        kind: EventKind,
        data: Value,
        reply: Reply<()>,
    },
    SetPaused {
        paused: bool,
        reply: Reply<()>,
    },
    CheckPending {
        reply: Reply<()>,
    },
    ProcessTimers {
        reply: Reply<()>,
    },
    Stop {
        reply: Reply<()>,
    },
}

/// Handle to a running automation engine
#[derive(Clone)]
pub struct AutomationEngine {
    commands: mpsc::Sender<Command>,
}

impl AutomationEngine {
    /// Reconcile the stored schedules and start the engine task
    ///
    /// Rows found executing are interrupted, expired rows are swept,
    /// in-flight rows are re-prepared and persisted timers are re-armed
    /// before an `app_init` event is emitted.
    pub async fn start<D, L, C, I>(
        deps: EngineDeps<D, L, C, I>,
        config: &EngineConfig,
    ) -> Result<Self, EngineError>
    where
        D: Driver,
        L: ScheduleListener,
        C: Clock,
        I: IdGen,
    {
        let (completions_tx, completions) = mpsc::unbounded_channel();
        let (commands_tx, commands) = mpsc::channel(COMMAND_BUFFER);

        let mut actor = Actor {
            executor: Executor::new(deps.driver, deps.listener, deps.store, completions_tx),
            clock: deps.clock,
            ids: deps.ids,
            schedule_limit: config.schedule_limit,
            compact_threshold: config.compact_threshold,
            progress: HashMap::new(),
            cancellation_progress: HashMap::new(),
        };
        actor.start_up()?;

        tokio::spawn(actor.run(commands, completions, config.tick_interval));
        Ok(Self {
            commands: commands_tx,
        })
    }

    async fn request<T>(
        &self,
        command: impl FnOnce(Reply<T>) -> Command,
    ) -> Result<T, EngineError> {
        let (reply, rx) = oneshot::channel();
        self.commands
            .send(command(reply))
            .await
            .map_err(|_| EngineError::Stopped)?;
        rx.await.map_err(|_| EngineError::Stopped)?
    }

    pub async fn schedule(&self, info: ScheduleInfo) -> Result<Schedule, EngineError> {
        let mut scheduled = self.schedule_all(vec![info]).await?;
        scheduled.pop().ok_or(EngineError::Stopped)
    }

    /// Validate and store a batch; nothing is stored if any entry fails
    pub async fn schedule_all(&self, infos: Vec<ScheduleInfo>) -> Result<Vec<Schedule>, EngineError> {
        self.request(|reply| Command::Schedule { infos, reply })
            .await
    }

    /// Cancel schedules by id. Returns false if none existed.
    pub async fn cancel(&self, ids: Vec<String>) -> Result<bool, EngineError> {
        self.request(|reply| Command::Cancel { ids, reply }).await
    }

    pub async fn cancel_group(&self, group: &str) -> Result<bool, EngineError> {
        let group = group.to_string();
        self.request(|reply| Command::CancelGroup { group, reply })
            .await
    }

    pub async fn cancel_by_type(&self, schedule_type: ScheduleType) -> Result<bool, EngineError> {
        self.request(|reply| Command::CancelByType {
            schedule_type,
            reply,
        })
        .await
    }

    /// Apply edits to a schedule
    ///
    /// Returns the edited row, or `None` if the edit finished the schedule
    /// and it was removed.
    pub async fn edit_schedule(
        &self,
        id: &str,
        edits: ScheduleEdits,
    ) -> Result<Option<Schedule>, EngineError> {
        let id = id.to_string();
        self.request(|reply| Command::Edit { id, edits, reply })
            .await
    }

    pub async fn get_schedule(&self, id: &str) -> Result<Option<Schedule>, EngineError> {
        let query = Query::One(id.to_string());
        let mut rows = self.request(|reply| Command::Query { query, reply }).await?;
        Ok(rows.pop())
    }

    pub async fn get_schedules(&self, ids: &[String]) -> Result<Vec<Schedule>, EngineError> {
        let mut rows = Vec::new();
        for id in ids {
            rows.extend(self.get_schedule(id).await?);
        }
        Ok(rows)
    }

    pub async fn get_schedules_by_group(
        &self,
        group: &str,
        schedule_type: Option<ScheduleType>,
    ) -> Result<Vec<Schedule>, EngineError> {
        let query = Query::Group(group.to_string(), schedule_type);
        self.request(|reply| Command::Query { query, reply }).await
    }

    pub async fn get_schedules_by_type(
        &self,
        schedule_type: ScheduleType,
    ) -> Result<Vec<Schedule>, EngineError> {
        let query = Query::Type(schedule_type);
        self.request(|reply| Command::Query { query, reply }).await
    }

    pub async fn get_all(&self) -> Result<Vec<Schedule>, EngineError> {
        self.request(|reply| Command::Query {
            query: Query::All,
            reply,
        })
        .await
    }

    /// Feed an event to trigger evaluation; returns once it is processed
    pub async fn on_event(&self, kind: EventKind, data: Value) -> Result<(), EngineError> {
        self.request(|reply| Command::Event { kind, data, reply })
            .await
    }

    /// Suspend or resume trigger evaluation and readiness checks
    pub async fn set_paused(&self, paused: bool) -> Result<(), EngineError> {
        self.request(|reply| Command::SetPaused { paused, reply })
            .await
    }

    /// Re-attempt execution of every schedule waiting on conditions
    pub async fn check_pending_schedules(&self) -> Result<(), EngineError> {
        self.request(|reply| Command::CheckPending { reply }).await
    }

    /// Fire due timers now instead of waiting for the next tick
    pub async fn process_timers(&self) -> Result<(), EngineError> {
        self.request(|reply| Command::ProcessTimers { reply })
            .await
    }

    pub async fn stop(&self) -> Result<(), EngineError> {
        self.request(|reply| Command::Stop { reply }).await
    }
}

type Progress = HashMap<(String, usize), f64>;

struct Actor<D, L, C, I> {
    executor: Executor<D, L>,
    clock: C,
    ids: I,
    schedule_limit: usize,
    compact_threshold: u64,
    /// Trigger progress by (schedule id, trigger index); not persisted
    progress: Progress,
    cancellation_progress: Progress,
}

impl<D, L, C, I> Actor<D, L, C, I>
where
    D: Driver,
    L: ScheduleListener,
    C: Clock,
    I: IdGen,
{
    async fn run(
        mut self,
        mut commands: mpsc::Receiver<Command>,
        mut completions: mpsc::UnboundedReceiver<Completion>,
        tick_interval: Duration,
    ) {
        let mut tick = tokio::time::interval(tick_interval);
        tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                command = commands.recv() => match command {
                    Some(Command::Stop { reply }) => {
                        let _ = reply.send(Ok(()));
                        break;
                    }
                    Some(command) => self.handle(command),
                    None => break,
                },

                Some(completion) = completions.recv() => {
                    if let Err(e) = self.on_completion(completion) {
                        error!(error = %e, "failed to apply completion");
                    }
                }

                _ = tick.tick() => {
                    if let Err(e) = self.on_tick() {
                        error!(error = %e, "tick failed");
                    }
                }
            }
        }

        info!("engine stopped");
    }

    fn handle(&mut self, command: Command) {
        // A dropped reply means the caller gave up waiting
        match command {
            Command::Schedule { infos, reply } => {
                let _ = reply.send(self.schedule(infos));
            }
            Command::Cancel { ids, reply } => {
                let _ = reply.send(self.cancel(ids));
            }
            Command::CancelGroup { group, reply } => {
                let ids = self.ids_where(|store| store.by_group(&group, None));
                let _ = reply.send(self.cancel(ids));
            }
            Command::CancelByType {
                schedule_type,
                reply,
            } => {
                let ids = self.ids_where(|store| store.by_type(schedule_type));
                let _ = reply.send(self.cancel(ids));
            }
            Command::Edit { id, edits, reply } => {
                let _ = reply.send(self.edit(id, edits));
            }
            Command::Query { query, reply } => {
                let _ = reply.send(self.query(query));
            }
            Command::Event { kind, data, reply } => {
                let _ = reply.send(self.on_event(kind, data));
            }
            Command::SetPaused { paused, reply } => {
                let _ = reply.send(self.set_paused(paused));
            }
            Command::CheckPending { reply } => {
                let _ = reply.send(self.check_pending());
            }
            Command::ProcessTimers { reply } => {
                let _ = reply.send(self.process_timers());
            }
            Command::Stop { reply } => {
                let _ = reply.send(Ok(()));
            }
        }
    }

    fn start_up(&mut self) -> Result<(), EngineError> {
        let interrupted = self.inputs_for(
            |s| s.state == ExecutionState::Executing,
            || ScheduleInput::Interrupted,
        );
        if !interrupted.is_empty() {
            warn!(count = interrupted.len(), "interrupting schedules left executing");
        }
        self.drive(interrupted)?;

        self.sweep()?;

        let reprepare = self.inputs_for(
            |s| {
                matches!(
                    s.state,
                    ExecutionState::Triggered
                        | ExecutionState::PreparingSchedule
                        | ExecutionState::WaitingScheduleConditions
                )
            },
            || ScheduleInput::Reprepare,
        );
        self.drive(reprepare)?;

        let timers = {
            let store = self.executor.store();
            let store = store.lock().unwrap_or_else(|e| e.into_inner());
            store.state().timers.clone()
        };
        {
            let scheduler = self.executor.scheduler();
            let mut scheduler = scheduler.lock().unwrap_or_else(|e| e.into_inner());
            for (id, fire_at_ms) in timers {
                scheduler.set_timer(id, fire_at_ms);
            }
        }
        self.process_timers()?;

        let count = {
            let store = self.executor.store();
            let mut store = store.lock().unwrap_or_else(|e| e.into_inner());
            store.compact()?;
            store.state().schedule_count()
        };
        info!(schedules = count, "engine started");

        self.on_event(EventKind::AppInit, Value::Null)
    }

    /// Ids of matching rows, ordered by triggered time then priority
    fn ordered_ids(&self, filter: impl Fn(&Schedule) -> bool) -> Vec<String> {
        let mut rows: Vec<Schedule> = self.rows().into_iter().filter(|s| filter(s)).collect();
        rows.sort_by_key(Schedule::execution_order);
        rows.into_iter().map(|s| s.id).collect()
    }

    fn inputs_for(
        &self,
        filter: impl Fn(&Schedule) -> bool,
        input: impl Fn() -> ScheduleInput,
    ) -> Vec<Feedback> {
        self.ordered_ids(filter)
            .into_iter()
            .map(|id| (id, input()))
            .collect()
    }

    fn rows(&self) -> Vec<Schedule> {
        self.executor
            .store()
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .all()
    }

    fn exists(&self, id: &str) -> bool {
        self.executor
            .store()
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(id)
            .is_some()
    }

    fn ids_where(&self, select: impl FnOnce(&Store) -> Vec<Schedule>) -> Vec<String> {
        let store = self.executor.store();
        let store = store.lock().unwrap_or_else(|e| e.into_inner());
        select(&*store).into_iter().map(|s| s.id).collect()
    }

    /// Apply inputs to their rows until no effect feeds anything back
    fn drive(&mut self, inputs: Vec<Feedback>) -> Result<(), EngineError> {
        let mut pending = VecDeque::from(inputs);
        while let Some((id, input)) = pending.pop_front() {
            let row = {
                let store = self.executor.store();
                let store = store.lock().unwrap_or_else(|e| e.into_inner());
                store.get(&id).cloned()
            };
            let Some(row) = row else {
                debug!(id = %id, "input for missing schedule dropped");
                continue;
            };

            let (next, effects) = row.transition(input, self.clock.now_ms());
            if next.state != row.state {
                debug!(id = %id, from = %row.state, to = %next.state, "transition");
            }
            pending.extend(self.executor.execute_all(effects)?);

            if holds_prepared(row.state) && (settled(next.state) || !self.exists(&id)) {
                self.executor.discard(&id);
            }
        }

        let store = self.executor.store();
        let store = store.lock().unwrap_or_else(|e| e.into_inner());
        let known = |key: &(String, usize)| store.get(&key.0).is_some();
        self.progress.retain(|key, _| known(key));
        self.cancellation_progress.retain(|key, _| known(key));
        Ok(())
    }

    fn sweep(&mut self) -> Result<(), EngineError> {
        let inputs = self.inputs_for(|_| true, || ScheduleInput::Sweep);
        self.drive(inputs)
    }

    fn on_tick(&mut self) -> Result<(), EngineError> {
        self.process_timers()?;
        self.sweep()?;
        self.executor
            .store()
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .compact_if_grown(self.compact_threshold)?;
        Ok(())
    }

    fn on_completion(&mut self, completion: Completion) -> Result<(), EngineError> {
        if !self.executor.is_current(&completion) {
            warn!(
                id = completion.schedule_id(),
                generation = completion.generation(),
                "stale completion ignored"
            );
            // A prepare that outlived its row may still have left state behind
            let id = completion.schedule_id();
            let settled_row = match self
                .executor
                .store()
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .get(id)
            {
                Some(row) => settled(row.state),
                None => true,
            };
            if matches!(completion, Completion::Prepared { .. }) && settled_row {
                self.executor.discard(id);
            }
            return Ok(());
        }
        let id = completion.schedule_id().to_string();
        self.drive(vec![(id, completion.into_input())])
    }

    fn process_timers(&mut self) -> Result<(), EngineError> {
        let now_ms = self.clock.now_ms();
        let fired = self
            .executor
            .scheduler()
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .fired_timers(now_ms);
        if fired.is_empty() {
            return Ok(());
        }

        let mut inputs = Vec::new();
        for timer_id in fired {
            self.executor.execute(Effect::CancelTimer {
                id: timer_id.clone(),
            })?;
            match TimerKind::parse(&timer_id) {
                Some((TimerKind::Delay, id)) => {
                    inputs.push((id.to_string(), ScheduleInput::DelayElapsed))
                }
                Some((TimerKind::Interval, id)) => {
                    inputs.push((id.to_string(), ScheduleInput::IntervalElapsed))
                }
                None => warn!(timer = %timer_id, "unknown timer fired"),
            }
        }

        let order: HashMap<String, (i64, i32)> = self
            .rows()
            .into_iter()
            .map(|s| (s.id.clone(), s.execution_order()))
            .collect();
        inputs.sort_by_key(|(id, _)| order.get(id).copied());
        self.drive(inputs)
    }

    fn schedule(&mut self, infos: Vec<ScheduleInfo>) -> Result<Vec<Schedule>, EngineError> {
        self.sweep()?;

        let now_ms = self.clock.now_ms();
        let schedules = infos
            .into_iter()
            .map(|info| Schedule::new(info, &self.ids, now_ms))
            .collect::<Result<Vec<_>, _>>()?;

        {
            let store = self.executor.store();
            let store = store.lock().unwrap_or_else(|e| e.into_inner());
            let mut seen = HashSet::new();
            for schedule in &schedules {
                if store.get(&schedule.id).is_some() || !seen.insert(schedule.id.as_str()) {
                    return Err(EngineError::DuplicateSchedule(schedule.id.clone()));
                }
            }
            if store.state().schedule_count() + schedules.len() > self.schedule_limit {
                return Err(EngineError::ScheduleLimitExceeded {
                    limit: self.schedule_limit,
                });
            }
        }

        let mut effects = Vec::with_capacity(schedules.len() * 2);
        for schedule in &schedules {
            effects.push(Effect::Persist {
                operation: Operation::upsert(schedule),
            });
            effects.push(Effect::Notify {
                notification: Notification::NewSchedule(Box::new(schedule.clone())),
            });
        }
        let feedback = self.executor.execute_all(effects)?;
        self.drive(feedback)?;

        info!(count = schedules.len(), "scheduled");
        Ok(schedules)
    }

    fn cancel(&mut self, ids: Vec<String>) -> Result<bool, EngineError> {
        let inputs: Vec<Feedback> = {
            let store = self.executor.store();
            let store = store.lock().unwrap_or_else(|e| e.into_inner());
            ids.into_iter()
                .filter(|id| store.get(id).is_some())
                .map(|id| (id, ScheduleInput::Cancel))
                .collect()
        };
        let found = !inputs.is_empty();
        self.drive(inputs)?;
        Ok(found)
    }

    fn edit(&mut self, id: String, edits: ScheduleEdits) -> Result<Option<Schedule>, EngineError> {
        let current = {
            let store = self.executor.store();
            let store = store.lock().unwrap_or_else(|e| e.into_inner());
            store.get(&id).cloned()
        };
        let current = current.ok_or_else(|| EngineError::NotFound(id.clone()))?;
        edits.validate(&current)?;

        self.drive(vec![(id.clone(), ScheduleInput::Edited { edits })])?;

        let store = self.executor.store();
        let store = store.lock().unwrap_or_else(|e| e.into_inner());
        Ok(store.get(&id).cloned())
    }

    fn query(&mut self, query: Query) -> Result<Vec<Schedule>, EngineError> {
        self.sweep()?;

        let store = self.executor.store();
        let store = store.lock().unwrap_or_else(|e| e.into_inner());
        Ok(match query {
            Query::One(id) => store.get(&id).cloned().into_iter().collect(),
            Query::Group(group, schedule_type) => store.by_group(&group, schedule_type),
            Query::Type(schedule_type) => store.by_type(schedule_type),
            Query::All => store.all(),
        })
    }

    fn on_event(&mut self, kind: EventKind, data: Value) -> Result<(), EngineError> {
        let paused = {
            let conditions = self.executor.conditions();
            let mut conditions = conditions.lock().unwrap_or_else(|e| e.into_inner());
            match kind {
                EventKind::Foreground => conditions.app_state = AppState::Foreground,
                EventKind::Background => conditions.app_state = AppState::Background,
                EventKind::Screen => conditions.screen = data.as_str().map(str::to_string),
                EventKind::RegionEnter => {
                    conditions.region = data
                        .get("region_id")
                        .and_then(Value::as_str)
                        .map(str::to_string)
                }
                EventKind::RegionExit => conditions.region = None,
                _ => {}
            }
            conditions.paused
        };

        if !paused {
            let now_ms = self.clock.now_ms();
            let mut rows = self.rows();
            rows.sort_by_key(|s| s.priority);

            let mut inputs = Vec::new();
            for schedule in &rows {
                match schedule.state {
                    ExecutionState::Idle
                        if schedule.has_started(now_ms) && !schedule.is_over_limit() =>
                    {
                        let fired = advance(
                            &mut self.progress,
                            &schedule.id,
                            &schedule.triggers,
                            kind,
                            &data,
                        );
                        if let Some(trigger) = fired {
                            let context = TriggerContext {
                                trigger,
                                event: data.clone(),
                            };
                            inputs.push((schedule.id.clone(), ScheduleInput::Triggered { context }));
                        }
                    }
                    ExecutionState::TimeDelayed
                    | ExecutionState::PreparingSchedule
                    | ExecutionState::WaitingScheduleConditions => {
                        let Some(delay) = &schedule.delay else {
                            continue;
                        };
                        let fired = advance(
                            &mut self.cancellation_progress,
                            &schedule.id,
                            &delay.cancellation_triggers,
                            kind,
                            &data,
                        );
                        if fired.is_some() {
                            inputs.push((schedule.id.clone(), ScheduleInput::CancellationTriggered));
                        }
                    }
                    _ => {}
                }
            }
            self.drive(inputs)?;
        }

        match kind {
            EventKind::Foreground
            | EventKind::Background
            | EventKind::Screen
            | EventKind::RegionEnter
            | EventKind::RegionExit => self.check_pending(),
            _ => Ok(()),
        }
    }

    fn set_paused(&mut self, paused: bool) -> Result<(), EngineError> {
        self.executor
            .conditions()
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .paused = paused;
        info!(paused, "engine pause changed");
        if paused {
            Ok(())
        } else {
            self.check_pending()
        }
    }

    fn check_pending(&mut self) -> Result<(), EngineError> {
        let effects = self
            .ordered_ids(|s| s.state == ExecutionState::WaitingScheduleConditions)
            .into_iter()
            .map(|schedule_id| Effect::AttemptExecution { schedule_id })
            .collect();
        let feedback = self.executor.execute_all(effects)?;
        self.drive(feedback)
    }
}

/// States in which the driver may hold a prepared payload
fn holds_prepared(state: ExecutionState) -> bool {
    matches!(
        state,
        ExecutionState::PreparingSchedule | ExecutionState::WaitingScheduleConditions
    )
}

/// States that will not execute without a new trigger
fn settled(state: ExecutionState) -> bool {
    matches!(
        state,
        ExecutionState::Idle | ExecutionState::Paused | ExecutionState::Finished
    )
}

/// Add an event to a schedule's trigger progress
///
/// Returns the first trigger that reached its goal; all of the schedule's
/// progress is reset when one fires.
fn advance(
    progress: &mut Progress,
    schedule_id: &str,
    triggers: &[Trigger],
    kind: EventKind,
    event: &Value,
) -> Option<Trigger> {
    let mut fired = None;
    for (index, trigger) in triggers.iter().enumerate() {
        let Some(increment) = evaluate(trigger, kind, event) else {
            continue;
        };
        let count = progress
            .entry((schedule_id.to_string(), index))
            .or_insert(0.0);
        *count += increment;
        if fired.is_none() && *count >= trigger.goal {
            fired = Some(trigger.clone());
        }
    }
    if fired.is_some() {
        progress.retain(|(id, _), _| id != schedule_id);
    }
    fired
}

#[cfg(test)]
#[path = "engine_tests.rs"]
mod tests;
