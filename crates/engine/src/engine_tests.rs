// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use rota_adapters::{DriverCall, FakeDriver, ListenerCall, RecordingListener};
use rota_core::{
    FakeClock, PrepareResult, ScheduleData, ScheduleDelay, SequentialIdGen, TriggerType,
};
use serde_json::json;
use tempfile::{tempdir, TempDir};

struct Harness {
    _dir: TempDir,
    engine: AutomationEngine,
    driver: FakeDriver,
    listener: RecordingListener,
    clock: FakeClock,
    store: Arc<Mutex<Store>>,
}

fn config(dir: &TempDir) -> EngineConfig {
    EngineConfig {
        tick_interval: Duration::from_millis(10),
        store_path: dir.path().join("automation.wal"),
        ..EngineConfig::default()
    }
}

async fn start(dir: TempDir, config: EngineConfig, driver: FakeDriver) -> Harness {
    let store = Arc::new(Mutex::new(Store::open(&config.store_path).unwrap()));
    let listener = RecordingListener::new();
    let clock = FakeClock::new();
    let deps = EngineDeps {
        driver: driver.clone(),
        listener: listener.clone(),
        clock: clock.clone(),
        ids: SequentialIdGen::default(),
        store: Arc::clone(&store),
    };
    let engine = AutomationEngine::start(deps, &config).await.unwrap();
    Harness {
        _dir: dir,
        engine,
        driver,
        listener,
        clock,
        store,
    }
}

async fn harness() -> Harness {
    let dir = tempdir().unwrap();
    let config = config(&dir);
    start(dir, config, FakeDriver::new()).await
}

fn info(id: &str, trigger_type: TriggerType, goal: f64) -> ScheduleInfo {
    let mut info = ScheduleInfo::new(
        ScheduleData::Actions(json!({"id": id})),
        vec![Trigger::new(trigger_type, goal)],
    );
    info.id = Some(id.to_string());
    info
}

fn state(h: &Harness, id: &str) -> Option<ExecutionState> {
    h.store
        .lock()
        .unwrap()
        .get(id)
        .map(|schedule| schedule.state)
}

async fn wait_until(mut condition: impl FnMut() -> bool) {
    for _ in 0..400 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("condition not reached");
}

async fn custom_event(h: &Harness) {
    h.engine
        .on_event(EventKind::CustomEvent, json!({"event_name": "purchase"}))
        .await
        .unwrap();
}

#[tokio::test]
async fn schedule_persists_and_notifies() {
    let h = harness().await;

    let scheduled = h
        .engine
        .schedule(info("welcome", TriggerType::CustomEventCount, 1.0))
        .await
        .unwrap();

    assert_eq!(scheduled.id, "welcome");
    assert_eq!(scheduled.state, ExecutionState::Idle);
    assert_eq!(
        h.listener.calls(),
        vec![ListenerCall::NewSchedule("welcome".to_string())]
    );
    assert_eq!(h.engine.get_schedule("welcome").await.unwrap(), Some(scheduled));
}

#[tokio::test]
async fn schedule_without_id_gets_generated_one() {
    let h = harness().await;
    let mut definition = info("x", TriggerType::CustomEventCount, 1.0);
    definition.id = None;

    let scheduled = h.engine.schedule(definition).await.unwrap();

    assert_eq!(scheduled.id, "schedule-1");
}

#[tokio::test]
async fn duplicate_ids_reject_the_whole_batch() {
    let h = harness().await;
    h.engine
        .schedule(info("a", TriggerType::CustomEventCount, 1.0))
        .await
        .unwrap();

    let existing = h
        .engine
        .schedule_all(vec![
            info("b", TriggerType::CustomEventCount, 1.0),
            info("a", TriggerType::CustomEventCount, 1.0),
        ])
        .await;
    assert!(matches!(existing, Err(EngineError::DuplicateSchedule(id)) if id == "a"));

    let within_batch = h
        .engine
        .schedule_all(vec![
            info("c", TriggerType::CustomEventCount, 1.0),
            info("c", TriggerType::CustomEventCount, 1.0),
        ])
        .await;
    assert!(matches!(within_batch, Err(EngineError::DuplicateSchedule(id)) if id == "c"));

    assert_eq!(h.engine.get_all().await.unwrap().len(), 1);
}

#[tokio::test]
async fn batch_over_schedule_limit_is_rejected() {
    let dir = tempdir().unwrap();
    let config = EngineConfig {
        schedule_limit: 2,
        ..config(&dir)
    };
    let h = start(dir, config, FakeDriver::new()).await;

    let result = h
        .engine
        .schedule_all(vec![
            info("a", TriggerType::CustomEventCount, 1.0),
            info("b", TriggerType::CustomEventCount, 1.0),
            info("c", TriggerType::CustomEventCount, 1.0),
        ])
        .await;

    assert!(matches!(
        result,
        Err(EngineError::ScheduleLimitExceeded { limit: 2 })
    ));
    assert!(h.engine.get_all().await.unwrap().is_empty());
}

#[tokio::test]
async fn invalid_definition_is_rejected() {
    let h = harness().await;
    let mut definition = info("a", TriggerType::CustomEventCount, 1.0);
    definition.start_ms = Some(2_000);
    definition.end_ms = Some(1_000);

    let result = h.engine.schedule(definition).await;

    assert!(matches!(result, Err(EngineError::Schedule(_))));
    assert!(h.listener.calls().is_empty());
}

#[tokio::test]
async fn goal_reached_runs_schedule_to_its_limit() {
    let h = harness().await;
    h.engine
        .schedule(info("a", TriggerType::CustomEventCount, 2.0))
        .await
        .unwrap();

    custom_event(&h).await;
    assert_eq!(state(&h, "a"), Some(ExecutionState::Idle));
    assert_eq!(h.driver.prepare_count("a"), 0);

    custom_event(&h).await;
    wait_until(|| state(&h, "a").is_none()).await;

    assert_eq!(h.driver.executed(), vec!["a".to_string()]);
    assert_eq!(
        h.listener.count(&ListenerCall::LimitReached("a".to_string())),
        1
    );
}

#[tokio::test]
async fn prepare_receives_trigger_context() {
    let h = harness().await;
    h.engine
        .schedule(info("a", TriggerType::CustomEventCount, 1.0))
        .await
        .unwrap();

    let event = json!({"event_name": "purchase"});
    h.engine
        .on_event(EventKind::CustomEvent, event.clone())
        .await
        .unwrap();
    wait_until(|| h.driver.prepare_count("a") == 1).await;

    let context = h.driver.calls().into_iter().find_map(|call| match call {
        DriverCall::Prepare { context, .. } => context,
        _ => None,
    });
    assert_eq!(
        context,
        Some(TriggerContext {
            trigger: Trigger::new(TriggerType::CustomEventCount, 1.0),
            event,
        })
    );
}

#[tokio::test]
async fn one_event_prepares_schedules_in_priority_order() {
    let h = harness().await;
    for (id, priority) in [("low", 9), ("high", -1), ("mid", 3)] {
        let mut definition = info(id, TriggerType::CustomEventCount, 1.0);
        definition.priority = priority;
        h.engine.schedule(definition).await.unwrap();
    }

    custom_event(&h).await;
    wait_until(|| h.driver.executed().len() == 3).await;

    let prepared: Vec<String> = h
        .driver
        .calls()
        .into_iter()
        .filter_map(|call| match call {
            DriverCall::Prepare { id, .. } => Some(id),
            _ => None,
        })
        .collect();
    assert_eq!(prepared, vec!["high", "mid", "low"]);
}

#[tokio::test]
async fn paused_engine_ignores_triggers() {
    let h = harness().await;
    h.engine
        .schedule(info("a", TriggerType::CustomEventCount, 1.0))
        .await
        .unwrap();

    h.engine.set_paused(true).await.unwrap();
    custom_event(&h).await;
    assert_eq!(state(&h, "a"), Some(ExecutionState::Idle));

    h.engine.set_paused(false).await.unwrap();
    custom_event(&h).await;
    wait_until(|| h.driver.executed().len() == 1).await;
}

#[tokio::test]
async fn delay_waits_for_durable_timer() {
    let h = harness().await;
    let mut definition = info("a", TriggerType::CustomEventCount, 1.0);
    definition.delay = Some(ScheduleDelay {
        seconds: 30,
        ..ScheduleDelay::default()
    });
    h.engine.schedule(definition).await.unwrap();

    custom_event(&h).await;
    assert_eq!(state(&h, "a"), Some(ExecutionState::TimeDelayed));
    assert!(h.store.lock().unwrap().state().timers.contains_key("delay:a"));

    h.clock.advance(Duration::from_secs(30));
    h.engine.process_timers().await.unwrap();
    wait_until(|| h.driver.executed().len() == 1).await;

    assert!(h.store.lock().unwrap().state().timers.is_empty());
}

#[tokio::test]
async fn cancellation_trigger_returns_delayed_schedule_to_idle() {
    let h = harness().await;
    let mut definition = info("a", TriggerType::CustomEventCount, 1.0);
    definition.delay = Some(ScheduleDelay {
        seconds: 60,
        cancellation_triggers: vec![Trigger::new(TriggerType::Background, 1.0)],
        ..ScheduleDelay::default()
    });
    h.engine.schedule(definition).await.unwrap();

    custom_event(&h).await;
    assert_eq!(state(&h, "a"), Some(ExecutionState::TimeDelayed));

    h.engine
        .on_event(EventKind::Background, Value::Null)
        .await
        .unwrap();

    assert_eq!(state(&h, "a"), Some(ExecutionState::Idle));
    assert!(h.store.lock().unwrap().state().timers.is_empty());
    assert_eq!(h.driver.prepare_count("a"), 0);
}

#[tokio::test]
async fn waiting_schedule_runs_once_conditions_hold() {
    let h = harness().await;
    let mut definition = info("a", TriggerType::CustomEventCount, 1.0);
    definition.delay = Some(ScheduleDelay {
        app_state: AppState::Foreground,
        screens: vec!["home".to_string()],
        ..ScheduleDelay::default()
    });
    h.engine.schedule(definition).await.unwrap();

    custom_event(&h).await;
    wait_until(|| state(&h, "a") == Some(ExecutionState::WaitingScheduleConditions)).await;

    h.engine
        .on_event(EventKind::Foreground, Value::Null)
        .await
        .unwrap();
    assert_eq!(
        state(&h, "a"),
        Some(ExecutionState::WaitingScheduleConditions)
    );

    h.engine
        .on_event(EventKind::Screen, json!("home"))
        .await
        .unwrap();
    wait_until(|| h.driver.executed().len() == 1).await;
}

#[tokio::test]
async fn not_ready_schedule_is_polled_again() {
    let driver = FakeDriver::new();
    driver.push_readiness("a", [Ok(rota_core::ReadyResult::NotReady)]);
    let dir = tempdir().unwrap();
    let config = config(&dir);
    let h = start(dir, config, driver).await;
    h.engine
        .schedule(info("a", TriggerType::CustomEventCount, 1.0))
        .await
        .unwrap();

    custom_event(&h).await;
    wait_until(|| state(&h, "a") == Some(ExecutionState::WaitingScheduleConditions)).await;
    assert!(h.driver.executed().is_empty());

    h.engine.check_pending_schedules().await.unwrap();
    wait_until(|| h.driver.executed().len() == 1).await;
}

#[tokio::test]
async fn cancelling_waiting_schedule_discards_driver_state() {
    let driver = FakeDriver::new();
    driver.push_readiness("a", [Ok(rota_core::ReadyResult::NotReady)]);
    let dir = tempdir().unwrap();
    let config = config(&dir);
    let h = start(dir, config, driver).await;
    h.engine
        .schedule(info("a", TriggerType::CustomEventCount, 1.0))
        .await
        .unwrap();

    custom_event(&h).await;
    wait_until(|| state(&h, "a") == Some(ExecutionState::WaitingScheduleConditions)).await;
    assert!(h.driver.discarded().is_empty());

    assert!(h.engine.cancel(vec!["a".to_string()]).await.unwrap());
    assert_eq!(h.driver.discarded(), vec!["a".to_string()]);
}

#[tokio::test]
async fn readiness_skip_discards_driver_state() {
    let driver = FakeDriver::new();
    driver.push_readiness("a", [Ok(rota_core::ReadyResult::Skip)]);
    let dir = tempdir().unwrap();
    let config = config(&dir);
    let h = start(dir, config, driver).await;
    h.engine
        .schedule(info("a", TriggerType::CustomEventCount, 1.0))
        .await
        .unwrap();

    custom_event(&h).await;
    wait_until(|| h.driver.discarded() == vec!["a".to_string()]).await;
    assert_eq!(state(&h, "a"), Some(ExecutionState::Idle));
    assert!(h.driver.executed().is_empty());
}

#[tokio::test]
async fn executed_schedule_is_not_discarded() {
    let h = harness().await;
    h.engine
        .schedule(info("a", TriggerType::CustomEventCount, 1.0))
        .await
        .unwrap();

    custom_event(&h).await;
    wait_until(|| state(&h, "a") == Some(ExecutionState::Idle) && h.driver.executed().len() == 1)
        .await;
    assert!(h.driver.discarded().is_empty());
}

#[tokio::test]
async fn prepare_skip_returns_to_idle_without_counting() {
    let driver = FakeDriver::new();
    driver.push_prepare("a", [PrepareResult::Skip]);
    let dir = tempdir().unwrap();
    let config = config(&dir);
    let h = start(dir, config, driver).await;
    h.engine
        .schedule(info("a", TriggerType::CustomEventCount, 1.0))
        .await
        .unwrap();

    custom_event(&h).await;
    wait_until(|| h.driver.prepare_count("a") == 1).await;
    wait_until(|| state(&h, "a") == Some(ExecutionState::Idle)).await;

    let row = h.engine.get_schedule("a").await.unwrap().unwrap();
    assert_eq!(row.count, 0);
    assert!(h.driver.executed().is_empty());
}

#[tokio::test]
async fn cancel_is_idempotent() {
    let h = harness().await;
    h.engine
        .schedule(info("a", TriggerType::CustomEventCount, 1.0))
        .await
        .unwrap();

    assert!(h.engine.cancel(vec!["a".to_string()]).await.unwrap());
    assert!(!h.engine.cancel(vec!["a".to_string()]).await.unwrap());
    assert_eq!(
        h.listener.count(&ListenerCall::Cancelled("a".to_string())),
        1
    );
}

#[tokio::test]
async fn cancel_by_group_and_type() {
    let h = harness().await;
    let mut grouped = info("a", TriggerType::CustomEventCount, 1.0);
    grouped.group = Some("spring".to_string());
    let mut message = info("b", TriggerType::CustomEventCount, 1.0);
    message.data = ScheduleData::InAppMessage(json!({"body": "hi"}));
    h.engine
        .schedule_all(vec![
            grouped,
            message,
            info("c", TriggerType::CustomEventCount, 1.0),
        ])
        .await
        .unwrap();

    assert_eq!(
        h.engine
            .get_schedules_by_group("spring", None)
            .await
            .unwrap()
            .len(),
        1
    );
    assert!(h.engine.cancel_group("spring").await.unwrap());
    assert!(!h.engine.cancel_group("spring").await.unwrap());

    assert!(h
        .engine
        .cancel_by_type(ScheduleType::InAppMessage)
        .await
        .unwrap());

    let remaining: Vec<String> = h
        .engine
        .get_all()
        .await
        .unwrap()
        .into_iter()
        .map(|s| s.id)
        .collect();
    assert_eq!(remaining, vec!["c"]);
}

#[tokio::test]
async fn edit_missing_schedule_is_not_found() {
    let h = harness().await;
    let result = h
        .engine
        .edit_schedule("ghost", ScheduleEdits::default())
        .await;
    assert!(matches!(result, Err(EngineError::NotFound(id)) if id == "ghost"));
}

#[tokio::test]
async fn edit_overwrites_given_fields() {
    let h = harness().await;
    let mut definition = info("a", TriggerType::CustomEventCount, 1.0);
    definition.priority = 2;
    definition.limit = 3;
    h.engine.schedule(definition).await.unwrap();

    let edited = h
        .engine
        .edit_schedule(
            "a",
            ScheduleEdits {
                priority: Some(7),
                ..ScheduleEdits::default()
            },
        )
        .await
        .unwrap()
        .unwrap();

    assert_eq!(edited.priority, 7);
    assert_eq!(edited.limit, 3);
}

#[tokio::test]
async fn edit_that_breaks_bounds_is_rejected() {
    let h = harness().await;
    let mut definition = info("a", TriggerType::CustomEventCount, 1.0);
    definition.start_ms = Some(h.clock.now_ms());
    h.engine.schedule(definition).await.unwrap();

    let result = h
        .engine
        .edit_schedule(
            "a",
            ScheduleEdits {
                end_ms: Some(h.clock.now_ms() - 1),
                ..ScheduleEdits::default()
            },
        )
        .await;

    assert!(matches!(result, Err(EngineError::Schedule(_))));
}

#[tokio::test]
async fn edit_during_prepare_discards_inflight_result() {
    let h = harness().await;
    let mut definition = info("a", TriggerType::CustomEventCount, 1.0);
    definition.priority = 1;
    h.engine.schedule(definition).await.unwrap();

    h.driver.hold_prepares();
    custom_event(&h).await;
    wait_until(|| h.driver.prepare_count("a") == 1).await;

    h.engine
        .edit_schedule(
            "a",
            ScheduleEdits {
                priority: Some(5),
                ..ScheduleEdits::default()
            },
        )
        .await
        .unwrap();
    h.driver.release_prepares();
    wait_until(|| h.driver.executed().len() == 1).await;

    let priorities: Vec<i32> = h
        .driver
        .calls()
        .into_iter()
        .filter_map(|call| match call {
            DriverCall::Prepare { priority, .. } => Some(priority),
            _ => None,
        })
        .collect();
    assert_eq!(priorities, vec![1, 5]);
}

#[tokio::test]
async fn expired_schedule_is_swept_on_query() {
    let h = harness().await;
    let mut definition = info("a", TriggerType::CustomEventCount, 1.0);
    definition.end_ms = Some(h.clock.now_ms() + 1_000);
    h.engine.schedule(definition).await.unwrap();

    h.clock.advance(Duration::from_secs(2));

    assert!(h.engine.get_all().await.unwrap().is_empty());
    assert_eq!(h.listener.count(&ListenerCall::Expired("a".to_string())), 1);
}

#[tokio::test]
async fn tick_compacts_grown_wal() {
    let dir = tempdir().unwrap();
    let config = EngineConfig {
        compact_threshold: 5,
        ..config(&dir)
    };
    let h = start(dir, config, FakeDriver::new()).await;

    for i in 0..5 {
        let mut definition = info("a", TriggerType::CustomEventCount, 1.0);
        definition.id = Some(format!("s-{i}"));
        h.engine.schedule(definition).await.unwrap();
    }

    // constraints plus five rows
    wait_until(|| h.store.lock().unwrap().appended_since_compaction() == 0).await;
    assert_eq!(h.store.lock().unwrap().sequence(), 6);
    assert_eq!(h.engine.get_all().await.unwrap().len(), 5);
}

#[tokio::test]
async fn stopped_engine_rejects_commands() {
    let h = harness().await;
    h.engine.stop().await.unwrap();

    let result = h.engine.get_all().await;
    assert!(matches!(result, Err(EngineError::Stopped)));
}

#[test]
fn advance_accumulates_and_resets_on_fire() {
    let mut progress = Progress::new();
    let triggers = vec![
        Trigger::new(TriggerType::CustomEventValue, 10.0),
        Trigger::new(TriggerType::CustomEventCount, 3.0),
    ];
    let event = json!({"event_value": 4.0});

    assert_eq!(
        advance(&mut progress, "a", &triggers, EventKind::CustomEvent, &event),
        None
    );
    assert_eq!(progress.get(&("a".to_string(), 0)), Some(&4.0));
    assert_eq!(progress.get(&("a".to_string(), 1)), Some(&1.0));

    assert_eq!(
        advance(&mut progress, "a", &triggers, EventKind::CustomEvent, &event),
        None
    );
    let fired = advance(&mut progress, "a", &triggers, EventKind::CustomEvent, &event);

    assert_eq!(fired, Some(triggers[0].clone()));
    assert!(progress.is_empty());
}

#[test]
fn advance_ignores_other_event_kinds() {
    let mut progress = Progress::new();
    let triggers = vec![Trigger::new(TriggerType::Foreground, 1.0)];

    let fired = advance(
        &mut progress,
        "a",
        &triggers,
        EventKind::Background,
        &Value::Null,
    );

    assert_eq!(fired, None);
    assert!(progress.is_empty());
}
