//! Restart recovery specs
//!
//! Verify rows and timers persisted by one engine are reconciled by the next.

use crate::prelude::*;

#[tokio::test]
async fn executing_schedule_is_interrupted_on_start() {
    let dir = temp_dir();
    let store = open_store(&dir);
    {
        let mut definition = info("banner", TriggerType::CustomEventCount, 1.0);
        definition.limit = 3;
        let mut schedule = Schedule::new(definition, &SequentialIdGen::default(), 0).unwrap();
        schedule.state = ExecutionState::Executing;
        schedule.count = 1;
        store.lock().unwrap().upsert(&schedule).unwrap();
    }

    let device = Device::start(dir, store, FakeDriver::new(), FakeClock::new()).await;

    let interrupted = device
        .driver
        .calls()
        .into_iter()
        .filter(|c| matches!(c, DriverCall::Interrupted { id } if id == "banner"))
        .count();
    assert_eq!(interrupted, 1);

    let row = device.row("banner").unwrap();
    assert_eq!(row.state, ExecutionState::Idle);
    assert_eq!(row.count, 1);
    assert!(device.driver.executed().is_empty());
}

#[tokio::test]
async fn interval_timer_survives_restart() {
    let clock = FakeClock::new();
    let dir = temp_dir();
    let store = open_store(&dir);
    let first = Device::start(dir, store, FakeDriver::new(), clock.clone()).await;
    let mut definition = info("tip", TriggerType::CustomEventCount, 1.0);
    definition.limit = 0;
    definition.interval = Duration::from_secs(10);
    first.engine.schedule(definition).await.unwrap();

    first.custom_event().await;
    wait_until(|| first.state("tip") == Some(ExecutionState::Paused)).await;
    let dir = first.stop().await;

    clock.advance(Duration::from_secs(10));
    let store = open_store(&dir);
    let second = Device::start(dir, store, FakeDriver::new(), clock).await;

    assert_eq!(second.state("tip"), Some(ExecutionState::Idle));
    assert!(second.store.lock().unwrap().state().timers.is_empty());
}

#[tokio::test]
async fn waiting_schedule_is_prepared_again_after_restart() {
    let dir = temp_dir();
    let store = open_store(&dir);
    {
        let mut schedule = Schedule::new(
            info("survey", TriggerType::CustomEventCount, 1.0),
            &SequentialIdGen::default(),
            0,
        )
        .unwrap();
        schedule.state = ExecutionState::WaitingScheduleConditions;
        schedule.triggered_time_ms = Some(100);
        store.lock().unwrap().upsert(&schedule).unwrap();
    }

    let device = Device::start(dir, store, FakeDriver::new(), FakeClock::new()).await;
    wait_until(|| device.driver.executed() == vec!["survey".to_string()]).await;

    assert_eq!(device.driver.prepare_count("survey"), 1);
}
