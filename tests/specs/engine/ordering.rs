//! Execution ordering specs

use crate::prelude::*;

fn waiting(id: &str, triggered_time_ms: i64, priority: i32) -> Schedule {
    let mut schedule = Schedule::new(
        info(id, TriggerType::CustomEventCount, 1.0),
        &SequentialIdGen::default(),
        0,
    )
    .unwrap();
    schedule.priority = priority;
    schedule.state = ExecutionState::WaitingScheduleConditions;
    schedule.triggered_time_ms = Some(triggered_time_ms);
    schedule
}

#[tokio::test]
async fn eligible_schedules_execute_by_triggered_time_then_priority() {
    let dir = temp_dir();
    let store = open_store(&dir);
    {
        let mut store = store.lock().unwrap();
        store.upsert(&waiting("A", 200, 4)).unwrap();
        store.upsert(&waiting("B", 200, 2)).unwrap();
        store.upsert(&waiting("C", 500, 5)).unwrap();
    }
    let driver = FakeDriver::new();
    for id in ["A", "B", "C"] {
        driver.push_readiness(id, [Ok(ReadyResult::NotReady)]);
    }
    let device = Device::start(dir, store, driver, FakeClock::new()).await;

    let readiness_checks = || {
        device
            .driver
            .calls()
            .iter()
            .filter(|c| matches!(c, DriverCall::CheckReadiness { .. }))
            .count()
    };
    wait_until(|| readiness_checks() == 3).await;

    device.engine.check_pending_schedules().await.unwrap();
    wait_until(|| device.driver.executed().len() == 3).await;

    assert_eq!(device.driver.executed(), vec!["B", "A", "C"]);
}
