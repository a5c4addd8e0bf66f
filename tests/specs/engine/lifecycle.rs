//! Schedule lifecycle specs
//!
//! Verify count, limit and interval handling across executions.

use crate::prelude::*;

#[tokio::test]
async fn interval_pause_returns_to_idle_on_virtual_clock() {
    let device = fake_device().await;
    let mut definition = info("tip", TriggerType::CustomEventCount, 1.0);
    definition.limit = 2;
    definition.interval = Duration::from_secs(10);
    device.engine.schedule(definition).await.unwrap();

    device.custom_event().await;
    wait_until(|| device.state("tip") == Some(ExecutionState::Paused)).await;
    assert_eq!(device.row("tip").unwrap().count, 1);

    device.clock.advance(Duration::from_secs(9));
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(device.state("tip"), Some(ExecutionState::Paused));

    // No caller action: the engine tick fires the interval timer
    device.clock.advance(Duration::from_secs(1));
    wait_until(|| device.state("tip") == Some(ExecutionState::Idle)).await;
    assert_eq!(device.row("tip").unwrap().count, 1);
}

#[tokio::test]
async fn limit_reached_fires_exactly_once() {
    let device = fake_device().await;
    let mut definition = info("promo", TriggerType::CustomEventCount, 1.0);
    definition.limit = 2;
    device.engine.schedule(definition).await.unwrap();

    device.custom_event().await;
    wait_until(|| device.driver.executed().len() == 1).await;
    wait_until(|| device.state("promo") == Some(ExecutionState::Idle)).await;

    device.custom_event().await;
    wait_until(|| device.state("promo").is_none()).await;

    device.custom_event().await;
    device.custom_event().await;

    assert_eq!(device.driver.executed().len(), 2);
    assert_eq!(
        device
            .listener
            .count(&ListenerCall::LimitReached("promo".to_string())),
        1
    );
}

#[tokio::test]
async fn finished_schedule_within_grace_period_is_revived_by_edit() {
    let device = fake_device().await;
    let mut definition = info("promo", TriggerType::CustomEventCount, 1.0);
    definition.edit_grace_period = Duration::from_secs(3600);
    device.engine.schedule(definition).await.unwrap();

    device.custom_event().await;
    wait_until(|| device.state("promo") == Some(ExecutionState::Finished)).await;

    let revived = device
        .engine
        .edit_schedule(
            "promo",
            ScheduleEdits {
                limit: Some(2),
                ..ScheduleEdits::default()
            },
        )
        .await
        .unwrap()
        .unwrap();

    assert_eq!(revived.state, ExecutionState::Idle);
    assert_eq!(revived.count, 1);
}

#[tokio::test]
async fn penalize_pauses_without_counting() {
    let driver = FakeDriver::new();
    driver.push_prepare("nag", [PrepareResult::Penalize]);
    let dir = temp_dir();
    let store = open_store(&dir);
    let device = Device::start(dir, store, driver, FakeClock::new()).await;
    let mut definition = info("nag", TriggerType::CustomEventCount, 1.0);
    definition.interval = Duration::from_secs(60);
    device.engine.schedule(definition).await.unwrap();

    device.custom_event().await;
    wait_until(|| device.state("nag") == Some(ExecutionState::Paused)).await;

    assert_eq!(device.row("nag").unwrap().count, 0);
    assert!(device.driver.executed().is_empty());
}
