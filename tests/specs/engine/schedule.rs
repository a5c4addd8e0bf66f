//! Scheduling and cancellation specs

use crate::prelude::*;

#[tokio::test]
async fn end_at_or_before_start_is_rejected_before_persistence() {
    let device = fake_device().await;
    let now = device.clock.now_ms();

    for end_ms in [now, now - 1] {
        let mut definition = info("bad", TriggerType::CustomEventCount, 1.0);
        definition.start_ms = Some(now);
        definition.end_ms = Some(end_ms);

        let result = device.engine.schedule(definition).await;
        assert!(matches!(result, Err(EngineError::Schedule(_))));
    }

    assert!(device.engine.get_all().await.unwrap().is_empty());
    assert_eq!(device.store.lock().unwrap().sequence(), 0);
}

#[tokio::test]
async fn cancelling_a_deleted_schedule_is_a_noop() {
    let device = fake_device().await;
    device
        .engine
        .schedule(info("gone", TriggerType::CustomEventCount, 1.0))
        .await
        .unwrap();

    assert!(device.engine.cancel(vec!["gone".to_string()]).await.unwrap());
    let sequence = device.store.lock().unwrap().sequence();

    assert!(!device.engine.cancel(vec!["gone".to_string()]).await.unwrap());
    assert_eq!(device.store.lock().unwrap().sequence(), sequence);
    assert_eq!(
        device
            .listener
            .count(&ListenerCall::Cancelled("gone".to_string())),
        1
    );
}

#[tokio::test]
async fn queries_filter_by_group_and_type() {
    let device = fake_device().await;
    let mut first = info("a", TriggerType::CustomEventCount, 1.0);
    first.group = Some("onboarding".to_string());
    let mut second = info("b", TriggerType::CustomEventCount, 1.0);
    second.group = Some("onboarding".to_string());
    second.data = ScheduleData::InAppMessage(json!({"body": "welcome"}));
    device
        .engine
        .schedule_all(vec![first, second, info("c", TriggerType::AppInit, 1.0)])
        .await
        .unwrap();

    let ids = |rows: Vec<Schedule>| rows.into_iter().map(|s| s.id).collect::<Vec<_>>();
    assert_eq!(
        ids(device
            .engine
            .get_schedules_by_group("onboarding", None)
            .await
            .unwrap()),
        vec!["a", "b"]
    );
    assert_eq!(
        ids(device
            .engine
            .get_schedules_by_group("onboarding", Some(ScheduleType::InAppMessage))
            .await
            .unwrap()),
        vec!["b"]
    );
    assert_eq!(
        ids(device
            .engine
            .get_schedules_by_type(ScheduleType::Actions)
            .await
            .unwrap()),
        vec!["a", "c"]
    );
    assert_eq!(
        ids(device
            .engine
            .get_schedules(&["c".to_string(), "missing".to_string()])
            .await
            .unwrap()),
        vec!["c"]
    );
}
