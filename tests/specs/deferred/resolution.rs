//! Deferred resolution and audience specs
//!
//! Run the composite automation driver inside the engine.

use crate::prelude::*;
use async_trait::async_trait;
use rota_adapters::{
    DeferredClient, DeferredError, DeferredRequest, DeferredResponse, FakeDeferredClient,
    PayloadDelegate, StaticDeviceInfo, StaticTokenProvider,
};
use rota_core::{Audience, DeferredData, DeviceSnapshot, Platform};
use rota_engine::{
    AutomationDriver, DeferredResolver, FrequencyLimitManager, RetryConfig, RetryingExecutor,
};

/// Delegate recording the priority of each row it prepares
#[derive(Clone, Default)]
struct MessageDelegate {
    prepared_priorities: Arc<Mutex<Vec<i32>>>,
    executed: Arc<Mutex<Vec<ScheduleData>>>,
}

#[async_trait]
impl PayloadDelegate for MessageDelegate {
    async fn prepare(&self, schedule: &Schedule, _data: &ScheduleData) -> PrepareResult {
        self.prepared_priorities
            .lock()
            .unwrap()
            .push(schedule.priority);
        PrepareResult::Continue
    }

    async fn execute(&self, _schedule: &Schedule, data: &ScheduleData) {
        self.executed.lock().unwrap().push(data.clone());
    }
}

/// Endpoint that edits the stored row and answers 409 on its first call
#[derive(Clone)]
struct ConflictingEndpoint {
    store: Arc<Mutex<Store>>,
    calls: Arc<Mutex<u32>>,
}

#[async_trait]
impl DeferredClient for ConflictingEndpoint {
    async fn send(&self, request: DeferredRequest) -> Result<DeferredResponse, DeferredError> {
        let call = {
            let mut calls = self.calls.lock().unwrap();
            *calls += 1;
            *calls
        };
        if call == 1 {
            let mut store = self.store.lock().unwrap();
            let mut row = store.get("remote").cloned().unwrap();
            row.priority = 9;
            store.upsert(&row).unwrap();
            return Ok(DeferredResponse::with_status(409));
        }

        assert_eq!(request.token, "token");
        Ok(DeferredResponse {
            status: 200,
            body: Some(json!({"audience_match": true, "message": {"body": "hello"}})),
            ..DeferredResponse::default()
        })
    }
}

fn device_info(notifications_opted_in: bool) -> StaticDeviceInfo {
    StaticDeviceInfo::new(DeviceSnapshot {
        channel_id: Some("channel-1".to_string()),
        notifications_opted_in,
        ..DeviceSnapshot::default()
    })
}

fn automation_driver<C: DeferredClient>(
    store: &Arc<Mutex<Store>>,
    client: C,
    device: StaticDeviceInfo,
    clock: &FakeClock,
    delegate: MessageDelegate,
) -> AutomationDriver<C, StaticTokenProvider, StaticDeviceInfo, FakeClock> {
    let frequency = FrequencyLimitManager::new(Arc::clone(store), clock.clone());
    let resolver = DeferredResolver::new(
        client,
        StaticTokenProvider::new("token"),
        device.clone(),
        Platform::Android,
        RetryingExecutor::new(RetryConfig {
            max_attempts: 1,
            ..RetryConfig::default()
        }),
    );
    AutomationDriver::new(frequency, device, resolver)
        .with_delegate(ScheduleType::Actions, delegate.clone())
        .with_delegate(ScheduleType::InAppMessage, delegate)
}

#[tokio::test]
async fn conflict_invalidates_and_reprepares_the_fresh_row() {
    let dir = temp_dir();
    let store = open_store(&dir);
    let clock = FakeClock::new();
    let endpoint = ConflictingEndpoint {
        store: Arc::clone(&store),
        calls: Arc::default(),
    };
    let delegate = MessageDelegate::default();
    let driver = automation_driver(
        &store,
        endpoint.clone(),
        device_info(true),
        &clock,
        delegate.clone(),
    );
    let device = Device::start(dir, store, driver, clock).await;

    let mut definition = info("remote", TriggerType::CustomEventCount, 1.0);
    definition.priority = 1;
    definition.data = ScheduleData::Deferred(DeferredData {
        url: "https://example.com/deferred".to_string(),
        retry_on_timeout: true,
    });
    device.engine.schedule(definition).await.unwrap();

    device.custom_event().await;
    wait_until(|| delegate.executed.lock().unwrap().len() == 1).await;

    assert_eq!(*endpoint.calls.lock().unwrap(), 2);
    assert_eq!(*delegate.prepared_priorities.lock().unwrap(), vec![9]);
    assert_eq!(
        delegate.executed.lock().unwrap()[0],
        ScheduleData::InAppMessage(json!({"body": "hello"}))
    );
}

#[tokio::test]
async fn audience_miss_defaults_to_penalize() {
    let dir = temp_dir();
    let store = open_store(&dir);
    let clock = FakeClock::new();
    let delegate = MessageDelegate::default();
    let driver = automation_driver(
        &store,
        FakeDeferredClient::new(),
        device_info(false),
        &clock,
        delegate.clone(),
    );
    let device = Device::start(dir, store, driver, clock).await;

    let mut definition = info("opt-in", TriggerType::CustomEventCount, 1.0);
    definition.interval = Duration::from_secs(60);
    definition.audience = Some(Audience {
        notification_opt_in: Some(true),
        ..Audience::default()
    });
    device.engine.schedule(definition).await.unwrap();

    device.custom_event().await;

    // Penalize pauses for the interval; skip would return to idle
    wait_until(|| device.state("opt-in") == Some(ExecutionState::Paused)).await;
    assert_eq!(device.row("opt-in").unwrap().count, 0);
    assert!(delegate.prepared_priorities.lock().unwrap().is_empty());
}
