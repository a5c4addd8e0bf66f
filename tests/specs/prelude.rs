//! Shared harness for engine specs

#![allow(dead_code)]

pub use rota_adapters::{DriverCall, FakeDriver, ListenerCall, RecordingListener};
pub use rota_core::{
    Clock, ExecutionState, FakeClock, PrepareResult, ReadyResult, Schedule, ScheduleData,
    ScheduleEdits, ScheduleInfo, ScheduleType, SequentialIdGen, Trigger, TriggerType, EventKind,
};
pub use rota_engine::{AutomationEngine, EngineConfig, EngineDeps, EngineError};
pub use rota_storage::Store;
pub use serde_json::{json, Value};
pub use std::sync::{Arc, Mutex};
pub use std::time::Duration;
pub use tempfile::TempDir;

use rota_adapters::Driver;

/// Running engine plus the fakes it was started with
pub struct Device<D> {
    pub dir: TempDir,
    pub engine: AutomationEngine,
    pub driver: D,
    pub listener: RecordingListener,
    pub clock: FakeClock,
    pub store: Arc<Mutex<Store>>,
}

pub fn temp_dir() -> TempDir {
    tempfile::tempdir().unwrap()
}

pub fn config(dir: &TempDir) -> EngineConfig {
    EngineConfig {
        tick_interval: Duration::from_millis(10),
        store_path: dir.path().join("automation.wal"),
        ..EngineConfig::default()
    }
}

pub fn open_store(dir: &TempDir) -> Arc<Mutex<Store>> {
    let store = config(dir).open_store().unwrap();
    Arc::new(Mutex::new(store))
}

impl<D: Driver> Device<D> {
    pub async fn start(dir: TempDir, store: Arc<Mutex<Store>>, driver: D, clock: FakeClock) -> Self {
        let listener = RecordingListener::new();
        let deps = EngineDeps {
            driver: driver.clone(),
            listener: listener.clone(),
            clock: clock.clone(),
            ids: SequentialIdGen::default(),
            store: Arc::clone(&store),
        };
        let engine = AutomationEngine::start(deps, &config(&dir)).await.unwrap();
        Self {
            dir,
            engine,
            driver,
            listener,
            clock,
            store,
        }
    }

    /// Stop the engine and hand back its directory for a restart
    pub async fn stop(self) -> TempDir {
        self.engine.stop().await.unwrap();
        self.dir
    }

    pub fn state(&self, id: &str) -> Option<ExecutionState> {
        self.store.lock().unwrap().get(id).map(|s| s.state)
    }

    pub fn row(&self, id: &str) -> Option<Schedule> {
        self.store.lock().unwrap().get(id).cloned()
    }

    pub async fn custom_event(&self) {
        self.engine
            .on_event(EventKind::CustomEvent, json!({"event_name": "tap"}))
            .await
            .unwrap();
    }
}

/// Engine with a fresh store and a fake driver
pub async fn fake_device() -> Device<FakeDriver> {
    let dir = temp_dir();
    let store = open_store(&dir);
    Device::start(dir, store, FakeDriver::new(), FakeClock::new()).await
}

/// Definition with a single trigger and a fixed id
pub fn info(id: &str, trigger_type: TriggerType, goal: f64) -> ScheduleInfo {
    let mut info = ScheduleInfo::new(
        ScheduleData::Actions(json!({"id": id})),
        vec![Trigger::new(trigger_type, goal)],
    );
    info.id = Some(id.to_string());
    info
}

/// Poll until the condition holds, panicking after two seconds
pub async fn wait_until(mut condition: impl FnMut() -> bool) {
    for _ in 0..400 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("condition not reached");
}
