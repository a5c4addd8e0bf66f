// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Device state used for audience checks and deferred requests

use rota_core::DeviceSnapshot;
use std::sync::{Arc, Mutex};

/// Source of the current device state
pub trait DeviceInfoProvider: Clone + Send + Sync + 'static {
    fn snapshot(&self) -> DeviceSnapshot;
}

/// Provider holding a snapshot the host keeps up to date
#[derive(Clone, Default)]
pub struct StaticDeviceInfo {
    inner: Arc<Mutex<DeviceSnapshot>>,
}

impl StaticDeviceInfo {
    pub fn new(snapshot: DeviceSnapshot) -> Self {
        Self {
            inner: Arc::new(Mutex::new(snapshot)),
        }
    }

    /// Mutate the held snapshot in place
    pub fn update(&self, f: impl FnOnce(&mut DeviceSnapshot)) {
        f(&mut self.inner.lock().unwrap_or_else(|e| e.into_inner()));
    }
}

impl DeviceInfoProvider for StaticDeviceInfo {
    fn snapshot(&self) -> DeviceSnapshot {
        self.inner.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

#[cfg(test)]
#[path = "device_tests.rs"]
mod tests;
