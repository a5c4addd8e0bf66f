// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
// Enable coverage(off) attribute for excluding test infrastructure
#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

//! Adapters for external I/O: drivers, listeners and deferred content

pub mod auth;
pub mod deferred;
pub mod device;
pub mod driver;
pub mod listener;
pub mod traced;

pub use auth::{AuthError, AuthProvider, StaticTokenProvider};
pub use deferred::{
    parse_retry_after, DeferredClient, DeferredError, DeferredRequest, DeferredResponse,
    HttpDeferredClient,
};
pub use device::{DeviceInfoProvider, StaticDeviceInfo};
pub use driver::{Driver, DriverError, PayloadDelegate};
pub use listener::{NoOpListener, ScheduleListener};
pub use traced::{TracedDeferredClient, TracedDriver};

// Test support - only compiled for tests or when explicitly requested
#[cfg(any(test, feature = "test-support"))]
pub use deferred::FakeDeferredClient;
#[cfg(any(test, feature = "test-support"))]
pub use driver::{DriverCall, FakeDriver};
#[cfg(any(test, feature = "test-support"))]
pub use listener::{ListenerCall, RecordingListener};
