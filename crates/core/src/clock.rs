// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Wall-clock abstraction in epoch milliseconds
//!
//! Schedules persist absolute times (start, end, timer deadlines), so the
//! clock speaks epoch milliseconds rather than monotonic instants.

use std::sync::{Arc, Mutex};
use std::time::Duration;

/// A clock that provides the current time
pub trait Clock: Clone + Send + Sync + 'static {
    /// Milliseconds since the Unix epoch
    fn now_ms(&self) -> i64;
}

/// Real system clock
#[derive(Clone, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> i64 {
        chrono::Utc::now().timestamp_millis()
    }
}

/// Fake clock for testing with controllable time
#[derive(Clone)]
pub struct FakeClock {
    current: Arc<Mutex<i64>>,
}

impl FakeClock {
    /// Start the clock at the given epoch milliseconds
    pub fn at(epoch_ms: i64) -> Self {
        Self {
            current: Arc::new(Mutex::new(epoch_ms)),
        }
    }

    pub fn new() -> Self {
        Self::at(1_700_000_000_000)
    }

    /// Advance the clock by the given duration
    pub fn advance(&self, duration: Duration) {
        let mut current = self.current.lock().unwrap_or_else(|e| e.into_inner());
        *current += duration_ms(duration);
    }

    /// Set the clock to a specific epoch millisecond
    pub fn set(&self, epoch_ms: i64) {
        let mut current = self.current.lock().unwrap_or_else(|e| e.into_inner());
        *current = epoch_ms;
    }
}

impl Default for FakeClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for FakeClock {
    fn now_ms(&self) -> i64 {
        *self.current.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Convert a duration to whole milliseconds, saturating at `i64::MAX`
pub fn duration_ms(duration: Duration) -> i64 {
    i64::try_from(duration.as_millis()).unwrap_or(i64::MAX)
}

#[cfg(test)]
#[path = "clock_tests.rs"]
mod tests;
