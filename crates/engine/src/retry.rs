// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Bounded exponential backoff

use crate::config::RetryConfig;
use std::future::Future;
use std::time::Duration;

/// What one attempt asks of the executor
#[derive(Debug, Clone, PartialEq)]
pub enum RetryOutcome<T> {
    Finished(T),
    /// Try again, after `after` when given or the next backoff step otherwise
    Retry { after: Option<Duration> },
}

/// Runs an operation until it finishes or attempts run out
///
/// Backoff state is per call.
#[derive(Debug, Clone)]
pub struct RetryingExecutor {
    config: RetryConfig,
}

impl RetryingExecutor {
    pub fn new(config: RetryConfig) -> Self {
        Self { config }
    }

    /// Backoff before retry number `retry` (1-based)
    pub fn backoff(&self, retry: u32) -> Duration {
        let factor = self
            .config
            .multiplier
            .max(1)
            .saturating_pow(retry.saturating_sub(1));
        self.config
            .initial_backoff
            .saturating_mul(factor)
            .min(self.config.max_backoff)
    }

    /// Run `op`, passing the 1-based attempt number
    ///
    /// Returns `None` once `max_attempts` attempts all asked to retry.
    pub async fn run<T, F, Fut>(&self, mut op: F) -> Option<T>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = RetryOutcome<T>>,
    {
        let max_attempts = self.config.max_attempts.max(1);
        for attempt in 1..=max_attempts {
            match op(attempt).await {
                RetryOutcome::Finished(value) => return Some(value),
                RetryOutcome::Retry { after } => {
                    if attempt == max_attempts {
                        break;
                    }
                    let wait = after.unwrap_or_else(|| self.backoff(attempt));
                    tracing::debug!(attempt, wait_ms = wait.as_millis() as u64, "retrying");
                    tokio::time::sleep(wait).await;
                }
            }
        }
        tracing::warn!(max_attempts, "retries exhausted");
        None
    }
}

#[cfg(test)]
#[path = "retry_tests.rs"]
mod tests;
