// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Traced adapter wrappers for consistent observability

use crate::deferred::{DeferredClient, DeferredError, DeferredRequest, DeferredResponse};
use crate::driver::{Driver, DriverError};
use async_trait::async_trait;
use rota_core::{PrepareResult, ReadyResult, Schedule, TriggerContext};
use tracing::Instrument;

/// Wrapper that adds tracing to any Driver
#[derive(Clone)]
pub struct TracedDriver<D> {
    inner: D,
}

impl<D> TracedDriver<D> {
    pub fn new(inner: D) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl<D: Driver> Driver for TracedDriver<D> {
    async fn prepare(&self, schedule: &Schedule, context: Option<&TriggerContext>) -> PrepareResult {
        let span = tracing::info_span!(
            "driver.prepare",
            id = %schedule.id,
            kind = schedule.schedule_type().as_str()
        );
        async {
            tracing::info!(
                trigger = context.map(|c| c.trigger.trigger_type.as_str()),
                "starting"
            );
            let start = std::time::Instant::now();
            let result = self.inner.prepare(schedule, context).await;
            tracing::info!(
                ?result,
                elapsed_ms = start.elapsed().as_millis() as u64,
                "prepared"
            );
            result
        }
        .instrument(span)
        .await
    }

    fn check_readiness(&self, schedule: &Schedule) -> Result<ReadyResult, DriverError> {
        let result = self.inner.check_readiness(schedule);
        match &result {
            Ok(ready) => tracing::trace!(id = %schedule.id, ?ready, "checked readiness"),
            Err(e) => tracing::warn!(id = %schedule.id, error = %e, "readiness check failed"),
        }
        result
    }

    async fn execute(&self, schedule: &Schedule) {
        let span = tracing::info_span!("driver.execute", id = %schedule.id, count = schedule.count);
        async {
            tracing::info!("starting");
            let start = std::time::Instant::now();
            self.inner.execute(schedule).await;
            tracing::info!(elapsed_ms = start.elapsed().as_millis() as u64, "executed");
        }
        .instrument(span)
        .await
    }

    fn on_execution_interrupted(&self, schedule: &Schedule) {
        tracing::warn!(id = %schedule.id, "execution interrupted by restart");
        self.inner.on_execution_interrupted(schedule);
    }

    fn discard(&self, schedule_id: &str) {
        tracing::debug!(id = schedule_id, "discarding prepared state");
        self.inner.discard(schedule_id);
    }
}

/// Wrapper that adds tracing to any DeferredClient
#[derive(Clone)]
pub struct TracedDeferredClient<C> {
    inner: C,
}

impl<C> TracedDeferredClient<C> {
    pub fn new(inner: C) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl<C: DeferredClient> DeferredClient for TracedDeferredClient<C> {
    async fn send(&self, request: DeferredRequest) -> Result<DeferredResponse, DeferredError> {
        let span = tracing::info_span!("deferred.send", url = %request.url);
        async {
            // Precondition: the token must be non-empty
            if request.token.is_empty() {
                tracing::error!("missing bearer token");
                return Err(DeferredError::Request("missing bearer token".to_string()));
            }

            tracing::debug!("sending");
            let start = std::time::Instant::now();
            let result = self.inner.send(request).await;
            let elapsed_ms = start.elapsed().as_millis() as u64;

            match &result {
                Ok(response) => tracing::info!(
                    status = response.status,
                    location = response.location.as_deref(),
                    retry_after_s = response.retry_after.map(|d| d.as_secs()),
                    elapsed_ms,
                    "response"
                ),
                Err(e) => tracing::warn!(elapsed_ms, error = %e, "request failed"),
            }
            result
        }
        .instrument(span)
        .await
    }
}

#[cfg(test)]
#[path = "traced_tests.rs"]
mod tests;
