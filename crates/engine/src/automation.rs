// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Composite driver gating payload delegates behind audience, frequency
//! and deferred resolution

use crate::config::EngineConfig;
use crate::deferred::{DeferredOutcome, DeferredResolver};
use crate::limits::{FrequencyChecker, FrequencyLimitManager};
use async_trait::async_trait;
use rota_adapters::{
    AuthProvider, DeferredClient, DeviceInfoProvider, Driver, DriverError, HttpDeferredClient,
    PayloadDelegate,
};
use rota_core::{
    check_audience, AudiencePhase, Clock, MissBehavior, PrepareResult, ReadyResult, Schedule,
    ScheduleData, ScheduleType, TriggerContext,
};
use rota_storage::Store;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Prepare result for an audience miss
pub(crate) fn miss_result(behavior: MissBehavior) -> PrepareResult {
    match behavior {
        MissBehavior::Cancel => PrepareResult::Cancel,
        MissBehavior::Skip => PrepareResult::Skip,
        MissBehavior::Penalize => PrepareResult::Penalize,
    }
}

/// State carried from a successful prepare to readiness and execution
struct Prepared<K> {
    data: ScheduleData,
    checker: FrequencyChecker<K>,
}

/// Driver that checks frequency limits and audience, resolves deferred
/// content, then hands the payload to the delegate for its type
pub struct AutomationDriver<C, A, V, K> {
    delegates: Arc<HashMap<ScheduleType, Arc<dyn PayloadDelegate>>>,
    frequency: FrequencyLimitManager<K>,
    device: V,
    resolver: Arc<DeferredResolver<C, A, V>>,
    prepared: Arc<Mutex<HashMap<String, Prepared<K>>>>,
}

impl<C, A, V: Clone, K: Clone> Clone for AutomationDriver<C, A, V, K> {
    fn clone(&self) -> Self {
        Self {
            delegates: Arc::clone(&self.delegates),
            frequency: self.frequency.clone(),
            device: self.device.clone(),
            resolver: Arc::clone(&self.resolver),
            prepared: Arc::clone(&self.prepared),
        }
    }
}

impl<C, A, V, K> AutomationDriver<C, A, V, K>
where
    C: DeferredClient,
    A: AuthProvider,
    V: DeviceInfoProvider,
    K: Clock,
{
    pub fn new(
        frequency: FrequencyLimitManager<K>,
        device: V,
        resolver: DeferredResolver<C, A, V>,
    ) -> Self {
        Self {
            delegates: Arc::new(HashMap::new()),
            frequency,
            device,
            resolver: Arc::new(resolver),
            prepared: Arc::default(),
        }
    }

    /// Register the delegate for a payload type
    ///
    /// Deferred schedules resolve to in-app messages, so they use the
    /// `InAppMessage` delegate.
    pub fn with_delegate(mut self, kind: ScheduleType, delegate: impl PayloadDelegate) -> Self {
        let mut delegates = (*self.delegates).clone();
        delegates.insert(kind, Arc::new(delegate));
        self.delegates = Arc::new(delegates);
        self
    }

    /// Whether the schedule's audience admits this device at scheduling time
    ///
    /// Users installed at or after `new_user_cutoff_ms` count as new.
    pub fn audience_allows_scheduling(&self, schedule: &Schedule, new_user_cutoff_ms: i64) -> bool {
        let Some(audience) = &schedule.audience else {
            return true;
        };
        check_audience(
            audience,
            &self.device.snapshot(),
            AudiencePhase::Scheduling { new_user_cutoff_ms },
        )
    }

    fn delegate(&self, kind: ScheduleType) -> Option<Arc<dyn PayloadDelegate>> {
        self.delegates.get(&kind).cloned()
    }

    fn take_prepared(&self, id: &str) -> Option<Prepared<K>> {
        self.prepared
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(id)
    }
}

impl<A, V, K> AutomationDriver<HttpDeferredClient, A, V, K>
where
    A: AuthProvider,
    V: DeviceInfoProvider,
    K: Clock,
{
    /// Driver wired from configuration, resolving deferred schedules over HTTP
    ///
    /// `store` must be the store handed to the engine so frequency limits
    /// share its WAL.
    pub fn from_config(
        config: &EngineConfig,
        store: Arc<Mutex<Store>>,
        device: V,
        auth: A,
        clock: K,
    ) -> Self {
        let client = HttpDeferredClient::new(config.deferred.request_timeout);
        let resolver = DeferredResolver::from_config(client, auth, device.clone(), config);
        Self::new(FrequencyLimitManager::new(store, clock), device, resolver)
    }
}

#[async_trait]
impl<C, A, V, K> Driver for AutomationDriver<C, A, V, K>
where
    C: DeferredClient,
    A: AuthProvider,
    V: DeviceInfoProvider,
    K: Clock,
{
    async fn prepare(&self, schedule: &Schedule, context: Option<&TriggerContext>) -> PrepareResult {
        self.take_prepared(&schedule.id);

        let checker = self
            .frequency
            .frequency_checker(&schedule.frequency_constraint_ids);
        if checker.is_over_limit() {
            tracing::debug!(id = %schedule.id, "frequency limit reached");
            return PrepareResult::Skip;
        }

        if let Some(audience) = &schedule.audience {
            if !check_audience(audience, &self.device.snapshot(), AudiencePhase::Execution) {
                tracing::debug!(id = %schedule.id, "audience check failed");
                return miss_result(audience.miss_behavior());
            }
        }

        let data = match &schedule.data {
            ScheduleData::Deferred(deferred) => {
                match self.resolver.resolve(schedule, deferred, context).await {
                    DeferredOutcome::Resolved(message) => ScheduleData::InAppMessage(message),
                    DeferredOutcome::Rejected(result) => return result,
                }
            }
            other => other.clone(),
        };

        let Some(delegate) = self.delegate(data.schedule_type()) else {
            tracing::warn!(
                id = %schedule.id,
                kind = data.schedule_type().as_str(),
                "no delegate for payload type"
            );
            return PrepareResult::Penalize;
        };

        let result = delegate.prepare(schedule, &data).await;
        if result == PrepareResult::Continue {
            self.prepared
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .insert(schedule.id.clone(), Prepared { data, checker });
        }
        result
    }

    fn check_readiness(&self, schedule: &Schedule) -> Result<ReadyResult, DriverError> {
        let mut prepared = self.prepared.lock().unwrap_or_else(|e| e.into_inner());
        let Some(Prepared { data, checker }) = prepared.get(&schedule.id) else {
            // Nothing prepared in this process, e.g. after a restart
            return Ok(ReadyResult::Invalidate);
        };
        let kind = data.schedule_type();
        let delegate = self
            .delegate(kind)
            .ok_or(DriverError::MissingDelegate(kind.as_str()))?;

        let ready = match delegate.check_readiness(schedule, data) {
            ReadyResult::Continue => match checker.check_and_increment() {
                Ok(true) => ReadyResult::Continue,
                Ok(false) => {
                    tracing::debug!(id = %schedule.id, "frequency limit reached at execution");
                    ReadyResult::Skip
                }
                Err(e) => return Err(DriverError::Readiness(e.to_string())),
            },
            other => other,
        };
        if matches!(ready, ReadyResult::Skip | ReadyResult::Invalidate) {
            prepared.remove(&schedule.id);
        }
        Ok(ready)
    }

    async fn execute(&self, schedule: &Schedule) {
        let Some(Prepared { data, .. }) = self.take_prepared(&schedule.id) else {
            tracing::warn!(id = %schedule.id, "execute without prepared payload");
            return;
        };
        if let Some(delegate) = self.delegate(data.schedule_type()) {
            delegate.execute(schedule, &data).await;
        }
    }

    fn on_execution_interrupted(&self, schedule: &Schedule) {
        let kind = match schedule.schedule_type() {
            ScheduleType::Deferred => ScheduleType::InAppMessage,
            kind => kind,
        };
        if let Some(delegate) = self.delegate(kind) {
            delegate.on_execution_interrupted(schedule);
        }
    }

    fn discard(&self, schedule_id: &str) {
        self.take_prepared(schedule_id);
    }
}

#[cfg(test)]
#[path = "automation_tests.rs"]
mod tests;
