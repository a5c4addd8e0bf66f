// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Deferred schedule resolver
//!
//! Turns a deferred schedule into concrete in-app content by POSTing the
//! device state to the schedule's endpoint, interpreting the status code
//! and retrying transient failures with backoff.

use crate::automation::miss_result;
use crate::config::EngineConfig;
use crate::retry::{RetryOutcome, RetryingExecutor};
use rota_adapters::{
    AuthProvider, DeferredClient, DeferredError, DeferredRequest, DeferredResponse,
    DeviceInfoProvider,
};
use rota_core::{
    DeferredData, DeviceSnapshot, MissBehavior, Platform, PrepareResult, Schedule, TriggerContext,
};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

/// Result of resolving a deferred schedule
#[derive(Debug, Clone, PartialEq)]
pub enum DeferredOutcome {
    /// The endpoint returned content to display
    Resolved(Value),
    /// Stop preparing with this result
    Rejected(PrepareResult),
}

pub struct DeferredResolver<C, A, V> {
    client: C,
    auth: A,
    device: V,
    platform: Platform,
    retry: RetryingExecutor,
    /// Redirect targets by schedule id
    redirects: Mutex<HashMap<String, String>>,
}

impl<C, A, V> DeferredResolver<C, A, V>
where
    C: DeferredClient,
    A: AuthProvider,
    V: DeviceInfoProvider,
{
    pub fn new(client: C, auth: A, device: V, platform: Platform, retry: RetryingExecutor) -> Self {
        Self {
            client,
            auth,
            device,
            platform,
            retry,
            redirects: Mutex::new(HashMap::new()),
        }
    }

    /// Resolver using the configured platform and retry policy
    pub fn from_config(client: C, auth: A, device: V, config: &EngineConfig) -> Self {
        Self::new(
            client,
            auth,
            device,
            config.deferred.platform,
            RetryingExecutor::new(config.retry.clone()),
        )
    }

    /// Resolve content for `schedule`, retrying transient failures
    ///
    /// Exhausted retries penalize the schedule.
    pub async fn resolve(
        &self,
        schedule: &Schedule,
        deferred: &DeferredData,
        context: Option<&TriggerContext>,
    ) -> DeferredOutcome {
        let miss_behavior = schedule
            .audience
            .as_ref()
            .map(|a| a.miss_behavior())
            .unwrap_or_default();

        let outcome = self
            .retry
            .run(|attempt| self.attempt(schedule, deferred, context, miss_behavior, attempt))
            .await
            .unwrap_or(DeferredOutcome::Rejected(PrepareResult::Penalize));

        self.redirects
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&schedule.id);
        outcome
    }

    /// Redirect target currently stored for a schedule
    pub fn redirect_for(&self, schedule_id: &str) -> Option<String> {
        self.redirects
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(schedule_id)
            .cloned()
    }

    async fn attempt(
        &self,
        schedule: &Schedule,
        deferred: &DeferredData,
        context: Option<&TriggerContext>,
        miss_behavior: MissBehavior,
        attempt: u32,
    ) -> RetryOutcome<DeferredOutcome> {
        let device = self.device.snapshot();
        let Some(channel_id) = device.channel_id.clone() else {
            tracing::debug!(id = %schedule.id, attempt, "channel id unavailable");
            return RetryOutcome::Retry { after: None };
        };

        let token = match self.auth.token().await {
            Ok(token) => token,
            Err(e) => {
                tracing::debug!(id = %schedule.id, attempt, error = %e, "auth token unavailable");
                return RetryOutcome::Retry { after: None };
            }
        };

        let url = self
            .redirect_for(&schedule.id)
            .unwrap_or_else(|| deferred.url.clone());
        let request = DeferredRequest {
            url,
            token: token.clone(),
            body: request_body(self.platform, &channel_id, &device, context),
        };

        match self.client.send(request).await {
            Ok(response) => {
                if response.status == 401 {
                    self.auth.expire(&token);
                    return RetryOutcome::Retry { after: None };
                }
                self.interpret(schedule, response, miss_behavior)
            }
            Err(e) => network_failure(schedule, deferred, &e),
        }
    }

    fn interpret(
        &self,
        schedule: &Schedule,
        response: DeferredResponse,
        miss_behavior: MissBehavior,
    ) -> RetryOutcome<DeferredOutcome> {
        use DeferredOutcome::{Rejected, Resolved};
        use RetryOutcome::{Finished, Retry};

        match response.status {
            200..=299 => {
                let body = response.body.unwrap_or(Value::Null);
                let audience_match = body
                    .get("audience_match")
                    .and_then(Value::as_bool)
                    .unwrap_or(false);
                if !audience_match {
                    return Finished(Rejected(miss_result(miss_behavior)));
                }
                match body.get("message") {
                    Some(message) if !message.is_null() => Finished(Resolved(message.clone())),
                    _ => {
                        tracing::warn!(id = %schedule.id, "deferred response has no message");
                        Finished(Rejected(PrepareResult::Penalize))
                    }
                }
            }
            409 => Finished(Rejected(PrepareResult::Invalidate)),
            307 | 429 => {
                if response.location.is_none() && response.retry_after.is_none() {
                    return Finished(Rejected(PrepareResult::Penalize));
                }
                if let Some(location) = response.location {
                    tracing::debug!(id = %schedule.id, %location, "following deferred redirect");
                    self.redirects
                        .lock()
                        .unwrap_or_else(|e| e.into_inner())
                        .insert(schedule.id.clone(), location);
                }
                let after = match (response.status, response.retry_after) {
                    (_, Some(after)) => Some(after),
                    (307, None) => Some(Duration::ZERO),
                    _ => None,
                };
                Retry { after }
            }
            500..=599 => Retry { after: None },
            status => {
                tracing::warn!(id = %schedule.id, status, "deferred request rejected");
                Finished(Rejected(PrepareResult::Penalize))
            }
        }
    }
}

fn network_failure(
    schedule: &Schedule,
    deferred: &DeferredData,
    error: &DeferredError,
) -> RetryOutcome<DeferredOutcome> {
    if deferred.retry_on_timeout {
        tracing::debug!(id = %schedule.id, %error, "deferred request failed, will retry");
        RetryOutcome::Retry { after: None }
    } else {
        tracing::warn!(id = %schedule.id, %error, "deferred request failed");
        RetryOutcome::Finished(DeferredOutcome::Rejected(PrepareResult::Penalize))
    }
}

/// JSON body describing the device and the trigger that fired
pub fn request_body(
    platform: Platform,
    channel_id: &str,
    device: &DeviceSnapshot,
    context: Option<&TriggerContext>,
) -> Value {
    let (language, country) = device.locale_parts();
    let mut body = json!({
        "platform": platform.as_str(),
        "channel_id": channel_id,
        "tag_overrides": device.tag_overrides,
        "attribute_overrides": device.attribute_overrides,
        "state_overrides": {
            "app_version": device.app_version_name,
            "sdk_version": device.sdk_version,
            "notification_opt_in": device.notifications_opted_in,
            "locale_language": language,
            "locale_country": country,
        },
    });
    if let Some(context) = context {
        body["trigger"] = json!({
            "type": context.trigger.trigger_type.as_str(),
            "goal": context.trigger.goal,
            "event": context.event,
        });
    }
    body
}

#[cfg(test)]
#[path = "deferred_tests.rs"]
mod tests;
