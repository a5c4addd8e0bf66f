// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Blocking HTTP client run on the tokio blocking pool

use super::{parse_retry_after, DeferredClient, DeferredError, DeferredRequest, DeferredResponse};
use async_trait::async_trait;
use std::time::Duration;

/// Deferred client over `ureq`
///
/// Redirects are not followed: a 307 is reported back so the caller can
/// remember the new location for the schedule.
#[derive(Clone)]
pub struct HttpDeferredClient {
    agent: ureq::Agent,
}

impl HttpDeferredClient {
    pub fn new(timeout: Duration) -> Self {
        let agent: ureq::Agent = ureq::Agent::config_builder()
            .http_status_as_error(false)
            .max_redirects(0)
            .timeout_global(Some(timeout))
            .build()
            .into();
        Self { agent }
    }
}

#[async_trait]
impl DeferredClient for HttpDeferredClient {
    async fn send(&self, request: DeferredRequest) -> Result<DeferredResponse, DeferredError> {
        let agent = self.agent.clone();
        tokio::task::spawn_blocking(move || send_blocking(&agent, request))
            .await
            .map_err(|e| DeferredError::Request(format!("task join error: {}", e)))?
    }
}

fn send_blocking(
    agent: &ureq::Agent,
    request: DeferredRequest,
) -> Result<DeferredResponse, DeferredError> {
    let mut response = agent
        .post(request.url.as_str())
        .header("Authorization", &format!("Bearer {}", request.token))
        .header("Content-Type", "application/json")
        .header("Accept", "application/json")
        .send(request.body.to_string())
        .map_err(map_error)?;

    let header = |name: &str| {
        response
            .headers()
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    };
    let location = header("Location");
    let retry_after = header("Retry-After").and_then(|v| parse_retry_after(&v));
    let status = response.status().as_u16();

    let text = response.body_mut().read_to_string().map_err(map_error)?;
    let body = if text.trim().is_empty() {
        None
    } else {
        match serde_json::from_str(&text) {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::debug!(status, error = %e, "ignoring non-JSON response body");
                None
            }
        }
    };

    Ok(DeferredResponse {
        status,
        location,
        retry_after,
        body,
    })
}

fn map_error(err: ureq::Error) -> DeferredError {
    match err {
        ureq::Error::Timeout(_) => DeferredError::Timeout,
        other => DeferredError::Request(other.to_string()),
    }
}

#[cfg(test)]
#[path = "http_tests.rs"]
mod tests;
