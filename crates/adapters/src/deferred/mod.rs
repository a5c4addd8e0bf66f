// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Deferred content endpoint clients

mod http;

pub use http::HttpDeferredClient;

// Test support - only compiled for tests or when explicitly requested
#[cfg(any(test, feature = "test-support"))]
mod fake;
#[cfg(any(test, feature = "test-support"))]
pub use fake::FakeDeferredClient;

use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;

/// Errors from deferred requests that never produced a response
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DeferredError {
    #[error("request timed out")]
    Timeout,
    #[error("request failed: {0}")]
    Request(String),
}

/// One authenticated POST to a deferred endpoint
#[derive(Debug, Clone, PartialEq)]
pub struct DeferredRequest {
    pub url: String,
    pub token: String,
    pub body: Value,
}

/// Raw endpoint response
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DeferredResponse {
    pub status: u16,
    /// `Location` header
    pub location: Option<String>,
    /// `Retry-After` header, in seconds
    pub retry_after: Option<Duration>,
    /// JSON body, when one was sent and parsed
    pub body: Option<Value>,
}

impl DeferredResponse {
    pub fn with_status(status: u16) -> Self {
        Self {
            status,
            ..Self::default()
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Client for deferred content endpoints
#[async_trait]
pub trait DeferredClient: Clone + Send + Sync + 'static {
    async fn send(&self, request: DeferredRequest) -> Result<DeferredResponse, DeferredError>;
}

/// Parse a `Retry-After` value given in whole seconds
pub fn parse_retry_after(value: &str) -> Option<Duration> {
    value.trim().parse::<u64>().ok().map(Duration::from_secs)
}

#[cfg(test)]
#[path = "deferred_tests.rs"]
mod tests;
