// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fake deferred client for testing
#![cfg_attr(coverage_nightly, coverage(off))]

use super::{DeferredClient, DeferredError, DeferredRequest, DeferredResponse};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

/// Fake client answering from a queue of scripted responses
///
/// An empty queue answers `500`.
#[derive(Clone, Default)]
pub struct FakeDeferredClient {
    requests: Arc<Mutex<Vec<DeferredRequest>>>,
    responses: Arc<Mutex<VecDeque<Result<DeferredResponse, DeferredError>>>>,
}

impl FakeDeferredClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a response
    pub fn push(&self, response: DeferredResponse) {
        self.push_result(Ok(response));
    }

    pub fn push_result(&self, result: Result<DeferredResponse, DeferredError>) {
        self.responses
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push_back(result);
    }

    /// Get all recorded requests
    pub fn requests(&self) -> Vec<DeferredRequest> {
        self.requests
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

#[async_trait]
impl DeferredClient for FakeDeferredClient {
    async fn send(&self, request: DeferredRequest) -> Result<DeferredResponse, DeferredError> {
        self.requests
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(request);
        self.responses
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pop_front()
            .unwrap_or_else(|| Ok(DeferredResponse::with_status(500)))
    }
}
