// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Bearer token sources for authenticated requests

use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use thiserror::Error;

/// Errors from auth providers
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AuthError {
    #[error("no token available")]
    Unavailable,
    #[error("token request failed: {0}")]
    Failed(String),
}

/// Source of bearer tokens
#[async_trait]
pub trait AuthProvider: Clone + Send + Sync + 'static {
    async fn token(&self) -> Result<String, AuthError>;

    /// Drop a token the server rejected so the next call fetches a fresh one
    fn expire(&self, _token: &str) {}
}

/// Provider backed by a token set by the host
#[derive(Clone, Default)]
pub struct StaticTokenProvider {
    token: Arc<Mutex<Option<String>>>,
}

impl StaticTokenProvider {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: Arc::new(Mutex::new(Some(token.into()))),
        }
    }

    /// Provider with no token yet
    pub fn unavailable() -> Self {
        Self::default()
    }

    pub fn set(&self, token: Option<String>) {
        *self.token.lock().unwrap_or_else(|e| e.into_inner()) = token;
    }
}

#[async_trait]
impl AuthProvider for StaticTokenProvider {
    async fn token(&self) -> Result<String, AuthError> {
        self.token
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
            .ok_or(AuthError::Unavailable)
    }
}

#[cfg(test)]
#[path = "auth_tests.rs"]
mod tests;
