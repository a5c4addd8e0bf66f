// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Error types for the automation engine

use crate::{ConfigError, ExecuteError};
use rota_core::ScheduleError;
use rota_storage::StoreError;
use thiserror::Error;

/// Errors returned by [`crate::AutomationEngine`] operations
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("execute error: {0}")]
    Execute(#[from] ExecuteError),
    #[error("storage error: {0}")]
    Store(#[from] StoreError),
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("invalid schedule: {0}")]
    Schedule(#[from] ScheduleError),
    #[error("schedule already exists: {0}")]
    DuplicateSchedule(String),
    #[error("schedule limit exceeded: at most {limit} schedules")]
    ScheduleLimitExceeded { limit: usize },
    #[error("schedule not found: {0}")]
    NotFound(String),
    #[error("engine stopped")]
    Stopped,
}
