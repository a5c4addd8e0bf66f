// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! rota automation engine

mod automation;
mod config;
mod deferred;
mod engine;
mod error;
mod executor;
mod limits;
mod retry;
mod scheduler;

pub use automation::AutomationDriver;
pub use config::{ConfigError, DeferredConfig, EngineConfig, RetryConfig};
pub use deferred::{request_body, DeferredOutcome, DeferredResolver};
pub use engine::{AutomationEngine, EngineDeps};
pub use error::EngineError;
pub use executor::{Completion, Conditions, ExecuteError, Executor, Feedback};
pub use limits::{FrequencyChecker, FrequencyLimitManager};
pub use retry::{RetryOutcome, RetryingExecutor};
pub use scheduler::Scheduler;
