// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! No-op listener

use super::ScheduleListener;

/// Listener that ignores every notification
#[derive(Clone, Copy, Debug, Default)]
pub struct NoOpListener;

impl ScheduleListener for NoOpListener {}
