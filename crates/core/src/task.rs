// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Task records and their lifecycle states

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle state of a task.
///
/// `Done` is terminal; the record stays in memory for observability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskState {
    Pending,
    InFlight,
    Done,
}

/// A unit of work owned by the queue manager
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub payload: String,
    pub state: TaskState,
    /// Lease expiry; only meaningful while the task is `InFlight`
    pub visibility_deadline: Option<DateTime<Utc>>,
    /// Count of timeout-induced redeliveries, not of deliveries
    pub attempts: u32,
}

impl Task {
    /// Create a freshly enqueued task
    pub fn new(id: impl Into<String>, payload: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            payload: payload.into(),
            state: TaskState::Pending,
            visibility_deadline: None,
            attempts: 0,
        }
    }
}

#[cfg(test)]
#[path = "task_tests.rs"]
mod tests;
