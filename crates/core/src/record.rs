// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Records persisted to the write-ahead log
//!
//! One record per line, one line per state change. The WAL is appended
//! before the corresponding in-memory mutation, so replaying the records
//! in order reconstructs the live state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single state-change record in the WAL.
///
/// Serialized as a flat JSON object with a `type` tag, e.g.
/// `{"type":"ENQUEUE","task_id":"t1","payload":"p","timestamp":"..."}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Record {
    /// A task was accepted into the queue
    #[serde(rename = "ENQUEUE")]
    Enqueue {
        task_id: String,
        payload: String,
        timestamp: DateTime<Utc>,
    },

    /// A worker leased a task until `deadline`
    #[serde(rename = "POLL")]
    Poll {
        task_id: String,
        worker_id: String,
        deadline: DateTime<Utc>,
        timestamp: DateTime<Utc>,
    },

    /// The leasing worker acknowledged completion
    #[serde(rename = "ACK")]
    Ack {
        task_id: String,
        worker_id: String,
        timestamp: DateTime<Utc>,
    },

    /// An expired lease was reclaimed by the visibility scanner.
    /// No worker id: reclamation is not scoped to the lease holder.
    #[serde(rename = "TIMEOUT")]
    Timeout {
        task_id: String,
        timestamp: DateTime<Utc>,
    },
}

impl Record {
    /// The id of the task this record concerns
    pub fn task_id(&self) -> &str {
        match self {
            Record::Enqueue { task_id, .. }
            | Record::Poll { task_id, .. }
            | Record::Ack { task_id, .. }
            | Record::Timeout { task_id, .. } => task_id,
        }
    }
}

#[cfg(test)]
#[path = "record_tests.rs"]
mod tests;
