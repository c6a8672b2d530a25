// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Queue manager: the single owner of all in-memory task state
//!
//! Every mutating operation appends its record to the WAL before touching
//! memory, under one lock held for the operation's full duration. A failed
//! append leaves memory exactly as it was.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use dq_core::{Clock, Config, Record, Task, TaskState};
use dq_storage::{Wal, WalError};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors reported by queue operations
#[derive(Debug, Error)]
pub enum QueueError {
    #[error("invalid input: {0}")]
    InvalidInput(&'static str),

    #[error("task capacity reached")]
    CapacityExceeded,

    #[error("task not found: {0}")]
    NotFound(String),

    #[error("task not in flight: {0}")]
    NotInFlight(String),

    #[error("worker mismatch for task {0}")]
    WorkerMismatch(String),

    #[error("wal write failed: {0}")]
    Durability(#[from] WalError),
}

/// Counters reported by the metrics surface
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stats {
    pub total: usize,
    pub pending: usize,
    pub in_flight: usize,
    pub done: usize,
    /// Sum of `attempts` across all tasks, including `Done` ones
    pub retries: u64,
}

/// Append surface of the WAL.
///
/// The manager only ever appends; abstracting that single method lets
/// tests stand in a failing log without a real disk fault.
pub trait WalAppend: Send + Sync {
    fn append(&self, record: &Record) -> Result<(), WalError>;
}

impl WalAppend for Wal {
    fn append(&self, record: &Record) -> Result<(), WalError> {
        Wal::append(self, record)
    }
}

/// In-memory queue state, guarded by the manager's lock
struct QueueState {
    /// All task records, keyed by id (single source of truth)
    tasks: HashMap<String, Task>,
    /// Ids awaiting delivery, FIFO by enqueue or reclamation order
    pending: VecDeque<String>,
    /// Leased ids mapped to the worker holding the lease
    in_flight: HashMap<String, String>,
}

impl QueueState {
    fn new() -> Self {
        Self {
            tasks: HashMap::new(),
            pending: VecDeque::new(),
            in_flight: HashMap::new(),
        }
    }
}

/// Queue manager owning tasks, the pending order, and in-flight leases.
///
/// Generic over the clock and the WAL append surface so tests can inject
/// a fake timeline and log faults; production uses `SystemClock` and
/// [`dq_storage::Wal`].
pub struct Manager<C: Clock, W: WalAppend = Wal> {
    state: Mutex<QueueState>,
    wal: W,
    clock: C,
    config: Config,
}

impl<C: Clock, W: WalAppend> Manager<C, W> {
    /// Create a manager with empty state.
    ///
    /// Callers restoring from a WAL apply the replayed records through
    /// [`Manager::apply`] before serving any client operation.
    pub fn new(config: Config, clock: C, wal: W) -> Self {
        Self {
            state: Mutex::new(QueueState::new()),
            wal,
            clock,
            config,
        }
    }

    /// Add a task to the queue.
    ///
    /// Re-enqueue of a known id is a success no-op, which makes client
    /// retries safe.
    pub fn enqueue(&self, task_id: &str, payload: &str) -> Result<(), QueueError> {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());

        if task_id.is_empty() {
            return Err(QueueError::InvalidInput("task id cannot be empty"));
        }
        if payload.len() > self.config.max_payload_bytes {
            return Err(QueueError::InvalidInput("payload exceeds max size"));
        }

        if state.tasks.contains_key(task_id) {
            return Ok(());
        }

        if state.tasks.len() >= self.config.max_tasks_in_memory {
            return Err(QueueError::CapacityExceeded);
        }

        self.wal.append(&Record::Enqueue {
            task_id: task_id.to_string(),
            payload: payload.to_string(),
            timestamp: self.clock.now(),
        })?;

        state.tasks.insert(task_id.to_string(), Task::new(task_id, payload));
        state.pending.push_back(task_id.to_string());

        Ok(())
    }

    /// Lease the oldest pending task to a worker.
    ///
    /// Returns `None` when no deliverable task exists. Stale pending
    /// entries (missing task or no longer `Pending`) are skipped and
    /// dropped; they are never handed out.
    pub fn poll(&self, worker_id: &str) -> Result<Option<Task>, QueueError> {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());

        if worker_id.is_empty() {
            return Err(QueueError::InvalidInput("worker id cannot be empty"));
        }

        while let Some(task_id) = state.pending.pop_front() {
            let deliverable = state
                .tasks
                .get(&task_id)
                .is_some_and(|task| task.state == TaskState::Pending);
            if !deliverable {
                continue;
            }

            let now = self.clock.now();
            let deadline = now + self.config.visibility_timeout;

            if let Err(e) = self.wal.append(&Record::Poll {
                task_id: task_id.clone(),
                worker_id: worker_id.to_string(),
                deadline,
                timestamp: now,
            }) {
                // The candidate must not be lost: restore it at the head
                // so the next poll sees the same FIFO order.
                state.pending.push_front(task_id);
                return Err(e.into());
            }

            if let Some(task) = state.tasks.get_mut(&task_id) {
                task.state = TaskState::InFlight;
                task.visibility_deadline = Some(deadline);
                let snapshot = task.clone();
                state.in_flight.insert(task_id, worker_id.to_string());
                return Ok(Some(snapshot));
            }
        }

        Ok(None)
    }

    /// Acknowledge a leased task as completed.
    ///
    /// Ack of an already-`Done` task is a success no-op so retried acks
    /// after a network timeout are safe.
    pub fn ack(&self, task_id: &str, worker_id: &str) -> Result<(), QueueError> {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());

        let task = match state.tasks.get(task_id) {
            Some(task) => task,
            None => return Err(QueueError::NotFound(task_id.to_string())),
        };

        if task.state == TaskState::Done {
            return Ok(());
        }
        if task.state != TaskState::InFlight {
            return Err(QueueError::NotInFlight(task_id.to_string()));
        }
        if state.in_flight.get(task_id).map(String::as_str) != Some(worker_id) {
            return Err(QueueError::WorkerMismatch(task_id.to_string()));
        }

        self.wal.append(&Record::Ack {
            task_id: task_id.to_string(),
            worker_id: worker_id.to_string(),
            timestamp: self.clock.now(),
        })?;

        if let Some(task) = state.tasks.get_mut(task_id) {
            task.state = TaskState::Done;
            task.visibility_deadline = None;
        }
        state.in_flight.remove(task_id);

        Ok(())
    }

    /// Reclaim every lease whose visibility deadline has passed.
    ///
    /// Candidates are processed in task-id order so the emitted `TIMEOUT`
    /// records replay in the same order they were applied. A failed append
    /// skips that task for this cycle; the next scan retries it.
    pub fn scan_visibility(&self) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        let now = self.clock.now();

        let mut expired: Vec<String> = state
            .in_flight
            .keys()
            .filter(|task_id| {
                state
                    .tasks
                    .get(*task_id)
                    .and_then(|task| task.visibility_deadline)
                    .is_some_and(|deadline| deadline < now)
            })
            .cloned()
            .collect();
        expired.sort();

        for task_id in expired {
            if let Err(e) = self.wal.append(&Record::Timeout {
                task_id: task_id.clone(),
                timestamp: now,
            }) {
                tracing::warn!(
                    task_id = %task_id,
                    error = %e,
                    "failed to write timeout record; retrying next scan"
                );
                continue;
            }

            if let Some(task) = state.tasks.get_mut(&task_id) {
                task.attempts += 1;
                task.state = TaskState::Pending;
                task.visibility_deadline = None;
            }
            state.in_flight.remove(&task_id);
            state.pending.push_back(task_id);
        }
    }

    /// Counters for the metrics surface. Pure read, no WAL interaction.
    pub fn stats(&self) -> Stats {
        let state = self.state.lock().unwrap_or_else(|e| e.into_inner());

        let mut done = 0;
        let mut retries = 0u64;
        for task in state.tasks.values() {
            if task.state == TaskState::Done {
                done += 1;
            }
            retries += u64::from(task.attempts);
        }

        Stats {
            total: state.tasks.len(),
            pending: state.pending.len(),
            in_flight: state.in_flight.len(),
            done,
            retries,
        }
    }

    /// Snapshot of a task record, if present
    pub fn task(&self, task_id: &str) -> Option<Task> {
        let state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state.tasks.get(task_id).cloned()
    }

    /// Worker currently holding the lease on a task, if any
    pub fn lease_holder(&self, task_id: &str) -> Option<String> {
        let state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state.in_flight.get(task_id).cloned()
    }

    // Restoration hooks, used only by WAL replay before the listener
    // starts. They mutate memory directly, never write the WAL, and
    // tolerate records whose context was lost.

    /// Apply one replayed record to the in-memory state
    pub fn apply(&self, record: &Record) {
        match record {
            Record::Enqueue {
                task_id, payload, ..
            } => self.replay_enqueue(task_id, payload),
            Record::Poll {
                task_id,
                worker_id,
                deadline,
                ..
            } => self.replay_poll(task_id, worker_id, *deadline),
            Record::Ack {
                task_id, worker_id, ..
            } => self.replay_ack(task_id, worker_id),
            Record::Timeout { task_id, timestamp } => self.replay_timeout(task_id, *timestamp),
        }
    }

    /// Restore an enqueued task; no-op when the id already exists
    pub fn replay_enqueue(&self, task_id: &str, payload: &str) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());

        if state.tasks.contains_key(task_id) {
            return;
        }

        state.tasks.insert(task_id.to_string(), Task::new(task_id, payload));
        state.pending.push_back(task_id.to_string());
    }

    /// Restore a lease; no-op when the task is unknown.
    ///
    /// Removes only the first matching id from `pending` so a duplicate
    /// entry can never take an unrelated slot with it.
    pub fn replay_poll(&self, task_id: &str, worker_id: &str, deadline: DateTime<Utc>) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());

        if !state.tasks.contains_key(task_id) {
            return;
        }

        if let Some(position) = state.pending.iter().position(|id| id == task_id) {
            state.pending.remove(position);
        }

        if let Some(task) = state.tasks.get_mut(task_id) {
            task.state = TaskState::InFlight;
            task.visibility_deadline = Some(deadline);
        }
        state.in_flight.insert(task_id.to_string(), worker_id.to_string());
    }

    /// Restore a completion; the worker id is advisory and not validated
    pub fn replay_ack(&self, task_id: &str, _worker_id: &str) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());

        if !state.tasks.contains_key(task_id) {
            return;
        }

        if let Some(task) = state.tasks.get_mut(task_id) {
            task.state = TaskState::Done;
            task.visibility_deadline = None;
        }
        state.in_flight.remove(task_id);
    }

    /// Restore a lease reclamation; no-op unless the task is `InFlight`
    pub fn replay_timeout(&self, task_id: &str, _now: DateTime<Utc>) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());

        let Some(task) = state.tasks.get_mut(task_id) else {
            return;
        };
        if task.state != TaskState::InFlight {
            return;
        }

        task.attempts += 1;
        task.state = TaskState::Pending;
        task.visibility_deadline = None;
        state.in_flight.remove(task_id);
        state.pending.push_back(task_id.to_string());
    }

    #[cfg(test)]
    pub(crate) fn snapshot(
        &self,
    ) -> (
        std::collections::BTreeMap<String, Task>,
        Vec<String>,
        std::collections::BTreeMap<String, String>,
    ) {
        let state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        (
            state.tasks.clone().into_iter().collect(),
            state.pending.iter().cloned().collect(),
            state.in_flight.clone().into_iter().collect(),
        )
    }

    #[cfg(test)]
    pub(crate) fn push_pending(&self, task_id: &str) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state.pending.push_back(task_id.to_string());
    }
}

#[cfg(test)]
#[path = "manager_tests.rs"]
mod tests;
