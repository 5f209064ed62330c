// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Work queue state
//!
//! Two priority tiers, FIFO within a tier, and a fixed concurrency limit.
//! Pausing stops new tasks from starting; running tasks are left alone.
//! Tasks may carry a coalescing key: while a task with that key is still
//! pending, a second submission with the same key is folded into it.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;

/// Priority tier of a queued task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    /// Housekeeping (connectivity probes and the like)
    High,
    /// Per-farm check cycles
    Low,
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Priority::High => write!(f, "high"),
            Priority::Low => write!(f, "low"),
        }
    }
}

/// Identifier of a submitted task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskId(pub u64);

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "task-{}", self.0)
    }
}

/// A task waiting in or running on the queue
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueuedTask {
    pub id: TaskId,
    pub priority: Priority,
    pub key: Option<String>,
    pub label: String,
}

/// Result of a submission
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Submission {
    Queued(TaskId),
    /// Folded into the pending task with the same key
    Coalesced(TaskId),
}

impl Submission {
    pub fn id(&self) -> TaskId {
        match self {
            Submission::Queued(id) | Submission::Coalesced(id) => *id,
        }
    }
}

/// Queue bookkeeping; the engine owns the actual jobs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskQueue {
    pub concurrency: usize,
    pub paused: bool,
    high: VecDeque<QueuedTask>,
    low: VecDeque<QueuedTask>,
    running: Vec<QueuedTask>,
    next_id: u64,
}

impl TaskQueue {
    pub fn new(concurrency: usize) -> Self {
        Self {
            concurrency: concurrency.max(1),
            paused: false,
            high: VecDeque::new(),
            low: VecDeque::new(),
            running: Vec::new(),
            next_id: 1,
        }
    }

    /// Submit a task, coalescing on `key` with a pending task
    pub fn push(
        &self,
        priority: Priority,
        key: Option<String>,
        label: impl Into<String>,
    ) -> (TaskQueue, Submission) {
        if let Some(existing) = key.as_deref().and_then(|k| self.pending_with_key(k)) {
            return (self.clone(), Submission::Coalesced(existing.id));
        }

        let mut queue = self.clone();
        let id = TaskId(queue.next_id);
        queue.next_id += 1;
        let task = QueuedTask {
            id,
            priority,
            key,
            label: label.into(),
        };
        match priority {
            Priority::High => queue.high.push_back(task),
            Priority::Low => queue.low.push_back(task),
        }
        (queue, Submission::Queued(id))
    }

    /// Start the next task if the queue is running and has a free slot
    pub fn take(&self) -> (TaskQueue, Option<QueuedTask>) {
        if self.paused || self.running.len() >= self.concurrency {
            return (self.clone(), None);
        }
        let mut queue = self.clone();
        let task = queue.high.pop_front().or_else(|| queue.low.pop_front());
        if let Some(task) = &task {
            queue.running.push(task.clone());
        }
        (queue, task)
    }

    /// Mark a running task finished
    pub fn complete(&self, id: TaskId) -> TaskQueue {
        let mut queue = self.clone();
        queue.running.retain(|t| t.id != id);
        queue
    }

    pub fn pause(&self) -> TaskQueue {
        TaskQueue {
            paused: true,
            ..self.clone()
        }
    }

    pub fn resume(&self) -> TaskQueue {
        TaskQueue {
            paused: false,
            ..self.clone()
        }
    }

    pub fn pending_with_key(&self, key: &str) -> Option<&QueuedTask> {
        self.pending().find(|t| t.key.as_deref() == Some(key))
    }

    /// Pending tasks in the order they will start
    pub fn pending(&self) -> impl Iterator<Item = &QueuedTask> {
        self.high.iter().chain(self.low.iter())
    }

    pub fn running(&self) -> &[QueuedTask] {
        &self.running
    }

    pub fn pending_len(&self) -> usize {
        self.high.len() + self.low.len()
    }

    /// Nothing pending and nothing running
    pub fn is_idle(&self) -> bool {
        self.pending_len() == 0 && self.running.is_empty()
    }
}

impl Default for TaskQueue {
    fn default() -> Self {
        Self::new(1)
    }
}

#[cfg(test)]
#[path = "queue_tests.rs"]
mod tests;
