// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Work queue runner
//!
//! Wraps the [`TaskQueue`] bookkeeping with the jobs themselves and spawns
//! them on tokio as slots free up.

use crate::events::EventBus;
use df_core::{Event, Priority, Submission, TaskId, TaskQueue};
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use tokio::sync::watch;

/// A unit of queued work
pub type Job = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

struct QueueState {
    tasks: TaskQueue,
    jobs: HashMap<TaskId, Job>,
}

struct QueueShared {
    state: Mutex<QueueState>,
    idle: watch::Sender<bool>,
    events: EventBus,
}

/// Process-wide priority queue with bounded concurrency
#[derive(Clone)]
pub struct WorkQueue {
    shared: Arc<QueueShared>,
}

impl WorkQueue {
    pub fn new(concurrency: usize, events: EventBus) -> Self {
        let (idle, _) = watch::channel(true);
        Self {
            shared: Arc::new(QueueShared {
                state: Mutex::new(QueueState {
                    tasks: TaskQueue::new(concurrency),
                    jobs: HashMap::new(),
                }),
                idle,
                events,
            }),
        }
    }

    /// Queue a job. A job whose `key` matches a pending task replaces that
    /// task's job instead of being queued a second time.
    pub fn submit(
        &self,
        priority: Priority,
        key: Option<String>,
        label: impl Into<String>,
        job: Job,
    ) -> Submission {
        let label = label.into();
        let submission = {
            let mut state = self.lock();
            let (tasks, submission) = state.tasks.push(priority, key.clone(), label.clone());
            state.tasks = tasks;
            state.jobs.insert(submission.id(), job);
            submission
        };

        match (submission, key) {
            (Submission::Coalesced(id), Some(key)) => {
                tracing::debug!(task = %id, key = key.as_str(), "coalesced");
                self.shared.events.publish(Event::QueueTaskCoalesced { key });
            }
            (submission, _) => {
                tracing::debug!(task = %submission.id(), label = label.as_str(), %priority, "queued");
                self.shared
                    .events
                    .publish(Event::QueueTaskAdded { label, priority });
            }
        }

        self.pump();
        submission
    }

    /// Stop starting new tasks; running tasks finish
    pub fn pause(&self) {
        {
            let mut state = self.lock();
            if state.tasks.paused {
                return;
            }
            let tasks = state.tasks.pause();
            state.tasks = tasks;
        }
        tracing::info!("queue paused");
        self.shared.events.publish(Event::QueuePaused);
    }

    pub fn resume(&self) {
        {
            let mut state = self.lock();
            if !state.tasks.paused {
                return;
            }
            let tasks = state.tasks.resume();
            state.tasks = tasks;
        }
        tracing::info!("queue resumed");
        self.shared.events.publish(Event::QueueResumed);
        self.pump();
    }

    /// Resolves once nothing is pending or running
    pub async fn wait_idle(&self) {
        let mut idle = self.shared.idle.subscribe();
        // The sender lives as long as the queue
        let _ = idle.wait_for(|idle| *idle).await;
    }

    /// Current bookkeeping state
    pub fn snapshot(&self) -> TaskQueue {
        self.lock().tasks.clone()
    }

    fn pump(&self) {
        loop {
            let (task, job) = {
                let mut state = self.lock();
                let (tasks, task) = state.tasks.take();
                state.tasks = tasks;
                let Some(task) = task else {
                    self.shared.idle.send_replace(state.tasks.is_idle());
                    return;
                };
                let job = state.jobs.remove(&task.id);
                self.shared.idle.send_replace(false);
                (task, job)
            };

            let queue = self.clone();
            tokio::spawn(async move {
                tracing::debug!(task = %task.id, label = task.label.as_str(), "started");
                if let Some(job) = job {
                    if let Err(e) = tokio::spawn(job).await {
                        tracing::error!(task = %task.id, error = %e, "task aborted");
                    }
                }
                queue.finish(task.id);
            });
        }
    }

    fn finish(&self, id: TaskId) {
        {
            let mut state = self.lock();
            let tasks = state.tasks.complete(id);
            state.tasks = tasks;
        }
        self.pump();
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, QueueState> {
        self.shared.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
#[path = "queue_tests.rs"]
mod tests;
