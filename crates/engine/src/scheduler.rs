// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Keyed repeating triggers on tokio
//!
//! The engine depends only on the [`Scheduler`] trait. [`TokioScheduler`]
//! keeps a [`TriggerTable`] and a driver task that sleeps until the earliest
//! deadline, then invokes the callbacks of every due key.

use df_core::{Clock, TriggerTable};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::sync::Notify;
use tokio::task::JoinHandle;

/// Invoked with the key of the trigger that fired
pub type TickCallback = Arc<dyn Fn(&str) + Send + Sync>;

/// Keyed interval triggers
pub trait Scheduler: Send + Sync {
    /// Register `key`, replacing any previous trigger with that key
    fn add(&self, key: &str, interval: Duration, start: bool, callback: TickCallback);

    /// Change the interval; a running trigger next fires at `now + interval`
    fn update(&self, key: &str, interval: Duration) -> bool;

    fn start(&self, key: &str) -> bool;

    fn stop(&self, key: &str) -> bool;

    fn start_all(&self);

    fn stop_all(&self);

    fn remove(&self, key: &str) -> bool;

    /// Next fire time of a running trigger
    fn next_fire(&self, key: &str) -> Option<Instant>;
}

struct SchedulerState<C> {
    clock: C,
    table: Mutex<TriggerTable>,
    callbacks: Mutex<HashMap<String, TickCallback>>,
    changed: Notify,
}

/// Scheduler backed by a tokio driver task
#[derive(Clone)]
pub struct TokioScheduler<C> {
    state: Arc<SchedulerState<C>>,
}

impl<C: Clock> TokioScheduler<C> {
    pub fn new(clock: C) -> Self {
        Self {
            state: Arc::new(SchedulerState {
                clock,
                table: Mutex::new(TriggerTable::new()),
                callbacks: Mutex::new(HashMap::new()),
                changed: Notify::new(),
            }),
        }
    }

    /// Spawn the driver task. Must be called from within a tokio runtime.
    pub fn spawn(&self) -> JoinHandle<()> {
        let scheduler = self.clone();
        tokio::spawn(async move {
            loop {
                let deadline = scheduler.table().next_deadline();
                match deadline {
                    Some(deadline) => {
                        tokio::select! {
                            _ = tokio::time::sleep_until(tokio::time::Instant::from_std(deadline)) => {}
                            _ = scheduler.state.changed.notified() => continue,
                        }
                    }
                    None => {
                        scheduler.state.changed.notified().await;
                        continue;
                    }
                }
                scheduler.fire_due();
            }
        })
    }

    /// Invoke callbacks of every due trigger; returns the keys that fired
    pub fn fire_due(&self) -> Vec<String> {
        let due = self.table().poll(self.state.clock.now());
        for key in &due {
            let callback = self
                .state
                .callbacks
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .get(key)
                .cloned();
            match callback {
                Some(callback) => {
                    tracing::debug!(key = key.as_str(), "trigger fired");
                    callback(key);
                }
                None => tracing::warn!(key = key.as_str(), "trigger fired without callback"),
            }
        }
        due
    }

    fn table(&self) -> std::sync::MutexGuard<'_, TriggerTable> {
        self.state.table.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn changed(&self) {
        self.state.changed.notify_one();
    }
}

impl<C: Clock> Scheduler for TokioScheduler<C> {
    fn add(&self, key: &str, interval: Duration, start: bool, callback: TickCallback) {
        self.state
            .callbacks
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(key.to_string(), callback);
        self.table().add(key, interval, start, &self.state.clock);
        self.changed();
    }

    fn update(&self, key: &str, interval: Duration) -> bool {
        let updated = self.table().update(key, interval, &self.state.clock);
        self.changed();
        updated
    }

    fn start(&self, key: &str) -> bool {
        let started = self.table().start(key, &self.state.clock);
        self.changed();
        started
    }

    fn stop(&self, key: &str) -> bool {
        let stopped = self.table().stop(key);
        self.changed();
        stopped
    }

    fn start_all(&self) {
        self.table().start_all(&self.state.clock);
        self.changed();
    }

    fn stop_all(&self) {
        self.table().stop_all();
        self.changed();
    }

    fn remove(&self, key: &str) -> bool {
        self.state
            .callbacks
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(key);
        let removed = self.table().remove(key).is_some();
        self.changed();
        removed
    }

    fn next_fire(&self, key: &str) -> Option<Instant> {
        self.table().get(key).and_then(|t| t.next_fire)
    }
}

#[cfg(test)]
#[path = "scheduler_tests.rs"]
mod tests;
