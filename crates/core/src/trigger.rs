// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Repeating interval triggers keyed by name
//!
//! Each key fires every `interval` while started. Keys are independent:
//! stopping, starting or re-timing one never moves another. A trigger
//! fires at most once per poll; fire times missed while the host slept are
//! skipped, not replayed.

use crate::clock::Clock;
use std::collections::HashMap;
use std::time::{Duration, Instant};

/// One keyed trigger
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Trigger {
    pub interval: Duration,
    /// `None` while stopped
    pub next_fire: Option<Instant>,
}

impl Trigger {
    pub fn is_running(&self) -> bool {
        self.next_fire.is_some()
    }
}

/// Table of keyed triggers
#[derive(Debug, Clone, Default)]
pub struct TriggerTable {
    triggers: HashMap<String, Trigger>,
}

impl TriggerTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a trigger; replaces any existing one with the same key
    pub fn add(&mut self, key: impl Into<String>, interval: Duration, start: bool, clock: &impl Clock) {
        let next_fire = start.then(|| clock.now() + interval);
        self.triggers.insert(
            key.into(),
            Trigger {
                interval,
                next_fire,
            },
        );
    }

    /// Change the interval. A running trigger next fires at
    /// `now + interval`; a stopped one only stores it.
    pub fn update(&mut self, key: &str, interval: Duration, clock: &impl Clock) -> bool {
        let Some(trigger) = self.triggers.get_mut(key) else {
            return false;
        };
        trigger.interval = interval;
        if trigger.next_fire.is_some() {
            trigger.next_fire = Some(clock.now() + interval);
        }
        true
    }

    /// Start a stopped trigger; a running one keeps its schedule
    pub fn start(&mut self, key: &str, clock: &impl Clock) -> bool {
        let Some(trigger) = self.triggers.get_mut(key) else {
            return false;
        };
        if trigger.next_fire.is_none() {
            trigger.next_fire = Some(clock.now() + trigger.interval);
        }
        true
    }

    pub fn stop(&mut self, key: &str) -> bool {
        let Some(trigger) = self.triggers.get_mut(key) else {
            return false;
        };
        trigger.next_fire = None;
        true
    }

    pub fn start_all(&mut self, clock: &impl Clock) {
        let now = clock.now();
        for trigger in self.triggers.values_mut() {
            if trigger.next_fire.is_none() {
                trigger.next_fire = Some(now + trigger.interval);
            }
        }
    }

    pub fn stop_all(&mut self) {
        for trigger in self.triggers.values_mut() {
            trigger.next_fire = None;
        }
    }

    pub fn remove(&mut self, key: &str) -> Option<Trigger> {
        self.triggers.remove(key)
    }

    pub fn get(&self, key: &str) -> Option<&Trigger> {
        self.triggers.get(key)
    }

    pub fn len(&self) -> usize {
        self.triggers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.triggers.is_empty()
    }

    /// Keys due at or before `now`, earliest first, rescheduling each
    pub fn poll(&mut self, now: Instant) -> Vec<String> {
        let mut due: Vec<(Instant, String)> = Vec::new();
        for (key, trigger) in self.triggers.iter_mut() {
            let Some(fire_at) = trigger.next_fire else {
                continue;
            };
            if fire_at > now {
                continue;
            }
            let mut next = fire_at + trigger.interval;
            if next <= now {
                next = now + trigger.interval;
            }
            trigger.next_fire = Some(next);
            due.push((fire_at, key.clone()));
        }
        due.sort();
        due.into_iter().map(|(_, key)| key).collect()
    }

    /// Earliest upcoming fire time
    pub fn next_deadline(&self) -> Option<Instant> {
        self.triggers.values().filter_map(|t| t.next_fire).min()
    }
}

#[cfg(test)]
#[path = "trigger_tests.rs"]
mod tests;
