// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Uptime timer
//!
//! Accumulates wall-clock time while a farm is actively farming. The timer
//! is a plain value: every operation takes the current time and returns the
//! next state, so no real time has to pass in tests.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Running state of an uptime timer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", tag = "state")]
pub enum UptimeState {
    Stopped,
    Running { since: DateTime<Utc> },
    Paused,
}

/// Accumulating uptime timer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UptimeTimer {
    pub state: UptimeState,
    pub accumulated_ms: u64,
}

impl Default for UptimeTimer {
    fn default() -> Self {
        Self::new()
    }
}

impl UptimeTimer {
    pub fn new() -> Self {
        Self::with_accumulated(0)
    }

    /// Restore a stopped timer from a persisted total
    pub fn with_accumulated(accumulated_ms: u64) -> Self {
        Self {
            state: UptimeState::Stopped,
            accumulated_ms,
        }
    }

    /// Begin counting; resumes a paused timer, no-op while running
    pub fn start(&self, now: DateTime<Utc>) -> UptimeTimer {
        match self.state {
            UptimeState::Running { .. } => *self,
            UptimeState::Stopped | UptimeState::Paused => UptimeTimer {
                state: UptimeState::Running { since: now },
                ..*self
            },
        }
    }

    /// Fold the running segment into the total and halt.
    ///
    /// Returns the new timer and the milliseconds committed by this call.
    pub fn pause(&self, now: DateTime<Utc>) -> (UptimeTimer, u64) {
        match self.state {
            UptimeState::Running { .. } => {
                let committed = self.running_ms(now);
                (
                    UptimeTimer {
                        state: UptimeState::Paused,
                        accumulated_ms: self.accumulated_ms.saturating_add(committed),
                    },
                    committed,
                )
            }
            UptimeState::Stopped | UptimeState::Paused => (*self, 0),
        }
    }

    /// Like [`UptimeTimer::pause`] but leaves the timer stopped
    pub fn stop(&self, now: DateTime<Utc>) -> (UptimeTimer, u64) {
        let (paused, committed) = self.pause(now);
        (
            UptimeTimer {
                state: UptimeState::Stopped,
                ..paused
            },
            committed,
        )
    }

    /// Milliseconds in the current running segment
    pub fn running_ms(&self, now: DateTime<Utc>) -> u64 {
        match self.state {
            UptimeState::Running { since } => {
                u64::try_from((now - since).num_milliseconds()).unwrap_or(0)
            }
            UptimeState::Stopped | UptimeState::Paused => 0,
        }
    }

    /// Total including the current running segment
    pub fn amount_ms(&self, now: DateTime<Utc>) -> u64 {
        self.accumulated_ms.saturating_add(self.running_ms(now))
    }

    pub fn is_running(&self) -> bool {
        matches!(self.state, UptimeState::Running { .. })
    }

    pub fn is_paused(&self) -> bool {
        matches!(self.state, UptimeState::Paused)
    }
}

#[cfg(test)]
#[path = "uptime_tests.rs"]
mod tests;
