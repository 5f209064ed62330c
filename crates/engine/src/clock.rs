// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Clock driven by tokio's timer

use chrono::{DateTime, Utc};
use df_core::Clock;
use tokio::time::Instant;

/// Clock whose readings follow `tokio::time`
///
/// Under a paused tokio runtime both the monotonic and the wall-clock
/// reading move only when tokio time advances, so scheduler deadlines,
/// condition periods and uptime stay consistent with each other.
#[derive(Clone, Debug)]
pub struct TokioClock {
    origin: Instant,
    origin_utc: DateTime<Utc>,
}

impl TokioClock {
    pub fn new() -> Self {
        Self::starting_at(Utc::now())
    }

    /// Start the wall-clock reading at `utc`
    pub fn starting_at(utc: DateTime<Utc>) -> Self {
        Self {
            origin: Instant::now(),
            origin_utc: utc,
        }
    }
}

impl Default for TokioClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for TokioClock {
    fn now(&self) -> std::time::Instant {
        Instant::now().into_std()
    }

    fn utc_now(&self) -> DateTime<Utc> {
        let elapsed = Instant::now().saturating_duration_since(self.origin);
        self.origin_utc + chrono::Duration::from_std(elapsed).unwrap_or_else(|_| chrono::Duration::zero())
    }
}
