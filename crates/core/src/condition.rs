// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Farming conditions
//!
//! A condition decides whether a farm may farm right now, and tracks
//! accrual toward a weekly or monthly target.
//!
//! - `unlimited`: always permitted, nothing tracked
//! - `weekly` / `monthly`: accrues farming time per period (ISO week or
//!   calendar month, UTC). Fulfilled once `accrued >= target + buffer`.
//!   Repeating conditions reset at the first evaluation in a later period.
//! - `time-window`: permitted only inside `[from, to]`

use chrono::{DateTime, Datelike, Months, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Kind of farming condition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConditionKind {
    Unlimited,
    Weekly,
    Monthly,
    TimeWindow,
}

impl fmt::Display for ConditionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConditionKind::Unlimited => write!(f, "unlimited"),
            ConditionKind::Weekly => write!(f, "weekly"),
            ConditionKind::Monthly => write!(f, "monthly"),
            ConditionKind::TimeWindow => write!(f, "time-window"),
        }
    }
}

/// Condition state owned by a farm
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Condition {
    pub kind: ConditionKind,
    pub started_at: Option<DateTime<Utc>>,
    pub fulfilled_at: Option<DateTime<Utc>>,
    pub amount_accrued_ms: u64,
    pub amount_target_ms: u64,
    pub buffer_ms: u64,
    pub repeating: bool,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

impl Default for Condition {
    fn default() -> Self {
        Self::unlimited()
    }
}

impl Condition {
    pub fn unlimited() -> Self {
        Self {
            kind: ConditionKind::Unlimited,
            started_at: None,
            fulfilled_at: None,
            amount_accrued_ms: 0,
            amount_target_ms: 0,
            buffer_ms: 0,
            repeating: false,
            from: None,
            to: None,
        }
    }

    pub fn weekly(target: Duration, buffer: Duration, repeating: bool) -> Self {
        Self::accruing(ConditionKind::Weekly, target, buffer, repeating)
    }

    pub fn monthly(target: Duration, buffer: Duration, repeating: bool) -> Self {
        Self::accruing(ConditionKind::Monthly, target, buffer, repeating)
    }

    pub fn time_window(from: Option<DateTime<Utc>>, to: Option<DateTime<Utc>>) -> Self {
        Self {
            kind: ConditionKind::TimeWindow,
            from,
            to,
            ..Self::unlimited()
        }
    }

    fn accruing(kind: ConditionKind, target: Duration, buffer: Duration, repeating: bool) -> Self {
        Self {
            kind,
            amount_target_ms: duration_ms(target),
            buffer_ms: duration_ms(buffer),
            repeating,
            ..Self::unlimited()
        }
    }

    /// Whether this kind accrues farming time
    pub fn tracks_accrual(&self) -> bool {
        matches!(self.kind, ConditionKind::Weekly | ConditionKind::Monthly)
    }

    /// Accrued amount at which the condition is fulfilled
    pub fn threshold_ms(&self) -> u64 {
        self.amount_target_ms.saturating_add(self.buffer_ms)
    }

    pub fn is_fulfilled(&self) -> bool {
        self.fulfilled_at.is_some()
    }

    /// Whether `now` lies inside the farming window (always true for
    /// non-window kinds; a missing bound is open)
    pub fn in_window(&self, now: DateTime<Utc>) -> bool {
        match self.kind {
            ConditionKind::TimeWindow => {
                let after_start = self.from.map_or(true, |from| now >= from);
                let before_end = self.to.map_or(true, |to| now <= to);
                after_start && before_end
            }
            _ => true,
        }
    }

    /// Whether farming may start right now
    pub fn permits_farming(&self, now: DateTime<Utc>) -> bool {
        match self.kind {
            ConditionKind::Unlimited => true,
            ConditionKind::Weekly | ConditionKind::Monthly => !self.is_fulfilled(),
            ConditionKind::TimeWindow => self.in_window(now),
        }
    }

    /// Mark the start of accrual for the current period
    pub fn begin(&self, now: DateTime<Utc>) -> Condition {
        if !self.tracks_accrual() || self.started_at.is_some() {
            return self.clone();
        }
        Condition {
            started_at: Some(now),
            ..self.clone()
        }
    }

    /// Add farmed time; returns the new condition and whether this call
    /// fulfilled it
    pub fn accrue(&self, ms: u64, now: DateTime<Utc>) -> (Condition, bool) {
        if !self.tracks_accrual() {
            return (self.clone(), false);
        }
        let mut next = self.begin(now);
        next.amount_accrued_ms = next.amount_accrued_ms.saturating_add(ms);
        if !next.is_fulfilled() && next.amount_accrued_ms >= next.threshold_ms() {
            next.fulfilled_at = Some(now);
            return (next, true);
        }
        (next, false)
    }

    /// Whether accruing `extra_ms` more would fulfil the condition
    pub fn would_fulfil(&self, extra_ms: u64) -> bool {
        self.tracks_accrual()
            && !self.is_fulfilled()
            && self.amount_accrued_ms.saturating_add(extra_ms) >= self.threshold_ms()
    }

    /// Whether a repeating condition has moved into a later period than
    /// the one accrual started in
    pub fn period_crossed(&self, now: DateTime<Utc>) -> bool {
        if !self.repeating {
            return false;
        }
        let Some(started) = self.started_at else {
            return false;
        };
        match (
            period_start(self.kind, started),
            period_start(self.kind, now),
        ) {
            (Some(then), Some(current)) => current > then,
            _ => false,
        }
    }

    /// When a repeating condition will next reset, if it will
    pub fn resets_at(&self) -> Option<DateTime<Utc>> {
        if !self.repeating {
            return None;
        }
        let started = self.started_at?;
        let start = period_start(self.kind, started)?;
        let next = match self.kind {
            ConditionKind::Weekly => start.checked_add_days(chrono::Days::new(7))?,
            ConditionKind::Monthly => start.checked_add_months(Months::new(1))?,
            _ => return None,
        };
        Some(next.and_hms_opt(0, 0, 0)?.and_utc())
    }

    /// Clear accrual and fulfilment, keeping configuration
    pub fn reset(&self) -> Condition {
        Condition {
            started_at: None,
            fulfilled_at: None,
            amount_accrued_ms: 0,
            ..self.clone()
        }
    }

    /// Adopt new configuration while keeping accrual state when the kind
    /// is unchanged. Fulfilment follows the new threshold: raising it
    /// clears fulfilment, lowering it to or below the accrued amount
    /// fulfils at `now`.
    pub fn reconfigure(&self, next: Condition, now: DateTime<Utc>) -> Condition {
        if next.kind != self.kind {
            return next.reset();
        }
        let mut merged = Condition {
            started_at: self.started_at,
            fulfilled_at: self.fulfilled_at,
            amount_accrued_ms: self.amount_accrued_ms,
            ..next
        };
        if merged.tracks_accrual() {
            if merged.amount_accrued_ms < merged.threshold_ms() {
                merged.fulfilled_at = None;
            } else if merged.fulfilled_at.is_none() {
                merged.fulfilled_at = Some(now);
            }
        }
        merged
    }
}

/// First day of the period containing `t`
fn period_start(kind: ConditionKind, t: DateTime<Utc>) -> Option<NaiveDate> {
    let date = t.date_naive();
    match kind {
        ConditionKind::Weekly => {
            let offset = u64::from(date.weekday().num_days_from_monday());
            date.checked_sub_days(chrono::Days::new(offset))
        }
        ConditionKind::Monthly => NaiveDate::from_ymd_opt(date.year(), date.month(), 1),
        ConditionKind::Unlimited | ConditionKind::TimeWindow => None,
    }
}

fn duration_ms(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
#[path = "condition_tests.rs"]
mod tests;
