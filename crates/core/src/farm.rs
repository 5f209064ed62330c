// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Farm state machine
//!
//! A farm is one independently scheduled monitored task. All transitions are
//! pure: they take the current farm and an event and return the next farm
//! plus the effects the engine must apply, in order.
//!
//! Check cycles capture the farm's `epoch` when they begin. `disable` and
//! `restart` bump the epoch, so results from a cycle that raced with them
//! are dropped and any sessions it opened are closed again.

use crate::clock::Clock;
use crate::condition::Condition;
use crate::config::FarmConfig;
use crate::effect::{Effect, Event};
use crate::id::{FarmId, HandleId};
use crate::session::{SessionRole, SessionSet};
use crate::uptime::UptimeTimer;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Current status of a farm
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FarmStatus {
    Disabled,
    Idle,
    Checking,
    Farming,
    AttentionRequired,
    ConditionFulfilled,
}

impl fmt::Display for FarmStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FarmStatus::Disabled => "disabled",
            FarmStatus::Idle => "idle",
            FarmStatus::Checking => "checking",
            FarmStatus::Farming => "farming",
            FarmStatus::AttentionRequired => "attention-required",
            FarmStatus::ConditionFulfilled => "condition-fulfilled",
        };
        write!(f, "{}", s)
    }
}

impl FromStr for FarmStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "disabled" => Ok(FarmStatus::Disabled),
            "idle" => Ok(FarmStatus::Idle),
            "checking" => Ok(FarmStatus::Checking),
            "farming" => Ok(FarmStatus::Farming),
            "attention-required" => Ok(FarmStatus::AttentionRequired),
            "condition-fulfilled" => Ok(FarmStatus::ConditionFulfilled),
            other => Err(format!("unknown farm status: {}", other)),
        }
    }
}

/// Events that drive a farm
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FarmEvent {
    Enable,
    Disable,
    /// Scheduler trigger fired
    Tick,
    CheckerOpened { epoch: u64, handle: HandleId },
    ActivityOpened {
        epoch: u64,
        handle: HandleId,
        url: String,
    },
    ExtraOpened { handle: HandleId },
    /// Engine wants to close a session it owns
    CloseSession { handle: HandleId },
    /// Host reported a session gone (user closed it, crash, ...)
    SessionClosed { handle: HandleId },
    CycleFinished { epoch: u64 },
    CycleFailed { epoch: u64, reason: String },
    Restart,
    ResetConditions,
    UpdateSchedule { minutes: u32 },
    UpdateCondition { condition: Condition },
}

/// A monitored task and everything it owns
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Farm {
    pub id: FarmId,
    /// Site adapter tag
    pub site: String,
    pub url: String,
    pub enabled: bool,
    pub status: FarmStatus,
    pub schedule_minutes: u32,
    pub sessions: SessionSet,
    pub condition: Condition,
    pub uptime: UptimeTimer,
    /// Activity sessions opened over the farm's lifetime
    pub sessions_opened: u64,
    pub epoch: u64,
    pub cycle_in_flight: bool,
}

impl Farm {
    pub fn new(id: impl Into<FarmId>, site: impl Into<String>, url: impl Into<String>) -> Self {
        Self::from_config(&FarmConfig::new(id, site, url))
    }

    /// Build a farm from validated configuration
    pub fn from_config(config: &FarmConfig) -> Self {
        let settings = &config.settings;
        Self {
            id: config.id.clone(),
            site: config.site.clone(),
            url: config.url.clone(),
            enabled: settings.enabled,
            status: if settings.enabled {
                FarmStatus::Idle
            } else {
                FarmStatus::Disabled
            },
            schedule_minutes: settings.schedule_minutes,
            sessions: SessionSet::new(),
            condition: settings.condition.to_condition(),
            uptime: UptimeTimer::new(),
            sessions_opened: 0,
            epoch: 0,
            cycle_in_flight: false,
        }
    }

    /// Restore persisted counters and condition progress, measured against
    /// the configured condition at `now`
    pub fn restore(
        mut self,
        uptime_ms: u64,
        sessions_opened: u64,
        condition: Option<Condition>,
        now: DateTime<Utc>,
    ) -> Self {
        self.uptime = UptimeTimer::with_accumulated(uptime_ms);
        self.sessions_opened = sessions_opened;
        if let Some(saved) = condition {
            self.condition = saved.reconfigure(self.condition, now);
        }
        if self.enabled && self.condition.is_fulfilled() {
            self.status = FarmStatus::ConditionFulfilled;
        }
        self
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(u64::from(self.schedule_minutes) * 60)
    }

    /// Whether the start-activity step may run in the current cycle
    pub fn may_start_activity(&self, now: DateTime<Utc>) -> bool {
        self.sessions.activity_count() == 0 && self.condition.permits_farming(now)
    }

    /// Whether a cycle started at `epoch` is still current
    pub fn is_current(&self, epoch: u64) -> bool {
        self.enabled && self.cycle_in_flight && self.epoch == epoch
    }

    /// Status-change notification for the current state
    pub fn status_event(&self) -> Event {
        Event::FarmStatusChanged {
            id: self.id.clone(),
            status: self.status,
            schedule_minutes: self.schedule_minutes,
            session_count: self.sessions.session_count(),
        }
    }

    /// Pure transition function - returns new state and effects
    pub fn transition(&self, event: FarmEvent, clock: &impl Clock) -> (Farm, Vec<Effect>) {
        let now = clock.utc_now();
        let mut next = self.clone();
        let mut effects = Vec::new();

        match event {
            FarmEvent::Enable => {
                if next.enabled {
                    return (next, effects);
                }
                next.enabled = true;
                next.status = FarmStatus::Idle;
                effects.push(Effect::StartTrigger {
                    farm_id: next.id.clone(),
                });
            }

            FarmEvent::Disable => {
                if !next.enabled {
                    return (next, effects);
                }
                next.epoch += 1;
                next.cycle_in_flight = false;
                next.destroy_all(&mut effects);
                next.commit_uptime(now, true, &mut effects);
                effects.push(Effect::StopTrigger {
                    farm_id: next.id.clone(),
                });
                next.enabled = false;
                next.status = FarmStatus::Disabled;
            }

            FarmEvent::Tick => next.tick(now, &mut effects),

            FarmEvent::CheckerOpened { epoch, handle } => {
                if !next.is_current(epoch) {
                    next.destroy_handle(handle, &mut effects);
                } else if let Some(previous) = next.sessions.set_checker(handle) {
                    next.destroy_handle(previous, &mut effects);
                }
            }

            FarmEvent::ActivityOpened { epoch, handle, url } => {
                if next.is_current(epoch) {
                    next.sessions.push_activity(handle, url);
                    next.sessions_opened += 1;
                } else {
                    next.destroy_handle(handle, &mut effects);
                }
            }

            FarmEvent::ExtraOpened { handle } => next.sessions.push_extra(handle),

            FarmEvent::CloseSession { handle } => {
                if let Some(role) = next.sessions.remove(&handle) {
                    next.destroy_handle(handle, &mut effects);
                    next.after_session_removed(role, now, &mut effects);
                }
            }

            FarmEvent::SessionClosed { handle } => {
                if let Some(role) = next.sessions.remove(&handle) {
                    next.after_session_removed(role, now, &mut effects);
                }
            }

            FarmEvent::CycleFinished { epoch } => {
                if !next.is_current(epoch) {
                    return (self.clone(), vec![]);
                }
                next.cycle_in_flight = false;
                if let Some(checker) = next.sessions.take_checker() {
                    next.destroy_handle(checker, &mut effects);
                }
                if next.sessions.activity_count() > 0 {
                    if next.status != FarmStatus::Farming {
                        next.condition = next.condition.begin(now);
                        next.uptime = next.uptime.start(now);
                        next.status = FarmStatus::Farming;
                    }
                } else {
                    next.settle(now, &mut effects);
                }
            }

            FarmEvent::CycleFailed { epoch, reason } => {
                if !next.is_current(epoch) {
                    return (self.clone(), vec![]);
                }
                next.cycle_in_flight = false;
                let mut handles: Vec<HandleId> = next.sessions.take_checker().into_iter().collect();
                handles.extend(next.sessions.drain_activity());
                if !handles.is_empty() {
                    effects.push(Effect::DestroySessions {
                        farm_id: next.id.clone(),
                        handles,
                    });
                }
                let fulfilled = next.commit_uptime(now, false, &mut effects);
                effects.push(Effect::Emit(Event::CycleFailed {
                    id: next.id.clone(),
                    reason,
                }));
                next.status = if fulfilled {
                    FarmStatus::ConditionFulfilled
                } else {
                    FarmStatus::AttentionRequired
                };
            }

            FarmEvent::Restart => {
                next.epoch += 1;
                next.cycle_in_flight = false;
                next.destroy_all(&mut effects);
                next.commit_uptime(now, true, &mut effects);
                effects.push(Effect::StopTrigger {
                    farm_id: next.id.clone(),
                });
                effects.push(Effect::RunRestartHook {
                    farm_id: next.id.clone(),
                });
                if next.enabled {
                    effects.push(Effect::StartTrigger {
                        farm_id: next.id.clone(),
                    });
                    next.status = FarmStatus::Idle;
                } else {
                    next.status = FarmStatus::Disabled;
                }
            }

            FarmEvent::ResetConditions => {
                next.restart_accrual(now, &mut effects);
                if matches!(
                    next.status,
                    FarmStatus::ConditionFulfilled | FarmStatus::AttentionRequired
                ) {
                    next.status = FarmStatus::Idle;
                }
            }

            FarmEvent::UpdateSchedule { minutes } => {
                next.schedule_minutes = minutes;
                effects.push(Effect::UpdateTrigger {
                    farm_id: next.id.clone(),
                    interval: next.interval(),
                });
            }

            FarmEvent::UpdateCondition { condition } => {
                if next.uptime.is_running() {
                    next.commit_uptime(now, false, &mut effects);
                    next.uptime = next.uptime.start(now);
                }
                let was_fulfilled = next.condition.is_fulfilled();
                next.condition = next.condition.reconfigure(condition, now);
                if !next.condition.is_fulfilled() {
                    if next.status == FarmStatus::ConditionFulfilled {
                        next.status = FarmStatus::Idle;
                    }
                } else {
                    if !was_fulfilled {
                        effects.push(Effect::Emit(Event::ConditionFulfilled {
                            id: next.id.clone(),
                            kind: next.condition.kind,
                            accrued_ms: next.condition.amount_accrued_ms,
                        }));
                    }
                    match next.status {
                        FarmStatus::Farming => {
                            next.destroy_activity(&mut effects);
                            next.settle(now, &mut effects);
                        }
                        FarmStatus::Idle | FarmStatus::AttentionRequired => {
                            next.status = FarmStatus::ConditionFulfilled;
                        }
                        // A cycle in flight settles when it finishes
                        FarmStatus::Checking
                        | FarmStatus::Disabled
                        | FarmStatus::ConditionFulfilled => {}
                    }
                }
            }
        }

        if next.status != self.status {
            effects.push(Effect::Emit(next.status_event()));
        }
        if next.status != self.status
            || next.condition != self.condition
            || next.uptime.accumulated_ms != self.uptime.accumulated_ms
            || next.sessions_opened != self.sessions_opened
        {
            effects.push(Effect::PersistStats {
                farm_id: next.id.clone(),
            });
        }
        (next, effects)
    }

    fn tick(&mut self, now: DateTime<Utc>, effects: &mut Vec<Effect>) {
        if !self.enabled || self.cycle_in_flight {
            return;
        }

        if self.condition.period_crossed(now) {
            self.restart_accrual(now, effects);
            if self.status == FarmStatus::ConditionFulfilled {
                self.status = FarmStatus::Idle;
                effects.push(Effect::Emit(self.status_event()));
            }
        }

        if !self.condition.in_window(now) {
            if self.sessions.activity_count() > 0 {
                self.destroy_activity(effects);
                self.settle(now, effects);
            }
            return;
        }

        if self.status == FarmStatus::Farming
            && self.condition.would_fulfil(self.uptime.running_ms(now))
        {
            self.destroy_activity(effects);
            self.settle(now, effects);
            return;
        }

        if self.condition.is_fulfilled() {
            if self.status != FarmStatus::ConditionFulfilled {
                self.destroy_activity(effects);
                self.settle(now, effects);
            }
            return;
        }

        if self.status != FarmStatus::Farming {
            self.status = FarmStatus::Checking;
        }
        self.cycle_in_flight = true;
        effects.push(Effect::BeginCycle {
            farm_id: self.id.clone(),
            epoch: self.epoch,
        });
    }

    fn after_session_removed(
        &mut self,
        role: SessionRole,
        now: DateTime<Utc>,
        effects: &mut Vec<Effect>,
    ) {
        if role == SessionRole::Activity
            && self.sessions.activity_count() == 0
            && self.status == FarmStatus::Farming
            && !self.cycle_in_flight
        {
            self.settle(now, effects);
        }
    }

    /// Stop uptime and pick the resting status once no activity remains
    fn settle(&mut self, now: DateTime<Utc>, effects: &mut Vec<Effect>) {
        self.commit_uptime(now, true, effects);
        self.status = if self.condition.is_fulfilled() {
            FarmStatus::ConditionFulfilled
        } else {
            FarmStatus::Idle
        };
    }

    /// Fold running uptime into the timer total and the condition.
    /// Returns true when this fulfilled the condition.
    fn commit_uptime(&mut self, now: DateTime<Utc>, stop: bool, effects: &mut Vec<Effect>) -> bool {
        let (timer, committed) = if stop {
            self.uptime.stop(now)
        } else {
            self.uptime.pause(now)
        };
        self.uptime = timer;
        if committed == 0 {
            return false;
        }
        let (condition, fulfilled) = self.condition.accrue(committed, now);
        self.condition = condition;
        if fulfilled {
            effects.push(Effect::Emit(Event::ConditionFulfilled {
                id: self.id.clone(),
                kind: self.condition.kind,
                accrued_ms: self.condition.amount_accrued_ms,
            }));
        }
        fulfilled
    }

    /// Reset condition progress; time farmed so far is committed first and
    /// a running timer keeps running into the new period
    fn restart_accrual(&mut self, now: DateTime<Utc>, effects: &mut Vec<Effect>) {
        let running = self.uptime.is_running();
        if running {
            self.commit_uptime(now, false, effects);
        }
        self.condition = self.condition.reset();
        effects.push(Effect::Emit(Event::ConditionReset {
            id: self.id.clone(),
        }));
        if running {
            self.condition = self.condition.begin(now);
            self.uptime = self.uptime.start(now);
        }
    }

    fn destroy_handle(&self, handle: HandleId, effects: &mut Vec<Effect>) {
        effects.push(Effect::DestroySessions {
            farm_id: self.id.clone(),
            handles: vec![handle],
        });
    }

    fn destroy_activity(&mut self, effects: &mut Vec<Effect>) {
        let handles = self.sessions.drain_activity();
        if !handles.is_empty() {
            effects.push(Effect::DestroySessions {
                farm_id: self.id.clone(),
                handles,
            });
        }
    }

    fn destroy_all(&mut self, effects: &mut Vec<Effect>) {
        let handles = self.sessions.drain_all();
        if !handles.is_empty() {
            effects.push(Effect::DestroySessions {
                farm_id: self.id.clone(),
                handles,
            });
        }
    }
}

#[cfg(test)]
#[path = "farm_tests.rs"]
mod tests;
