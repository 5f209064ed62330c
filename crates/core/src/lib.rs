// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! df-core: pure state machines for the farm engine
//!
//! This crate provides:
//! - The farm state machine, driven by events and returning effects
//! - Conditions (unlimited, weekly, monthly, time window) and the uptime timer
//! - Work queue and trigger table bookkeeping
//! - Configuration types and validation
//!
//! Nothing here performs I/O; time comes in through [`Clock`].

pub mod clock;
pub mod condition;
pub mod config;
pub mod effect;
pub mod farm;
pub mod id;
pub mod queue;
pub mod session;
pub mod traced;
pub mod trigger;
pub mod uptime;

pub use clock::{Clock, FakeClock, SystemClock};
pub use condition::{Condition, ConditionKind};
pub use config::{
    ConditionConfig, ConfigError, ConfigFile, EngineConfig, FarmConfig, FarmSettings,
    DEFAULT_SCHEDULE_MINUTES, MAX_SCHEDULE_MINUTES, MIN_SCHEDULE_MINUTES,
};
pub use effect::{Effect, Event};
pub use farm::{Farm, FarmEvent, FarmStatus};
pub use id::{FarmId, HandleId, IdGen, SequentialIdGen, UuidIdGen};
pub use queue::{Priority, QueuedTask, Submission, TaskId, TaskQueue};
pub use session::{ActivitySession, SessionRole, SessionSet};
pub use traced::TracedEffect;
pub use trigger::{Trigger, TriggerTable};
pub use uptime::{UptimeState, UptimeTimer};
