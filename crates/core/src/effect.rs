// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Effects and events for state machine orchestration

use crate::condition::ConditionKind;
use crate::farm::FarmStatus;
use crate::id::{FarmId, HandleId};
use crate::queue::Priority;
use crate::traced::TracedEffect;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Side effects requested by the farm state machine
///
/// The engine applies them in the order they are returned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Publish an event on the bus
    Emit(Event),
    /// Submit a check cycle to the work queue
    BeginCycle { farm_id: FarmId, epoch: u64 },
    /// Close session handles that were already removed from the farm
    DestroySessions {
        farm_id: FarmId,
        handles: Vec<HandleId>,
    },
    StartTrigger { farm_id: FarmId },
    StopTrigger { farm_id: FarmId },
    UpdateTrigger { farm_id: FarmId, interval: Duration },
    /// Run the side effect injected into a restart, if any
    RunRestartHook { farm_id: FarmId },
    /// Write uptime, counters and condition to the stats store
    PersistStats { farm_id: FarmId },
}

/// Events published for observers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Event {
    FarmStatusChanged {
        id: FarmId,
        status: FarmStatus,
        schedule_minutes: u32,
        session_count: usize,
    },
    ConditionFulfilled {
        id: FarmId,
        kind: ConditionKind,
        accrued_ms: u64,
    },
    ConditionReset {
        id: FarmId,
    },
    CycleFailed {
        id: FarmId,
        reason: String,
    },
    QueueTaskAdded {
        label: String,
        priority: Priority,
    },
    QueueTaskCoalesced {
        key: String,
    },
    QueuePaused,
    QueueResumed,
}

impl Event {
    /// Get the event name for pattern matching
    /// Format: "category:action"
    pub fn name(&self) -> String {
        match self {
            Event::FarmStatusChanged { .. } => "farm:status".to_string(),
            Event::ConditionFulfilled { .. } => "condition:fulfilled".to_string(),
            Event::ConditionReset { .. } => "condition:reset".to_string(),
            Event::CycleFailed { .. } => "cycle:failed".to_string(),
            Event::QueueTaskAdded { .. } => "queue:added".to_string(),
            Event::QueueTaskCoalesced { .. } => "queue:coalesced".to_string(),
            Event::QueuePaused => "queue:paused".to_string(),
            Event::QueueResumed => "queue:resumed".to_string(),
        }
    }

    /// Farm the event concerns, if any
    pub fn farm_id(&self) -> Option<&FarmId> {
        match self {
            Event::FarmStatusChanged { id, .. }
            | Event::ConditionFulfilled { id, .. }
            | Event::ConditionReset { id }
            | Event::CycleFailed { id, .. } => Some(id),
            _ => None,
        }
    }
}

impl TracedEffect for Effect {
    fn name(&self) -> &'static str {
        match self {
            Effect::Emit(_) => "emit",
            Effect::BeginCycle { .. } => "begin_cycle",
            Effect::DestroySessions { .. } => "destroy_sessions",
            Effect::StartTrigger { .. } => "start_trigger",
            Effect::StopTrigger { .. } => "stop_trigger",
            Effect::UpdateTrigger { .. } => "update_trigger",
            Effect::RunRestartHook { .. } => "restart_hook",
            Effect::PersistStats { .. } => "persist_stats",
        }
    }

    fn fields(&self) -> Vec<(&'static str, String)> {
        match self {
            Effect::Emit(event) => vec![("event", event.name())],
            Effect::BeginCycle { farm_id, epoch } => {
                vec![("farm", farm_id.to_string()), ("epoch", epoch.to_string())]
            }
            Effect::DestroySessions { farm_id, handles } => vec![
                ("farm", farm_id.to_string()),
                ("handles", handles.len().to_string()),
            ],
            Effect::UpdateTrigger { farm_id, interval } => vec![
                ("farm", farm_id.to_string()),
                ("interval", format!("{}s", interval.as_secs())),
            ],
            Effect::StartTrigger { farm_id }
            | Effect::StopTrigger { farm_id }
            | Effect::RunRestartHook { farm_id }
            | Effect::PersistStats { farm_id } => vec![("farm", farm_id.to_string())],
        }
    }
}

#[cfg(test)]
#[path = "effect_tests.rs"]
mod tests;
