// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-farm statistics storage

mod json;
mod memory;

pub use json::JsonStatsStore;
pub use memory::MemoryStatsStore;

use async_trait::async_trait;
use df_core::{Condition, Farm, FarmId};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from stats storage
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Counters and condition progress kept across restarts
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FarmStats {
    pub uptime_ms: u64,
    pub sessions_opened: u64,
    #[serde(default)]
    pub condition: Option<Condition>,
}

impl FarmStats {
    pub fn of(farm: &Farm) -> Self {
        Self {
            uptime_ms: farm.uptime.accumulated_ms,
            sessions_opened: farm.sessions_opened,
            condition: Some(farm.condition.clone()),
        }
    }
}

/// Adapter for statistics persistence
#[async_trait]
pub trait StatsStore: Clone + Send + Sync + 'static {
    async fn load(&self, id: &FarmId) -> Result<Option<FarmStats>, StoreError>;

    async fn save(&self, id: &FarmId, stats: &FarmStats) -> Result<(), StoreError>;

    async fn remove(&self, id: &FarmId) -> Result<(), StoreError>;
}
