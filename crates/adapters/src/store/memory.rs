// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-memory stats store

use super::{FarmStats, StatsStore, StoreError};
use async_trait::async_trait;
use df_core::FarmId;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

/// Stats store that keeps everything in memory
#[derive(Clone, Default)]
pub struct MemoryStatsStore {
    stats: Arc<Mutex<HashMap<FarmId, FarmStats>>>,
    saves: Arc<Mutex<u64>>,
    yield_on_save: Arc<AtomicBool>,
}

impl MemoryStatsStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed stats as if loaded from a previous run
    pub fn insert(&self, id: impl Into<FarmId>, stats: FarmStats) {
        self.stats
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(id.into(), stats);
    }

    pub fn get(&self, id: &FarmId) -> Option<FarmStats> {
        self.stats
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(id)
            .cloned()
    }

    /// Yield to the scheduler inside `save`, like a store doing file I/O
    pub fn yield_on_save(&self) {
        self.yield_on_save.store(true, Ordering::SeqCst);
    }

    /// Number of `save` calls so far
    pub fn save_count(&self) -> u64 {
        *self.saves.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl StatsStore for MemoryStatsStore {
    async fn load(&self, id: &FarmId) -> Result<Option<FarmStats>, StoreError> {
        Ok(self.get(id))
    }

    async fn save(&self, id: &FarmId, stats: &FarmStats) -> Result<(), StoreError> {
        *self.saves.lock().unwrap_or_else(|e| e.into_inner()) += 1;
        self.insert(id.clone(), stats.clone());
        if self.yield_on_save.load(Ordering::SeqCst) {
            tokio::task::yield_now().await;
        }
        Ok(())
    }

    async fn remove(&self, id: &FarmId) -> Result<(), StoreError> {
        self.stats
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(id);
        Ok(())
    }
}
