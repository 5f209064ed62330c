// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! JSON file-backed stats store

use super::{FarmStats, StatsStore, StoreError};
use async_trait::async_trait;
use df_core::FarmId;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// Stats for every farm in one JSON document
///
/// The file is read once on open and rewritten on every save through a
/// temporary file and rename.
#[derive(Clone)]
pub struct JsonStatsStore {
    path: PathBuf,
    stats: Arc<Mutex<BTreeMap<FarmId, FarmStats>>>,
}

impl JsonStatsStore {
    /// Open a store at `path`, creating parent directories as needed
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let stats = if path.exists() {
            let json = fs::read_to_string(&path)?;
            if json.trim().is_empty() {
                BTreeMap::new()
            } else {
                serde_json::from_str(&json)?
            }
        } else {
            BTreeMap::new()
        };
        Ok(Self {
            path,
            stats: Arc::new(Mutex::new(stats)),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write(&self, stats: &BTreeMap<FarmId, FarmStats>) -> Result<(), StoreError> {
        let json = serde_json::to_string_pretty(stats)?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, json)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

#[async_trait]
impl StatsStore for JsonStatsStore {
    async fn load(&self, id: &FarmId) -> Result<Option<FarmStats>, StoreError> {
        Ok(self
            .stats
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(id)
            .cloned())
    }

    async fn save(&self, id: &FarmId, stats: &FarmStats) -> Result<(), StoreError> {
        let mut all = self.stats.lock().unwrap_or_else(|e| e.into_inner());
        all.insert(id.clone(), stats.clone());
        self.write(&all)
    }

    async fn remove(&self, id: &FarmId) -> Result<(), StoreError> {
        let mut all = self.stats.lock().unwrap_or_else(|e| e.into_inner());
        if all.remove(id).is_some() {
            self.write(&all)?;
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "json_tests.rs"]
mod tests;
