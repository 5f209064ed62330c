// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Farm registry
//!
//! Each farm sits behind its own lock. The registry map itself changes
//! only when farms are added or removed.

use crate::error::RuntimeError;
use df_core::{Farm, FarmId, HandleId};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

/// Shared handle to one farm's state
pub type FarmCell = Arc<Mutex<Farm>>;

#[derive(Clone, Default)]
pub struct FarmRegistry {
    farms: Arc<Mutex<BTreeMap<FarmId, FarmCell>>>,
}

impl FarmRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, farm: Farm) -> Result<FarmCell, RuntimeError> {
        let mut farms = self.lock();
        if farms.contains_key(&farm.id) {
            return Err(RuntimeError::DuplicateFarm(farm.id));
        }
        let id = farm.id.clone();
        let cell = Arc::new(Mutex::new(farm));
        farms.insert(id, Arc::clone(&cell));
        Ok(cell)
    }

    pub fn remove(&self, id: &FarmId) -> Option<FarmCell> {
        self.lock().remove(id)
    }

    pub fn get(&self, id: &FarmId) -> Option<FarmCell> {
        self.lock().get(id).cloned()
    }

    pub fn contains(&self, id: &FarmId) -> bool {
        self.lock().contains_key(id)
    }

    /// Farm ids in sorted order
    pub fn ids(&self) -> Vec<FarmId> {
        self.lock().keys().cloned().collect()
    }

    /// Copy of every farm's current state
    pub fn snapshot(&self) -> Vec<Farm> {
        let cells: Vec<FarmCell> = self.lock().values().cloned().collect();
        cells
            .iter()
            .map(|cell| cell.lock().unwrap_or_else(|e| e.into_inner()).clone())
            .collect()
    }

    /// Farm that owns `handle` in any role
    pub fn owner_of(&self, handle: &HandleId) -> Option<FarmId> {
        let cells: Vec<FarmCell> = self.lock().values().cloned().collect();
        cells.iter().find_map(|cell| {
            let farm = cell.lock().unwrap_or_else(|e| e.into_inner());
            farm.sessions.role_of(handle).map(|_| farm.id.clone())
        })
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BTreeMap<FarmId, FarmCell>> {
        self.farms.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_ids_are_rejected() {
        let registry = FarmRegistry::new();
        registry.insert(Farm::new("a", "noop", "https://a")).unwrap();
        assert!(matches!(
            registry.insert(Farm::new("a", "noop", "https://other")),
            Err(RuntimeError::DuplicateFarm(id)) if id == FarmId::new("a")
        ));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn owner_of_finds_farm_by_handle() {
        let registry = FarmRegistry::new();
        registry.insert(Farm::new("a", "noop", "https://a")).unwrap();
        let cell = registry.insert(Farm::new("b", "noop", "https://b")).unwrap();
        cell.lock()
            .unwrap()
            .sessions
            .push_activity(HandleId::new("h1"), "https://b/live");

        assert_eq!(registry.owner_of(&HandleId::new("h1")), Some(FarmId::new("b")));
        assert_eq!(registry.owner_of(&HandleId::new("h2")), None);
    }

    #[test]
    fn ids_are_sorted_and_remove_drops_farm() {
        let registry = FarmRegistry::new();
        registry.insert(Farm::new("b", "noop", "https://b")).unwrap();
        registry.insert(Farm::new("a", "noop", "https://a")).unwrap();
        assert_eq!(registry.ids(), vec![FarmId::new("a"), FarmId::new("b")]);

        assert!(registry.remove(&FarmId::new("a")).is_some());
        assert!(!registry.contains(&FarmId::new("a")));
        assert_eq!(registry.snapshot().len(), 1);
    }
}
