// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Effect executor
//!
//! Owns the adapters and the shared engine state. Farm events go through
//! [`Executor::feed`], which runs the pure transition under the farm's lock
//! and then applies the returned effects in order.

use crate::cycle;
use crate::error::RuntimeError;
use crate::events::EventBus;
use crate::queue::WorkQueue;
use crate::registry::FarmRegistry;
use crate::scheduler::Scheduler;
use df_adapters::{FarmStats, SessionHost, SiteCatalog, StatsStore};
use df_core::{Clock, Effect, Farm, FarmEvent, FarmId, HandleId, Priority, TracedEffect};
use std::collections::{HashMap, VecDeque};
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tracing::Instrument;

/// Close notices kept for handles that had no owner when they arrived
const EARLY_CLOSE_CAPACITY: usize = 256;

pub(crate) type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Side effect run between stopping and restarting a farm's trigger
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestartHook {
    /// Clear the site's cookies and cached data through a short-lived session
    ClearCache,
}

/// Executes effects using the configured adapters
pub struct Executor<H, S, C> {
    pub(crate) host: H,
    pub(crate) store: S,
    pub(crate) clock: C,
    pub(crate) sites: SiteCatalog,
    pub(crate) registry: FarmRegistry,
    pub(crate) scheduler: Arc<dyn Scheduler>,
    pub(crate) queue: WorkQueue,
    pub(crate) events: EventBus,
    hooks: Mutex<HashMap<FarmId, RestartHook>>,
    early_closes: Mutex<VecDeque<HandleId>>,
}

impl<H, S, C> Executor<H, S, C>
where
    H: SessionHost,
    S: StatsStore,
    C: Clock,
{
    pub(crate) fn new(
        host: H,
        store: S,
        clock: C,
        sites: SiteCatalog,
        scheduler: Arc<dyn Scheduler>,
        queue: WorkQueue,
        events: EventBus,
    ) -> Self {
        Self {
            host,
            store,
            clock,
            sites,
            registry: FarmRegistry::new(),
            scheduler,
            queue,
            events,
            hooks: Mutex::new(HashMap::new()),
            early_closes: Mutex::new(VecDeque::new()),
        }
    }

    /// Copy of a farm's current state
    pub fn farm(&self, id: &FarmId) -> Result<Farm, RuntimeError> {
        let cell = self
            .registry
            .get(id)
            .ok_or_else(|| RuntimeError::FarmNotFound(id.clone()))?;
        let farm = cell.lock().unwrap_or_else(|e| e.into_inner()).clone();
        Ok(farm)
    }

    /// Run `event` through the farm's state machine without applying effects
    pub fn step(&self, id: &FarmId, event: FarmEvent) -> Result<Vec<Effect>, RuntimeError> {
        let cell = self
            .registry
            .get(id)
            .ok_or_else(|| RuntimeError::FarmNotFound(id.clone()))?;
        let mut farm = cell.lock().unwrap_or_else(|e| e.into_inner());
        let (next, effects) = farm.transition(event, &self.clock);
        if next.status != farm.status {
            tracing::info!(farm = %id, from = %farm.status, to = %next.status, "status changed");
        }
        *farm = next;
        Ok(effects)
    }

    /// Run `event` through the farm's state machine and apply the effects.
    /// Returns the farm as it stands afterwards.
    pub async fn feed(self: &Arc<Self>, id: &FarmId, event: FarmEvent) -> Result<Farm, RuntimeError> {
        let effects = self.step(id, event)?;
        self.execute_all(effects).await;
        self.farm(id)
    }

    /// Queue `hook` to run at the farm's next restart
    pub(crate) fn set_restart_hook(&self, id: &FarmId, hook: RestartHook) {
        self.hooks
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(id.clone(), hook);
    }

    /// Execute multiple effects in order
    pub fn execute_all(self: &Arc<Self>, effects: Vec<Effect>) -> BoxFuture<'_, ()> {
        Box::pin(async move {
            for effect in effects {
                self.execute(effect).await;
            }
        })
    }

    /// Execute a single effect with tracing. Failures are logged; one
    /// failing effect does not stop the ones after it.
    pub async fn execute(self: &Arc<Self>, effect: Effect) {
        let span = tracing::info_span!("effect", effect = effect.name());
        async move {
            tracing::info!(fields = ?effect.fields(), "executing");

            let start = Instant::now();
            let result = self.execute_inner(effect).await;
            let elapsed_ms = start.elapsed().as_millis() as u64;

            match &result {
                Ok(()) => tracing::debug!(elapsed_ms, "completed"),
                Err(e) => tracing::error!(elapsed_ms, error = %e, "failed"),
            }
        }
        .instrument(span)
        .await
    }

    async fn execute_inner(self: &Arc<Self>, effect: Effect) -> Result<(), RuntimeError> {
        match effect {
            Effect::Emit(event) => {
                self.events.publish(event);
                Ok(())
            }

            Effect::BeginCycle { farm_id, epoch } => {
                let label = format!("check {}", farm_id);
                let key = farm_id.to_string();
                let job = Box::pin(cycle::run(Arc::clone(self), farm_id, epoch));
                self.queue.submit(Priority::Low, Some(key), label, job);
                Ok(())
            }

            Effect::DestroySessions { handles, .. } => {
                self.destroy_handles(&handles).await;
                Ok(())
            }

            Effect::StartTrigger { farm_id } => {
                self.scheduler.start(farm_id.as_str());
                Ok(())
            }

            Effect::StopTrigger { farm_id } => {
                self.scheduler.stop(farm_id.as_str());
                Ok(())
            }

            Effect::UpdateTrigger { farm_id, interval } => {
                self.scheduler.update(farm_id.as_str(), interval);
                Ok(())
            }

            Effect::RunRestartHook { farm_id } => {
                let hook = self
                    .hooks
                    .lock()
                    .unwrap_or_else(|e| e.into_inner())
                    .remove(&farm_id);
                match hook {
                    Some(RestartHook::ClearCache) => self.clear_cache(&farm_id).await,
                    None => Ok(()),
                }
            }

            Effect::PersistStats { farm_id } => {
                let stats = FarmStats::of(&self.farm(&farm_id)?);
                self.store.save(&farm_id, &stats).await?;
                Ok(())
            }
        }
    }

    /// Close handles already removed from their farm. A handle the host
    /// reports as gone is not an error.
    pub(crate) async fn destroy_handles(&self, handles: &[HandleId]) {
        for handle in handles {
            match self.host.destroy(handle).await {
                Ok(()) => {}
                Err(e) if e.is_gone() => tracing::debug!(%handle, "session already closed"),
                Err(e) => tracing::warn!(%handle, error = %e, "failed to close session"),
            }
        }
    }

    async fn clear_cache(self: &Arc<Self>, id: &FarmId) -> Result<(), RuntimeError> {
        let url = self.farm(id)?.url;
        let handle = self.host.create(&url, false).await?;
        if let Err(e) = self
            .feed(id, FarmEvent::ExtraOpened {
                handle: handle.clone(),
            })
            .await
        {
            self.destroy_handles(&[handle]).await;
            return Err(e);
        }
        let cleared = self.host.clear_data(&handle).await;
        self.feed(id, FarmEvent::CloseSession { handle }).await?;
        cleared?;
        tracing::info!(farm = %id, "cache cleared");
        Ok(())
    }

    /// A session closed outside the engine's control.
    ///
    /// A notice can overtake the recording of a freshly created handle.
    /// Unowned handles are kept in a bounded buffer that the session pool
    /// consults after recording; whichever side removes the entry first
    /// applies the close.
    pub(crate) async fn session_closed(self: &Arc<Self>, handle: HandleId) {
        let id = match self.registry.owner_of(&handle) {
            Some(id) => id,
            None => {
                self.remember_early_close(handle.clone());
                let Some(id) = self.registry.owner_of(&handle) else {
                    tracing::debug!(%handle, "close notification for unowned session");
                    return;
                };
                if !self.take_early_close(&handle) {
                    return;
                }
                id
            }
        };
        tracing::info!(farm = %id, %handle, "session closed externally");
        if let Err(e) = self.feed(&id, FarmEvent::SessionClosed { handle }).await {
            tracing::debug!(farm = %id, error = %e, "farm gone before close was handled");
        }
    }

    fn remember_early_close(&self, handle: HandleId) {
        let mut closes = self.early_closes.lock().unwrap_or_else(|e| e.into_inner());
        if closes.len() == EARLY_CLOSE_CAPACITY {
            closes.pop_front();
        }
        closes.push_back(handle);
    }

    /// Claim a close notice that arrived before `handle` had an owner
    pub(crate) fn take_early_close(&self, handle: &HandleId) -> bool {
        let mut closes = self.early_closes.lock().unwrap_or_else(|e| e.into_inner());
        match closes.iter().position(|h| h == handle) {
            Some(index) => {
                closes.remove(index);
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
#[path = "executor_tests.rs"]
mod tests;
