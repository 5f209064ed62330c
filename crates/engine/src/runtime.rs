// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Runtime for the farm engine
//!
//! [`Runtime`] is the command surface: it owns the executor, the scheduler
//! driver and the listener for externally closed sessions. Settings are
//! validated here before anything reaches a farm's state machine.

use crate::clock::TokioClock;
use crate::error::RuntimeError;
use crate::events::EventBus;
use crate::executor::{Executor, RestartHook};
use crate::queue::{Job, WorkQueue};
use crate::scheduler::{Scheduler, TickCallback, TokioScheduler};
use df_adapters::{SessionHost, SiteCatalog, SiteError, StatsStore};
use df_core::{
    Clock, EngineConfig, Event, Farm, FarmConfig, FarmEvent, FarmId, FarmSettings, HandleId,
    Priority, Submission, TaskQueue,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, Weak};
use std::time::Instant;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Runtime adapter dependencies
pub struct RuntimeDeps<H, S> {
    pub host: H,
    pub store: S,
    pub sites: SiteCatalog,
}

/// Runtime that coordinates farms, the scheduler and the work queue
pub struct Runtime<H, S, C = TokioClock> {
    exec: Arc<Executor<H, S, C>>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
    closed: AtomicBool,
}

impl<H, S, C> Runtime<H, S, C>
where
    H: SessionHost,
    S: StatsStore,
    C: Clock,
{
    /// Create a runtime and start its background tasks.
    ///
    /// Must be called from within a tokio runtime.
    pub fn new(deps: RuntimeDeps<H, S>, clock: C, config: &EngineConfig) -> Self {
        let events = EventBus::new();
        let scheduler = TokioScheduler::new(clock.clone());
        let queue = WorkQueue::new(config.concurrency.max(1), events.clone());
        let closed_sessions = deps.host.subscribe();

        let exec = Arc::new(Executor::new(
            deps.host,
            deps.store,
            clock,
            deps.sites,
            Arc::new(scheduler.clone()) as Arc<dyn Scheduler>,
            queue,
            events,
        ));

        let driver = scheduler.spawn();
        let listener = spawn_close_listener(Arc::downgrade(&exec), closed_sessions);

        Self {
            exec,
            tasks: Mutex::new(vec![driver, listener]),
            closed: AtomicBool::new(false),
        }
    }

    /// Register a farm, restoring any persisted stats, and arm its trigger
    /// when enabled
    pub async fn add_farm(&self, config: FarmConfig) -> Result<Farm, RuntimeError> {
        self.ensure_open()?;
        config.validate()?;
        if !self.exec.sites.contains(&config.site) {
            return Err(SiteError::UnknownSite(config.site.clone()).into());
        }
        if self.exec.registry.contains(&config.id) {
            return Err(RuntimeError::DuplicateFarm(config.id.clone()));
        }

        let stats = match self.exec.store.load(&config.id).await {
            Ok(stats) => stats,
            Err(e) => {
                tracing::warn!(farm = %config.id, error = %e, "failed to load stats, starting fresh");
                None
            }
        };
        let mut farm = Farm::from_config(&config);
        if let Some(stats) = stats {
            farm = farm.restore(
                stats.uptime_ms,
                stats.sessions_opened,
                stats.condition,
                self.exec.clock.utc_now(),
            );
        }

        self.exec.registry.insert(farm.clone())?;
        self.exec.scheduler.add(
            farm.id.as_str(),
            farm.interval(),
            farm.enabled,
            self.tick_callback(),
        );
        tracing::info!(
            farm = %farm.id,
            site = farm.site.as_str(),
            status = %farm.status,
            schedule_minutes = farm.schedule_minutes,
            "farm added"
        );
        self.exec.events.publish(farm.status_event());
        Ok(farm)
    }

    /// Disable a farm, drop its trigger and forget its stats
    pub async fn remove_farm(&self, id: &FarmId) -> Result<(), RuntimeError> {
        let farm = self.exec.farm(id)?;
        if farm.enabled {
            self.exec.feed(id, FarmEvent::Disable).await?;
        }
        self.exec.scheduler.remove(id.as_str());
        self.exec.registry.remove(id);
        if let Err(e) = self.exec.store.remove(id).await {
            tracing::warn!(farm = %id, error = %e, "failed to remove stats");
        }
        tracing::info!(farm = %id, "farm removed");
        Ok(())
    }

    pub async fn enable(&self, id: &FarmId) -> Result<Farm, RuntimeError> {
        self.ensure_open()?;
        self.exec.feed(id, FarmEvent::Enable).await
    }

    pub async fn disable(&self, id: &FarmId) -> Result<Farm, RuntimeError> {
        self.exec.feed(id, FarmEvent::Disable).await
    }

    /// Close every session, then re-arm the trigger
    pub async fn restart(&self, id: &FarmId) -> Result<Farm, RuntimeError> {
        self.ensure_open()?;
        self.exec.feed(id, FarmEvent::Restart).await
    }

    /// Restart the farm, clearing the site's cached data between stopping
    /// and re-arming its trigger
    pub async fn clear_cache(&self, id: &FarmId) -> Result<Farm, RuntimeError> {
        self.ensure_open()?;
        self.exec.farm(id)?;
        self.exec.set_restart_hook(id, RestartHook::ClearCache);
        self.exec.feed(id, FarmEvent::Restart).await
    }

    pub async fn reset_conditions(&self, id: &FarmId) -> Result<Farm, RuntimeError> {
        self.exec.feed(id, FarmEvent::ResetConditions).await
    }

    /// Run a check for the farm now instead of waiting for its trigger
    pub async fn check_now(&self, id: &FarmId) -> Result<Farm, RuntimeError> {
        self.ensure_open()?;
        self.exec.feed(id, FarmEvent::Tick).await
    }

    /// Apply new settings to one farm.
    ///
    /// Settings are validated first; an invalid value leaves the farm
    /// untouched.
    pub async fn apply_settings(
        &self,
        id: &FarmId,
        settings: &FarmSettings,
    ) -> Result<Farm, RuntimeError> {
        settings.validate()?;
        let farm = self.exec.farm(id)?;

        if !settings.enabled && farm.enabled {
            self.exec.feed(id, FarmEvent::Disable).await?;
        }
        if settings.schedule_minutes != farm.schedule_minutes {
            self.exec
                .feed(
                    id,
                    FarmEvent::UpdateSchedule {
                        minutes: settings.schedule_minutes,
                    },
                )
                .await?;
        }
        self.exec
            .feed(
                id,
                FarmEvent::UpdateCondition {
                    condition: settings.condition.to_condition(),
                },
            )
            .await?;
        if settings.enabled && !farm.enabled {
            self.exec.feed(id, FarmEvent::Enable).await?;
        }

        let farm = self.exec.farm(id)?;
        tracing::info!(farm = %id, enabled = farm.enabled, schedule_minutes = farm.schedule_minutes, "settings applied");
        Ok(farm)
    }

    /// Apply a whole farm list: existing farms get new settings, unknown
    /// ones are added. Nothing is applied unless every entry is valid.
    pub async fn apply_all(&self, configs: &[FarmConfig]) -> Result<(), RuntimeError> {
        self.ensure_open()?;
        for config in configs {
            config.validate()?;
            if !self.exec.sites.contains(&config.site) {
                return Err(SiteError::UnknownSite(config.site.clone()).into());
            }
        }
        for config in configs {
            if self.exec.registry.contains(&config.id) {
                self.apply_settings(&config.id, &config.settings).await?;
            } else {
                self.add_farm(config.clone()).await?;
            }
        }
        Ok(())
    }

    /// Disable every farm and stop all triggers
    pub async fn stop_all(&self) {
        for id in self.exec.registry.ids() {
            if let Err(e) = self.exec.feed(&id, FarmEvent::Disable).await {
                tracing::warn!(farm = %id, error = %e, "failed to stop farm");
            }
        }
        self.exec.scheduler.stop_all();
    }

    /// Hold queued checks, e.g. while the machine sleeps
    pub fn suspend(&self) {
        self.exec.queue.pause();
    }

    pub fn resume(&self) {
        self.exec.queue.resume();
    }

    /// Queue engine-wide work ahead of farm checks
    pub fn submit_housekeeping(&self, label: impl Into<String>, job: Job) -> Submission {
        self.exec.queue.submit(Priority::High, None, label, job)
    }

    pub fn farm(&self, id: &FarmId) -> Result<Farm, RuntimeError> {
        self.exec.farm(id)
    }

    /// Every farm, sorted by id
    pub fn farms(&self) -> Vec<Farm> {
        self.exec.registry.snapshot()
    }

    /// Next time the farm's trigger fires, if it is armed
    pub fn next_check(&self, id: &FarmId) -> Option<Instant> {
        self.exec.scheduler.next_fire(id.as_str())
    }

    pub fn queue(&self) -> TaskQueue {
        self.exec.queue.snapshot()
    }

    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<Event> {
        self.exec.events.subscribe()
    }

    pub fn events(&self) -> &EventBus {
        &self.exec.events
    }

    /// Resolves once no queued work is pending or running
    pub async fn wait_idle(&self) {
        self.exec.queue.wait_idle().await;
    }

    /// Stop every farm, let in-flight work drain and end background tasks
    pub async fn shutdown(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        tracing::info!(farms = self.exec.registry.len(), "shutting down");
        self.stop_all().await;
        self.exec.queue.resume();
        self.exec.queue.wait_idle().await;
        let tasks: Vec<JoinHandle<()>> = self
            .tasks
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .drain(..)
            .collect();
        for task in tasks {
            task.abort();
        }
    }

    fn ensure_open(&self) -> Result<(), RuntimeError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(RuntimeError::ShuttingDown);
        }
        Ok(())
    }

    fn tick_callback(&self) -> TickCallback {
        let exec = Arc::downgrade(&self.exec);
        Arc::new(move |key: &str| {
            let Some(exec) = exec.upgrade() else {
                return;
            };
            let id = FarmId::new(key);
            tokio::spawn(async move {
                if let Err(e) = exec.feed(&id, FarmEvent::Tick).await {
                    tracing::debug!(farm = %id, error = %e, "tick for missing farm");
                }
            });
        })
    }
}

impl<H, S, C> Drop for Runtime<H, S, C> {
    fn drop(&mut self) {
        let tasks = self.tasks.get_mut().unwrap_or_else(|e| e.into_inner());
        for task in tasks.drain(..) {
            task.abort();
        }
    }
}

fn spawn_close_listener<H, S, C>(
    exec: Weak<Executor<H, S, C>>,
    mut closed: mpsc::UnboundedReceiver<HandleId>,
) -> JoinHandle<()>
where
    H: SessionHost,
    S: StatsStore,
    C: Clock,
{
    tokio::spawn(async move {
        while let Some(handle) = closed.recv().await {
            let Some(exec) = exec.upgrade() else {
                break;
            };
            exec.session_closed(handle).await;
        }
    })
}

#[cfg(test)]
#[path = "runtime_tests.rs"]
mod tests;
