// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-farm session pool handed to site adapters during a cycle
//!
//! Every session the pool opens is recorded on the farm through its state
//! machine, tagged with the cycle's epoch. When the cycle has been
//! superseded by a disable or restart, the farm refuses the handle (and
//! closes it) and the pool reports [`SiteError::Superseded`]. A handle the
//! host closed before or while it was recorded is a step failure
//! ([`HostError::NotFound`]) of a cycle that is still current.

use crate::error::RuntimeError;
use crate::executor::Executor;
use async_trait::async_trait;
use df_adapters::{HostError, SessionHost, SiteError, SiteSessions, StatsStore};
use df_core::{ActivitySession, Clock, Farm, FarmEvent, FarmId, HandleId};
use std::sync::Arc;

pub(crate) struct SessionPool<H, S, C> {
    exec: Arc<Executor<H, S, C>>,
    farm_id: FarmId,
    url: String,
    epoch: u64,
}

fn superseded(e: RuntimeError) -> SiteError {
    tracing::debug!(error = %e, "farm removed during cycle");
    SiteError::Superseded
}

impl<H, S, C> SessionPool<H, S, C>
where
    H: SessionHost,
    S: StatsStore,
    C: Clock,
{
    pub(crate) fn new(exec: Arc<Executor<H, S, C>>, farm: &Farm, epoch: u64) -> Self {
        Self {
            exec,
            farm_id: farm.id.clone(),
            url: farm.url.clone(),
            epoch,
        }
    }

    /// The farm, if the cycle that owns this pool is still current
    pub(crate) fn current(&self) -> Result<Farm, SiteError> {
        let farm = self.exec.farm(&self.farm_id).map_err(superseded)?;
        if farm.is_current(self.epoch) {
            Ok(farm)
        } else {
            Err(SiteError::Superseded)
        }
    }

    /// Reuse the farm's checker or open a new hidden one
    pub(crate) async fn open_checker(&mut self) -> Result<HandleId, SiteError> {
        if let Some(handle) = self.current()?.sessions.checker {
            return Ok(handle);
        }
        let handle = self.exec.host.create(&self.url, false).await?;
        let farm = self
            .exec
            .feed(
                &self.farm_id,
                FarmEvent::CheckerOpened {
                    epoch: self.epoch,
                    handle: handle.clone(),
                },
            )
            .await
            .map_err(superseded)?;
        self.recorded(farm, &handle).await?;
        Ok(handle)
    }

    /// Confirm `handle` is still held by the farm after recording it
    async fn recorded(&self, farm: Farm, handle: &HandleId) -> Result<(), SiteError> {
        let farm = if self.exec.take_early_close(handle) {
            tracing::info!(farm = %self.farm_id, %handle, "session closed before it was recorded");
            self.exec
                .feed(
                    &self.farm_id,
                    FarmEvent::SessionClosed {
                        handle: handle.clone(),
                    },
                )
                .await
                .map_err(superseded)?
        } else {
            farm
        };
        if !farm.is_current(self.epoch) {
            return Err(SiteError::Superseded);
        }
        if farm.sessions.role_of(handle).is_none() {
            return Err(HostError::NotFound(handle.clone()).into());
        }
        Ok(())
    }
}

#[async_trait]
impl<H, S, C> SiteSessions for SessionPool<H, S, C>
where
    H: SessionHost,
    S: StatsStore,
    C: Clock,
{
    fn farm_id(&self) -> &FarmId {
        &self.farm_id
    }

    fn url(&self) -> &str {
        &self.url
    }

    fn checker(&self) -> Option<HandleId> {
        self.exec
            .farm(&self.farm_id)
            .ok()
            .and_then(|farm| farm.sessions.checker)
    }

    fn activity(&self) -> Vec<ActivitySession> {
        self.exec
            .farm(&self.farm_id)
            .map(|farm| farm.sessions.activity)
            .unwrap_or_default()
    }

    async fn open_activity(&mut self, url: &str) -> Result<HandleId, SiteError> {
        self.current()?;
        let handle = self.exec.host.create(url, false).await?;
        let farm = self
            .exec
            .feed(
                &self.farm_id,
                FarmEvent::ActivityOpened {
                    epoch: self.epoch,
                    handle: handle.clone(),
                    url: url.to_string(),
                },
            )
            .await
            .map_err(superseded)?;
        self.recorded(farm, &handle).await?;
        tracing::info!(farm = %self.farm_id, %handle, url, "activity session opened");
        Ok(handle)
    }

    async fn close_activity(&mut self, handle: &HandleId) -> Result<(), SiteError> {
        self.exec
            .feed(
                &self.farm_id,
                FarmEvent::CloseSession {
                    handle: handle.clone(),
                },
            )
            .await
            .map_err(superseded)?;
        tracing::info!(farm = %self.farm_id, %handle, "activity session closed");
        Ok(())
    }

    async fn show(&mut self, handle: &HandleId) -> Result<(), SiteError> {
        self.exec.host.show(handle).await?;
        Ok(())
    }

    async fn hide(&mut self, handle: &HandleId) -> Result<(), SiteError> {
        self.exec.host.hide(handle).await?;
        Ok(())
    }
}
