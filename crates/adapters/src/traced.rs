// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Traced adapter wrappers for consistent observability

use crate::session::{HostError, SessionHost};
use crate::site::{SiteAdapter, SiteError, SiteSessions};
use async_trait::async_trait;
use df_core::HandleId;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc;
use tracing::Instrument;

/// Wrapper that adds tracing to any SessionHost
#[derive(Clone)]
pub struct TracedSessionHost<H> {
    inner: H,
}

impl<H> TracedSessionHost<H> {
    pub fn new(inner: H) -> Self {
        Self { inner }
    }

    pub fn inner(&self) -> &H {
        &self.inner
    }
}

#[async_trait]
impl<H: SessionHost> SessionHost for TracedSessionHost<H> {
    async fn create(&self, url: &str, visible: bool) -> Result<HandleId, HostError> {
        let span = tracing::info_span!("session.create", url, visible);
        async {
            tracing::info!("opening");
            let start = Instant::now();
            let result = self.inner.create(url, visible).await;
            let elapsed_ms = start.elapsed().as_millis() as u64;
            match &result {
                Ok(handle) => tracing::info!(%handle, elapsed_ms, "session created"),
                Err(e) => tracing::error!(elapsed_ms, error = %e, "create failed"),
            }
            result
        }
        .instrument(span)
        .await
    }

    async fn destroy(&self, handle: &HandleId) -> Result<(), HostError> {
        let span = tracing::info_span!("session.destroy", %handle);
        async {
            let result = self.inner.destroy(handle).await;
            match &result {
                Ok(()) => tracing::info!("destroyed"),
                Err(e) if e.is_gone() => tracing::warn!("already gone"),
                Err(e) => tracing::error!(error = %e, "destroy failed"),
            }
            result
        }
        .instrument(span)
        .await
    }

    async fn show(&self, handle: &HandleId) -> Result<(), HostError> {
        let result = self.inner.show(handle).await;
        tracing::debug!(%handle, ok = result.is_ok(), "show");
        result
    }

    async fn hide(&self, handle: &HandleId) -> Result<(), HostError> {
        let result = self.inner.hide(handle).await;
        tracing::debug!(%handle, ok = result.is_ok(), "hide");
        result
    }

    async fn clear_data(&self, handle: &HandleId) -> Result<(), HostError> {
        let span = tracing::info_span!("session.clear_data", %handle);
        async {
            let result = self.inner.clear_data(handle).await;
            match &result {
                Ok(()) => tracing::info!("cleared"),
                Err(e) => tracing::error!(error = %e, "clear failed"),
            }
            result
        }
        .instrument(span)
        .await
    }

    fn subscribe(&self) -> mpsc::UnboundedReceiver<HandleId> {
        self.inner.subscribe()
    }
}

/// Wrapper that adds tracing to a site adapter's steps
#[derive(Clone)]
pub struct TracedSiteAdapter {
    inner: Arc<dyn SiteAdapter>,
}

impl TracedSiteAdapter {
    pub fn new(inner: Arc<dyn SiteAdapter>) -> Self {
        Self { inner }
    }
}

fn log_step(result: &Result<(), SiteError>, start: Instant, sessions: &dyn SiteSessions) {
    let elapsed_ms = start.elapsed().as_millis() as u64;
    let activity = sessions.activity().len();
    match result {
        Ok(()) => tracing::info!(elapsed_ms, activity, "step finished"),
        Err(e) => tracing::error!(elapsed_ms, activity, error = %e, "step failed"),
    }
}

#[async_trait]
impl SiteAdapter for TracedSiteAdapter {
    fn tag(&self) -> &str {
        self.inner.tag()
    }

    async fn login(&self, sessions: &mut dyn SiteSessions) -> Result<(), SiteError> {
        let span = tracing::info_span!("site.login", site = self.tag(), farm = %sessions.farm_id());
        async {
            let start = Instant::now();
            let result = self.inner.login(&mut *sessions).await;
            log_step(&result, start, &*sessions);
            result
        }
        .instrument(span)
        .await
    }

    async fn still_active(&self, sessions: &mut dyn SiteSessions) -> Result<(), SiteError> {
        let span =
            tracing::info_span!("site.still_active", site = self.tag(), farm = %sessions.farm_id());
        async {
            let start = Instant::now();
            let result = self.inner.still_active(&mut *sessions).await;
            log_step(&result, start, &*sessions);
            result
        }
        .instrument(span)
        .await
    }

    async fn start_activity(&self, sessions: &mut dyn SiteSessions) -> Result<(), SiteError> {
        let span = tracing::info_span!(
            "site.start_activity",
            site = self.tag(),
            farm = %sessions.farm_id()
        );
        async {
            let start = Instant::now();
            let result = self.inner.start_activity(&mut *sessions).await;
            log_step(&result, start, &*sessions);
            result
        }
        .instrument(span)
        .await
    }
}

#[cfg(test)]
#[path = "traced_tests.rs"]
mod tests;
