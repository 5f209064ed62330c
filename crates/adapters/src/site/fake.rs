// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Scripted site adapter for testing
#![cfg_attr(coverage_nightly, coverage(off))]

use super::{SiteAdapter, SiteError, SiteSessions};
use async_trait::async_trait;
use df_core::FarmId;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Recorded site step
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SiteCall {
    Login { farm: FarmId },
    StillActive { farm: FarmId },
    StartActivity { farm: FarmId },
}

#[derive(Default)]
struct FakeSiteState {
    live: Vec<String>,
    calls: Vec<SiteCall>,
    login_failure: Option<String>,
    start_failure: Option<String>,
    login_delay: Option<Duration>,
}

/// Site adapter driven by a scripted list of live activity URLs
///
/// `still_active` closes sessions whose URL is no longer live and
/// `start_activity` opens one session per live URL not yet watched.
#[derive(Clone)]
pub struct FakeSiteAdapter {
    tag: String,
    state: Arc<Mutex<FakeSiteState>>,
}

impl FakeSiteAdapter {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            state: Arc::new(Mutex::new(FakeSiteState::default())),
        }
    }

    /// Get all recorded calls
    pub fn calls(&self) -> Vec<SiteCall> {
        self.lock().calls.clone()
    }

    pub fn go_live(&self, url: impl Into<String>) {
        let url = url.into();
        let mut state = self.lock();
        if !state.live.contains(&url) {
            state.live.push(url);
        }
    }

    pub fn end(&self, url: &str) {
        self.lock().live.retain(|u| u != url);
    }

    pub fn end_all(&self) {
        self.lock().live.clear();
    }

    /// Make `login` fail with `reason` until cleared
    pub fn fail_login(&self, reason: impl Into<String>) {
        self.lock().login_failure = Some(reason.into());
    }

    /// Make `start_activity` fail with `reason` until cleared
    pub fn fail_start(&self, reason: impl Into<String>) {
        self.lock().start_failure = Some(reason.into());
    }

    pub fn clear_failures(&self) {
        let mut state = self.lock();
        state.login_failure = None;
        state.start_failure = None;
    }

    /// Make `login` take this long before answering
    pub fn delay_login(&self, delay: Duration) {
        self.lock().login_delay = Some(delay);
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, FakeSiteState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn record(&self, call: SiteCall) {
        self.lock().calls.push(call);
    }
}

#[async_trait]
impl SiteAdapter for FakeSiteAdapter {
    fn tag(&self) -> &str {
        &self.tag
    }

    async fn login(&self, sessions: &mut dyn SiteSessions) -> Result<(), SiteError> {
        self.record(SiteCall::Login {
            farm: sessions.farm_id().clone(),
        });
        let delay = self.lock().login_delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        let failure = self.lock().login_failure.clone();
        if let Some(reason) = failure {
            return Err(SiteError::LoginFailed(reason));
        }
        if sessions.checker().is_none() {
            return Err(SiteError::NoChecker);
        }
        Ok(())
    }

    async fn still_active(&self, sessions: &mut dyn SiteSessions) -> Result<(), SiteError> {
        self.record(SiteCall::StillActive {
            farm: sessions.farm_id().clone(),
        });
        let live = self.lock().live.clone();
        for session in sessions.activity() {
            if !live.contains(&session.url) {
                sessions.close_activity(&session.handle).await?;
            }
        }
        Ok(())
    }

    async fn start_activity(&self, sessions: &mut dyn SiteSessions) -> Result<(), SiteError> {
        self.record(SiteCall::StartActivity {
            farm: sessions.farm_id().clone(),
        });
        let failure = self.lock().start_failure.clone();
        if let Some(reason) = failure {
            return Err(SiteError::Step(reason));
        }
        let live = self.lock().live.clone();
        let watched: Vec<String> = sessions.activity().into_iter().map(|s| s.url).collect();
        for url in live.iter().filter(|url| !watched.contains(url)) {
            sessions.open_activity(url).await?;
        }
        Ok(())
    }
}
