// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Site adapters
//!
//! A site adapter holds the per-site automation: logging in, deciding
//! whether watched activity is still live, and opening sessions for new
//! activity. Adapters never touch the session pool directly; they work
//! through the [`SiteSessions`] capability handed to each step.

mod noop;
mod timeout;

pub use noop::NoOpSiteAdapter;
pub use timeout::{wait_until, StepTimeout};

// Test support - only compiled for tests or when explicitly requested
#[cfg(any(test, feature = "test-support"))]
mod fake;
#[cfg(any(test, feature = "test-support"))]
pub use fake::{FakeSiteAdapter, SiteCall};

use crate::session::HostError;
use async_trait::async_trait;
use df_core::{ActivitySession, FarmId, HandleId};
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;

/// Errors from site adapter steps
#[derive(Debug, Error)]
pub enum SiteError {
    #[error("timed out waiting for {0}")]
    Timeout(String),
    #[error("login failed: {0}")]
    LoginFailed(String),
    #[error("no checker session")]
    NoChecker,
    #[error("farm was disabled or restarted during the cycle")]
    Superseded,
    #[error("unknown site: {0}")]
    UnknownSite(String),
    #[error(transparent)]
    Host(#[from] HostError),
    #[error("{0}")]
    Step(String),
}

/// Session operations available to a site adapter during a cycle
#[async_trait]
pub trait SiteSessions: Send {
    fn farm_id(&self) -> &FarmId;

    /// Page the farm is configured to check
    fn url(&self) -> &str;

    fn checker(&self) -> Option<HandleId>;

    /// Activity sessions currently open, oldest first
    fn activity(&self) -> Vec<ActivitySession>;

    /// Open a new activity session watching `url`
    async fn open_activity(&mut self, url: &str) -> Result<HandleId, SiteError>;

    /// Close an activity session whose activity has ended
    async fn close_activity(&mut self, handle: &HandleId) -> Result<(), SiteError>;

    async fn show(&mut self, handle: &HandleId) -> Result<(), SiteError>;

    async fn hide(&mut self, handle: &HandleId) -> Result<(), SiteError>;
}

/// Per-site automation
#[async_trait]
pub trait SiteAdapter: Send + Sync {
    /// Tag farms use to select this adapter
    fn tag(&self) -> &str;

    /// Make sure the checker session is authenticated. May show the
    /// session and wait for the user.
    async fn login(&self, sessions: &mut dyn SiteSessions) -> Result<(), SiteError>;

    /// Close activity sessions whose activity has ended
    async fn still_active(&self, sessions: &mut dyn SiteSessions) -> Result<(), SiteError>;

    /// Open activity sessions for newly live activity
    async fn start_activity(&self, sessions: &mut dyn SiteSessions) -> Result<(), SiteError>;
}

/// Site adapters by tag
#[derive(Clone, Default)]
pub struct SiteCatalog {
    sites: BTreeMap<String, Arc<dyn SiteAdapter>>,
}

impl SiteCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an adapter under its tag, replacing any previous one
    pub fn register(&mut self, adapter: Arc<dyn SiteAdapter>) {
        self.sites.insert(adapter.tag().to_string(), adapter);
    }

    pub fn with(mut self, adapter: Arc<dyn SiteAdapter>) -> Self {
        self.register(adapter);
        self
    }

    pub fn get(&self, tag: &str) -> Result<Arc<dyn SiteAdapter>, SiteError> {
        self.sites
            .get(tag)
            .cloned()
            .ok_or_else(|| SiteError::UnknownSite(tag.to_string()))
    }

    pub fn contains(&self, tag: &str) -> bool {
        self.sites.contains_key(tag)
    }

    pub fn tags(&self) -> impl Iterator<Item = &str> {
        self.sites.keys().map(String::as_str)
    }
}

#[cfg(test)]
#[path = "catalog_tests.rs"]
mod tests;
