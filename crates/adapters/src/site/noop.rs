// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Site adapter that never finds any activity

use super::{SiteAdapter, SiteError, SiteSessions};
use async_trait::async_trait;

/// Site adapter that logs in trivially and never reports live activity.
///
/// Registered by `dfd` under the `noop` tag so a farm can be scheduled
/// without any site automation attached.
#[derive(Clone, Debug)]
pub struct NoOpSiteAdapter {
    tag: String,
}

impl NoOpSiteAdapter {
    pub fn new(tag: impl Into<String>) -> Self {
        Self { tag: tag.into() }
    }
}

impl Default for NoOpSiteAdapter {
    fn default() -> Self {
        Self::new("noop")
    }
}

#[async_trait]
impl SiteAdapter for NoOpSiteAdapter {
    fn tag(&self) -> &str {
        &self.tag
    }

    async fn login(&self, _sessions: &mut dyn SiteSessions) -> Result<(), SiteError> {
        Ok(())
    }

    async fn still_active(&self, _sessions: &mut dyn SiteSessions) -> Result<(), SiteError> {
        Ok(())
    }

    async fn start_activity(&self, _sessions: &mut dyn SiteSessions) -> Result<(), SiteError> {
        Ok(())
    }
}
