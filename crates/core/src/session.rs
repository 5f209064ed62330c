// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Session bookkeeping for a farm
//!
//! A farm owns at most one checker session, an ordered list of activity
//! sessions and a handful of short-lived extra sessions. This module only
//! tracks handles; opening and closing them is the engine's job.

use crate::id::HandleId;
use serde::{Deserialize, Serialize};

/// What a session handle is used for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SessionRole {
    Checker,
    Activity,
    Extra,
}

/// An open activity session and the page it watches
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivitySession {
    pub handle: HandleId,
    pub url: String,
}

/// Handles owned by one farm
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSet {
    pub checker: Option<HandleId>,
    pub activity: Vec<ActivitySession>,
    pub extra: Vec<HandleId>,
}

impl SessionSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the checker; returns the previous one if it was replaced
    pub fn set_checker(&mut self, handle: HandleId) -> Option<HandleId> {
        self.checker.replace(handle)
    }

    pub fn take_checker(&mut self) -> Option<HandleId> {
        self.checker.take()
    }

    pub fn push_activity(&mut self, handle: HandleId, url: impl Into<String>) {
        self.activity.push(ActivitySession {
            handle,
            url: url.into(),
        });
    }

    pub fn push_extra(&mut self, handle: HandleId) {
        self.extra.push(handle);
    }

    /// Whether a page is already watched by an activity session
    pub fn watches(&self, url: &str) -> bool {
        self.activity.iter().any(|s| s.url == url)
    }

    pub fn role_of(&self, handle: &HandleId) -> Option<SessionRole> {
        if self.checker.as_ref() == Some(handle) {
            Some(SessionRole::Checker)
        } else if self.activity.iter().any(|s| &s.handle == handle) {
            Some(SessionRole::Activity)
        } else if self.extra.contains(handle) {
            Some(SessionRole::Extra)
        } else {
            None
        }
    }

    /// Forget a handle, returning the role it had
    pub fn remove(&mut self, handle: &HandleId) -> Option<SessionRole> {
        let role = self.role_of(handle)?;
        match role {
            SessionRole::Checker => self.checker = None,
            SessionRole::Activity => self.activity.retain(|s| &s.handle != handle),
            SessionRole::Extra => self.extra.retain(|h| h != handle),
        }
        Some(role)
    }

    /// Remove every activity session, returning their handles
    pub fn drain_activity(&mut self) -> Vec<HandleId> {
        self.activity.drain(..).map(|s| s.handle).collect()
    }

    /// Remove every handle, checker first
    pub fn drain_all(&mut self) -> Vec<HandleId> {
        let mut handles: Vec<HandleId> = self.checker.take().into_iter().collect();
        handles.extend(self.drain_activity());
        handles.append(&mut self.extra);
        handles
    }

    pub fn activity_count(&self) -> usize {
        self.activity.len()
    }

    /// Sessions reported to the presentation layer (checker and activity)
    pub fn session_count(&self) -> usize {
        self.activity.len() + usize::from(self.checker.is_some())
    }

    pub fn is_empty(&self) -> bool {
        self.checker.is_none() && self.activity.is_empty() && self.extra.is_empty()
    }
}

#[cfg(test)]
#[path = "session_tests.rs"]
mod tests;
