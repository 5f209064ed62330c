// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Session host adapters
//!
//! The host creates and displays the browser-like surfaces farms work
//! through. It also reports sessions closed from outside the engine (the
//! user closing a window, a renderer crash).

mod noop;

pub use noop::NoOpSessionHost;

// Test support - only compiled for tests or when explicitly requested
#[cfg(any(test, feature = "test-support"))]
mod fake;
#[cfg(any(test, feature = "test-support"))]
pub use fake::{FakeHostSession, FakeSessionHost, HostCall};

use async_trait::async_trait;
use df_core::HandleId;
use thiserror::Error;
use tokio::sync::mpsc;

/// Errors from session host operations
#[derive(Debug, Error)]
pub enum HostError {
    #[error("session not found: {0}")]
    NotFound(HandleId),
    #[error("failed to create session for {url}: {reason}")]
    CreateFailed { url: String, reason: String },
    #[error("host unavailable: {0}")]
    Unavailable(String),
}

impl HostError {
    /// The handle was already closed; callers treat this as a no-op
    pub fn is_gone(&self) -> bool {
        matches!(self, HostError::NotFound(_))
    }
}

/// Adapter for the session/window host
#[async_trait]
pub trait SessionHost: Clone + Send + Sync + 'static {
    /// Open a session on `url`; resolves once the page has loaded
    async fn create(&self, url: &str, visible: bool) -> Result<HandleId, HostError>;

    async fn destroy(&self, handle: &HandleId) -> Result<(), HostError>;

    async fn show(&self, handle: &HandleId) -> Result<(), HostError>;

    async fn hide(&self, handle: &HandleId) -> Result<(), HostError>;

    /// Clear cookies and cached data of the session's profile
    async fn clear_data(&self, handle: &HandleId) -> Result<(), HostError>;

    /// Receive the handles of sessions as they close
    fn subscribe(&self) -> mpsc::UnboundedReceiver<HandleId>;
}
