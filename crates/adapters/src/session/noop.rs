// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Headless session host that opens nothing

use super::{HostError, SessionHost};
use async_trait::async_trait;
use df_core::{HandleId, IdGen, UuidIdGen};
use tokio::sync::mpsc;

/// Session host that hands out handles without opening anything.
///
/// Used by `dfd` when no rendering host is attached.
#[derive(Clone, Debug, Default)]
pub struct NoOpSessionHost {
    ids: UuidIdGen,
}

impl NoOpSessionHost {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionHost for NoOpSessionHost {
    async fn create(&self, _url: &str, _visible: bool) -> Result<HandleId, HostError> {
        Ok(HandleId::new(self.ids.next()))
    }

    async fn destroy(&self, _handle: &HandleId) -> Result<(), HostError> {
        Ok(())
    }

    async fn show(&self, _handle: &HandleId) -> Result<(), HostError> {
        Ok(())
    }

    async fn hide(&self, _handle: &HandleId) -> Result<(), HostError> {
        Ok(())
    }

    async fn clear_data(&self, _handle: &HandleId) -> Result<(), HostError> {
        Ok(())
    }

    fn subscribe(&self) -> mpsc::UnboundedReceiver<HandleId> {
        // Nothing ever closes on its own
        let (_tx, rx) = mpsc::unbounded_channel();
        rx
    }
}
