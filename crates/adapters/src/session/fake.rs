// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fake session host for testing
#![cfg_attr(coverage_nightly, coverage(off))]

use super::{HostError, SessionHost};
use async_trait::async_trait;
use df_core::{HandleId, IdGen, SequentialIdGen};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

/// Recorded host call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostCall {
    Create { url: String, visible: bool },
    Destroy { handle: HandleId },
    Show { handle: HandleId },
    Hide { handle: HandleId },
    ClearData { handle: HandleId },
}

/// Fake session state
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FakeHostSession {
    pub url: String,
    pub visible: bool,
    pub data_cleared: bool,
}

#[derive(Default)]
struct FakeHostState {
    sessions: HashMap<HandleId, FakeHostSession>,
    calls: Vec<HostCall>,
    subscribers: Vec<mpsc::UnboundedSender<HandleId>>,
    create_failure: Option<String>,
    close_on_create: Option<CloseOnCreate>,
}

/// Sessions whose URL contains `fragment` are closed inside `create`
#[derive(Debug, Clone)]
struct CloseOnCreate {
    fragment: String,
    /// Yield before returning so the close notice is delivered first
    deliver_first: bool,
}

/// Fake session host for testing
///
/// Destroying a session delivers a close notification afterwards, the way a
/// real window host does.
#[derive(Clone)]
pub struct FakeSessionHost {
    state: Arc<Mutex<FakeHostState>>,
    ids: SequentialIdGen,
}

impl Default for FakeSessionHost {
    fn default() -> Self {
        Self {
            state: Arc::new(Mutex::new(FakeHostState::default())),
            ids: SequentialIdGen::new("session"),
        }
    }
}

impl FakeSessionHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get all recorded calls
    pub fn calls(&self) -> Vec<HostCall> {
        self.lock().calls.clone()
    }

    pub fn get_session(&self, handle: &HandleId) -> Option<FakeHostSession> {
        self.lock().sessions.get(handle).cloned()
    }

    pub fn is_open(&self, handle: &HandleId) -> bool {
        self.lock().sessions.contains_key(handle)
    }

    /// Number of sessions currently open
    pub fn open_count(&self) -> usize {
        self.lock().sessions.len()
    }

    /// Make every following `create` fail with `reason`
    pub fn fail_create(&self, reason: impl Into<String>) {
        self.lock().create_failure = Some(reason.into());
    }

    pub fn clear_create_failure(&self) {
        self.lock().create_failure = None;
    }

    /// Close matching sessions as they are created, delivering the close
    /// notice before `create` returns the handle
    pub fn close_on_create(&self, fragment: impl Into<String>) {
        self.lock().close_on_create = Some(CloseOnCreate {
            fragment: fragment.into(),
            deliver_first: true,
        });
    }

    /// Close matching sessions as they are created, leaving the close
    /// notice queued when `create` returns
    pub fn close_after_create(&self, fragment: impl Into<String>) {
        self.lock().close_on_create = Some(CloseOnCreate {
            fragment: fragment.into(),
            deliver_first: false,
        });
    }

    pub fn clear_close_on_create(&self) {
        self.lock().close_on_create = None;
    }

    /// Close a session as if the user closed its window
    pub fn close_externally(&self, handle: &HandleId) -> bool {
        let mut state = self.lock();
        if state.sessions.remove(handle).is_none() {
            return false;
        }
        notify(&mut state, handle);
        true
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, FakeHostState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn with_session(
        &self,
        handle: &HandleId,
        call: HostCall,
        f: impl FnOnce(&mut FakeHostSession),
    ) -> Result<(), HostError> {
        let mut state = self.lock();
        state.calls.push(call);
        match state.sessions.get_mut(handle) {
            Some(session) => {
                f(session);
                Ok(())
            }
            None => Err(HostError::NotFound(handle.clone())),
        }
    }
}

fn notify(state: &mut FakeHostState, handle: &HandleId) {
    state
        .subscribers
        .retain(|tx| tx.send(handle.clone()).is_ok());
}

#[async_trait]
impl SessionHost for FakeSessionHost {
    async fn create(&self, url: &str, visible: bool) -> Result<HandleId, HostError> {
        let (handle, deliver_first) = {
            let mut state = self.lock();
            state.calls.push(HostCall::Create {
                url: url.to_string(),
                visible,
            });
            if let Some(reason) = &state.create_failure {
                return Err(HostError::CreateFailed {
                    url: url.to_string(),
                    reason: reason.clone(),
                });
            }
            let handle = HandleId::new(self.ids.next());
            let closing = state
                .close_on_create
                .clone()
                .filter(|close| url.contains(&close.fragment));
            match closing {
                Some(close) => {
                    notify(&mut state, &handle);
                    (handle, close.deliver_first)
                }
                None => {
                    state.sessions.insert(
                        handle.clone(),
                        FakeHostSession {
                            url: url.to_string(),
                            visible,
                            data_cleared: false,
                        },
                    );
                    (handle, false)
                }
            }
        };
        if deliver_first {
            tokio::task::yield_now().await;
        }
        Ok(handle)
    }

    async fn destroy(&self, handle: &HandleId) -> Result<(), HostError> {
        let mut state = self.lock();
        state.calls.push(HostCall::Destroy {
            handle: handle.clone(),
        });
        if state.sessions.remove(handle).is_none() {
            return Err(HostError::NotFound(handle.clone()));
        }
        notify(&mut state, handle);
        Ok(())
    }

    async fn show(&self, handle: &HandleId) -> Result<(), HostError> {
        let call = HostCall::Show {
            handle: handle.clone(),
        };
        self.with_session(handle, call, |s| s.visible = true)
    }

    async fn hide(&self, handle: &HandleId) -> Result<(), HostError> {
        let call = HostCall::Hide {
            handle: handle.clone(),
        };
        self.with_session(handle, call, |s| s.visible = false)
    }

    async fn clear_data(&self, handle: &HandleId) -> Result<(), HostError> {
        let call = HostCall::ClearData {
            handle: handle.clone(),
        };
        self.with_session(handle, call, |s| s.data_cleared = true)
    }

    fn subscribe(&self) -> mpsc::UnboundedReceiver<HandleId> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.lock().subscribers.push(tx);
        rx
    }
}

#[cfg(test)]
#[path = "fake_tests.rs"]
mod tests;
