// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::session::FakeSessionHost;
use crate::site::FakeSiteAdapter;
use df_core::{ActivitySession, FarmId};
use std::sync::Mutex;
use tracing_subscriber::fmt::MakeWriter;

/// A writer that captures log output for testing
#[derive(Clone, Default)]
struct CapturedLogs {
    logs: Arc<Mutex<Vec<u8>>>,
}

impl CapturedLogs {
    fn contents(&self) -> String {
        let logs = self.logs.lock().unwrap();
        String::from_utf8_lossy(&logs).to_string()
    }
}

impl std::io::Write for CapturedLogs {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.logs.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for CapturedLogs {
    type Writer = CapturedLogs;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

/// Run a test with captured tracing output
fn with_tracing<F, Fut>(f: F) -> (String, Fut::Output)
where
    F: FnOnce() -> Fut,
    Fut: std::future::Future,
{
    let logs = CapturedLogs::default();

    let subscriber = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::TRACE)
        .with_writer(logs.clone())
        .with_ansi(false)
        .without_time()
        .finish();

    let result = tracing::subscriber::with_default(subscriber, || {
        tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap()
            .block_on(f())
    });

    (logs.contents(), result)
}

/// Minimal session capability with a checker and no activity
struct CheckerOnly {
    farm: FarmId,
}

#[async_trait]
impl SiteSessions for CheckerOnly {
    fn farm_id(&self) -> &FarmId {
        &self.farm
    }

    fn url(&self) -> &str {
        "https://site"
    }

    fn checker(&self) -> Option<HandleId> {
        Some(HandleId::new("checker"))
    }

    fn activity(&self) -> Vec<ActivitySession> {
        Vec::new()
    }

    async fn open_activity(&mut self, _url: &str) -> Result<HandleId, SiteError> {
        Err(SiteError::Step("not supported".to_string()))
    }

    async fn close_activity(&mut self, _handle: &HandleId) -> Result<(), SiteError> {
        Ok(())
    }

    async fn show(&mut self, _handle: &HandleId) -> Result<(), SiteError> {
        Ok(())
    }

    async fn hide(&mut self, _handle: &HandleId) -> Result<(), SiteError> {
        Ok(())
    }
}

#[test]
fn create_logs_span_and_timing() {
    let (logs, result) = with_tracing(|| async {
        let traced = TracedSessionHost::new(FakeSessionHost::new());
        traced.create("https://site/watch", false).await
    });

    assert!(result.is_ok(), "create should succeed: {:?}", result);
    assert!(logs.contains("session.create"), "Logs:\n{}", logs);
    assert!(logs.contains("https://site/watch"), "Logs:\n{}", logs);
    assert!(logs.contains("session created"), "Logs:\n{}", logs);
    assert!(logs.contains("elapsed_ms"), "Logs:\n{}", logs);
}

#[test]
fn create_failure_is_logged_as_error() {
    let (logs, result) = with_tracing(|| async {
        let host = FakeSessionHost::new();
        host.fail_create("renderer crashed");
        TracedSessionHost::new(host).create("https://site", true).await
    });

    assert!(result.is_err());
    assert!(logs.contains("ERROR"), "Logs:\n{}", logs);
    assert!(logs.contains("renderer crashed"), "Logs:\n{}", logs);
}

#[test]
fn destroying_a_closed_session_only_warns() {
    let (logs, result) = with_tracing(|| async {
        let traced = TracedSessionHost::new(FakeSessionHost::new());
        traced.destroy(&HandleId::new("gone")).await
    });

    assert!(matches!(result, Err(ref e) if e.is_gone()));
    assert!(logs.contains("WARN"), "Logs:\n{}", logs);
    assert!(logs.contains("already gone"), "Logs:\n{}", logs);
    assert!(!logs.contains("ERROR"), "Logs:\n{}", logs);
}

#[test]
fn site_step_failure_names_farm_and_error() {
    let (logs, result) = with_tracing(|| async {
        let site = FakeSiteAdapter::new("fake");
        site.fail_login("AuthTimeout");
        let traced = TracedSiteAdapter::new(Arc::new(site));
        let mut sessions = CheckerOnly {
            farm: FarmId::new("league"),
        };
        traced.login(&mut sessions).await
    });

    assert!(result.is_err());
    assert!(logs.contains("site.login"), "Logs:\n{}", logs);
    assert!(logs.contains("league"), "Logs:\n{}", logs);
    assert!(logs.contains("step failed"), "Logs:\n{}", logs);
    assert!(logs.contains("AuthTimeout"), "Logs:\n{}", logs);
}

#[tokio::test]
async fn traced_site_keeps_inner_tag() {
    let traced = TracedSiteAdapter::new(Arc::new(FakeSiteAdapter::new("fake")));
    assert_eq!(traced.tag(), "fake");
}
