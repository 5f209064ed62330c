// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use df_adapters::SiteError;
use df_core::{FarmId, FarmStatus};
use tempfile::TempDir;

const CONFIG: &str = r#"
[engine]
concurrency = 1

[[farms]]
id = "alpha"
site = "noop"
url = "https://example.test/alpha"
schedule_minutes = 15

[[farms]]
id = "beta"
site = "noop"
url = "https://example.test/beta"
enabled = false
"#;

fn config_in(dir: &TempDir, content: Option<&str>) -> Config {
    let path = dir.path().join("dfd.toml");
    if let Some(content) = content {
        std::fs::write(&path, content).unwrap();
    }
    Config::with_state_dir(path, &dir.path().join("state"))
}

#[tokio::test]
async fn startup_registers_configured_farms() {
    let dir = TempDir::new().unwrap();
    let config = config_in(&dir, Some(CONFIG));

    let daemon = startup(&config).await.unwrap();

    let farms = daemon.runtime.farms();
    assert_eq!(farms.len(), 2);
    let alpha = daemon.runtime.farm(&FarmId::new("alpha")).unwrap();
    assert_eq!(alpha.status, FarmStatus::Idle);
    assert_eq!(alpha.schedule_minutes, 15);
    let beta = daemon.runtime.farm(&FarmId::new("beta")).unwrap();
    assert_eq!(beta.status, FarmStatus::Disabled);
    assert!(config.lock_path.exists());

    daemon.shutdown().await.unwrap();
    assert!(!config.lock_path.exists());
}

#[tokio::test]
async fn missing_config_starts_empty() {
    let dir = TempDir::new().unwrap();
    let config = config_in(&dir, None);

    let daemon = startup(&config).await.unwrap();

    assert!(daemon.runtime.farms().is_empty());
    assert_eq!(daemon.engine, EngineConfig::default());
    daemon.shutdown().await.unwrap();
}

#[tokio::test]
async fn second_daemon_cannot_take_the_lock() {
    let dir = TempDir::new().unwrap();
    let config = config_in(&dir, Some(CONFIG));
    let first = startup(&config).await.unwrap();

    let second = startup(&config).await;

    assert!(matches!(second, Err(LifecycleError::LockFailed(_))));
    assert!(config.lock_path.exists());
    first.shutdown().await.unwrap();
}

#[tokio::test]
async fn unknown_site_fails_startup_and_releases_lock() {
    let dir = TempDir::new().unwrap();
    let config = config_in(
        &dir,
        Some(
            r#"
[[farms]]
id = "alpha"
site = "elsewhere"
url = "https://example.test/alpha"
"#,
        ),
    );

    let result = startup(&config).await;

    assert!(matches!(
        result,
        Err(LifecycleError::Runtime(RuntimeError::Site(SiteError::UnknownSite(_))))
    ));
    assert!(!config.lock_path.exists());
}

#[tokio::test]
async fn invalid_config_is_rejected() {
    let dir = TempDir::new().unwrap();
    let config = config_in(
        &dir,
        Some(
            r#"
[[farms]]
id = "alpha"
site = "noop"
url = "https://example.test/alpha"
schedule_minutes = 0
"#,
        ),
    );

    let result = startup(&config).await;

    assert!(matches!(
        result,
        Err(LifecycleError::Config(ConfigError::ScheduleOutOfRange(0)))
    ));
}

#[tokio::test]
async fn reload_applies_the_new_farm_list() {
    let dir = TempDir::new().unwrap();
    let config = config_in(&dir, Some(CONFIG));
    let daemon = startup(&config).await.unwrap();

    let updated = CONFIG.replace("schedule_minutes = 15", "schedule_minutes = 5")
        + r#"
[[farms]]
id = "gamma"
site = "noop"
url = "https://example.test/gamma"
"#;
    std::fs::write(&config.config_path, updated).unwrap();
    daemon.reload().await.unwrap();

    assert_eq!(daemon.runtime.farms().len(), 3);
    let alpha = daemon.runtime.farm(&FarmId::new("alpha")).unwrap();
    assert_eq!(alpha.schedule_minutes, 5);
    daemon.shutdown().await.unwrap();
}

#[tokio::test]
async fn reload_removes_farms_no_longer_listed() {
    let dir = TempDir::new().unwrap();
    let config = config_in(&dir, Some(CONFIG));
    let daemon = startup(&config).await.unwrap();

    let only_alpha = CONFIG
        .split("[[farms]]")
        .take(2)
        .collect::<Vec<_>>()
        .join("[[farms]]");
    std::fs::write(&config.config_path, only_alpha).unwrap();
    daemon.reload().await.unwrap();

    let ids: Vec<FarmId> = daemon.runtime.farms().into_iter().map(|farm| farm.id).collect();
    assert_eq!(ids, vec![FarmId::new("alpha")]);
    assert!(daemon.runtime.farm(&FarmId::new("beta")).is_err());
    daemon.shutdown().await.unwrap();
}

#[tokio::test]
async fn probe_reports_reachability() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let open = listener.local_addr().unwrap().to_string();
    assert!(probe(&open, Duration::from_secs(1)).await);

    let closed = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().to_string()
    };
    assert!(!probe(&closed, Duration::from_secs(1)).await);
}

#[tokio::test]
async fn await_connectivity_retries_until_attempts_run_out() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let open = listener.local_addr().unwrap().to_string();
    assert!(await_connectivity(&open, Duration::from_secs(1), 3, Duration::from_millis(10)).await);

    let closed = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().to_string()
    };
    let start = Instant::now();
    assert!(!await_connectivity(&closed, Duration::from_secs(1), 3, Duration::from_millis(20)).await);
    assert!(start.elapsed() >= Duration::from_millis(40));
}

#[tokio::test]
async fn suspend_and_wake_toggle_the_queue() {
    let dir = TempDir::new().unwrap();
    let config = config_in(&dir, Some(CONFIG));
    let daemon = startup(&config).await.unwrap();

    daemon.suspend();
    assert!(daemon.runtime.queue().paused);
    daemon.wake();
    assert!(!daemon.runtime.queue().paused);

    daemon.shutdown().await.unwrap();
}
