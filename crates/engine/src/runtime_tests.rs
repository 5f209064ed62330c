// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Runtime tests

use super::*;
use chrono::{DateTime, TimeZone, Utc};
use df_adapters::{FakeSessionHost, FakeSiteAdapter, FarmStats, HostCall, MemoryStatsStore, SiteCall};
use df_core::{Condition, ConditionConfig, ConditionKind, ConfigError, FarmStatus};
use std::time::Duration;

const FARM_URL: &str = "https://site.test/channel";
const LIVE_1: &str = "https://site.test/live/1";
const LIVE_2: &str = "https://site.test/live/2";

const MINUTE: Duration = Duration::from_secs(60);
const HOUR: Duration = Duration::from_secs(60 * 60);

/// Monday, so weekly periods start at the origin
fn monday() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 1, 5, 0, 0, 0).unwrap()
}

struct Harness {
    runtime: Runtime<FakeSessionHost, MemoryStatsStore, TokioClock>,
    host: FakeSessionHost,
    site: FakeSiteAdapter,
    broken: FakeSiteAdapter,
    store: MemoryStatsStore,
    events: mpsc::UnboundedReceiver<Event>,
}

impl Harness {
    fn new() -> Self {
        Self::with_store(MemoryStatsStore::new())
    }

    fn with_store(store: MemoryStatsStore) -> Self {
        let host = FakeSessionHost::new();
        let site = FakeSiteAdapter::new("fake");
        let broken = FakeSiteAdapter::new("broken");
        let sites = SiteCatalog::new()
            .with(Arc::new(site.clone()))
            .with(Arc::new(broken.clone()));
        let runtime = Runtime::new(
            RuntimeDeps {
                host: host.clone(),
                store: store.clone(),
                sites,
            },
            TokioClock::starting_at(monday()),
            &EngineConfig::default(),
        );
        let events = runtime.subscribe();
        Self {
            runtime,
            host,
            site,
            broken,
            store,
            events,
        }
    }

    async fn add(&self, config: FarmConfig) -> FarmId {
        self.runtime.add_farm(config).await.unwrap().id
    }

    /// Run a check now and wait for it to settle
    async fn check(&self, id: &FarmId) -> Farm {
        self.runtime.check_now(id).await.unwrap();
        self.runtime.wait_idle().await;
        self.runtime.farm(id).unwrap()
    }

    fn drain(&mut self) -> Vec<Event> {
        std::iter::from_fn(|| self.events.try_recv().ok()).collect()
    }

    fn statuses(&mut self, id: &FarmId) -> Vec<FarmStatus> {
        self.drain()
            .into_iter()
            .filter_map(|event| match event {
                Event::FarmStatusChanged { id: farm, status, .. } if farm == *id => Some(status),
                _ => None,
            })
            .collect()
    }
}

fn farm(id: &str) -> FarmConfig {
    FarmConfig::new(id, "fake", FARM_URL)
}

fn weekly_settings() -> FarmSettings {
    FarmSettings {
        condition: ConditionConfig {
            kind: ConditionKind::Weekly,
            target: 4 * HOUR,
            buffer: 30 * MINUTE,
            repeating: true,
            ..ConditionConfig::default()
        },
        ..FarmSettings::default()
    }
}

fn now() -> Instant {
    tokio::time::Instant::now().into_std()
}

#[tokio::test(start_paused = true)]
async fn unlimited_farm_watches_activity_until_it_ends() {
    let mut h = Harness::new();
    let id = h.add(farm("x")).await;
    h.site.go_live(LIVE_1);

    let farm = h.check(&id).await;
    assert_eq!(farm.status, FarmStatus::Farming);
    assert_eq!(farm.sessions.activity_count(), 1);
    assert!(farm.sessions.checker.is_none());
    assert!(farm.uptime.is_running());
    assert_eq!(h.host.open_count(), 1);

    h.site.end(LIVE_1);
    tokio::time::sleep(10 * MINUTE).await;
    let farm = h.check(&id).await;

    assert_eq!(farm.status, FarmStatus::Idle);
    assert_eq!(farm.sessions.session_count(), 0);
    assert_eq!(farm.uptime.accumulated_ms, 600_000);
    assert_eq!(h.host.open_count(), 0);
    assert_eq!(
        h.statuses(&id),
        vec![
            FarmStatus::Idle,
            FarmStatus::Checking,
            FarmStatus::Farming,
            FarmStatus::Idle
        ]
    );
    assert_eq!(h.store.get(&id).unwrap().uptime_ms, 600_000);
    assert_eq!(h.store.get(&id).unwrap().sessions_opened, 1);
}

#[tokio::test(start_paused = true)]
async fn failed_login_needs_attention_and_queue_moves_on() {
    let mut h = Harness::new();
    let x = h.add(FarmConfig::new("x", "broken", FARM_URL)).await;
    let y = h.add(farm("y")).await;
    h.broken.fail_login("AuthTimeout");
    h.broken.go_live(LIVE_1);
    h.site.go_live(LIVE_2);

    h.runtime.check_now(&x).await.unwrap();
    h.runtime.check_now(&y).await.unwrap();
    h.runtime.wait_idle().await;

    let failed = h.runtime.farm(&x).unwrap();
    assert_eq!(failed.status, FarmStatus::AttentionRequired);
    assert!(failed.sessions.is_empty());
    assert_eq!(h.runtime.farm(&y).unwrap().status, FarmStatus::Farming);
    assert_eq!(h.host.open_count(), 1);

    let reasons: Vec<String> = h
        .drain()
        .into_iter()
        .filter_map(|event| match event {
            Event::CycleFailed { id, reason } if id == x => Some(reason),
            _ => None,
        })
        .collect();
    assert_eq!(reasons.len(), 1);
    assert!(reasons[0].contains("AuthTimeout"));

    // The next check retries
    h.broken.clear_failures();
    let farm = h.check(&x).await;
    assert_eq!(farm.status, FarmStatus::Farming);
}

#[tokio::test(start_paused = true)]
async fn disable_closes_sessions_and_stops_the_trigger() {
    let h = Harness::new();
    let id = h.add(farm("x")).await;
    h.site.go_live(LIVE_1);
    h.site.go_live(LIVE_2);
    let farm = h.check(&id).await;
    assert_eq!(farm.sessions.activity_count(), 2);
    assert_eq!(h.host.open_count(), 2);

    tokio::time::sleep(5 * MINUTE).await;
    let farm = h.runtime.disable(&id).await.unwrap();

    assert_eq!(farm.status, FarmStatus::Disabled);
    assert!(farm.sessions.is_empty());
    assert!(!farm.uptime.is_running());
    assert_eq!(farm.uptime.accumulated_ms, 300_000);
    assert_eq!(h.host.open_count(), 0);
    assert_eq!(h.runtime.next_check(&id), None);

    let calls = h.site.calls().len();
    tokio::time::sleep(2 * HOUR).await;
    assert_eq!(h.site.calls().len(), calls);
}

#[tokio::test(start_paused = true)]
async fn trigger_runs_checks_on_schedule() {
    let h = Harness::new();
    let added_at = now();
    let id = h.add(farm("x")).await;
    assert_eq!(h.runtime.next_check(&id), Some(added_at + 30 * MINUTE));
    h.site.go_live(LIVE_1);

    tokio::time::sleep(30 * MINUTE + Duration::from_secs(1)).await;
    h.runtime.wait_idle().await;

    assert_eq!(h.runtime.farm(&id).unwrap().status, FarmStatus::Farming);
    assert_eq!(
        h.site.calls().first(),
        Some(&SiteCall::Login { farm: id.clone() })
    );
}

#[tokio::test(start_paused = true)]
async fn weekly_condition_fulfils_then_resets_next_week() {
    let mut h = Harness::new();
    let id = h.add(farm("x").with_settings(weekly_settings())).await;
    h.site.go_live(LIVE_1);
    h.check(&id).await;

    tokio::time::sleep(4 * HOUR + 31 * MINUTE).await;
    h.runtime.wait_idle().await;

    let farm = h.runtime.farm(&id).unwrap();
    assert_eq!(farm.status, FarmStatus::ConditionFulfilled);
    assert_eq!(farm.condition.amount_accrued_ms, 16_200_000);
    assert_eq!(h.host.open_count(), 0);
    assert!(h
        .drain()
        .iter()
        .any(|event| matches!(event, Event::ConditionFulfilled { id: farm, .. } if *farm == id)));

    // First check of the following week starts a new period
    let next_monday = monday() + chrono::Duration::days(7) + chrono::Duration::minutes(31);
    let remaining = (next_monday - monday()).to_std().unwrap() - (4 * HOUR + 31 * MINUTE);
    tokio::time::sleep(remaining).await;
    h.runtime.wait_idle().await;

    let farm = h.runtime.farm(&id).unwrap();
    assert_eq!(farm.status, FarmStatus::Farming);
    assert_eq!(farm.condition.amount_accrued_ms, 0);
    assert!(!farm.condition.is_fulfilled());
    assert_eq!(
        farm.condition.started_at,
        Some(monday() + chrono::Duration::days(7))
    );
}

#[tokio::test(start_paused = true)]
async fn time_window_gates_checks() {
    let h = Harness::new();
    let settings = FarmSettings {
        condition: ConditionConfig {
            kind: ConditionKind::TimeWindow,
            from: Some(monday() + chrono::Duration::hours(2)),
            to: Some(monday() + chrono::Duration::hours(3)),
            ..ConditionConfig::default()
        },
        ..FarmSettings::default()
    };
    let id = h.add(farm("x").with_settings(settings)).await;
    h.site.go_live(LIVE_1);

    let farm = h.check(&id).await;
    assert_eq!(farm.status, FarmStatus::Idle);
    assert!(h.site.calls().is_empty());
    assert!(h.runtime.queue().is_idle());

    tokio::time::sleep(2 * HOUR + MINUTE).await;
    h.runtime.wait_idle().await;
    assert_eq!(h.runtime.farm(&id).unwrap().status, FarmStatus::Farming);

    tokio::time::sleep(HOUR + 30 * MINUTE).await;
    h.runtime.wait_idle().await;
    let farm = h.runtime.farm(&id).unwrap();
    assert_eq!(farm.status, FarmStatus::Idle);
    assert_eq!(farm.uptime.accumulated_ms, 90 * 60 * 1000);
    assert_eq!(h.host.open_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn schedule_change_mid_cycle_moves_next_check() {
    let h = Harness::new();
    let id = h.add(farm("x")).await;
    h.site.go_live(LIVE_1);
    h.site.delay_login(Duration::from_secs(10));

    h.runtime.check_now(&id).await.unwrap();
    tokio::time::sleep(Duration::from_secs(1)).await;

    let settings = FarmSettings {
        schedule_minutes: 5,
        ..FarmSettings::default()
    };
    let farm = h.runtime.apply_settings(&id, &settings).await.unwrap();
    let updated_at = now();
    assert_eq!(farm.status, FarmStatus::Checking);
    assert_eq!(h.runtime.next_check(&id), Some(updated_at + 5 * MINUTE));

    tokio::time::sleep(Duration::from_secs(20)).await;
    h.runtime.wait_idle().await;
    let farm = h.runtime.farm(&id).unwrap();
    assert_eq!(farm.status, FarmStatus::Farming);
    assert_eq!(farm.schedule_minutes, 5);
}

#[tokio::test(start_paused = true)]
async fn invalid_settings_leave_farm_untouched() {
    let h = Harness::new();
    let id = h.add(farm("x")).await;
    let next = h.runtime.next_check(&id);

    let zero_schedule = FarmSettings {
        schedule_minutes: 0,
        ..FarmSettings::default()
    };
    assert!(matches!(
        h.runtime.apply_settings(&id, &zero_schedule).await,
        Err(RuntimeError::Config(ConfigError::ScheduleOutOfRange(0)))
    ));

    let no_target = FarmSettings {
        enabled: false,
        condition: ConditionConfig {
            kind: ConditionKind::Weekly,
            ..ConditionConfig::default()
        },
        ..FarmSettings::default()
    };
    assert!(matches!(
        h.runtime.apply_settings(&id, &no_target).await,
        Err(RuntimeError::Config(ConfigError::MissingTarget(ConditionKind::Weekly)))
    ));

    let farm = h.runtime.farm(&id).unwrap();
    assert!(farm.enabled);
    assert_eq!(farm.schedule_minutes, 30);
    assert_eq!(farm.condition.kind, ConditionKind::Unlimited);
    assert_eq!(h.runtime.next_check(&id), next);
}

#[tokio::test(start_paused = true)]
async fn clear_cache_runs_between_stop_and_restart() {
    let h = Harness::new();
    let id = h.add(farm("x")).await;
    h.site.go_live(LIVE_1);
    let farm = h.check(&id).await;
    let activity = farm.sessions.activity[0].handle.clone();
    let before = h.host.calls().len();

    let farm = h.runtime.clear_cache(&id).await.unwrap();

    assert_eq!(farm.status, FarmStatus::Idle);
    assert!(farm.sessions.is_empty());
    assert!(h.runtime.next_check(&id).is_some());
    assert_eq!(h.host.open_count(), 0);

    let calls = h.host.calls()[before..].to_vec();
    assert_eq!(calls.len(), 4, "{calls:?}");
    assert_eq!(calls[0], HostCall::Destroy { handle: activity });
    assert!(matches!(&calls[1], HostCall::Create { url, visible: false } if url == FARM_URL));
    assert!(matches!(&calls[2], HostCall::ClearData { .. }));
    assert!(matches!(&calls[3], HostCall::Destroy { .. }));
}

#[tokio::test(start_paused = true)]
async fn session_closed_externally_settles_farm() {
    let h = Harness::new();
    let id = h.add(farm("x")).await;
    h.site.go_live(LIVE_1);
    let farm = h.check(&id).await;
    let handle = farm.sessions.activity[0].handle.clone();

    tokio::time::sleep(2 * MINUTE).await;
    assert!(h.host.close_externally(&handle));
    tokio::time::sleep(Duration::from_secs(1)).await;

    let farm = h.runtime.farm(&id).unwrap();
    assert_eq!(farm.status, FarmStatus::Idle);
    assert!(farm.sessions.is_empty());
    assert_eq!(farm.uptime.accumulated_ms, 120_000);
}

#[tokio::test(start_paused = true)]
async fn activity_closed_while_recorded_fails_check_and_recovers() {
    let store = MemoryStatsStore::new();
    store.yield_on_save();
    let h = Harness::with_store(store);
    let id = h.add(farm("x")).await;
    h.site.go_live(LIVE_1);
    h.host.close_after_create("/live/");

    h.check(&id).await;
    tokio::time::sleep(Duration::from_secs(1)).await;

    let farm = h.runtime.farm(&id).unwrap();
    assert_eq!(farm.status, FarmStatus::AttentionRequired);
    assert!(!farm.cycle_in_flight);
    assert!(farm.sessions.is_empty());
    assert_eq!(h.host.open_count(), 0);

    h.host.clear_close_on_create();
    let farm = h.check(&id).await;
    assert_eq!(farm.status, FarmStatus::Farming);
    assert_eq!(farm.sessions.activity_count(), 1);
    let logins = h
        .site
        .calls()
        .iter()
        .filter(|call| matches!(call, SiteCall::Login { .. }))
        .count();
    assert_eq!(logins, 2);
}

#[tokio::test(start_paused = true)]
async fn close_notice_before_recording_is_not_lost() {
    let h = Harness::new();
    let id = h.add(farm("x")).await;
    h.site.go_live(LIVE_1);
    h.host.close_on_create("/live/");

    h.check(&id).await;
    tokio::time::sleep(Duration::from_secs(1)).await;

    let farm = h.runtime.farm(&id).unwrap();
    assert_eq!(farm.status, FarmStatus::AttentionRequired);
    assert!(farm.sessions.is_empty());
    assert!(!farm.uptime.is_running());
    assert_eq!(h.host.open_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn check_after_restart_replaces_the_queued_one() {
    let mut h = Harness::new();
    let id = h.add(farm("x")).await;
    h.site.go_live(LIVE_1);

    h.runtime.suspend();
    h.runtime.check_now(&id).await.unwrap();
    assert_eq!(h.runtime.queue().pending_len(), 1);

    let farm = h.runtime.restart(&id).await.unwrap();
    assert_eq!(farm.status, FarmStatus::Idle);
    let farm = h.runtime.check_now(&id).await.unwrap();
    assert_eq!(farm.status, FarmStatus::Checking);
    assert_eq!(h.runtime.queue().pending_len(), 1);

    h.runtime.resume();
    h.runtime.wait_idle().await;

    assert_eq!(h.runtime.farm(&id).unwrap().status, FarmStatus::Farming);
    let coalesced = h
        .drain()
        .iter()
        .filter(|event| matches!(event, Event::QueueTaskCoalesced { .. }))
        .count();
    assert_eq!(coalesced, 1);
    let logins = h
        .site
        .calls()
        .iter()
        .filter(|call| matches!(call, SiteCall::Login { .. }))
        .count();
    assert_eq!(logins, 1);
}

#[tokio::test(start_paused = true)]
async fn persisted_stats_are_restored_on_add() {
    let (fulfilled, _) =
        Condition::weekly(4 * HOUR, 30 * MINUTE, true).accrue(16_200_000, monday());
    let store = MemoryStatsStore::new();
    store.insert(
        "x",
        FarmStats {
            uptime_ms: 3_600_000,
            sessions_opened: 7,
            condition: Some(fulfilled),
        },
    );
    let h = Harness::with_store(store);

    let id = h.add(farm("x").with_settings(weekly_settings())).await;
    let farm = h.runtime.farm(&id).unwrap();
    assert_eq!(farm.status, FarmStatus::ConditionFulfilled);
    assert_eq!(farm.uptime.accumulated_ms, 3_600_000);
    assert_eq!(farm.sessions_opened, 7);

    h.site.go_live(LIVE_1);
    let farm = h.check(&id).await;
    assert_eq!(farm.status, FarmStatus::ConditionFulfilled);
    assert!(h.site.calls().is_empty());

    let farm = h.runtime.reset_conditions(&id).await.unwrap();
    assert_eq!(farm.status, FarmStatus::Idle);
    let saved = h.store.get(&id).unwrap().condition.unwrap();
    assert_eq!(saved.amount_accrued_ms, 0);
    assert!(!saved.is_fulfilled());
}

#[tokio::test(start_paused = true)]
async fn add_rejects_unknown_site_and_duplicates() {
    let h = Harness::new();
    assert!(matches!(
        h.runtime.add_farm(FarmConfig::new("z", "missing", FARM_URL)).await,
        Err(RuntimeError::Site(SiteError::UnknownSite(tag))) if tag == "missing"
    ));

    h.add(farm("x")).await;
    assert!(matches!(
        h.runtime.add_farm(farm("x")).await,
        Err(RuntimeError::DuplicateFarm(id)) if id == FarmId::new("x")
    ));
    assert_eq!(h.runtime.farms().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn remove_farm_closes_sessions_and_forgets_stats() {
    let h = Harness::new();
    let id = h.add(farm("x")).await;
    h.site.go_live(LIVE_1);
    h.check(&id).await;
    assert!(h.store.get(&id).is_some());

    h.runtime.remove_farm(&id).await.unwrap();

    assert!(matches!(h.runtime.farm(&id), Err(RuntimeError::FarmNotFound(_))));
    assert_eq!(h.host.open_count(), 0);
    assert_eq!(h.runtime.next_check(&id), None);
    assert_eq!(h.store.get(&id), None);
    assert!(h.runtime.farms().is_empty());
}

#[tokio::test(start_paused = true)]
async fn apply_all_updates_existing_and_adds_new_farms() {
    let h = Harness::new();
    let x = h.add(farm("x")).await;

    let invalid = vec![
        farm("x"),
        farm("z").with_settings(FarmSettings {
            schedule_minutes: 99,
            ..FarmSettings::default()
        }),
    ];
    assert!(h.runtime.apply_all(&invalid).await.is_err());
    assert_eq!(h.runtime.farms().len(), 1);

    let configs = vec![
        farm("x").with_settings(FarmSettings {
            enabled: false,
            schedule_minutes: 10,
            ..FarmSettings::default()
        }),
        farm("y"),
    ];
    h.runtime.apply_all(&configs).await.unwrap();

    let updated = h.runtime.farm(&x).unwrap();
    assert_eq!(updated.status, FarmStatus::Disabled);
    assert_eq!(updated.schedule_minutes, 10);
    let added = h.runtime.farm(&FarmId::new("y")).unwrap();
    assert_eq!(added.status, FarmStatus::Idle);
    assert!(h.runtime.next_check(&added.id).is_some());
}

#[tokio::test(start_paused = true)]
async fn housekeeping_runs_ahead_of_queued_checks() {
    let h = Harness::new();
    let id = h.add(farm("x")).await;
    h.site.go_live(LIVE_1);

    h.runtime.suspend();
    h.runtime.check_now(&id).await.unwrap();

    let site = h.site.clone();
    let ran_first = Arc::new(Mutex::new(None));
    let seen = Arc::clone(&ran_first);
    h.runtime.submit_housekeeping(
        "probe",
        Box::pin(async move {
            *seen.lock().unwrap() = Some(site.calls().is_empty());
        }),
    );

    h.runtime.resume();
    h.runtime.wait_idle().await;
    assert_eq!(*ran_first.lock().unwrap(), Some(true));
    assert_eq!(h.runtime.farm(&id).unwrap().status, FarmStatus::Farming);
}

#[tokio::test(start_paused = true)]
async fn shutdown_stops_farms_and_refuses_new_work() {
    let h = Harness::new();
    let id = h.add(farm("x")).await;
    h.site.go_live(LIVE_1);
    h.check(&id).await;

    h.runtime.shutdown().await;

    assert_eq!(h.runtime.farm(&id).unwrap().status, FarmStatus::Disabled);
    assert_eq!(h.host.open_count(), 0);
    assert!(matches!(
        h.runtime.add_farm(farm("y")).await,
        Err(RuntimeError::ShuttingDown)
    ));
}
