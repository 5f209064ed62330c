// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::scheduler::{TickCallback, TokioScheduler};
use df_adapters::{FakeSessionHost, HostCall, MemoryStatsStore, SessionHost};
use df_core::{Event, FakeClock, FarmStatus};
use std::time::Duration;

struct Fixture {
    exec: Arc<Executor<FakeSessionHost, MemoryStatsStore, FakeClock>>,
    host: FakeSessionHost,
    store: MemoryStatsStore,
    scheduler: TokioScheduler<FakeClock>,
}

fn setup() -> Fixture {
    let host = FakeSessionHost::new();
    let store = MemoryStatsStore::new();
    let clock = FakeClock::new();
    let scheduler = TokioScheduler::new(clock.clone());
    let events = EventBus::new();
    let exec = Arc::new(Executor::new(
        host.clone(),
        store.clone(),
        clock,
        SiteCatalog::new(),
        Arc::new(scheduler.clone()),
        WorkQueue::new(1, events.clone()),
        events,
    ));
    Fixture {
        exec,
        host,
        store,
        scheduler,
    }
}

fn noop() -> TickCallback {
    Arc::new(|_: &str| {})
}

#[tokio::test]
async fn persist_effect_saves_farm_stats() {
    let f = setup();
    let mut farm = Farm::new("a", "noop", "https://a");
    farm.sessions_opened = 3;
    f.exec.registry.insert(farm).unwrap();

    f.exec
        .execute(Effect::PersistStats {
            farm_id: FarmId::new("a"),
        })
        .await;

    let stats = f.store.get(&FarmId::new("a")).unwrap();
    assert_eq!(stats.sessions_opened, 3);
}

#[tokio::test]
async fn emit_effect_publishes_event() {
    let f = setup();
    let mut rx = f.exec.events.subscribe();

    f.exec.execute(Effect::Emit(Event::QueuePaused)).await;

    assert_eq!(rx.try_recv().unwrap(), Event::QueuePaused);
}

#[tokio::test]
async fn trigger_effects_drive_scheduler() {
    let f = setup();
    f.scheduler.add("a", Duration::from_secs(60), false, noop());
    let id = FarmId::new("a");

    f.exec
        .execute(Effect::StartTrigger {
            farm_id: id.clone(),
        })
        .await;
    assert!(f.scheduler.next_fire("a").is_some());

    f.exec
        .execute(Effect::StopTrigger {
            farm_id: id.clone(),
        })
        .await;
    assert_eq!(f.scheduler.next_fire("a"), None);
}

#[tokio::test]
async fn destroying_a_gone_session_continues_with_the_rest() {
    let f = setup();
    let live = f.host.create("https://a/live", false).await.unwrap();

    f.exec
        .execute(Effect::DestroySessions {
            farm_id: FarmId::new("a"),
            handles: vec![HandleId::new("missing"), live.clone()],
        })
        .await;

    assert!(!f.host.is_open(&live));
    assert!(f.host.calls().contains(&HostCall::Destroy { handle: live }));
}

#[tokio::test]
async fn disable_closes_every_session_the_farm_holds() {
    let f = setup();
    let checker = f.host.create("https://a", false).await.unwrap();
    let activity = f.host.create("https://a/live", false).await.unwrap();
    let mut farm = Farm::new("a", "noop", "https://a");
    farm.sessions.set_checker(checker);
    farm.sessions.push_activity(activity, "https://a/live");
    f.exec.registry.insert(farm).unwrap();

    let farm = f.exec.feed(&FarmId::new("a"), FarmEvent::Disable).await.unwrap();

    assert!(!farm.enabled);
    assert!(farm.sessions.is_empty());
    assert_eq!(f.host.open_count(), 0);
}

#[tokio::test]
async fn restart_hook_runs_once() {
    let f = setup();
    f.exec
        .registry
        .insert(Farm::new("a", "noop", "https://a"))
        .unwrap();
    let id = FarmId::new("a");
    f.exec.set_restart_hook(&id, RestartHook::ClearCache);

    for _ in 0..2 {
        f.exec
            .execute(Effect::RunRestartHook {
                farm_id: id.clone(),
            })
            .await;
    }

    let cleared = f
        .host
        .calls()
        .iter()
        .filter(|call| matches!(call, HostCall::ClearData { .. }))
        .count();
    assert_eq!(cleared, 1);
    assert_eq!(f.host.open_count(), 0);
    assert!(f.exec.farm(&id).unwrap().sessions.is_empty());
}

#[tokio::test]
async fn close_notice_for_unowned_session_is_ignored() {
    let f = setup();
    f.exec
        .registry
        .insert(Farm::new("a", "noop", "https://a"))
        .unwrap();

    f.exec.session_closed(HandleId::new("stray")).await;

    assert_eq!(f.exec.farm(&FarmId::new("a")).unwrap().status, FarmStatus::Idle);
}

#[tokio::test]
async fn early_close_notice_is_claimed_once() {
    let f = setup();
    let handle = HandleId::new("early");

    f.exec.session_closed(handle.clone()).await;

    assert!(f.exec.take_early_close(&handle));
    assert!(!f.exec.take_early_close(&handle));
    assert!(!f.exec.take_early_close(&HandleId::new("other")));
}

#[tokio::test]
async fn early_close_buffer_is_bounded() {
    let f = setup();
    for i in 0..=EARLY_CLOSE_CAPACITY {
        f.exec.session_closed(HandleId::new(format!("h{i}"))).await;
    }

    assert!(!f.exec.take_early_close(&HandleId::new("h0")));
    assert!(f.exec.take_early_close(&HandleId::new(format!("h{EARLY_CLOSE_CAPACITY}"))));
}
