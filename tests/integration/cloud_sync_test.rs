//! Integration tests for session sync and debounced pushes.
//!
//! Timing tests run on a paused tokio clock, so the debounce window is
//! driven deterministically.

use chrono::NaiveDate;
use personal21::progress::{FixedClock, LocalProgressStore, MemoryStorage, ProgressRecord};
use personal21::sync::{MemoryRemoteStore, RemoteProgressStore, SyncSource};
use personal21::tracker::{ProgressEvent, ProgressTracker, TrackerOptions};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

struct Harness {
    storage: Arc<MemoryStorage>,
    remote: Arc<MemoryRemoteStore>,
    tracker: ProgressTracker<MemoryRemoteStore>,
}

fn create_harness(storage: Arc<MemoryStorage>, remote: Arc<MemoryRemoteStore>) -> Harness {
    let clock = Arc::new(FixedClock::at_date(NaiveDate::from_ymd_opt(2026, 9, 1).unwrap()));
    let tracker = ProgressTracker::new(
        LocalProgressStore::new(storage.clone()),
        Some(remote.clone()),
        TrackerOptions {
            clock,
            push_debounce: Duration::from_secs(1),
            ..Default::default()
        },
    );
    Harness {
        storage,
        remote,
        tracker,
    }
}

fn record_with_chapters(count: u8) -> ProgressRecord {
    let mut record = ProgressRecord::new();
    record.mindset.completed_chapters.extend(1..=count);
    record
}

#[tokio::test]
async fn test_remote_wins_and_overwrites_local_store() {
    let storage = Arc::new(MemoryStorage::new());
    LocalProgressStore::new(storage.clone())
        .save(&record_with_chapters(2))
        .unwrap();

    let remote = Arc::new(MemoryRemoteStore::new());
    let user = Uuid::new_v4();
    remote.upsert(user, &record_with_chapters(5)).await.unwrap();

    let h = create_harness(storage, remote);
    assert_eq!(h.tracker.record().mindset.completed_chapters.len(), 2);

    let mut events = h.tracker.subscribe();
    assert_eq!(h.tracker.login(user).await, Some(SyncSource::Remote));
    assert_eq!(events.recv().await.unwrap(), ProgressEvent::RemoteApplied);

    assert_eq!(h.tracker.record().mindset.completed_chapters.len(), 5);
    assert_eq!(h.tracker.snapshot().pillars.mindset, 50);

    // A fresh load from the device store sees the remote copy
    let reloaded = LocalProgressStore::new(h.storage.clone()).load();
    assert_eq!(reloaded.mindset.completed_chapters.len(), 5);
}

#[tokio::test]
async fn test_sync_runs_once_per_login() {
    let h = create_harness(Arc::new(MemoryStorage::new()), Arc::new(MemoryRemoteStore::new()));
    let user = Uuid::new_v4();

    h.tracker.login(user).await;
    assert_eq!(h.tracker.login(user).await, Some(SyncSource::Skipped));
    assert_eq!(h.remote.fetch_count(), 1);

    h.tracker.logout();
    h.tracker.login(user).await;
    assert_eq!(h.remote.fetch_count(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_burst_of_mutations_pushes_once() {
    let h = create_harness(Arc::new(MemoryStorage::new()), Arc::new(MemoryRemoteStore::new()));
    let user = Uuid::new_v4();
    assert_eq!(h.tracker.login(user).await, Some(SyncSource::Local));

    h.tracker.add_water_intake(250);
    tokio::time::sleep(Duration::from_millis(100)).await;
    h.tracker.add_water_intake(250);
    tokio::time::sleep(Duration::from_millis(100)).await;
    h.tracker.complete_mindset_chapter(1);
    assert!(h.tracker.is_push_pending());
    assert_eq!(h.remote.upsert_count(), 0);

    tokio::time::sleep(Duration::from_millis(1500)).await;

    assert_eq!(h.remote.upsert_count(), 1);
    let pushed = h.remote.record(user).unwrap();
    assert_eq!(pushed.mindset.completed_chapters.len(), 1);
    assert_eq!(pushed, h.tracker.record());
}

#[tokio::test(start_paused = true)]
async fn test_mutation_inside_window_restarts_it() {
    let h = create_harness(Arc::new(MemoryStorage::new()), Arc::new(MemoryRemoteStore::new()));
    h.tracker.login(Uuid::new_v4()).await;

    h.tracker.add_water_intake(100);
    tokio::time::sleep(Duration::from_millis(900)).await;
    h.tracker.add_water_intake(100);
    tokio::time::sleep(Duration::from_millis(900)).await;

    // 1.8s since the first mutation, but only 0.9s since the last
    assert_eq!(h.remote.upsert_count(), 0);

    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(h.remote.upsert_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_logout_cancels_pending_push() {
    let h = create_harness(Arc::new(MemoryStorage::new()), Arc::new(MemoryRemoteStore::new()));
    h.tracker.login(Uuid::new_v4()).await;

    h.tracker.add_water_intake(300);
    assert!(h.tracker.is_push_pending());
    h.tracker.logout();
    assert!(!h.tracker.is_push_pending());

    tokio::time::sleep(Duration::from_secs(3)).await;
    assert_eq!(h.remote.upsert_count(), 0);

    // Local data survives logout
    assert_eq!(h.tracker.today_hydration_ml(), 300);
}

#[tokio::test(start_paused = true)]
async fn test_offline_push_is_retried_by_next_mutation() {
    let h = create_harness(Arc::new(MemoryStorage::new()), Arc::new(MemoryRemoteStore::new()));
    let user = Uuid::new_v4();
    h.tracker.login(user).await;
    let mut events = h.tracker.subscribe();

    h.remote.set_offline(true);
    h.tracker.complete_mindset_chapter(1);
    tokio::time::sleep(Duration::from_millis(1500)).await;
    assert_eq!(h.remote.upsert_count(), 0);

    h.remote.set_offline(false);
    h.tracker.complete_mindset_chapter(2);
    tokio::time::sleep(Duration::from_millis(1500)).await;
    assert_eq!(h.remote.upsert_count(), 1);
    assert_eq!(h.remote.record(user).unwrap().mindset.completed_chapters.len(), 2);

    let mut seen = Vec::new();
    while let Ok(event) = events.try_recv() {
        seen.push(event);
    }
    assert!(seen.contains(&ProgressEvent::PushFailed));
    assert!(seen.contains(&ProgressEvent::Pushed));
}

#[tokio::test]
async fn test_offline_login_keeps_local_record() {
    let storage = Arc::new(MemoryStorage::new());
    LocalProgressStore::new(storage.clone())
        .save(&record_with_chapters(3))
        .unwrap();
    let remote = Arc::new(MemoryRemoteStore::new());
    remote.set_offline(true);

    let h = create_harness(storage, remote);
    let user = Uuid::new_v4();
    assert_eq!(h.tracker.login(user).await, None);
    assert_eq!(h.tracker.record().mindset.completed_chapters.len(), 3);

    // The next login attempt fetches again
    h.remote.set_offline(false);
    assert_eq!(h.tracker.login(user).await, Some(SyncSource::Local));
}

#[tokio::test]
async fn test_push_now_skips_debounce() {
    let h = create_harness(Arc::new(MemoryStorage::new()), Arc::new(MemoryRemoteStore::new()));
    let user = Uuid::new_v4();
    h.tracker.login(user).await;
    h.tracker.add_sleep_time(8.0);

    assert!(h.tracker.push_now().await);
    assert!(!h.tracker.is_push_pending());
    assert_eq!(h.remote.upsert_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_edit_during_slow_login_is_kept() {
    let remote = Arc::new(MemoryRemoteStore::new());
    let user = Uuid::new_v4();
    remote.upsert(user, &record_with_chapters(5)).await.unwrap();
    remote.set_fetch_latency(Duration::from_millis(200));
    let h = create_harness(Arc::new(MemoryStorage::new()), remote);

    let tracker = h.tracker.clone();
    let login = tokio::spawn(async move { tracker.login(user).await });
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(h.tracker.add_water_intake(300));

    assert_eq!(login.await.unwrap(), Some(SyncSource::Remote));
    assert_eq!(h.tracker.today_hydration_ml(), 300);
    assert!(h.tracker.is_push_pending());

    tokio::time::sleep(Duration::from_millis(1500)).await;
    let pushed = h.remote.record(user).unwrap();
    let date = NaiveDate::from_ymd_opt(2026, 9, 1).unwrap();
    assert_eq!(pushed.daily_log(date).unwrap().hydration_ml, 300);
}
