//! Integration tests for realtime invalidation feeding the tracker.

use personal21::notify::RecordingNotifier;
use personal21::progress::{LocalProgressStore, MemoryStorage, ProgressRecord};
use personal21::realtime::{
    ChangeEvent, ChangeKind, ChannelMessage, ConnectionState, MemoryTransport, QueryCache,
    QueryKey, RealtimeBridge, WatchedTable,
};
use personal21::sync::{MemoryRemoteStore, RemoteProgressStore};
use personal21::tracker::{ProgressTracker, TrackerOptions};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

fn progress_change() -> ChannelMessage {
    ChannelMessage::Change(ChangeEvent {
        table: WatchedTable::Progress,
        kind: ChangeKind::Update,
        row: json!({}),
    })
}

fn record_with_days(days: u8) -> ProgressRecord {
    let mut record = ProgressRecord::new();
    record.workouts.completed_days.extend(1..=days);
    record
}

async fn settle() {
    tokio::time::sleep(Duration::from_millis(50)).await;
}

struct Setup {
    user: Uuid,
    remote: Arc<MemoryRemoteStore>,
    transport: Arc<MemoryTransport>,
    bridge: RealtimeBridge<MemoryTransport>,
    tracker: ProgressTracker<MemoryRemoteStore>,
}

async fn connected_setup() -> Setup {
    let user = Uuid::new_v4();
    let remote = Arc::new(MemoryRemoteStore::new());
    remote.upsert(user, &record_with_days(1)).await.unwrap();

    let tracker = ProgressTracker::new(
        LocalProgressStore::new(Arc::new(MemoryStorage::new())),
        Some(remote.clone()),
        TrackerOptions::default(),
    );
    tracker.login(user).await;

    let transport = Arc::new(MemoryTransport::new());
    let bridge = RealtimeBridge::new(
        transport.clone(),
        Arc::new(QueryCache::new()),
        Arc::new(RecordingNotifier::new()),
    );
    tracker.listen_to(&bridge);
    bridge.connect(user).await.unwrap();
    transport.send(ChannelMessage::Subscribed).await;
    settle().await;
    assert_eq!(bridge.state(), ConnectionState::Connected);

    Setup {
        user,
        remote,
        transport,
        bridge,
        tracker,
    }
}

#[tokio::test]
async fn test_remote_progress_change_is_applied() {
    let s = connected_setup().await;
    assert_eq!(s.tracker.record().workouts.completed_days.len(), 1);

    // Another device pushes
    s.remote.upsert(s.user, &record_with_days(4)).await.unwrap();
    s.bridge.cache().insert(QueryKey::new("user-progress"), json!({}));
    s.transport.send(progress_change()).await;
    settle().await;

    assert_eq!(s.tracker.record().workouts.completed_days.len(), 4);
    assert!(!s.bridge.cache().contains(&QueryKey::new("user-progress")));
}

#[tokio::test]
async fn test_remote_change_ignored_while_push_pending() {
    let s = connected_setup().await;

    s.tracker.add_water_intake(500);
    assert!(s.tracker.is_push_pending());

    s.remote.upsert(s.user, &record_with_days(6)).await.unwrap();
    s.transport.send(progress_change()).await;
    settle().await;

    // The local change is kept and will overwrite the remote on push
    let record = s.tracker.record();
    assert_eq!(record.workouts.completed_days.len(), 1);
    assert_eq!(s.tracker.today_hydration_ml(), 500);
}

#[tokio::test]
async fn test_other_tables_do_not_touch_progress() {
    let s = connected_setup().await;
    s.remote.upsert(s.user, &record_with_days(9)).await.unwrap();

    s.transport
        .send(ChannelMessage::Change(ChangeEvent {
            table: WatchedTable::Profiles,
            kind: ChangeKind::Update,
            row: json!({ "id": s.user.to_string() }),
        }))
        .await;
    settle().await;

    assert_eq!(s.tracker.record().workouts.completed_days.len(), 1);
}

#[tokio::test]
async fn test_logout_teardown() {
    let s = connected_setup().await;

    s.tracker.logout();
    s.bridge.disconnect();
    settle().await;

    assert_eq!(s.bridge.state(), ConnectionState::Disconnected);
    assert!(!s.transport.is_subscribed());
    assert!(s.tracker.current_user().is_none());
}

#[tokio::test(start_paused = true)]
async fn test_local_edit_during_slow_refresh_is_kept() {
    let s = connected_setup().await;
    s.remote.upsert(s.user, &record_with_days(3)).await.unwrap();
    s.remote.set_fetch_latency(Duration::from_millis(200));
    let fetches = s.remote.fetch_count();

    s.transport.send(progress_change()).await;
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(s.remote.fetch_count(), fetches + 1);

    // Edit while the refetch is still in flight
    assert!(s.tracker.complete_mindset_chapter(1));

    // The fetch lands, then the debounce window elapses
    tokio::time::sleep(Duration::from_secs(2)).await;
    assert!(!s.tracker.is_push_pending());

    let local = s.tracker.record();
    assert!(local.mindset.completed_chapters.contains(&1));
    let pushed = s.remote.record(s.user).unwrap();
    assert!(pushed.mindset.completed_chapters.contains(&1));
    assert_eq!(pushed, local);
}
