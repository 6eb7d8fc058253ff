//! Signed-in session lifecycle.
//!
//! Without a session the tracker is local-only. `login` runs the
//! once-per-login reconciliation; `logout` cancels any pending push so
//! nothing fires against a torn-down session.

use std::sync::atomic::Ordering;
use std::sync::Arc;
use tokio::runtime::Handle;
use uuid::Uuid;

use super::{Inner, ProgressEvent, ProgressSnapshot, ProgressTracker};
use crate::progress::ProgressRecord;
use crate::realtime::{ChangeEvent, ChangeListener, RealtimeBridge, RealtimeTransport, WatchedTable};
use crate::sync::{RemoteProgressStore, SyncSource};

impl<R> Inner<R> {
    /// Replace the record with a remote copy and persist it locally.
    ///
    /// `seen` is the revision captured before the remote copy was fetched.
    /// If the record changed since, the local edit wins and the remote copy
    /// is dropped; the pending push will carry the edit up.
    fn apply_remote(&self, remote: ProgressRecord, seen: u64) -> bool {
        {
            let mut record = self.record_mut();
            if self.revision() != seen {
                tracing::debug!("Progress changed during remote fetch, keeping local record");
                return false;
            }
            if *record == remote {
                return false;
            }
            *record = remote;
            self.revision.fetch_add(1, Ordering::SeqCst);

            if let Err(e) = self.store.save(&*record) {
                tracing::warn!("Failed to persist remote progress locally: {}", e);
            }
        }

        self.refresh_snapshot();
        self.emit(ProgressEvent::RemoteApplied);
        true
    }
}

impl<R: RemoteProgressStore> ProgressTracker<R> {
    /// User the tracker is syncing for.
    pub fn current_user(&self) -> Option<Uuid> {
        self.inner.current_user()
    }

    /// Start a session and reconcile with the remote copy.
    ///
    /// Returns which copy won, or `None` when the tracker has no remote or
    /// the remote could not be reached (the local record stays in use).
    pub async fn login(&self, user_id: Uuid) -> Option<SyncSource> {
        let previous = self
            .inner
            .session
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .replace(user_id);
        if let Some(previous) = previous.filter(|previous| *previous != user_id) {
            self.end_session(previous);
        }

        let cloud = self.inner.cloud.as_ref()?;
        let seen = self.inner.revision();
        let local = self.record();

        match cloud.sync_progress(user_id, local).await {
            Ok(outcome) => {
                match outcome.source {
                    SyncSource::Remote => {
                        if self.current_user() == Some(user_id) {
                            self.inner.apply_remote(outcome.record, seen);
                        }
                    }
                    // Seed the remote with what this device has
                    SyncSource::Local => self.schedule_push(),
                    SyncSource::Skipped => {}
                }
                Some(outcome.source)
            }
            Err(e) => {
                tracing::warn!("Progress sync failed for user {}: {}", user_id, e);
                None
            }
        }
    }

    /// End the session. A pending push is cancelled, not flushed.
    pub fn logout(&self) {
        let previous = self
            .inner
            .session
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();

        if let Some(user_id) = previous {
            self.end_session(user_id);
        }
    }

    fn end_session(&self, user_id: Uuid) {
        if self.inner.debouncer.cancel() {
            tracing::info!("Cancelled pending progress push for user {}", user_id);
        }
        if let Some(cloud) = self.inner.cloud.as_ref() {
            cloud.end_session(user_id);
        }
    }

    /// Re-read the remote copy and apply it (remote wins).
    ///
    /// Skipped while a local push is pending, since the remote copy is
    /// about to be overwritten anyway. A local edit made while the fetch is
    /// in flight also keeps the fetched copy out. Returns whether the record
    /// changed.
    pub async fn refresh_from_remote(&self) -> bool {
        let (Some(user_id), Some(cloud)) = (self.current_user(), self.inner.cloud.as_ref()) else {
            return false;
        };
        if self.inner.debouncer.is_pending() {
            tracing::debug!("Local push pending, skipping remote refresh");
            return false;
        }
        let seen = self.inner.revision();

        match cloud.fetch_remote(user_id).await {
            Ok(Some(remote)) if self.current_user() == Some(user_id) => {
                self.inner.apply_remote(remote, seen)
            }
            Ok(_) => false,
            Err(e) => {
                tracing::warn!("Failed to refresh progress for user {}: {}", user_id, e);
                false
            }
        }
    }

    /// Push immediately, replacing any pending debounced push.
    pub async fn push_now(&self) -> bool {
        let Some(user_id) = self.current_user() else {
            return false;
        };
        self.inner.debouncer.cancel();
        self.inner.push_for(user_id).await
    }

    /// Route remote progress changes from a realtime bridge to this tracker.
    pub fn listen_to<T: RealtimeTransport>(&self, bridge: &RealtimeBridge<T>) {
        bridge.add_listener(Arc::new(self.clone()));
    }

    /// Derived values, recomputed from scratch.
    pub fn refresh(&self) -> ProgressSnapshot {
        self.inner.refresh_snapshot()
    }
}

impl<R: RemoteProgressStore> ChangeListener for ProgressTracker<R> {
    fn on_change(&self, user_id: Uuid, event: &ChangeEvent) {
        if event.table != WatchedTable::Progress || self.current_user() != Some(user_id) {
            return;
        }

        let Ok(runtime) = Handle::try_current() else {
            tracing::warn!("No async runtime available, remote progress change ignored");
            return;
        };

        let tracker = self.clone();
        runtime.spawn(async move {
            if tracker.refresh_from_remote().await {
                tracing::info!("Applied remote progress change for user {}", user_id);
            }
        });
    }
}
