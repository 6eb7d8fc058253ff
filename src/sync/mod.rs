//! Cloud progress sync.
//!
//! Reconciles the local progress record with a per-user remote copy:
//! - `sync_progress` runs once per login; an existing remote record
//!   replaces the local one, otherwise the local record seeds the remote
//! - `push_to_cloud` upserts the whole local record (last push wins)
//!
//! Network failures surface as `SyncError` values for the caller to log;
//! nothing is queued or retried here.

pub mod debounce;
pub mod memory;
pub mod remote;

use std::collections::HashSet;
use std::future::Future;
use std::sync::{Arc, Mutex};
use thiserror::Error;
use uuid::Uuid;

use crate::progress::{MigrationError, ProgressRecord};

// Re-export main types
pub use debounce::Debouncer;
pub use memory::MemoryRemoteStore;
pub use remote::HttpRemoteStore;

/// Sync-related errors
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("Network unavailable")]
    Offline,

    #[error("Remote store error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Remote record could not be decoded: {0}")]
    Decode(#[from] MigrationError),

    #[error("Remote store not configured: {0}")]
    NotConfigured(String),
}

impl From<serde_json::Error> for SyncError {
    fn from(err: serde_json::Error) -> Self {
        SyncError::Serialization(err.to_string())
    }
}

/// Per-user remote copy of the progress record.
pub trait RemoteProgressStore: Send + Sync + 'static {
    /// Fetch the user's record, `None` if the user has never pushed.
    fn fetch(
        &self,
        user_id: Uuid,
    ) -> impl Future<Output = Result<Option<ProgressRecord>, SyncError>> + Send;

    /// Insert or overwrite the user's record.
    fn upsert(
        &self,
        user_id: Uuid,
        record: &ProgressRecord,
    ) -> impl Future<Output = Result<(), SyncError>> + Send;
}

/// Which copy won a session sync.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncSource {
    /// Remote record replaced the local one
    Remote,
    /// No remote record existed; local is the seed
    Local,
    /// This login was already synced; nothing fetched
    Skipped,
}

/// Result of a session sync.
#[derive(Debug, Clone)]
pub struct SyncOutcome {
    pub source: SyncSource,
    /// Record to use from now on
    pub record: ProgressRecord,
}

/// Cloud sync service over a remote store.
pub struct CloudSync<R> {
    remote: Arc<R>,
    synced_users: Mutex<HashSet<Uuid>>,
}

impl<R: RemoteProgressStore> CloudSync<R> {
    pub fn new(remote: Arc<R>) -> Self {
        Self {
            remote,
            synced_users: Mutex::new(HashSet::new()),
        }
    }

    /// Underlying remote store.
    pub fn remote(&self) -> &Arc<R> {
        &self.remote
    }

    fn synced_users(&self) -> std::sync::MutexGuard<'_, HashSet<Uuid>> {
        self.synced_users
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Whether this login already ran its sync.
    pub fn has_synced(&self, user_id: Uuid) -> bool {
        self.synced_users().contains(&user_id)
    }

    /// Reconcile `local` with the remote copy, once per login.
    ///
    /// Remote wins whenever it has a record. A failed fetch leaves the
    /// login unsynced so the next call tries again.
    pub async fn sync_progress(
        &self,
        user_id: Uuid,
        local: ProgressRecord,
    ) -> Result<SyncOutcome, SyncError> {
        if !self.synced_users().insert(user_id) {
            tracing::debug!("Progress already synced for user {}", user_id);
            return Ok(SyncOutcome {
                source: SyncSource::Skipped,
                record: local,
            });
        }

        match self.remote.fetch(user_id).await {
            Ok(Some(remote)) => {
                tracing::info!("Remote progress found for user {}, replacing local copy", user_id);
                Ok(SyncOutcome {
                    source: SyncSource::Remote,
                    record: remote,
                })
            }
            Ok(None) => {
                tracing::info!("No remote progress for user {}, seeding from local", user_id);
                Ok(SyncOutcome {
                    source: SyncSource::Local,
                    record: local,
                })
            }
            Err(e) => {
                self.synced_users().remove(&user_id);
                Err(e)
            }
        }
    }

    /// Fetch the remote record outside the once-per-login guard.
    pub async fn fetch_remote(&self, user_id: Uuid) -> Result<Option<ProgressRecord>, SyncError> {
        self.remote.fetch(user_id).await
    }

    /// Overwrite the remote copy with `record`.
    pub async fn push_to_cloud(
        &self,
        user_id: Uuid,
        record: &ProgressRecord,
    ) -> Result<(), SyncError> {
        self.remote.upsert(user_id, record).await?;
        tracing::debug!("Pushed progress for user {}", user_id);
        Ok(())
    }

    /// Forget the login so the next `sync_progress` runs again.
    pub fn end_session(&self, user_id: Uuid) {
        self.synced_users().remove(&user_id);
    }
}
