//! In-process remote store.
//!
//! Behaves like the hosted progress table: one JSON row per user, upserts
//! overwrite. Can be switched offline to exercise failure paths.

use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use uuid::Uuid;

use super::{RemoteProgressStore, SyncError};
use crate::progress::migration::decode_record;
use crate::progress::ProgressRecord;

/// Remote store kept in memory.
#[derive(Debug, Default)]
pub struct MemoryRemoteStore {
    rows: Mutex<HashMap<Uuid, Value>>,
    offline: AtomicBool,
    fetch_latency_ms: AtomicU64,
    fetches: AtomicUsize,
    upserts: AtomicUsize,
}

impl MemoryRemoteStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn rows(&self) -> std::sync::MutexGuard<'_, HashMap<Uuid, Value>> {
        self.rows.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Simulate losing (or regaining) connectivity.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Delay every fetch, as a slow network would.
    pub fn set_fetch_latency(&self, latency: Duration) {
        let millis = u64::try_from(latency.as_millis()).unwrap_or(u64::MAX);
        self.fetch_latency_ms.store(millis, Ordering::SeqCst);
    }

    /// Store a raw row, bypassing serialization of a typed record.
    pub fn insert_raw(&self, user_id: Uuid, progress_data: Value) {
        self.rows().insert(user_id, progress_data);
    }

    /// Decoded copy of the user's row.
    pub fn record(&self, user_id: Uuid) -> Option<ProgressRecord> {
        let value = self.rows().get(&user_id).cloned()?;
        decode_record(value).ok().map(|decoded| decoded.record)
    }

    /// Number of fetches served (including failed ones).
    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    /// Number of successful upserts.
    pub fn upsert_count(&self) -> usize {
        self.upserts.load(Ordering::SeqCst)
    }

    fn check_online(&self) -> Result<(), SyncError> {
        if self.offline.load(Ordering::SeqCst) {
            Err(SyncError::Offline)
        } else {
            Ok(())
        }
    }
}

impl RemoteProgressStore for MemoryRemoteStore {
    async fn fetch(&self, user_id: Uuid) -> Result<Option<ProgressRecord>, SyncError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);

        let latency = self.fetch_latency_ms.load(Ordering::SeqCst);
        if latency > 0 {
            tokio::time::sleep(Duration::from_millis(latency)).await;
        }
        self.check_online()?;

        let value = self.rows().get(&user_id).cloned();
        match value {
            Some(value) => Ok(Some(decode_record(value)?.record)),
            None => Ok(None),
        }
    }

    async fn upsert(&self, user_id: Uuid, record: &ProgressRecord) -> Result<(), SyncError> {
        self.check_online()?;

        let value = serde_json::to_value(record)?;
        self.rows().insert(user_id, value);
        self.upserts.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
