//! Local progress store.
//!
//! Reads and writes the whole `ProgressRecord` under a single storage key.
//! `load` never fails: missing or corrupt data yields a fresh record and the
//! corruption is only logged.

use std::sync::Arc;

use super::migration::decode_record;
use super::storage::{KeyValueStorage, StorageError};
use super::types::ProgressRecord;

/// Default storage key for the progress record.
pub const DEFAULT_PROGRESS_KEY: &str = "personal21_progress";

/// Durable, device-local copy of the progress record.
#[derive(Clone)]
pub struct LocalProgressStore {
    storage: Arc<dyn KeyValueStorage>,
    key: String,
}

impl LocalProgressStore {
    /// Create a store using the default key.
    pub fn new(storage: Arc<dyn KeyValueStorage>) -> Self {
        Self::with_key(storage, DEFAULT_PROGRESS_KEY)
    }

    /// Create a store under a custom key.
    pub fn with_key(storage: Arc<dyn KeyValueStorage>, key: impl Into<String>) -> Self {
        Self {
            storage,
            key: key.into(),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Load the record, upgrading older shapes and persisting the upgrade.
    pub fn load(&self) -> ProgressRecord {
        let raw = match self.storage.get(&self.key) {
            Ok(Some(raw)) => raw,
            Ok(None) => return ProgressRecord::new(),
            Err(e) => {
                tracing::error!("Failed to read progress record: {}", e);
                return ProgressRecord::new();
            }
        };

        let value = match serde_json::from_str(&raw) {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!("Discarding unparsable progress record: {}", e);
                return ProgressRecord::new();
            }
        };

        match decode_record(value) {
            Ok(decoded) => {
                if decoded.was_upgraded() {
                    tracing::info!(
                        "Upgraded progress record from schema v{} to v{}",
                        decoded.from_version,
                        decoded.record.schema_version
                    );
                    if let Err(e) = self.save(&decoded.record) {
                        tracing::warn!("Failed to persist upgraded progress record: {}", e);
                    }
                }
                decoded.record
            }
            Err(e) => {
                tracing::warn!("Discarding corrupt progress record: {}", e);
                ProgressRecord::new()
            }
        }
    }

    /// Replace the stored record.
    pub fn save(&self, record: &ProgressRecord) -> Result<(), StorageError> {
        let json = serde_json::to_string(record)
            .map_err(|e| StorageError::WriteFailed(e.to_string()))?;
        self.storage.set(&self.key, &json)
    }
}

impl std::fmt::Debug for LocalProgressStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalProgressStore")
            .field("key", &self.key)
            .finish_non_exhaustive()
    }
}
