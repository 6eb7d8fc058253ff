//! Durable key-value storage backends for the progress store.
//!
//! The progress store only needs `get`/`set` of whole string values under a
//! single key. `SqliteStorage` is the durable backend; `MemoryStorage` keeps
//! values for the lifetime of the process.

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;
use thiserror::Error;

/// Key-value storage errors.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Failed to open storage: {0}")]
    OpenFailed(String),

    #[error("Read failed: {0}")]
    ReadFailed(String),

    #[error("Write failed: {0}")]
    WriteFailed(String),

    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    #[error("IO error: {0}")]
    IoError(String),
}

/// Durable string storage keyed by name.
pub trait KeyValueStorage: Send + Sync {
    /// Read the value stored under `key`.
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Replace the value stored under `key`.
    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;
}

/// In-process storage.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    values: Mutex<HashMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, String>> {
        self.values.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl KeyValueStorage for MemoryStorage {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.lock().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.lock().insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// Schema version of the SQLite key-value layout.
const KV_SCHEMA_VERSION: i32 = 1;

const SCHEMA_VERSION_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS schema_version (
    version INTEGER PRIMARY KEY,
    applied_at TEXT NOT NULL
);
"#;

const KV_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS kv_store (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL,
    updated_at TEXT NOT NULL
);
"#;

/// SQLite-backed storage.
pub struct SqliteStorage {
    conn: Mutex<Connection>,
}

impl SqliteStorage {
    /// Open or create a storage database at the given path.
    pub fn open(path: &Path) -> Result<Self, StorageError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| StorageError::IoError(e.to_string()))?;
        }

        let conn = Connection::open(path).map_err(|e| StorageError::OpenFailed(e.to_string()))?;
        Self::with_connection(conn)
    }

    /// Open an in-memory database (for testing).
    pub fn open_in_memory() -> Result<Self, StorageError> {
        let conn =
            Connection::open_in_memory().map_err(|e| StorageError::OpenFailed(e.to_string()))?;
        Self::with_connection(conn)
    }

    fn with_connection(conn: Connection) -> Result<Self, StorageError> {
        initialize(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn initialize(conn: &Connection) -> Result<(), StorageError> {
    conn.execute_batch(SCHEMA_VERSION_TABLE)
        .map_err(|e| StorageError::MigrationFailed(e.to_string()))?;

    let current: i32 = conn
        .query_row(
            "SELECT COALESCE(MAX(version), 0) FROM schema_version",
            [],
            |row| row.get(0),
        )
        .map_err(|e| StorageError::MigrationFailed(e.to_string()))?;

    if current < 1 {
        conn.execute_batch(KV_SCHEMA)
            .map_err(|e| StorageError::MigrationFailed(e.to_string()))?;
        conn.execute(
            "INSERT INTO schema_version (version, applied_at) VALUES (?1, ?2)",
            params![KV_SCHEMA_VERSION, Utc::now().to_rfc3339()],
        )
        .map_err(|e| StorageError::MigrationFailed(e.to_string()))?;

        tracing::info!("Key-value store migrated to version {}", KV_SCHEMA_VERSION);
    }

    Ok(())
}

impl KeyValueStorage for SqliteStorage {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        self.lock()
            .query_row(
                "SELECT value FROM kv_store WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()
            .map_err(|e| StorageError::ReadFailed(e.to_string()))
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.lock()
            .execute(
                "INSERT INTO kv_store (key, value, updated_at) VALUES (?1, ?2, ?3)
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
                params![key, value, Utc::now().to_rfc3339()],
            )
            .map_err(|e| StorageError::WriteFailed(e.to_string()))?;
        Ok(())
    }
}
