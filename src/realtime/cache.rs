//! Cached remote reads.
//!
//! Keys are segment lists (`["diet-access", "<user>"]`). Invalidating a
//! key drops every entry it prefixes, so `["diet-access"]` also clears the
//! per-user entries. Each invalidation is broadcast so readers holding a
//! view can refetch.

use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use std::sync::RwLock;
use tokio::sync::broadcast;

/// Hierarchical cache key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QueryKey(Vec<String>);

impl QueryKey {
    /// Single-segment key.
    pub fn new(root: impl Into<String>) -> Self {
        Self(vec![root.into()])
    }

    /// Append a segment.
    pub fn with(mut self, segment: impl ToString) -> Self {
        self.0.push(segment.to_string());
        self
    }

    pub fn segments(&self) -> &[String] {
        &self.0
    }

    /// Whether `self` is a prefix of `other`.
    pub fn prefixes(&self, other: &QueryKey) -> bool {
        other.0.starts_with(&self.0)
    }
}

impl std::fmt::Display for QueryKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}]", self.0.join(", "))
    }
}

/// In-memory cache of remote reads with prefix invalidation.
pub struct QueryCache {
    entries: RwLock<HashMap<QueryKey, Value>>,
    invalidated_tx: broadcast::Sender<QueryKey>,
}

impl Default for QueryCache {
    fn default() -> Self {
        Self::new()
    }
}

impl QueryCache {
    pub fn new() -> Self {
        let (invalidated_tx, _) = broadcast::channel(64);
        Self {
            entries: RwLock::new(HashMap::new()),
            invalidated_tx,
        }
    }

    /// Cached value for a key, if still fresh.
    pub fn get(&self, key: &QueryKey) -> Option<Value> {
        self.entries
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(key)
            .cloned()
    }

    pub fn insert(&self, key: QueryKey, value: Value) {
        self.entries
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(key, value);
    }

    pub fn contains(&self, key: &QueryKey) -> bool {
        self.get(key).is_some()
    }

    /// Return the cached value or fetch, cache and return a fresh one.
    pub async fn get_or_fetch<F, Fut, E>(&self, key: QueryKey, fetch: F) -> Result<Value, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Value, E>>,
    {
        if let Some(value) = self.get(&key) {
            return Ok(value);
        }

        let value = fetch().await?;
        self.insert(key, value.clone());
        Ok(value)
    }

    /// Drop every entry under `prefix`. Returns how many were dropped.
    pub fn invalidate(&self, prefix: &QueryKey) -> usize {
        let removed = {
            let mut entries = self
                .entries
                .write()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            let before = entries.len();
            entries.retain(|key, _| !prefix.prefixes(key));
            before - entries.len()
        };

        tracing::debug!("Invalidated {} cached queries under {}", removed, prefix);
        let _ = self.invalidated_tx.send(prefix.clone());
        removed
    }

    /// Subscribe to invalidated prefixes.
    pub fn subscribe(&self) -> broadcast::Receiver<QueryKey> {
        self.invalidated_tx.subscribe()
    }
}
