//! Hosted database remote store.
//!
//! Talks to the progress table through the database's REST interface:
//! one row per user (`user_id`, `progress_data`, `synced_at`), read with a
//! filtered select and written with an upsert on `user_id`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::RwLock;
use std::time::Duration;
use uuid::Uuid;

use super::{RemoteProgressStore, SyncError};
use crate::config::RemoteSettings;
use crate::progress::migration::decode_record;
use crate::progress::ProgressRecord;

#[derive(Debug, Deserialize)]
struct ProgressRow {
    progress_data: Option<serde_json::Value>,
}

#[derive(Debug, Serialize)]
struct UpsertRow<'a> {
    user_id: Uuid,
    progress_data: &'a ProgressRecord,
    synced_at: DateTime<Utc>,
}

/// Remote store backed by the hosted database's REST API.
pub struct HttpRemoteStore {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    table: String,
    /// Session token of the signed-in user
    access_token: RwLock<Option<String>>,
}

impl HttpRemoteStore {
    /// Create a store from remote settings.
    pub fn new(settings: &RemoteSettings) -> Result<Self, SyncError> {
        if settings.base_url.is_empty() {
            return Err(SyncError::NotConfigured("remote.base_url is empty".to_string()));
        }

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.request_timeout_secs))
            .build()
            .map_err(|e| SyncError::NotConfigured(e.to_string()))?;

        Ok(Self {
            http,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            api_key: settings.api_key.clone(),
            table: settings.progress_table.clone(),
            access_token: RwLock::new(None),
        })
    }

    /// Set or clear the signed-in user's session token.
    pub fn set_access_token(&self, token: Option<String>) {
        *self
            .access_token
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = token;
    }

    fn bearer(&self) -> String {
        self.access_token
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
            .unwrap_or_else(|| self.api_key.clone())
    }

    fn table_url(&self) -> String {
        format!("{}/rest/v1/{}", self.base_url, self.table)
    }

    fn fetch_request(&self, user_id: Uuid) -> Result<reqwest::Request, SyncError> {
        self.http
            .get(self.table_url())
            .query(&[
                ("select", "progress_data".to_string()),
                ("user_id", format!("eq.{}", user_id)),
            ])
            .header("apikey", &self.api_key)
            .bearer_auth(self.bearer())
            .build()
            .map_err(|e| SyncError::NotConfigured(e.to_string()))
    }

    fn upsert_request(
        &self,
        user_id: Uuid,
        record: &ProgressRecord,
    ) -> Result<reqwest::Request, SyncError> {
        let rows = [UpsertRow {
            user_id,
            progress_data: record,
            synced_at: Utc::now(),
        }];

        self.http
            .post(self.table_url())
            .query(&[("on_conflict", "user_id")])
            .header("apikey", &self.api_key)
            .header("Prefer", "resolution=merge-duplicates,return=minimal")
            .bearer_auth(self.bearer())
            .json(&rows)
            .build()
            .map_err(|e| SyncError::Serialization(e.to_string()))
    }

    async fn execute(&self, request: reqwest::Request) -> Result<reqwest::Response, SyncError> {
        let response = self.http.execute(request).await.map_err(map_transport_error)?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let message = response.text().await.unwrap_or_default();
        Err(SyncError::Api {
            status: status.as_u16(),
            message,
        })
    }
}

fn map_transport_error(err: reqwest::Error) -> SyncError {
    if err.is_connect() || err.is_timeout() {
        SyncError::Offline
    } else {
        SyncError::Api {
            status: err.status().map(|s| s.as_u16()).unwrap_or(0),
            message: err.to_string(),
        }
    }
}

impl RemoteProgressStore for HttpRemoteStore {
    async fn fetch(&self, user_id: Uuid) -> Result<Option<ProgressRecord>, SyncError> {
        let request = self.fetch_request(user_id)?;
        let response = self.execute(request).await?;

        let rows: Vec<ProgressRow> = response
            .json()
            .await
            .map_err(|e| SyncError::Serialization(e.to_string()))?;

        match rows.into_iter().next().and_then(|row| row.progress_data) {
            Some(value) => Ok(Some(decode_record(value)?.record)),
            None => Ok(None),
        }
    }

    async fn upsert(&self, user_id: Uuid, record: &ProgressRecord) -> Result<(), SyncError> {
        let request = self.upsert_request(user_id, record)?;
        self.execute(request).await?;
        Ok(())
    }
}
