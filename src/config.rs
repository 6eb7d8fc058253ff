//! Application configuration.
//!
//! Loaded from `config.toml` in the platform data directory. A missing
//! file yields defaults; sections and fields left out of the file fall
//! back to their defaults individually.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::progress::DEFAULT_PROGRESS_KEY;

/// Application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Application version
    pub version: String,
    /// Data directory path
    #[serde(skip)]
    pub data_dir: PathBuf,
    /// Local persistence settings
    pub storage: StorageSettings,
    /// Cloud push settings
    pub sync: SyncSettings,
    /// Hosted database connection
    pub remote: RemoteSettings,
    /// Change subscription settings
    pub realtime: RealtimeSettings,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION").to_string(),
            data_dir: PathBuf::new(),
            storage: StorageSettings::default(),
            sync: SyncSettings::default(),
            remote: RemoteSettings::default(),
            realtime: RealtimeSettings::default(),
        }
    }
}

impl AppConfig {
    /// Path of the SQLite progress database.
    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join(&self.storage.database_file)
    }

    /// Whether a remote store is configured and sync is on.
    pub fn cloud_enabled(&self) -> bool {
        self.sync.enabled && !self.remote.base_url.is_empty()
    }

    /// Whether change subscriptions should be opened for a signed-in user.
    pub fn realtime_enabled(&self) -> bool {
        self.cloud_enabled() && self.realtime.enabled
    }
}

/// Local persistence settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    /// Key the progress record is stored under
    pub progress_key: String,
    /// Database file name, relative to the data directory
    pub database_file: String,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            progress_key: DEFAULT_PROGRESS_KEY.to_string(),
            database_file: "progress.db".to_string(),
        }
    }
}

/// Cloud push settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncSettings {
    /// Push local changes to the remote store
    pub enabled: bool,
    /// Quiet period after the last mutation before pushing
    pub debounce_ms: u64,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            debounce_ms: 1000,
        }
    }
}

/// Hosted database connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteSettings {
    /// Project URL, e.g. `https://<project>.supabase.co`
    pub base_url: String,
    /// Public (anon) API key
    pub api_key: String,
    /// Table holding one progress row per user
    pub progress_table: String,
    /// Per-request timeout
    pub request_timeout_secs: u64,
}

impl Default for RemoteSettings {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            api_key: String::new(),
            progress_table: "user_progress".to_string(),
            request_timeout_secs: 15,
        }
    }
}

/// Change subscription settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RealtimeSettings {
    /// Subscribe to row changes while signed in
    pub enabled: bool,
    /// Heartbeat interval in seconds
    pub heartbeat_secs: u64,
}

impl Default for RealtimeSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            heartbeat_secs: 30,
        }
    }
}

/// Get the application data directory.
pub fn get_data_dir() -> PathBuf {
    directories::ProjectDirs::from("com", "personal21", "Personal21")
        .map(|dirs| dirs.data_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Get the configuration file path.
pub fn get_config_path() -> PathBuf {
    get_data_dir().join("config.toml")
}

/// Load application configuration from the default location.
pub fn load_config() -> Result<AppConfig, ConfigError> {
    let mut config = load_config_from(&get_config_path())?;
    config.data_dir = get_data_dir();
    Ok(config)
}

/// Load configuration from a specific file; missing means defaults.
pub fn load_config_from(path: &Path) -> Result<AppConfig, ConfigError> {
    if !path.exists() {
        return Ok(AppConfig::default());
    }

    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::IoError(e.to_string()))?;

    toml::from_str(&content).map_err(|e| ConfigError::ParseError(e.to_string()))
}

/// Save application configuration to the default location.
pub fn save_config(config: &AppConfig) -> Result<(), ConfigError> {
    save_config_to(config, &get_config_path())
}

/// Save configuration to a specific file.
pub fn save_config_to(config: &AppConfig, path: &Path) -> Result<(), ConfigError> {
    // Ensure parent directory exists
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| ConfigError::IoError(e.to_string()))?;
    }

    let content =
        toml::to_string_pretty(config).map_err(|e| ConfigError::SerializeError(e.to_string()))?;

    std::fs::write(path, content).map_err(|e| ConfigError::IoError(e.to_string()))?;

    Ok(())
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Serialize error: {0}")]
    SerializeError(String),
}
