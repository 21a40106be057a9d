use log::{debug, info};
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Result, SyncError};

pub const API_URL_ENV: &str = "MARKETCHAT_API_URL";
pub const SOCKET_URL_ENV: &str = "MARKETCHAT_SOCKET_URL";

static CONFIG_DIR_OVERRIDE: OnceCell<PathBuf> = OnceCell::new();

/// Tunables for the synchronization engine and its collaborators
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    pub api_base_url: String,
    pub socket_url: String,
    pub history_page_size: usize,
    pub match_window_ms: i64,
    pub typing_auto_stop_ms: u64,
    pub typing_expiry_ms: u64,
    pub search_debounce_ms: u64,
    pub request_timeout_secs: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        SyncConfig {
            api_base_url: "http://localhost:5000/api".to_string(),
            socket_url: "ws://localhost:5000/socket".to_string(),
            history_page_size: 50,
            match_window_ms: 5000,
            typing_auto_stop_ms: 3000,
            typing_expiry_ms: 5000,
            search_debounce_ms: 300,
            request_timeout_secs: 15,
        }
    }
}

impl SyncConfig {
    pub fn typing_auto_stop(&self) -> Duration {
        Duration::from_millis(self.typing_auto_stop_ms)
    }

    pub fn typing_expiry(&self) -> Duration {
        Duration::from_millis(self.typing_expiry_ms)
    }

    pub fn search_debounce(&self) -> Duration {
        Duration::from_millis(self.search_debounce_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Load from a JSON file; a missing file yields the defaults
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!("No config file at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let file = File::open(path)?;
        let config: SyncConfig = serde_json::from_reader(file)
            .map_err(|e| SyncError::Config(format!("{}: {}", path.display(), e)))?;
        info!("Loaded configuration from {}", path.display());
        config.validate()?;
        Ok(config)
    }

    /// Load the default config file and apply environment overrides
    pub fn load() -> Result<Self> {
        let mut config = Self::load_from(&config_dir()?.join("config.json"))?;
        config.apply_env();
        Ok(config)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        let file = File::create(path)?;
        serde_json::to_writer_pretty(file, self)?;
        Ok(())
    }

    pub fn apply_env(&mut self) {
        if let Ok(url) = std::env::var(API_URL_ENV) {
            self.api_base_url = url;
        }
        if let Ok(url) = std::env::var(SOCKET_URL_ENV) {
            self.socket_url = url;
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.api_base_url.trim().is_empty() {
            return Err(SyncError::Config("api_base_url is empty".to_string()));
        }
        if self.socket_url.trim().is_empty() {
            return Err(SyncError::Config("socket_url is empty".to_string()));
        }
        if self.match_window_ms <= 0 {
            return Err(SyncError::Config("match_window_ms must be positive".to_string()));
        }
        if self.history_page_size == 0 {
            return Err(SyncError::Config("history_page_size must be positive".to_string()));
        }
        Ok(())
    }
}

/// Redirect the config directory, e.g. from a `--config-dir` flag
pub fn set_config_dir_override(dir: PathBuf) {
    let _ = CONFIG_DIR_OVERRIDE.set(dir);
}

pub fn config_dir() -> Result<PathBuf> {
    if let Some(dir) = CONFIG_DIR_OVERRIDE.get() {
        return Ok(dir.clone());
    }
    let config_dir = dirs::config_dir()
        .ok_or_else(|| SyncError::Config("could not determine config directory".to_string()))?
        .join("marketchat");

    if !config_dir.exists() {
        fs::create_dir_all(&config_dir)?;
    }

    Ok(config_dir)
}
