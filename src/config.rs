use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub emitter: EmitterSettings,
    #[serde(default)]
    pub retention: RetentionConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api: ApiConfig::default(),
            emitter: EmitterSettings::default(),
            retention: RetentionConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    pub enabled: bool,
    pub port: u16,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            port: 7700,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmitterSettings {
    /// Minimum milliseconds between deliveries per throttle key.
    pub throttle_ms: u64,
    /// Flush task tick in milliseconds.
    pub flush_tick_ms: u64,
    /// Broadcast channel capacity for the SSE fan-out.
    pub channel_capacity: usize,
}

impl Default for EmitterSettings {
    fn default() -> Self {
        Self {
            throttle_ms: 200,
            flush_tick_ms: 100,
            channel_capacity: 1024,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetentionConfig {
    /// Terminal swarms retained before the oldest-completed are evicted.
    pub max_completed: usize,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self { max_completed: 100 }
    }
}

impl AppConfig {
    /// Load configuration from a JSON file. A missing file yields the
    /// defaults and writes them out; malformed JSON is an error.
    pub fn load(path: &Path) -> Result<AppConfig, ConfigError> {
        if !path.exists() {
            let config = AppConfig::default();
            config.save(path)?;
            return Ok(config);
        }
        let json = fs::read_to_string(path)?;
        let config: AppConfig = serde_json::from_str(&json)?;
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }
}
