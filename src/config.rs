use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::sync::RetryPolicy;

pub const DEFAULT_CONFIG_PATH: &str = "config/chat.json";
pub const DEFAULT_DB_PATH: &str = "data/chat.db";

pub const ENV_REST_URL: &str = "CHAT_REST_URL";
pub const ENV_REST_API_KEY: &str = "CHAT_REST_API_KEY";
pub const ENV_DB_PATH: &str = "CHAT_DB_PATH";

/// Where messages and participants live.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum BackendConfig {
    /// Embedded SQLite file with in-process realtime delivery.
    Sqlite { path: String },
    /// Hosted PostgREST endpoint; no realtime channel.
    Rest { url: String, api_key: String },
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self::Sqlite {
            path: DEFAULT_DB_PATH.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityConfig {
    #[serde(default = "default_retry_attempts")]
    pub retry_attempts: u32,
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
}

fn default_retry_attempts() -> u32 {
    5
}

fn default_retry_delay_ms() -> u64 {
    500
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            retry_attempts: default_retry_attempts(),
            retry_delay_ms: default_retry_delay_ms(),
        }
    }
}

impl IdentityConfig {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            attempts: self.retry_attempts,
            delay: Duration::from_millis(self.retry_delay_ms),
        }
    }
}

fn default_channel_capacity() -> usize {
    100
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub backend: BackendConfig,
    #[serde(default)]
    pub identity: IdentityConfig,
    /// Buffer size of the front end <-> session channels.
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            backend: BackendConfig::default(),
            identity: IdentityConfig::default(),
            channel_capacity: default_channel_capacity(),
        }
    }
}

impl AppConfig {
    /// Applies environment overrides. `lookup` is normally `std::env::var(..).ok()`.
    pub fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let non_empty = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        if let Some(url) = non_empty(ENV_REST_URL) {
            let api_key = non_empty(ENV_REST_API_KEY).unwrap_or_default();
            if api_key.is_empty() {
                log::warn!("{ENV_REST_URL} set without {ENV_REST_API_KEY}");
            }
            self.backend = BackendConfig::Rest { url, api_key };
        } else if let Some(path) = non_empty(ENV_DB_PATH) {
            self.backend = BackendConfig::Sqlite { path };
        }

        self.channel_capacity = self.channel_capacity.max(1);
        self
    }
}

pub fn load_config(path: &str) -> AppConfig {
    let path = Path::new(path);
    match fs::read_to_string(path) {
        Ok(content) => match serde_json::from_str::<AppConfig>(&content) {
            Ok(config) => config,
            Err(err) => {
                log::warn!("Failed to parse config file {}: {err}", path.display());
                AppConfig::default()
            }
        },
        Err(err) => {
            log::info!(
                "Config file {} not found ({err}); using defaults",
                path.display()
            );
            AppConfig::default()
        }
    }
}

/// Config file merged with the process environment.
pub fn load_effective_config(path: &str) -> AppConfig {
    load_config(path).with_overrides(|key| std::env::var(key).ok())
}

pub fn save_config(path: &str, config: &AppConfig) -> std::io::Result<()> {
    if let Some(parent) = Path::new(path).parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    let json = serde_json::to_string_pretty(config)?;
    fs::write(path, json)
}
