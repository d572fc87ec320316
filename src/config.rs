//! Application configuration.
//!
//! Loaded from a TOML file with environment-variable overrides; every field
//! has a serde default so a missing file or section still yields a usable
//! configuration.

use std::env;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

/// Top-level application configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub messaging: MessagingConfig,
}

/// Log subscriber configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub with_target: bool,
    #[serde(default)]
    pub with_thread_ids: bool,
    #[serde(default)]
    pub with_file: bool,
    #[serde(default)]
    pub with_line_number: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            with_target: false,
            with_thread_ids: false,
            with_file: false,
            with_line_number: false,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Messaging core tunables.
#[derive(Debug, Clone, Deserialize)]
pub struct MessagingConfig {
    /// Typing indicator expiry in milliseconds.
    #[serde(default = "default_typing_expiry_ms")]
    pub typing_expiry_ms: u64,
    /// Maximum messages returned by a single history page.
    #[serde(default = "default_history_page_size")]
    pub history_page_size: usize,
    /// Attempts for best-effort email notification delivery.
    #[serde(default = "default_notify_max_attempts")]
    pub notify_max_attempts: u32,
    /// Base backoff between notification attempts in milliseconds.
    #[serde(default = "default_notify_backoff_ms")]
    pub notify_backoff_ms: u64,
    /// Internal retry budget for transient store conflicts and outages.
    #[serde(default = "default_conflict_retry_limit")]
    pub conflict_retry_limit: u32,
    /// Base backoff between store retries in milliseconds. Applied only to
    /// unavailability; conflicts are retried immediately.
    #[serde(default = "default_store_retry_backoff_ms")]
    pub store_retry_backoff_ms: u64,
}

impl Default for MessagingConfig {
    fn default() -> Self {
        Self {
            typing_expiry_ms: default_typing_expiry_ms(),
            history_page_size: default_history_page_size(),
            notify_max_attempts: default_notify_max_attempts(),
            notify_backoff_ms: default_notify_backoff_ms(),
            conflict_retry_limit: default_conflict_retry_limit(),
            store_retry_backoff_ms: default_store_retry_backoff_ms(),
        }
    }
}

fn default_typing_expiry_ms() -> u64 {
    2_000
}

fn default_history_page_size() -> usize {
    50
}

fn default_notify_max_attempts() -> u32 {
    3
}

fn default_notify_backoff_ms() -> u64 {
    200
}

fn default_conflict_retry_limit() -> u32 {
    5
}

fn default_store_retry_backoff_ms() -> u64 {
    50
}

impl AppConfig {
    /// Load configuration from a TOML file, then apply env overrides.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        let mut config: AppConfig = toml::from_str(&raw)
            .with_context(|| format!("failed to parse config file {}", path.display()))?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Build from defaults plus env overrides, for when no file is present.
    pub fn from_env() -> Self {
        let mut config = AppConfig::default();
        config.apply_env_overrides();
        config
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(level) = env::var("RENTHAVEN_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Some(value) = env_u64("RENTHAVEN_TYPING_EXPIRY_MS") {
            self.messaging.typing_expiry_ms = value;
        }
        if let Some(value) = env_u64("RENTHAVEN_HISTORY_PAGE_SIZE") {
            self.messaging.history_page_size = value as usize;
        }
        if let Some(value) = env_u64("RENTHAVEN_NOTIFY_MAX_ATTEMPTS") {
            self.messaging.notify_max_attempts = value as u32;
        }
        if let Some(value) = env_u64("RENTHAVEN_NOTIFY_BACKOFF_MS") {
            self.messaging.notify_backoff_ms = value;
        }
        if let Some(value) = env_u64("RENTHAVEN_CONFLICT_RETRY_LIMIT") {
            self.messaging.conflict_retry_limit = value as u32;
        }
        if let Some(value) = env_u64("RENTHAVEN_STORE_RETRY_BACKOFF_MS") {
            self.messaging.store_retry_backoff_ms = value;
        }
    }
}

fn env_u64(key: &str) -> Option<u64> {
    env::var(key).ok().and_then(|value| value.parse::<u64>().ok())
}
