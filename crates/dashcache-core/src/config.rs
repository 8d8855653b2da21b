//! Application configuration management.
//!
//! This module handles loading and saving the application configuration:
//! the API base URL and token, cache and debounce timings, default page size,
//! and the user name that scopes persisted filter selections.
//!
//! Configuration is stored at `~/.config/dashcache/config.json`.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::cache::DEFAULT_TTL;
use crate::schedule::DEFAULT_QUIESCENCE;

/// Application name used for config directory paths
pub const APP_NAME: &str = "dashcache";

/// Config file name
const CONFIG_FILE: &str = "config.json";

const DEFAULT_API_BASE_URL: &str = "http://localhost:3000/api";
const DEFAULT_PAGE_SIZE: usize = 10;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub api_base_url: String,
    pub api_token: Option<String>,
    pub cache_ttl_secs: u64,
    pub debounce_ms: u64,
    pub auto_refresh_secs: Option<u64>,
    pub page_size: usize,
    pub user: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            api_token: None,
            cache_ttl_secs: DEFAULT_TTL.as_secs(),
            debounce_ms: DEFAULT_QUIESCENCE.as_millis() as u64,
            auto_refresh_secs: None,
            page_size: DEFAULT_PAGE_SIZE,
            user: None,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    pub fn load_from(path: &std::path::Path) -> Result<Self> {
        if path.exists() {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, path: &std::path::Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    pub fn config_dir() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME))
    }

    fn config_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join(CONFIG_FILE))
    }

    /// Scope for persisted filter selections.
    pub fn user_scope(&self) -> &str {
        self.user.as_deref().unwrap_or("default")
    }

    pub fn auto_refresh(&self) -> Option<Duration> {
        self.auto_refresh_secs
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
    }

    pub fn service_options(&self) -> ServiceOptions {
        ServiceOptions {
            cache_ttl: Duration::from_secs(self.cache_ttl_secs),
            debounce: Duration::from_millis(self.debounce_ms),
        }
    }
}

/// Runtime knobs handed to every resource service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServiceOptions {
    pub cache_ttl: Duration,
    pub debounce: Duration,
}

impl Default for ServiceOptions {
    fn default() -> Self {
        Self {
            cache_ttl: DEFAULT_TTL,
            debounce: DEFAULT_QUIESCENCE,
        }
    }
}
