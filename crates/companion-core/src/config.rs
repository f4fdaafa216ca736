//! Application configuration management.
//!
//! Holds the API base URL, the latency bounds of the startup sequence and an
//! optional simulated position for hosts without positioning hardware.
//!
//! Configuration is stored at `~/.config/companion/config.json`.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::models::Coordinate;

/// Application name used for config/cache directory paths
const APP_NAME: &str = "companion";

/// Config file name
const CONFIG_FILE: &str = "config.json";

/// Default API server
pub const DEFAULT_BASE_URL: &str = "http://68.183.102.75:1337";

/// Latency bounds, in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Timeouts {
    /// Outer deadline for the startup location. Authoritative.
    pub quick_location_ms: u64,
    /// Timeout handed to the provider for the quick read.
    pub quick_provider_ms: u64,
    pub refinement_ms: u64,
    pub data_refresh_ms: u64,
    /// Pause between the first paint and background work.
    pub debounce_ms: u64,
    /// Per-request bound on the HTTP client.
    pub request_secs: u64,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            quick_location_ms: 3000,
            quick_provider_ms: 2500,
            refinement_ms: 30_000,
            data_refresh_ms: 10_000,
            debounce_ms: 100,
            request_secs: 30,
        }
    }
}

impl Timeouts {
    pub fn quick_location(&self) -> Duration {
        Duration::from_millis(self.quick_location_ms)
    }

    pub fn quick_provider(&self) -> Duration {
        Duration::from_millis(self.quick_provider_ms)
    }

    pub fn refinement(&self) -> Duration {
        Duration::from_millis(self.refinement_ms)
    }

    pub fn data_refresh(&self) -> Duration {
        Duration::from_millis(self.data_refresh_ms)
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn request(&self) -> Duration {
        Duration::from_secs(self.request_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub base_url: String,
    pub timeouts: Timeouts,
    pub simulated_position: Option<Coordinate>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeouts: Timeouts::default(),
            simulated_position: None,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        if path.exists() {
            let contents = std::fs::read_to_string(&path)?;
            Ok(serde_json::from_str(&contents)?)
        } else {
            Ok(Self::default())
        }
    }

    /// Write the config file, returning where it went
    pub fn save(&self) -> Result<PathBuf> {
        let path = Self::config_path()?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(&path, contents)?;
        Ok(path)
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    pub fn cache_dir(&self) -> Result<PathBuf> {
        let cache_dir = dirs::cache_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find cache directory"))?;
        Ok(cache_dir.join(APP_NAME))
    }
}
