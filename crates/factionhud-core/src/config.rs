//! Application configuration management.
//!
//! Holds the tunables for the network layer and the roster poller, plus the
//! location of the local data store. Credentials are not kept here; they live
//! in the key-value store under `apiKey` / `tornStatsKey`.
//!
//! Configuration is stored at `~/.config/factionhud/config.json`.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Application name used for config/data directory paths
pub const APP_NAME: &str = "factionhud";

/// Config file name
const CONFIG_FILE: &str = "config.json";

/// Environment variable overriding the stored Torn API key
pub const API_KEY_ENV: &str = "FACTIONHUD_API_KEY";

/// Environment variable overriding the stored TornStats key
pub const TORNSTATS_KEY_ENV: &str = "FACTIONHUD_TORNSTATS_KEY";

/// Torn allows 100 calls per key per minute.
const DEFAULT_API_RATE_LIMIT: usize = 100;

const DEFAULT_CACHE_DURATION_MS: u64 = 30_000;
const DEFAULT_POLL_INTERVAL_MS: u64 = 30_000;
const DEFAULT_RATE_LIMIT_COOLDOWN_MS: u64 = 2_000;
const DEFAULT_RETRY_DELAY_MS: u64 = 5_000;
const DEFAULT_MAX_RETRIES: u32 = 3;
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

const DEFAULT_TORN_API_URL: &str = "https://api.torn.com";
const DEFAULT_TORNSTATS_URL: &str = "https://www.tornstats.com/api/v2";
const DEFAULT_YATA_URL: &str = "https://yata.yt/api/v1";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Maximum remote calls admitted within any trailing 60 s window
    pub api_rate_limit: usize,
    pub cache_duration_ms: u64,
    pub poll_interval_ms: u64,
    /// Wait applied once the rate window is full
    pub rate_limit_cooldown_ms: u64,
    /// Wait before retrying a "too many requests" response
    pub retry_delay_ms: u64,
    pub max_retries: u32,
    pub request_timeout_secs: u64,
    pub torn_api_url: String,
    pub tornstats_url: String,
    pub yata_url: String,
    /// Overrides the platform data directory for the key-value store
    pub data_dir: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_rate_limit: DEFAULT_API_RATE_LIMIT,
            cache_duration_ms: DEFAULT_CACHE_DURATION_MS,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            rate_limit_cooldown_ms: DEFAULT_RATE_LIMIT_COOLDOWN_MS,
            retry_delay_ms: DEFAULT_RETRY_DELAY_MS,
            max_retries: DEFAULT_MAX_RETRIES,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            torn_api_url: DEFAULT_TORN_API_URL.to_string(),
            tornstats_url: DEFAULT_TORNSTATS_URL.to_string(),
            yata_url: DEFAULT_YATA_URL.to_string(),
            data_dir: None,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        if path.exists() {
            let contents = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            Ok(serde_json::from_str(&contents).context("Failed to parse config file")?)
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self) -> Result<()> {
        let path = Self::config_path()?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    /// Directory holding the JSON key-value store and log files
    pub fn data_dir(&self) -> Result<PathBuf> {
        if let Some(ref dir) = self.data_dir {
            return Ok(dir.clone());
        }
        let data_dir = dirs::data_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find data directory"))?;
        Ok(data_dir.join(APP_NAME))
    }

    pub fn cache_duration(&self) -> Duration {
        Duration::from_millis(self.cache_duration_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn rate_limit_cooldown(&self) -> Duration {
        Duration::from_millis(self.rate_limit_cooldown_ms)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_torn_budget() {
        let config = Config::default();
        assert_eq!(config.api_rate_limit, 100);
        assert_eq!(config.cache_duration(), Duration::from_secs(30));
        assert_eq!(config.poll_interval(), Duration::from_secs(30));
        assert_eq!(config.rate_limit_cooldown(), Duration::from_secs(2));
        assert_eq!(config.retry_delay(), Duration::from_secs(5));
    }

    #[test]
    fn test_partial_config_fills_defaults() {
        let config: Config = serde_json::from_str(r#"{"poll_interval_ms": 10000}"#)
            .expect("partial config should parse");
        assert_eq!(config.poll_interval_ms, 10_000);
        assert_eq!(config.api_rate_limit, 100);
        assert_eq!(config.torn_api_url, "https://api.torn.com");
    }

    #[test]
    fn test_data_dir_override() {
        let config = Config {
            data_dir: Some(PathBuf::from("/tmp/hud")),
            ..Config::default()
        };
        assert_eq!(config.data_dir().expect("override"), PathBuf::from("/tmp/hud"));
    }
}
