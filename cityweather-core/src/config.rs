use anyhow::{Context, Result, anyhow};
use chrono::FixedOffset;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::{fs, path::PathBuf, time::Duration};

use crate::icon::NightRule;

pub const API_KEY_ENV: &str = "OPENWEATHER_API_KEY";
pub const DEFAULT_BASE_URL: &str = "https://api.openweathermap.org";
pub const DEFAULT_CITY: &str = "London";
pub const DEFAULT_TIMEOUT_SECS: u64 = 10;
const CACHE_FILE_NAME: &str = "weather_data.json";

/// Top-level configuration stored on disk.
///
/// Example TOML:
/// ```toml
/// api_key = "..."
/// default_city = "Hanoi"
/// utc_offset_minutes = 420
/// night_rule = "step-time"
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// OpenWeather API key; `OPENWEATHER_API_KEY` takes precedence.
    pub api_key: Option<String>,

    /// City shown when no location or search is available.
    pub default_city: String,

    pub base_url: String,

    /// Upper bound for each weather request.
    pub timeout_secs: u64,

    /// Where the last successful fetch is kept; defaults to the data dir.
    pub cache_path: Option<PathBuf>,

    /// Offset used for display and for the daily noon marker. UTC when unset.
    pub utc_offset_minutes: Option<i32>,

    pub night_rule: NightRule,

    /// Dispatch weather alerts after each fresh fetch.
    pub notifications: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_key: None,
            default_city: DEFAULT_CITY.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            cache_path: None,
            utc_offset_minutes: None,
            night_rule: NightRule::default(),
            notifications: true,
        }
    }
}

impl Config {
    /// Load config from disk, or return an empty default if it doesn't exist yet.
    pub fn load() -> Result<Self> {
        let path = Self::config_file_path()?;
        if !path.exists() {
            // First run: no config file, return defaults.
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        Self::from_toml(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    pub fn from_toml(contents: &str) -> Result<Self> {
        let cfg: Config = toml::from_str(contents)?;
        Ok(cfg)
    }

    /// Save config to disk, creating parent directories as needed.
    pub fn save(&self) -> Result<()> {
        let path = Self::config_file_path()?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let toml =
            toml::to_string_pretty(self).context("Failed to serialize configuration to TOML")?;

        fs::write(&path, toml)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    fn project_dirs() -> Result<ProjectDirs> {
        ProjectDirs::from("dev", "cityweather", "cityweather")
            .ok_or_else(|| anyhow!("Could not determine platform config directory"))
    }

    /// Path to the config file.
    pub fn config_file_path() -> Result<PathBuf> {
        Ok(Self::project_dirs()?.config_dir().join("config.toml"))
    }

    /// Path of the offline cache file.
    pub fn cache_file_path(&self) -> Result<PathBuf> {
        match &self.cache_path {
            Some(path) => Ok(path.clone()),
            None => Ok(Self::project_dirs()?.data_dir().join(CACHE_FILE_NAME)),
        }
    }

    /// API key from the environment, falling back to the config file.
    pub fn api_key(&self) -> Result<String> {
        let from_env = std::env::var(API_KEY_ENV).ok().filter(|k| !k.trim().is_empty());
        self.resolve_api_key(from_env)
    }

    fn resolve_api_key(&self, from_env: Option<String>) -> Result<String> {
        from_env
            .or_else(|| self.api_key.clone().filter(|k| !k.trim().is_empty()))
            .ok_or_else(|| {
                anyhow!(
                    "No OpenWeather API key configured.\n\
                     Hint: run `cityweather configure` or set {API_KEY_ENV}."
                )
            })
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn utc_offset(&self) -> Result<FixedOffset> {
        let minutes = self.utc_offset_minutes.unwrap_or(0);
        FixedOffset::east_opt(minutes * 60)
            .ok_or_else(|| anyhow!("utc_offset_minutes out of range: {minutes}"))
    }
}
