//! Application configuration.
//!
//! The kiosk reads a single JSON file at startup (`config/config.json` by
//! default). A path ending in `.toml` is read as TOML instead. Every key is
//! optional; missing keys fall back to the defaults below. Display-only keys
//! (fonts, sprites, idle cycling) belong to the renderer and are ignored here.
//!
//! The loaded [`AppConfig`] is resolved once into the immutable
//! [`SyncConfig`] and [`WeatherConfig`] values handed to the engines.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::sync::SyncConfig;
use crate::weather::WeatherConfig;

pub const DEFAULT_CONFIG_PATH: &str = "config/config.json";

/// Weather section of the app config.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeatherSection {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub latitude: f64,
    #[serde(default)]
    pub longitude: f64,
    #[serde(default = "default_weather_interval")]
    pub sync_interval_sec: u64,
}

/// Application configuration as stored on disk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_sync_interval")]
    pub sync_interval_sec: u64,
    #[serde(default = "default_time_window_days")]
    pub time_window_days: u32,
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,
    #[serde(default = "default_token_path")]
    pub token_path: PathBuf,
    #[serde(default = "default_true")]
    pub mock_mode: bool,
    #[serde(default)]
    pub ics_url: String,
    #[serde(default = "default_calendar_ids")]
    pub calendar_ids: Vec<String>,
    #[serde(default)]
    pub client_id: String,
    #[serde(default)]
    pub client_secret: String,
    #[serde(default)]
    pub weather: WeatherSection,
}

fn default_sync_interval() -> u64 {
    120
}
fn default_time_window_days() -> u32 {
    14
}
fn default_weather_interval() -> u64 {
    900
}
fn default_db_path() -> PathBuf {
    PathBuf::from("./data/calendar.db")
}
fn default_token_path() -> PathBuf {
    PathBuf::from("./data/token.json")
}
fn default_calendar_ids() -> Vec<String> {
    vec!["primary".to_string()]
}
fn default_true() -> bool {
    true
}

impl Default for WeatherSection {
    fn default() -> Self {
        Self {
            enabled: false,
            latitude: 0.0,
            longitude: 0.0,
            sync_interval_sec: default_weather_interval(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            sync_interval_sec: default_sync_interval(),
            time_window_days: default_time_window_days(),
            db_path: default_db_path(),
            token_path: default_token_path(),
            mock_mode: true,
            ics_url: String::new(),
            calendar_ids: default_calendar_ids(),
            client_id: String::new(),
            client_secret: String::new(),
            weather: WeatherSection::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from `path`.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or parsed.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::LoadFailed {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        let is_toml = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"));
        let mut config = if is_toml {
            Self::from_toml_str(&content)?
        } else {
            Self::from_json_str(&content)?
        };
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_str(content: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(content).map_err(|e| ConfigError::ParseFailed(e.to_string()))
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::ParseFailed(e.to_string()))
    }

    /// `WALLCAL_ICS_URL` and `WALLCAL_DB_PATH` override the file, so the
    /// feed secret can stay out of the config on shared images.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(url) = std::env::var("WALLCAL_ICS_URL") {
            self.ics_url = url;
        }
        if let Ok(path) = std::env::var("WALLCAL_DB_PATH") {
            if !path.trim().is_empty() {
                self.db_path = PathBuf::from(path);
            }
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sync_interval_sec == 0 {
            return Err(ConfigError::InvalidValue {
                key: "sync_interval_sec".to_string(),
                message: "must be at least 1".to_string(),
            });
        }
        if self.time_window_days == 0 {
            return Err(ConfigError::InvalidValue {
                key: "time_window_days".to_string(),
                message: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }

    /// Calendar engine configuration snapshot.
    pub fn sync_config(&self) -> SyncConfig {
        SyncConfig {
            db_path: self.db_path.clone(),
            token_path: self.token_path.clone(),
            ics_url: self.ics_url.clone(),
            calendar_ids: self.calendar_ids.clone(),
            sync_interval_sec: self.sync_interval_sec,
            time_window_days: self.time_window_days,
            mock_mode: self.mock_mode,
            client_id: self.client_id.clone(),
            client_secret: self.client_secret.clone(),
            ..SyncConfig::default()
        }
    }

    /// Weather engine configuration snapshot.
    pub fn weather_config(&self) -> WeatherConfig {
        WeatherConfig {
            db_path: self.db_path.clone(),
            enabled: self.weather.enabled,
            latitude: self.weather.latitude,
            longitude: self.weather.longitude,
            sync_interval_sec: self.weather.sync_interval_sec,
            ..WeatherConfig::default()
        }
    }
}
