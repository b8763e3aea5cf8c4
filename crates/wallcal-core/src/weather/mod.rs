//! Weather synchronization.
//!
//! Fetches current conditions, a 24 hour strip and a 7 day outlook from
//! Open-Meteo and flattens them into `weather_*` Meta keys.

pub mod engine;
pub mod open_meteo;

use std::path::PathBuf;

pub use engine::{weather_once, WeatherReport, WeatherStatus, WeatherSyncService, WeatherSyncer};
pub use open_meteo::{DailyEntry, HourlyEntry, WeatherSnapshot};

pub const DEFAULT_WEATHER_API_URL: &str = "https://api.open-meteo.com/v1/forecast";

/// Shortest allowed interval between weather fetches.
pub const MIN_INTERVAL_SECS: u64 = 60;

/// Immutable configuration for the weather engine.
#[derive(Debug, Clone, PartialEq)]
pub struct WeatherConfig {
    pub db_path: PathBuf,
    pub enabled: bool,
    pub latitude: f64,
    pub longitude: f64,
    pub sync_interval_sec: u64,
    pub api_url: String,
    pub request_timeout_sec: u64,
}

impl Default for WeatherConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from("./data/calendar.db"),
            enabled: false,
            latitude: 0.0,
            longitude: 0.0,
            sync_interval_sec: 900,
            api_url: DEFAULT_WEATHER_API_URL.to_string(),
            request_timeout_sec: crate::sync::types::DEFAULT_REQUEST_TIMEOUT_SECS,
        }
    }
}

impl WeatherConfig {
    pub fn with_api_url(self, api_url: impl Into<String>) -> Self {
        Self {
            api_url: api_url.into(),
            ..self
        }
    }

    pub fn with_db_path(self, db_path: impl Into<PathBuf>) -> Self {
        Self {
            db_path: db_path.into(),
            ..self
        }
    }

    pub fn with_location(self, latitude: f64, longitude: f64) -> Self {
        Self {
            enabled: true,
            latitude,
            longitude,
            ..self
        }
    }

    pub fn interval_secs(&self) -> u64 {
        self.sync_interval_sec.max(MIN_INTERVAL_SECS)
    }
}
