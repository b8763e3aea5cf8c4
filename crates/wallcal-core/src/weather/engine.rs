//! Weather sync engine.

use reqwest::blocking::Client;
use tracing::{debug, error, info, warn};

use super::open_meteo::{self, WeatherSnapshot};
use super::WeatherConfig;
use crate::error::{CoreError, WeatherError};
use crate::integrations::http::{self, fetch_text};
use crate::storage::{meta, LocalCache};
use crate::time_util::now_ts;
use crate::worker::{BackgroundWorker, CancelToken};

/// Value of the `weather_status` Meta key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WeatherStatus {
    Disabled,
    Config,
    Online,
    Offline,
}

impl WeatherStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            WeatherStatus::Disabled => "disabled",
            WeatherStatus::Config => "config",
            WeatherStatus::Online => "online",
            WeatherStatus::Offline => "offline",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WeatherReport {
    pub status: WeatherStatus,
    pub error: Option<WeatherError>,
}

pub struct WeatherSyncer {
    config: WeatherConfig,
    http: Option<Client>,
}

impl WeatherSyncer {
    pub fn new(config: WeatherConfig) -> Self {
        Self { config, http: None }
    }

    pub fn config(&self) -> &WeatherConfig {
        &self.config
    }

    pub fn run_cycle(&mut self, cache: &LocalCache, now: i64) -> WeatherReport {
        let report = if !self.config.enabled {
            WeatherReport {
                status: WeatherStatus::Disabled,
                error: None,
            }
        } else if !open_meteo::is_valid_coords(self.config.latitude, self.config.longitude) {
            debug!(
                latitude = self.config.latitude,
                longitude = self.config.longitude,
                "weather coordinates invalid"
            );
            WeatherReport {
                status: WeatherStatus::Config,
                error: Some(WeatherError::InvalidCoordinates),
            }
        } else {
            match self.fetch().and_then(|snapshot| store_snapshot(cache, &snapshot)) {
                Ok(()) => WeatherReport {
                    status: WeatherStatus::Online,
                    error: None,
                },
                Err(err) => {
                    warn!(error = %err, "weather sync failed");
                    WeatherReport {
                        status: WeatherStatus::Offline,
                        error: Some(err),
                    }
                }
            }
        };

        set_meta(cache, meta::WEATHER_STATUS, report.status.as_str());
        let error = report
            .error
            .as_ref()
            .map(ToString::to_string)
            .unwrap_or_default();
        set_meta(cache, meta::WEATHER_ERROR, &error);
        if report.status == WeatherStatus::Online {
            set_meta(cache, meta::WEATHER_LAST_SYNC_TS, &now.to_string());
        }
        report
    }

    fn fetch(&mut self) -> Result<WeatherSnapshot, WeatherError> {
        let client = self.client()?;
        let query = open_meteo::forecast_query(self.config.latitude, self.config.longitude);
        let body = fetch_text(client.get(&self.config.api_url).query(&query))?;
        open_meteo::parse_forecast(&body)
    }

    fn client(&mut self) -> Result<Client, WeatherError> {
        if let Some(client) = &self.http {
            return Ok(client.clone());
        }
        let client = http::build_client(self.config.request_timeout_sec).map_err(|e| {
            error!(error = %e, "failed to build http client");
            WeatherError::Transport
        })?;
        self.http = Some(client.clone());
        Ok(client)
    }
}

fn set_meta(cache: &LocalCache, key: &str, value: &str) {
    if let Err(e) = cache.set_meta(key, value) {
        warn!(key, error = %e, "failed to write meta");
    }
}

/// Write every forecast key at once.
fn store_snapshot(cache: &LocalCache, snapshot: &WeatherSnapshot) -> Result<(), WeatherError> {
    let hourly = serde_json::to_string(&snapshot.hourly).map_err(|_| WeatherError::Storage)?;
    let daily = serde_json::to_string(&snapshot.daily).map_err(|_| WeatherError::Storage)?;

    let mut entries = vec![
        (meta::WEATHER_TEMP_C, format!("{:.1}", snapshot.temp_c)),
        (meta::WEATHER_CODE, snapshot.code.to_string()),
        (
            meta::WEATHER_IS_DAY,
            if snapshot.is_day { "1" } else { "0" }.to_string(),
        ),
        (meta::WEATHER_SUMMARY, snapshot.summary().to_string()),
        (meta::WEATHER_HOURLY_JSON, hourly),
        (meta::WEATHER_DAILY_JSON, daily),
    ];
    if let Some(wind) = snapshot.wind_kmh {
        entries.push((meta::WEATHER_WIND_KMH, format!("{wind:.1}")));
    }

    cache.set_meta_batch(&entries).map_err(|e| {
        warn!(error = %e, "failed to store weather snapshot");
        WeatherError::Storage
    })?;
    info!(
        temp_c = snapshot.temp_c,
        code = snapshot.code,
        hours = snapshot.hourly.len(),
        days = snapshot.daily.len(),
        "weather updated"
    );
    Ok(())
}

/// Open the configured cache and run a single cycle.
pub fn weather_once(config: WeatherConfig) -> Result<WeatherReport, CoreError> {
    let cache = LocalCache::open(&config.db_path)?;
    Ok(WeatherSyncer::new(config).run_cycle(&cache, now_ts()))
}

fn run_loop(config: WeatherConfig, token: CancelToken) {
    let cache = match LocalCache::open(&config.db_path) {
        Ok(cache) => cache,
        Err(e) => {
            error!(error = %e, "weather sync could not open cache, exiting");
            return;
        }
    };
    let interval = config.interval_secs();
    let mut syncer = WeatherSyncer::new(config);
    info!(interval, enabled = syncer.config().enabled, "weather sync started");

    while !token.is_cancelled() {
        syncer.run_cycle(&cache, now_ts());
        if !token.sleep_secs(interval) {
            break;
        }
    }
    info!("weather sync stopped");
}

/// Background weather sync thread.
pub struct WeatherSyncService {
    config: WeatherConfig,
    worker: Option<BackgroundWorker>,
}

impl WeatherSyncService {
    pub fn new(config: WeatherConfig) -> Self {
        Self {
            config,
            worker: None,
        }
    }

    pub fn start(&mut self) -> Result<(), CoreError> {
        if self.is_running() {
            return Ok(());
        }
        let config = self.config.clone();
        self.worker = Some(BackgroundWorker::spawn("weather-sync", move |token| {
            run_loop(config, token)
        })?);
        Ok(())
    }

    pub fn stop(&mut self) {
        if let Some(mut worker) = self.worker.take() {
            worker.stop();
        }
    }

    pub fn is_running(&self) -> bool {
        self.worker.as_ref().is_some_and(BackgroundWorker::is_running)
    }
}

impl Drop for WeatherSyncService {
    fn drop(&mut self) {
        self.stop();
    }
}
