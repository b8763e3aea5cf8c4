//! Calendar sync configuration and status types.

use std::path::PathBuf;

use crate::error::SyncError;
use crate::integrations::OAuthClientConfig;
use crate::time_util::SECONDS_PER_DAY;

pub const DEFAULT_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
pub const DEFAULT_API_BASE_URL: &str = "https://www.googleapis.com/calendar/v3";
pub const DEFAULT_PROBE_URL: &str = "http://connectivitycheck.gstatic.com/generate_204";
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 15;

/// Immutable configuration for the calendar sync engine.
///
/// Built once from the app config. Variations are expressed with the
/// `with_*` constructors, which return a new value.
#[derive(Debug, Clone, PartialEq)]
pub struct SyncConfig {
    pub db_path: PathBuf,
    pub token_path: PathBuf,
    pub ics_url: String,
    pub calendar_ids: Vec<String>,
    pub sync_interval_sec: u64,
    pub time_window_days: u32,
    pub mock_mode: bool,
    pub client_id: String,
    pub client_secret: String,
    pub token_url: String,
    pub api_base_url: String,
    pub connectivity_probe_url: String,
    pub request_timeout_sec: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from("./data/calendar.db"),
            token_path: PathBuf::from("./data/token.json"),
            ics_url: String::new(),
            calendar_ids: vec!["primary".to_string()],
            sync_interval_sec: 120,
            time_window_days: 14,
            mock_mode: true,
            client_id: String::new(),
            client_secret: String::new(),
            token_url: DEFAULT_TOKEN_URL.to_string(),
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            connectivity_probe_url: DEFAULT_PROBE_URL.to_string(),
            request_timeout_sec: DEFAULT_REQUEST_TIMEOUT_SECS,
        }
    }
}

impl SyncConfig {
    pub fn with_db_path(self, db_path: impl Into<PathBuf>) -> Self {
        Self {
            db_path: db_path.into(),
            ..self
        }
    }

    pub fn with_token_path(self, token_path: impl Into<PathBuf>) -> Self {
        Self {
            token_path: token_path.into(),
            ..self
        }
    }

    pub fn with_mock_mode(self, mock_mode: bool) -> Self {
        Self { mock_mode, ..self }
    }

    pub fn with_ics_url(self, ics_url: impl Into<String>) -> Self {
        Self {
            ics_url: ics_url.into(),
            ..self
        }
    }

    pub fn with_oauth_client(
        self,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            ..self
        }
    }

    pub fn with_token_url(self, token_url: impl Into<String>) -> Self {
        Self {
            token_url: token_url.into(),
            ..self
        }
    }

    pub fn with_api_base_url(self, api_base_url: impl Into<String>) -> Self {
        Self {
            api_base_url: api_base_url.into(),
            ..self
        }
    }

    pub fn with_probe_url(self, connectivity_probe_url: impl Into<String>) -> Self {
        Self {
            connectivity_probe_url: connectivity_probe_url.into(),
            ..self
        }
    }

    pub fn with_interval(self, sync_interval_sec: u64) -> Self {
        Self {
            sync_interval_sec,
            ..self
        }
    }

    /// Which source this configuration syncs from.
    ///
    /// Mock wins over everything, then a non-empty ICS URL, then the API when
    /// client credentials and at least one calendar id are present.
    pub fn source(&self) -> SourceMode {
        if self.mock_mode {
            return SourceMode::Mock;
        }
        let ics_url = self.ics_url.trim();
        if !ics_url.is_empty() {
            return SourceMode::Ics(ics_url.to_string());
        }
        if self.oauth_client().is_configured() && !self.calendar_ids.is_empty() {
            return SourceMode::Api;
        }
        SourceMode::None
    }

    pub fn window_secs(&self) -> i64 {
        i64::from(self.time_window_days) * SECONDS_PER_DAY
    }

    pub fn interval_secs(&self) -> u64 {
        self.sync_interval_sec.max(1)
    }

    pub fn oauth_client(&self) -> OAuthClientConfig {
        OAuthClientConfig {
            client_id: self.client_id.clone(),
            client_secret: self.client_secret.clone(),
            token_url: self.token_url.clone(),
        }
    }
}

/// Data source selected for a cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceMode {
    Mock,
    /// Trimmed feed URL.
    Ics(String),
    Api,
    None,
}

impl SourceMode {
    /// Value written to the `sync_source` Meta key.
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceMode::Mock => "mock",
            SourceMode::Ics(_) => "ics",
            SourceMode::Api => "api",
            SourceMode::None => "none",
        }
    }
}

/// Connectivity state of the calendar engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectivityState {
    /// No online sync has ever succeeded.
    NeverSynced,
    /// A cycle is in flight.
    Syncing,
    /// At least one online sync has succeeded and failures are below the
    /// fallback threshold.
    Synced,
    /// Too many consecutive failures; present cached data only.
    CacheFallback,
}

/// Value of the `last_sync_status` Meta key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStatus {
    Mock,
    Online,
    Offline,
    Cache,
}

impl SyncStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            SyncStatus::Mock => "mock",
            SyncStatus::Online => "online",
            SyncStatus::Offline => "offline",
            SyncStatus::Cache => "cache",
        }
    }
}

/// Outcome of one calendar sync cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleReport {
    pub status: SyncStatus,
    pub error: Option<SyncError>,
    pub upserted: usize,
    pub removed: usize,
    /// Seconds until the next cycle should start.
    pub next_sleep_secs: u64,
}

impl CycleReport {
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}
