//! Calendar sync engine.
//!
//! [`CalendarSyncer`] runs one fetch-parse-reconcile cycle at a time against
//! a cache handle it is given. [`CalendarSyncService`] wraps it in a
//! background thread that owns its own cache connection.

use reqwest::blocking::Client;
use tracing::{debug, error, info, warn};

use super::tracker::SyncTracker;
use super::types::{ConnectivityState, CycleReport, SourceMode, SyncConfig, SyncStatus};
use crate::error::{CoreError, SyncError};
use crate::integrations::google::{self, ApiError, EventQuery};
use crate::integrations::http::{self, fetch_text};
use crate::integrations::{ics, oauth, token_store, TokenInfo, ICS_CALENDAR_ID};
use crate::storage::{meta, EventRecord, LocalCache};
use crate::time_util::{now_ts, parse_meta_ts};
use crate::worker::{BackgroundWorker, CancelToken};

/// Events written and removed by a successful cycle.
type Reconciled = (usize, usize);

pub struct CalendarSyncer {
    config: SyncConfig,
    tracker: SyncTracker,
    http: Option<Client>,
    seeded: bool,
    cancel: CancelToken,
}

impl CalendarSyncer {
    /// Restores "has synced before" from the cache so restarts keep the warm
    /// retry behaviour.
    pub fn new(config: SyncConfig, cache: &LocalCache) -> Self {
        let has_synced = match cache.get_meta(meta::LAST_SYNC_SUCCESS_TS) {
            Ok(value) => parse_meta_ts(&value).is_some(),
            Err(e) => {
                warn!(error = %e, "could not read sync history");
                false
            }
        };
        Self {
            config,
            tracker: SyncTracker::new(has_synced),
            http: None,
            seeded: false,
            cancel: CancelToken::new(),
        }
    }

    /// Checked between the requests of a cycle so `stop()` waits for at most
    /// the request already in flight.
    pub fn with_cancel_token(self, cancel: CancelToken) -> Self {
        Self { cancel, ..self }
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    pub fn tracker(&self) -> &SyncTracker {
        &self.tracker
    }

    /// Run one cycle with `now` as both the window start and the sync stamp.
    pub fn run_cycle(&mut self, cache: &LocalCache, now: i64) -> CycleReport {
        let source = self.config.source();
        set_meta(cache, meta::SYNC_SOURCE, source.as_str());

        let report = match &source {
            SourceMode::Mock => self.run_mock(cache, now),
            SourceMode::None => {
                debug!("no calendar source configured, serving cache");
                CycleReport {
                    status: SyncStatus::Cache,
                    error: None,
                    upserted: 0,
                    removed: 0,
                    next_sleep_secs: self.config.interval_secs(),
                }
            }
            SourceMode::Ics(_) | SourceMode::Api => self.run_remote(cache, &source, now),
        };
        if report.error == Some(SyncError::Cancelled) {
            debug!("calendar cycle cancelled, status left as is");
            return report;
        }

        set_meta(cache, meta::LAST_SYNC_STATUS, report.status.as_str());
        if report.status != SyncStatus::Cache {
            set_meta(cache, meta::LAST_SYNC_TS, &now.to_string());
        }
        let error = report
            .error
            .as_ref()
            .map(ToString::to_string)
            .unwrap_or_default();
        set_meta(cache, meta::LAST_SYNC_ERROR, &error);
        set_meta(
            cache,
            meta::SYNC_CONSECUTIVE_FAILURES,
            &self.tracker.consecutive_failures().to_string(),
        );
        report
    }

    fn run_mock(&mut self, cache: &LocalCache, now: i64) -> CycleReport {
        let mut report = CycleReport {
            status: SyncStatus::Mock,
            error: None,
            upserted: 0,
            removed: 0,
            next_sleep_secs: self.config.interval_secs(),
        };
        if !self.seeded {
            self.seeded = true;
            match cache.insert_sample_events(now) {
                Ok(()) => {
                    info!("seeded sample events");
                    report.upserted = 6;
                }
                Err(e) => {
                    warn!(error = %e, "failed to seed sample events");
                    report.error = Some(SyncError::Storage);
                }
            }
        }
        report
    }

    fn run_remote(&mut self, cache: &LocalCache, source: &SourceMode, now: i64) -> CycleReport {
        self.tracker.begin_cycle();

        let cancel = self.cancel.clone();
        let result = self.client(source).and_then(|client| {
            ensure_live(&cancel)?;
            if self.tracker.should_probe() {
                let online = http::probe(&client, &self.config.connectivity_probe_url);
                self.tracker.record_probe(online);
                set_meta(
                    cache,
                    meta::CONNECTIVITY_STATUS,
                    if online { "online" } else { "offline" },
                );
                set_meta(cache, meta::CONNECTIVITY_CHECKED_TS, &now.to_string());
                ensure_live(&cancel)?;
            }
            match source {
                SourceMode::Ics(url) => sync_ics(&client, &self.config, cache, url, now),
                _ => sync_api(&client, &self.config, cache, &cancel, now),
            }
        });

        let interval = self.config.interval_secs();
        match result {
            Ok((upserted, removed)) => {
                let status = self.tracker.record_success();
                set_meta(cache, meta::LAST_SYNC_SUCCESS_TS, &now.to_string());
                info!(
                    source = source.as_str(),
                    upserted, removed, "calendar sync succeeded"
                );
                CycleReport {
                    status,
                    error: None,
                    upserted,
                    removed,
                    next_sleep_secs: self.tracker.next_interval(interval, false),
                }
            }
            Err(SyncError::Cancelled) => {
                self.tracker.abandon_cycle();
                CycleReport {
                    status: if self.tracker.state() == ConnectivityState::CacheFallback {
                        SyncStatus::Cache
                    } else {
                        SyncStatus::Offline
                    },
                    error: Some(SyncError::Cancelled),
                    upserted: 0,
                    removed: 0,
                    next_sleep_secs: 0,
                }
            }
            Err(err) => {
                let status = self.tracker.record_failure();
                warn!(
                    source = source.as_str(),
                    error = %err,
                    failures = self.tracker.consecutive_failures(),
                    "calendar sync failed"
                );
                CycleReport {
                    status,
                    error: Some(err),
                    upserted: 0,
                    removed: 0,
                    next_sleep_secs: self.tracker.next_interval(interval, true),
                }
            }
        }
    }

    fn client(&mut self, source: &SourceMode) -> Result<Client, SyncError> {
        if let Some(client) = &self.http {
            return Ok(client.clone());
        }
        let client = http::build_client(self.config.request_timeout_sec).map_err(|e| {
            error!(error = %e, "failed to build http client");
            SyncError::Transport(source.as_str())
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

fn ensure_live(cancel: &CancelToken) -> Result<(), SyncError> {
    if cancel.is_cancelled() {
        return Err(SyncError::Cancelled);
    }
    Ok(())
}

fn is_http_url(raw: &str) -> bool {
    url::Url::parse(raw)
        .map(|u| matches!(u.scheme(), "http" | "https") && u.host().is_some())
        .unwrap_or(false)
}

/// Upsert every record; report a storage failure only after trying them all.
fn upsert_all(cache: &LocalCache, records: &[EventRecord]) -> Result<usize, SyncError> {
    let mut failed = 0usize;
    for record in records {
        if let Err(e) = cache.upsert_event(record) {
            warn!(id = %record.id, error = %e, "failed to upsert event");
            failed += 1;
        }
    }
    if failed > 0 {
        return Err(SyncError::Storage);
    }
    Ok(records.len())
}

fn sweep(
    cache: &LocalCache,
    calendar_id: &str,
    window_start: i64,
    window_end: i64,
    sync_ts: i64,
) -> Result<usize, SyncError> {
    cache
        .delete_stale_in_window(calendar_id, window_start, window_end, sync_ts)
        .map_err(|e| {
            warn!(calendar_id, error = %e, "stale sweep failed");
            SyncError::Storage
        })
}

fn sync_ics(
    client: &Client,
    config: &SyncConfig,
    cache: &LocalCache,
    url: &str,
    now: i64,
) -> Result<Reconciled, SyncError> {
    if !is_http_url(url) {
        return Err(SyncError::InvalidIcsUrl);
    }
    let body = fetch_text(client.get(url)).map_err(|e| {
        debug!(error = ?e, "ics fetch failed");
        e.into_sync_error("ics")
    })?;

    let window_end = now + config.window_secs();
    let parsed = ics::parse_events(&body);
    let total = parsed.len();
    let records: Vec<EventRecord> = parsed
        .into_iter()
        .filter(|event| event.overlaps(now, window_end))
        .map(|event| event.into_record(now))
        .collect();
    debug!(total, in_window = records.len(), "parsed ics feed");

    let upserted = upsert_all(cache, &records)?;
    let removed = sweep(cache, ICS_CALENDAR_ID, now, window_end, now)?;
    Ok((upserted, removed))
}

fn refresh(
    client: &Client,
    config: &SyncConfig,
    token: &mut TokenInfo,
    now: i64,
) -> Result<(), SyncError> {
    oauth::refresh_access_token(
        client,
        &config.oauth_client(),
        token,
        &config.token_path,
        now,
    )
    .map_err(|e| {
        warn!(error = %e, "token refresh failed");
        SyncError::TokenRefresh
    })
}

fn sync_api(
    client: &Client,
    config: &SyncConfig,
    cache: &LocalCache,
    cancel: &CancelToken,
    now: i64,
) -> Result<Reconciled, SyncError> {
    let mut token = token_store::load(&config.token_path).map_err(|e| {
        warn!(error = %e, "token load failed");
        SyncError::TokenLoad
    })?;
    if !token.has_refresh_token() {
        return Err(SyncError::RefreshTokenMissing);
    }
    if token.needs_refresh(now) {
        ensure_live(cancel)?;
        refresh(client, config, &mut token, now)?;
    }

    let window_end = now + config.window_secs();
    let mut upserted = 0;
    let mut removed = 0;
    for calendar_id in &config.calendar_ids {
        ensure_live(cancel)?;
        let query = EventQuery {
            api_base_url: &config.api_base_url,
            calendar_id,
            window_start: now,
            window_end,
            sync_ts: now,
        };
        let records = match google::fetch_calendar(client, &token, &query, cancel) {
            Ok(records) => records,
            Err(ApiError::Unauthorized) => {
                info!(calendar_id = %calendar_id, "events request unauthorized, refreshing token");
                ensure_live(cancel)?;
                refresh(client, config, &mut token, now)?;
                match google::fetch_calendar(client, &token, &query, cancel) {
                    Ok(records) => records,
                    Err(ApiError::Unauthorized) => return Err(SyncError::Unauthorized),
                    Err(ApiError::Failed(e)) => return Err(e),
                }
            }
            Err(ApiError::Failed(e)) => return Err(e),
        };
        upserted += upsert_all(cache, &records)?;
        removed += sweep(cache, calendar_id, now, window_end, now)?;
    }
    Ok((upserted, removed))
}

/// Open the configured cache and run a single cycle.
pub fn sync_once(config: SyncConfig) -> Result<CycleReport, CoreError> {
    let cache = LocalCache::open(&config.db_path)?;
    let mut syncer = CalendarSyncer::new(config, &cache);
    Ok(syncer.run_cycle(&cache, now_ts()))
}

fn run_loop(config: SyncConfig, token: CancelToken) {
    let cache = match LocalCache::open(&config.db_path) {
        Ok(cache) => cache,
        Err(e) => {
            error!(error = %e, "calendar sync could not open cache, exiting");
            return;
        }
    };
    let mut syncer = CalendarSyncer::new(config, &cache).with_cancel_token(token.clone());
    info!(
        source = syncer.config().source().as_str(),
        interval = syncer.config().interval_secs(),
        "calendar sync started"
    );

    while !token.is_cancelled() {
        let report = syncer.run_cycle(&cache, now_ts());
        if !token.sleep_secs(report.next_sleep_secs) {
            break;
        }
    }
    info!("calendar sync stopped");
}

/// Background calendar sync thread.
pub struct CalendarSyncService {
    config: SyncConfig,
    worker: Option<BackgroundWorker>,
}

impl CalendarSyncService {
    pub fn new(config: SyncConfig) -> Self {
        Self {
            config,
            worker: None,
        }
    }

    /// Spawn the worker. Calling it while already running does nothing.
    pub fn start(&mut self) -> Result<(), CoreError> {
        if self.is_running() {
            return Ok(());
        }
        let config = self.config.clone();
        self.worker = Some(BackgroundWorker::spawn("calendar-sync", move |token| {
            run_loop(config, token)
        })?);
        Ok(())
    }

    /// Signal the loop and wait for it to exit.
    pub fn stop(&mut self) {
        if let Some(mut worker) = self.worker.take() {
            worker.stop();
        }
    }

    pub fn is_running(&self) -> bool {
        self.worker.as_ref().is_some_and(BackgroundWorker::is_running)
    }
}

impl Drop for CalendarSyncService {
    fn drop(&mut self) {
        self.stop();
    }
}
