//! Connectivity and failure bookkeeping for the calendar engine.
//!
//! The tracker is a plain state machine; it never touches the network or the
//! cache. The engine feeds it probe results and cycle outcomes and asks it
//! which status to report and how long to sleep.

use super::types::{ConnectivityState, SyncStatus};

/// Consecutive failures before the engine reports `cache`.
pub const CACHE_FALLBACK_THRESHOLD: u32 = 5;

/// Retry interval while offline and never synced.
pub const OFFLINE_RETRY_SECS: u64 = 1800;

#[derive(Debug, Clone)]
pub struct SyncTracker {
    state: ConnectivityState,
    consecutive_failures: u32,
    has_synced: bool,
    last_probe_online: Option<bool>,
}

impl SyncTracker {
    /// `has_synced_before` comes from `last_sync_success_ts` in the cache so a
    /// restart does not drop back into cold-start behaviour.
    pub fn new(has_synced_before: bool) -> Self {
        Self {
            state: if has_synced_before {
                ConnectivityState::Synced
            } else {
                ConnectivityState::NeverSynced
            },
            consecutive_failures: 0,
            has_synced: has_synced_before,
            last_probe_online: None,
        }
    }

    pub fn state(&self) -> ConnectivityState {
        self.state
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    pub fn has_synced(&self) -> bool {
        self.has_synced
    }

    pub fn last_probe_online(&self) -> Option<bool> {
        self.last_probe_online
    }

    /// Probing only matters until the first success.
    pub fn should_probe(&self) -> bool {
        !self.has_synced
    }

    pub fn begin_cycle(&mut self) {
        self.state = ConnectivityState::Syncing;
    }

    /// Leave `Syncing` without counting the cycle either way.
    pub fn abandon_cycle(&mut self) {
        self.state = self.resting_state();
    }

    pub fn record_probe(&mut self, online: bool) {
        self.last_probe_online = Some(online);
    }

    pub fn record_success(&mut self) -> SyncStatus {
        self.state = ConnectivityState::Synced;
        self.consecutive_failures = 0;
        self.has_synced = true;
        SyncStatus::Online
    }

    pub fn record_failure(&mut self) -> SyncStatus {
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
        if self.consecutive_failures >= CACHE_FALLBACK_THRESHOLD {
            self.state = ConnectivityState::CacheFallback;
            SyncStatus::Cache
        } else {
            self.state = self.resting_state();
            SyncStatus::Offline
        }
    }

    fn resting_state(&self) -> ConnectivityState {
        if self.consecutive_failures >= CACHE_FALLBACK_THRESHOLD {
            ConnectivityState::CacheFallback
        } else if self.has_synced {
            ConnectivityState::Synced
        } else {
            ConnectivityState::NeverSynced
        }
    }

    /// Sleep before the next cycle.
    pub fn next_interval(&self, base_secs: u64, cycle_failed: bool) -> u64 {
        if cycle_failed && !self.has_synced && self.last_probe_online == Some(false) {
            OFFLINE_RETRY_SECS
        } else {
            base_secs
        }
    }
}

impl Default for SyncTracker {
    fn default() -> Self {
        Self::new(false)
    }
}
