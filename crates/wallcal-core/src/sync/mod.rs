//! Calendar synchronization.
//!
//! Keeps the cached event window consistent with one external source (mock
//! seed, ICS feed or calendar REST API) and reports availability through
//! Meta keys.

pub mod engine;
pub mod tracker;
pub mod types;


pub use engine::{sync_once, CalendarSyncService, CalendarSyncer};
pub use tracker::{SyncTracker, CACHE_FALLBACK_THRESHOLD, OFFLINE_RETRY_SECS};
pub use types::{ConnectivityState, CycleReport, SourceMode, SyncConfig, SyncStatus};
