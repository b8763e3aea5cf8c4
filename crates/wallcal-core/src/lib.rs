//! # wallcal Core Library
//!
//! This library provides the synchronization core of the wallcal kiosk wall
//! calendar. Two background engines keep a local SQLite cache fresh; the
//! display process (and the `wallcal` CLI) only ever reads that cache.
//!
//! ## Architecture
//!
//! - **Local Cache**: SQLite event table plus a flat key/value Meta table that
//!   carries sync status to the display
//! - **Calendar Sync**: mock seed, ICS feed or calendar REST API, with a
//!   connectivity state machine, backoff and cache-fallback reporting
//! - **Weather Sync**: Open-Meteo current/hourly/daily forecast flattened into
//!   Meta keys
//! - **Credential Store**: OAuth token file and refresh-token grant
//!
//! ## Key Components
//!
//! - [`LocalCache`]: Event and Meta persistence
//! - [`CalendarSyncService`]: Background calendar engine
//! - [`WeatherSyncService`]: Background weather engine
//! - [`AppConfig`]: Application configuration, resolved into [`SyncConfig`]
//!   and [`WeatherConfig`]

pub mod error;
pub mod integrations;
pub mod storage;
pub mod sync;
pub mod time_util;
pub mod weather;
pub mod worker;

pub use error::{
    ConfigError, CoreError, CredentialError, DatabaseError, OAuthError, SyncError, WeatherError,
};
pub use integrations::TokenInfo;
pub use storage::{AppConfig, EventRecord, LocalCache};
pub use sync::{CalendarSyncService, CalendarSyncer, CycleReport, SyncConfig, SyncStatus};
pub use weather::{WeatherConfig, WeatherReport, WeatherStatus, WeatherSyncService};
pub use worker::CancelToken;
