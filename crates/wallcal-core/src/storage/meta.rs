//! Well-known Meta keys.
//!
//! Calendar keys are written by the calendar engine only, `weather_*` keys
//! by the weather engine only. Readers get `""` for anything never written.

pub const LAST_SYNC_STATUS: &str = "last_sync_status";
pub const LAST_SYNC_TS: &str = "last_sync_ts";
pub const LAST_SYNC_ERROR: &str = "last_sync_error";
pub const LAST_SYNC_SUCCESS_TS: &str = "last_sync_success_ts";
pub const SYNC_SOURCE: &str = "sync_source";
pub const SYNC_CONSECUTIVE_FAILURES: &str = "sync_consecutive_failures";
pub const CONNECTIVITY_STATUS: &str = "connectivity_status";
pub const CONNECTIVITY_CHECKED_TS: &str = "connectivity_checked_ts";

pub const WEATHER_STATUS: &str = "weather_status";
pub const WEATHER_ERROR: &str = "weather_error";
pub const WEATHER_LAST_SYNC_TS: &str = "weather_last_sync_ts";
pub const WEATHER_TEMP_C: &str = "weather_temp_c";
pub const WEATHER_CODE: &str = "weather_code";
pub const WEATHER_IS_DAY: &str = "weather_is_day";
pub const WEATHER_SUMMARY: &str = "weather_summary";
pub const WEATHER_WIND_KMH: &str = "weather_wind_kmh";
pub const WEATHER_HOURLY_JSON: &str = "weather_hourly_json";
pub const WEATHER_DAILY_JSON: &str = "weather_daily_json";

/// Every key the calendar engine owns.
pub const CALENDAR_KEYS: &[&str] = &[
    LAST_SYNC_STATUS,
    LAST_SYNC_TS,
    LAST_SYNC_ERROR,
    LAST_SYNC_SUCCESS_TS,
    SYNC_SOURCE,
    SYNC_CONSECUTIVE_FAILURES,
    CONNECTIVITY_STATUS,
    CONNECTIVITY_CHECKED_TS,
];

/// Every key the weather engine owns.
pub const WEATHER_KEYS: &[&str] = &[
    WEATHER_STATUS,
    WEATHER_ERROR,
    WEATHER_LAST_SYNC_TS,
    WEATHER_TEMP_C,
    WEATHER_CODE,
    WEATHER_IS_DAY,
    WEATHER_SUMMARY,
    WEATHER_WIND_KMH,
    WEATHER_HOURLY_JSON,
    WEATHER_DAILY_JSON,
];
