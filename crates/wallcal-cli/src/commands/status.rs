use serde_json::{Map, Value};
use wallcal_core::storage::meta;
use wallcal_core::time_util::{minutes_since, now_ts};
use wallcal_core::AppConfig;

use super::{open_cache, CliResult};

/// Print the Meta surface the display reads every frame.
pub fn run(config: &AppConfig, json: bool) -> CliResult {
    let cache = open_cache(config)?;
    let now = now_ts();

    let mut values = Map::new();
    for key in meta::CALENDAR_KEYS.iter().chain(meta::WEATHER_KEYS) {
        values.insert((*key).to_string(), Value::String(cache.get_meta(key)?));
    }
    let sync_age = minutes_since(&cache.get_meta(meta::LAST_SYNC_TS)?, now);
    let weather_age = minutes_since(&cache.get_meta(meta::WEATHER_LAST_SYNC_TS)?, now);

    if json {
        values.insert("minutes_since_sync".into(), sync_age.into());
        values.insert("minutes_since_weather".into(), weather_age.into());
        values.insert("event_count".into(), cache.event_count()?.into());
        println!("{}", serde_json::to_string_pretty(&Value::Object(values))?);
        return Ok(());
    }

    let get = |key: &str| values.get(key).and_then(Value::as_str).unwrap_or_default();
    let age = |minutes: Option<i64>| match minutes {
        Some(m) => format!("{m} min ago"),
        None => "never".to_string(),
    };
    let or_unknown = |s: &str| if s.is_empty() { "unknown".to_string() } else { s.to_string() };

    println!(
        "calendar: {} (source {}), last sync {}",
        or_unknown(get(meta::LAST_SYNC_STATUS)),
        or_unknown(get(meta::SYNC_SOURCE)),
        age(sync_age)
    );
    let error = get(meta::LAST_SYNC_ERROR);
    if !error.is_empty() {
        println!(
            "  error: {error} ({} consecutive failures)",
            get(meta::SYNC_CONSECUTIVE_FAILURES)
        );
    }
    let connectivity = get(meta::CONNECTIVITY_STATUS);
    if !connectivity.is_empty() {
        println!("  connectivity: {connectivity}");
    }
    println!("  events cached: {}", cache.event_count()?);

    println!(
        "weather: {}, last sync {}",
        or_unknown(get(meta::WEATHER_STATUS)),
        age(weather_age)
    );
    let temp = get(meta::WEATHER_TEMP_C);
    if !temp.is_empty() {
        println!("  {temp}°C {}", get(meta::WEATHER_SUMMARY));
    }
    let weather_error = get(meta::WEATHER_ERROR);
    if !weather_error.is_empty() {
        println!("  error: {weather_error}");
    }
    Ok(())
}
