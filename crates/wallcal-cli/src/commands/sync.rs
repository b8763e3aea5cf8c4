use serde_json::json;
use wallcal_core::sync::sync_once;
use wallcal_core::weather::weather_once;
use wallcal_core::AppConfig;

use super::CliResult;

pub fn run_calendar(config: &AppConfig) -> CliResult {
    let report = sync_once(config.sync_config())?;
    let out = json!({
        "status": report.status.as_str(),
        "source": config.sync_config().source().as_str(),
        "error": report.error.map(|e| e.to_string()).unwrap_or_default(),
        "upserted": report.upserted,
        "removed": report.removed,
        "next_sleep_secs": report.next_sleep_secs,
    });
    println!("{}", serde_json::to_string_pretty(&out)?);
    Ok(())
}

pub fn run_weather(config: &AppConfig) -> CliResult {
    let report = weather_once(config.weather_config())?;
    let out = json!({
        "status": report.status.as_str(),
        "error": report.error.map(|e| e.to_string()).unwrap_or_default(),
    });
    println!("{}", serde_json::to_string_pretty(&out)?);
    Ok(())
}
