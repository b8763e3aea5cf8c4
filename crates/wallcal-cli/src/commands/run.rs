use tracing::info;
use wallcal_core::{AppConfig, CalendarSyncService, WeatherSyncService};

use super::CliResult;

/// Start both engines and block until Ctrl-C, then stop them in order.
pub fn run(config: &AppConfig) -> CliResult {
    let mut calendar = CalendarSyncService::new(config.sync_config());
    let mut weather = WeatherSyncService::new(config.weather_config());
    calendar.start()?;
    weather.start()?;
    info!(db = %config.db_path.display(), "wallcal running, press Ctrl-C to stop");

    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    rt.block_on(tokio::signal::ctrl_c())?;

    info!("shutting down");
    weather.stop();
    calendar.stop();
    Ok(())
}
