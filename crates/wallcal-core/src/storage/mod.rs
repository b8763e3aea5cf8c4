mod config;
pub mod cache;
pub mod meta;

pub use cache::{EventRecord, LocalCache};
pub use config::{AppConfig, WeatherSection, DEFAULT_CONFIG_PATH};

use std::path::PathBuf;

/// Returns `~/.config/wallcal[-dev]/` based on WALLCAL_ENV, creating it.
///
/// The CLI looks for a fallback `config.json` here when no `--config` is
/// given and `config/config.json` is absent. Set WALLCAL_ENV=dev to use a
/// development directory.
///
/// # Errors
/// Returns an error if creating the directory fails.
pub fn data_dir() -> Result<PathBuf, std::io::Error> {
    let base_dir = dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config");

    let env = std::env::var("WALLCAL_ENV").unwrap_or_else(|_| "production".to_string());

    let dir = if env == "dev" {
        base_dir.join("wallcal-dev")
    } else {
        base_dir.join("wallcal")
    };

    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}
