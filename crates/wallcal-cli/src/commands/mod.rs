pub mod agenda;
pub mod run;
pub mod status;
pub mod sync;

use std::path::{Path, PathBuf};

use tracing::{debug, info};
use wallcal_core::storage::{data_dir, DEFAULT_CONFIG_PATH};
use wallcal_core::{AppConfig, LocalCache};

pub type CliResult = Result<(), Box<dyn std::error::Error>>;

/// Resolve the app config.
///
/// An explicit path must load. Otherwise `config/config.json` in the working
/// directory is tried, then `config.json` in the data directory, then the
/// built-in defaults.
pub fn load_config(explicit: Option<&Path>) -> Result<AppConfig, Box<dyn std::error::Error>> {
    if let Some(path) = explicit {
        return Ok(AppConfig::load_from(path)?);
    }

    let mut candidates = vec![PathBuf::from(DEFAULT_CONFIG_PATH)];
    if let Ok(dir) = data_dir() {
        candidates.push(dir.join("config.json"));
    }
    for path in candidates {
        if path.is_file() {
            info!(path = %path.display(), "loading config");
            return Ok(AppConfig::load_from(&path)?);
        }
    }

    debug!("no config file found, using defaults");
    let mut config = AppConfig::default();
    config.apply_env_overrides();
    Ok(config)
}

/// Open the cache read side, the same way the display does.
pub fn open_cache(config: &AppConfig) -> Result<LocalCache, Box<dyn std::error::Error>> {
    Ok(LocalCache::open(&config.db_path)?)
}
