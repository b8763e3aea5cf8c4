//! Core error types for wallcal-core.
//!
//! Every failure a sync cycle can hit is a distinct variant here. The
//! `Display` output of [`SyncError`] and [`WeatherError`] is the exact string
//! the engines store in Meta, so the rendering side can show it verbatim.

use std::path::PathBuf;
use thiserror::Error;

/// Core error type for wallcal-core.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Database-related errors
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// OAuth-related errors
    #[error("OAuth error: {0}")]
    OAuth(#[from] OAuthError),

    /// Token file errors
    #[error("Credential error: {0}")]
    Credential(#[from] CredentialError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Database-specific errors.
#[derive(Error, Debug)]
pub enum DatabaseError {
    /// Failed to open database connection
    #[error("Failed to open database at {path}: {source}")]
    OpenFailed {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    /// Query execution failed
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Schema creation failed
    #[error("Schema setup failed: {0}")]
    SchemaFailed(String),

    /// Database is locked past the busy timeout
    #[error("Database is locked")]
    Locked,
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to load configuration
    #[error("Failed to load configuration from {path}: {message}")]
    LoadFailed { path: PathBuf, message: String },

    /// Failed to parse configuration
    #[error("Failed to parse configuration: {0}")]
    ParseFailed(String),

    /// Invalid configuration value
    #[error("Invalid configuration value for '{key}': {message}")]
    InvalidValue { key: String, message: String },
}

/// OAuth-specific errors.
#[derive(Error, Debug)]
pub enum OAuthError {
    /// Client credentials or refresh token absent
    #[error("Missing OAuth client_id, client_secret, or refresh_token")]
    CredentialsNotConfigured,

    /// Token endpoint unreachable
    #[error("Token refresh transport failed: {0}")]
    Transport(String),

    /// Token endpoint answered with a non-200 status
    #[error("Token refresh failed (HTTP {0})")]
    Status(u16),

    /// Token endpoint answered with something that is not a token
    #[error("Token refresh response invalid: {0}")]
    InvalidResponse(String),

    /// Refreshed token could not be persisted
    #[error("Token refresh could not be saved: {0}")]
    Persist(#[from] CredentialError),
}

/// Token file errors.
#[derive(Error, Debug)]
pub enum CredentialError {
    /// File missing or unreadable
    #[error("Token file not readable at {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// File present but not a token record
    #[error("Failed to parse token file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// Write or permission change failed
    #[error("Failed to write token file {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to encode token: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Reason a calendar sync cycle failed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SyncError {
    #[error("ics url invalid")]
    InvalidIcsUrl,

    /// DNS, connect, TLS or timeout failure
    #[error("{0} http failed")]
    Transport(&'static str),

    /// Non-200 response
    #[error("{0} http {1}")]
    Status(&'static str, u16),

    /// Unparseable response body
    #[error("{0} invalid json")]
    InvalidJson(&'static str),

    #[error("token load failed")]
    TokenLoad,

    #[error("refresh token missing")]
    RefreshTokenMissing,

    #[error("token refresh failed")]
    TokenRefresh,

    /// Still unauthorized after a forced refresh
    #[error("api unauthorized")]
    Unauthorized,

    #[error("cache write failed")]
    Storage,

    /// Stop was requested mid-cycle; not counted as a failure
    #[error("sync cancelled")]
    Cancelled,
}

/// Reason a weather sync cycle failed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WeatherError {
    /// Coordinates out of range or not finite; no request is made
    #[error("weather lat/lon invalid")]
    InvalidCoordinates,

    #[error("weather http failed")]
    Transport,

    #[error("weather http {0}")]
    Status(u16),

    #[error("weather invalid json")]
    InvalidJson,

    #[error("weather missing fields")]
    MissingFields,

    #[error("weather temperature invalid")]
    TemperatureInvalid,

    #[error("weather cache write failed")]
    Storage,
}

impl From<rusqlite::Error> for DatabaseError {
    fn from(err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(code, _msg) => {
                if code.code == rusqlite::ErrorCode::DatabaseLocked
                    || code.code == rusqlite::ErrorCode::DatabaseBusy
                {
                    DatabaseError::Locked
                } else {
                    DatabaseError::QueryFailed(err.to_string())
                }
            }
            _ => DatabaseError::QueryFailed(err.to_string()),
        }
    }
}

/// Result type alias for CoreError
pub type Result<T, E = CoreError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sync_error_strings_match_meta_contract() {
        assert_eq!(SyncError::Transport("ics").to_string(), "ics http failed");
        assert_eq!(SyncError::Status("ics", 404).to_string(), "ics http 404");
        assert_eq!(SyncError::Status("api", 500).to_string(), "api http 500");
    }

    #[test]
    fn weather_error_strings_match_meta_contract() {
        assert_eq!(WeatherError::InvalidJson.to_string(), "weather invalid json");
        assert_eq!(WeatherError::MissingFields.to_string(), "weather missing fields");
        assert_eq!(
            WeatherError::TemperatureInvalid.to_string(),
            "weather temperature invalid"
        );
        assert_eq!(WeatherError::Status(503).to_string(), "weather http 503");
        assert_eq!(
            WeatherError::InvalidCoordinates.to_string(),
            "weather lat/lon invalid"
        );
    }

    #[test]
    fn busy_sqlite_maps_to_locked() {
        let err = rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_BUSY),
            None,
        );
        assert!(matches!(DatabaseError::from(err), DatabaseError::Locked));
    }
}
