//! On-disk OAuth token record.
//!
//! A small JSON object next to the cache. On Unix the file is created and
//! kept at mode 0600.

use std::fs;
use std::io::Write;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::CredentialError;

/// Refresh this many seconds before the recorded expiry.
pub const REFRESH_LEEWAY_SECS: i64 = 60;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenInfo {
    #[serde(default)]
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: String,
    #[serde(default)]
    pub expiry_ts: i64,
    #[serde(default = "default_token_type")]
    pub token_type: String,
}

fn default_token_type() -> String {
    "Bearer".to_string()
}

impl Default for TokenInfo {
    fn default() -> Self {
        Self {
            access_token: String::new(),
            refresh_token: String::new(),
            expiry_ts: 0,
            token_type: default_token_type(),
        }
    }
}

impl TokenInfo {
    /// True when the access token is missing or expires within the leeway.
    pub fn needs_refresh(&self, now: i64) -> bool {
        self.access_token.is_empty() || self.expiry_ts <= now + REFRESH_LEEWAY_SECS
    }

    pub fn has_refresh_token(&self) -> bool {
        !self.refresh_token.trim().is_empty()
    }

    /// Value for the `Authorization` header.
    pub fn authorization(&self) -> String {
        let kind = if self.token_type.is_empty() {
            "Bearer"
        } else {
            self.token_type.as_str()
        };
        format!("{} {}", kind, self.access_token)
    }
}

/// Read the token file. Missing or corrupt files are errors the caller treats
/// as "no credentials yet".
pub fn load(path: &Path) -> Result<TokenInfo, CredentialError> {
    let content = fs::read_to_string(path).map_err(|source| CredentialError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&content).map_err(|source| CredentialError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Write the token file, creating the parent directory if needed.
pub fn save(path: &Path, token: &TokenInfo) -> Result<(), CredentialError> {
    let body = serde_json::to_string_pretty(token)?;
    let write_err = |source| CredentialError::Write {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(write_err)?;
    }

    let mut options = fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    let mut file = options.open(path).map_err(write_err)?;
    file.write_all(body.as_bytes()).map_err(write_err)?;
    file.write_all(b"\n").map_err(write_err)?;

    // `mode` only applies on creation; tighten files that already existed.
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(path, fs::Permissions::from_mode(0o600)).map_err(write_err)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_default() {
        let token: TokenInfo = serde_json::from_str(r#"{"refresh_token":"r1"}"#).unwrap();
        assert_eq!(token.refresh_token, "r1");
        assert_eq!(token.token_type, "Bearer");
        assert_eq!(token.expiry_ts, 0);
        assert!(token.needs_refresh(0));
    }

    #[test]
    fn refresh_window() {
        let token = TokenInfo {
            access_token: "a".into(),
            expiry_ts: 1_000,
            ..TokenInfo::default()
        };
        assert!(!token.needs_refresh(900));
        assert!(token.needs_refresh(940));
        assert!(token.needs_refresh(2_000));
    }

    #[test]
    fn save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("token.json");
        let token = TokenInfo {
            access_token: "abc".into(),
            refresh_token: "def".into(),
            expiry_ts: 42,
            token_type: "Bearer".into(),
        };
        save(&path, &token).unwrap();
        assert_eq!(load(&path).unwrap(), token);
    }

    #[cfg(unix)]
    #[test]
    fn saved_file_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("token.json");
        fs::write(&path, "{}").unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o644)).unwrap();

        save(&path, &TokenInfo::default()).unwrap();
        let mode = fs::metadata(&path).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o600);
    }

    #[test]
    fn load_errors_are_reported() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("none.json");
        assert!(matches!(load(&missing), Err(CredentialError::Read { .. })));

        let corrupt = dir.path().join("bad.json");
        fs::write(&corrupt, "not json").unwrap();
        assert!(matches!(load(&corrupt), Err(CredentialError::Parse { .. })));
    }

    #[test]
    fn authorization_header() {
        let token = TokenInfo {
            access_token: "xyz".into(),
            token_type: String::new(),
            ..TokenInfo::default()
        };
        assert_eq!(token.authorization(), "Bearer xyz");
    }
}
