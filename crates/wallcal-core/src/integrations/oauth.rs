//! Refresh-token grant for the calendar API source.
//!
//! Only the refresh half of OAuth2 lives here. The initial authorization
//! happens elsewhere and leaves a token file with a refresh token in it.

use std::path::Path;

use reqwest::blocking::Client;
use reqwest::StatusCode;
use serde::Deserialize;
use tracing::{debug, info};

use super::token_store::{self, TokenInfo};
use crate::error::OAuthError;

/// Subtracted from `expires_in` so a token is never used right at its edge.
pub const EXPIRY_MARGIN_SECS: i64 = 30;

#[derive(Debug, Clone)]
pub struct OAuthClientConfig {
    pub client_id: String,
    pub client_secret: String,
    pub token_url: String,
}

impl OAuthClientConfig {
    pub fn is_configured(&self) -> bool {
        !self.client_id.is_empty() && !self.client_secret.is_empty()
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    #[serde(default)]
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    token_type: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
}

/// Exchange the stored refresh token for a new access token.
///
/// On success `token` is updated in place and written to `token_path`
/// before returning.
pub fn refresh_access_token(
    http: &Client,
    config: &OAuthClientConfig,
    token: &mut TokenInfo,
    token_path: &Path,
    now: i64,
) -> Result<(), OAuthError> {
    if !config.is_configured() || !token.has_refresh_token() {
        return Err(OAuthError::CredentialsNotConfigured);
    }

    let params = [
        ("client_id", config.client_id.as_str()),
        ("client_secret", config.client_secret.as_str()),
        ("refresh_token", token.refresh_token.as_str()),
        ("grant_type", "refresh_token"),
    ];

    let resp = http
        .post(&config.token_url)
        .form(&params)
        .send()
        .map_err(|e| OAuthError::Transport(e.to_string()))?;

    let status = resp.status();
    if status != StatusCode::OK {
        debug!(status = status.as_u16(), "token endpoint rejected refresh");
        return Err(OAuthError::Status(status.as_u16()));
    }

    let body: TokenResponse = resp
        .json()
        .map_err(|e| OAuthError::InvalidResponse(e.to_string()))?;
    if body.access_token.is_empty() {
        return Err(OAuthError::InvalidResponse(
            "missing access_token".to_string(),
        ));
    }

    let expires_in = body.expires_in.unwrap_or(0);
    token.access_token = body.access_token;
    token.expiry_ts = now + (expires_in - EXPIRY_MARGIN_SECS).max(0);
    token.token_type = body
        .token_type
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| "Bearer".to_string());
    if let Some(refresh) = body.refresh_token.filter(|r| !r.is_empty()) {
        token.refresh_token = refresh;
    }

    token_store::save(token_path, token)?;
    info!(expiry_ts = token.expiry_ts, "access token refreshed");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::integrations::http::build_client;
    use mockito::Matcher;

    fn config(url: String) -> OAuthClientConfig {
        OAuthClientConfig {
            client_id: "cid".into(),
            client_secret: "secret".into(),
            token_url: url,
        }
    }

    #[test]
    fn refresh_updates_and_persists() {
        let mut server = mockito::Server::new();
        let mock = server
            .mock("POST", "/token")
            .match_body(Matcher::AllOf(vec![
                Matcher::UrlEncoded("grant_type".into(), "refresh_token".into()),
                Matcher::UrlEncoded("refresh_token".into(), "r1".into()),
                Matcher::UrlEncoded("client_id".into(), "cid".into()),
            ]))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"access_token":"new","expires_in":3600}"#)
            .create();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("token.json");
        let mut token = TokenInfo {
            refresh_token: "r1".into(),
            ..TokenInfo::default()
        };

        let http = build_client(5).unwrap();
        refresh_access_token(
            &http,
            &config(format!("{}/token", server.url())),
            &mut token,
            &path,
            1_000,
        )
        .unwrap();

        mock.assert();
        assert_eq!(token.access_token, "new");
        assert_eq!(token.refresh_token, "r1");
        assert_eq!(token.expiry_ts, 1_000 + 3600 - 30);
        assert_eq!(token_store::load(&path).unwrap(), token);
    }

    #[test]
    fn rejected_refresh_keeps_token() {
        let mut server = mockito::Server::new();
        let _m = server.mock("POST", "/token").with_status(400).create();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("token.json");
        let mut token = TokenInfo {
            access_token: "old".into(),
            refresh_token: "r1".into(),
            ..TokenInfo::default()
        };
        let http = build_client(5).unwrap();
        let err = refresh_access_token(
            &http,
            &config(format!("{}/token", server.url())),
            &mut token,
            &path,
            0,
        )
        .unwrap_err();

        assert!(matches!(err, OAuthError::Status(400)));
        assert_eq!(token.access_token, "old");
        assert!(!path.exists());
    }

    #[test]
    fn missing_refresh_token_is_not_configured() {
        let http = build_client(5).unwrap();
        let mut token = TokenInfo::default();
        let err = refresh_access_token(
            &http,
            &config("http://127.0.0.1:9/token".into()),
            &mut token,
            Path::new("unused.json"),
            0,
        )
        .unwrap_err();
        assert!(matches!(err, OAuthError::CredentialsNotConfigured));
    }
}
