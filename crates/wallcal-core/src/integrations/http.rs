//! Blocking HTTP plumbing shared by every outbound call.
//!
//! One [`reqwest::blocking::Client`] per engine thread, TLS verification on,
//! a bounded request timeout and a descriptive user agent. Clients must be
//! built on the worker thread, never inside an async runtime.

use std::time::Duration;

use reqwest::blocking::{Client, RequestBuilder};
use reqwest::StatusCode;
use tracing::debug;

use crate::error::{SyncError, WeatherError};

pub const USER_AGENT: &str = concat!("wallcal/", env!("CARGO_PKG_VERSION"));

/// Build the client used by one engine.
pub fn build_client(timeout_secs: u64) -> reqwest::Result<Client> {
    Client::builder()
        .user_agent(USER_AGENT)
        .timeout(Duration::from_secs(timeout_secs.max(1)))
        .build()
}

/// Classified outcome of a failed request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    /// DNS, connect, TLS, timeout or body read failure.
    Transport(String),
    /// The server answered with something other than 200.
    Status(u16),
}

impl FetchError {
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, FetchError::Status(code) if *code == StatusCode::UNAUTHORIZED.as_u16())
    }

    /// Tag the failure with the source it came from (`"ics"`, `"api"`).
    pub fn into_sync_error(self, source: &'static str) -> SyncError {
        match self {
            FetchError::Transport(_) => SyncError::Transport(source),
            FetchError::Status(code) => SyncError::Status(source, code),
        }
    }
}

impl From<FetchError> for WeatherError {
    fn from(err: FetchError) -> Self {
        match err {
            FetchError::Transport(_) => WeatherError::Transport,
            FetchError::Status(code) => WeatherError::Status(code),
        }
    }
}

/// Send a request and return the body of a 200 response.
pub fn fetch_text(request: RequestBuilder) -> Result<String, FetchError> {
    let resp = request
        .send()
        .map_err(|e| FetchError::Transport(e.to_string()))?;
    let status = resp.status();
    if status != StatusCode::OK {
        debug!(status = status.as_u16(), url = %resp.url(), "non-200 response");
        return Err(FetchError::Status(status.as_u16()));
    }
    resp.text().map_err(|e| FetchError::Transport(e.to_string()))
}

/// Unconditional GET used to tell "no internet" apart from "source down".
///
/// Any HTTP response at all counts as reachable.
pub fn probe(client: &Client, url: &str) -> bool {
    match client.get(url).send() {
        Ok(resp) => {
            debug!(status = resp.status().as_u16(), "connectivity probe answered");
            true
        }
        Err(e) => {
            debug!(error = %e, "connectivity probe failed");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fetch_text_classifies_status() {
        let mut server = mockito::Server::new();
        let ok = server.mock("GET", "/ok").with_status(200).with_body("hello").create();
        let gone = server.mock("GET", "/gone").with_status(410).create();

        let client = build_client(5).unwrap();
        assert_eq!(
            fetch_text(client.get(format!("{}/ok", server.url()))).unwrap(),
            "hello"
        );
        assert_eq!(
            fetch_text(client.get(format!("{}/gone", server.url()))),
            Err(FetchError::Status(410))
        );
        ok.assert();
        gone.assert();
    }

    #[test]
    fn fetch_text_transport_failure() {
        let client = build_client(2).unwrap();
        // Port 9 on localhost is the discard service; nothing listens there in CI.
        let err = fetch_text(client.get("http://127.0.0.1:9/feed.ics")).unwrap_err();
        assert!(matches!(err, FetchError::Transport(_)));
        assert_eq!(err.into_sync_error("ics").to_string(), "ics http failed");
    }

    #[test]
    fn probe_counts_any_response() {
        let mut server = mockito::Server::new();
        let _m = server.mock("GET", "/generate_204").with_status(204).create();
        let client = build_client(2).unwrap();
        assert!(probe(&client, &format!("{}/generate_204", server.url())));
        assert!(!probe(&client, "http://127.0.0.1:9/"));
    }

    #[test]
    fn unauthorized_detection() {
        assert!(FetchError::Status(401).is_unauthorized());
        assert!(!FetchError::Status(403).is_unauthorized());
        assert!(!FetchError::Transport("x".into()).is_unauthorized());
    }
}
