//! Calendar REST API source (Google Calendar v3 events endpoint).
//!
//! Pages through `events.list` for one calendar id and maps each item to an
//! [`EventRecord`]. Token refresh and the 401 retry are the caller's job;
//! this module only reports that a request was unauthorized.

use reqwest::blocking::Client;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use super::http::{fetch_text, FetchError};
use super::token_store::TokenInfo;
use crate::error::SyncError;
use crate::storage::EventRecord;
use crate::time_util::{parse_date_local, parse_rfc3339, to_rfc3339_utc, SECONDS_PER_DAY};
use crate::worker::CancelToken;

const SOURCE: &str = "api";
const MAX_RESULTS: &str = "2500";

/// Failure while listing one calendar.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    /// The bearer token was rejected; refresh and retry.
    Unauthorized,
    Failed(SyncError),
}

impl From<FetchError> for ApiError {
    fn from(err: FetchError) -> Self {
        if err.is_unauthorized() {
            ApiError::Unauthorized
        } else {
            ApiError::Failed(err.into_sync_error(SOURCE))
        }
    }
}

/// Query window and identity for one `events.list` walk.
#[derive(Debug, Clone, Copy)]
pub struct EventQuery<'a> {
    pub api_base_url: &'a str,
    pub calendar_id: &'a str,
    pub window_start: i64,
    pub window_end: i64,
    pub sync_ts: i64,
}

impl EventQuery<'_> {
    pub fn events_url(&self) -> String {
        format!(
            "{}/calendars/{}/events",
            self.api_base_url.trim_end_matches('/'),
            urlencoding::encode(self.calendar_id)
        )
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EventsPage {
    #[serde(default)]
    items: Vec<Value>,
    #[serde(default)]
    next_page_token: Option<String>,
}

/// Fetch every page for one calendar.
///
/// `cancel` is checked before each page request.
pub fn fetch_calendar(
    http: &Client,
    token: &TokenInfo,
    query: &EventQuery<'_>,
    cancel: &CancelToken,
) -> Result<Vec<EventRecord>, ApiError> {
    let url = query.events_url();
    let time_min = to_rfc3339_utc(query.window_start);
    let time_max = to_rfc3339_utc(query.window_end);
    let mut records = Vec::new();
    let mut page_token: Option<String> = None;

    loop {
        if cancel.is_cancelled() {
            return Err(ApiError::Failed(SyncError::Cancelled));
        }
        let mut params: Vec<(&str, &str)> = vec![
            ("singleEvents", "true"),
            ("orderBy", "startTime"),
            ("maxResults", MAX_RESULTS),
            ("timeMin", time_min.as_str()),
            ("timeMax", time_max.as_str()),
            ("showDeleted", "true"),
        ];
        if let Some(page) = page_token.as_deref() {
            params.push(("pageToken", page));
        }

        let request = http
            .get(&url)
            .header(reqwest::header::AUTHORIZATION, token.authorization())
            .query(&params);
        let body = fetch_text(request)?;
        let page: EventsPage = serde_json::from_str(&body)
            .map_err(|_| ApiError::Failed(SyncError::InvalidJson(SOURCE)))?;

        let before = records.len();
        records.extend(
            page.items
                .iter()
                .filter_map(|item| parse_event_item(item, query.calendar_id, query.sync_ts)),
        );
        debug!(
            calendar_id = query.calendar_id,
            items = page.items.len(),
            mapped = records.len() - before,
            "fetched events page"
        );

        match page.next_page_token.filter(|t| !t.is_empty()) {
            Some(next) => page_token = Some(next),
            None => break,
        }
    }
    Ok(records)
}

/// Map one `events.list` item. Items without an id or a usable start are
/// skipped.
pub fn parse_event_item(item: &Value, calendar_id: &str, sync_ts: i64) -> Option<EventRecord> {
    let id = item.get("id")?.as_str().filter(|id| !id.is_empty())?;
    let start = item.get("start")?;
    let end = item.get("end");

    let (start_ts, end_ts, all_day) = if let Some(date_time) = str_field(start, "dateTime") {
        let start_ts = parse_rfc3339(date_time)?;
        let end_ts = end
            .and_then(|e| str_field(e, "dateTime"))
            .and_then(parse_rfc3339)
            .unwrap_or(start_ts);
        (start_ts, end_ts, false)
    } else {
        let start_ts = parse_date_local(str_field(start, "date")?)?;
        // End dates are exclusive; a missing one means a single day.
        let end_exclusive = end
            .and_then(|e| str_field(e, "date"))
            .and_then(parse_date_local)
            .unwrap_or(start_ts + SECONDS_PER_DAY);
        (start_ts, end_exclusive - 1, true)
    };

    Some(EventRecord {
        id: id.to_string(),
        calendar_id: calendar_id.to_string(),
        title: str_field(item, "summary")
            .filter(|s| !s.is_empty())
            .unwrap_or("(No title)")
            .to_string(),
        start_ts,
        end_ts: end_ts.max(start_ts),
        all_day,
        location: str_field(item, "location").unwrap_or_default().to_string(),
        updated_ts: sync_ts,
        status: str_field(item, "status")
            .filter(|s| !s.is_empty())
            .unwrap_or("confirmed")
            .to_ascii_lowercase(),
    })
}

fn str_field<'a>(value: &'a Value, key: &str) -> Option<&'a str> {
    value.get(key).and_then(Value::as_str)
}
