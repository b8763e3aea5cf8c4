//! Integration tests for the OAuth calendar API source.

use mockito::Matcher;
use wallcal_core::integrations::token_store;
use wallcal_core::storage::meta;
use wallcal_core::sync::SyncStatus;
use wallcal_core::time_util::now_ts;
use wallcal_core::{CalendarSyncer, EventRecord, LocalCache, SyncConfig, SyncError, TokenInfo};

struct Fixture {
    server: mockito::ServerGuard,
    dir: tempfile::TempDir,
    _probe: mockito::Mock,
}

impl Fixture {
    fn new() -> Self {
        let mut server = mockito::Server::new();
        let probe = server.mock("GET", "/generate_204").with_status(204).create();
        Self {
            server,
            dir: tempfile::tempdir().unwrap(),
            _probe: probe,
        }
    }

    fn token_path(&self) -> std::path::PathBuf {
        self.dir.path().join("token.json")
    }

    fn write_token(&self, access: &str, expiry_ts: i64) {
        token_store::save(
            &self.token_path(),
            &TokenInfo {
                access_token: access.into(),
                refresh_token: "refresh-1".into(),
                expiry_ts,
                token_type: "Bearer".into(),
            },
        )
        .unwrap();
    }

    fn config(&self) -> SyncConfig {
        let url = self.server.url();
        SyncConfig::default()
            .with_mock_mode(false)
            .with_oauth_client("client", "secret")
            .with_token_path(self.token_path())
            .with_token_url(format!("{url}/token"))
            .with_api_base_url(url.clone())
            .with_probe_url(format!("{url}/generate_204"))
    }
}

fn timed_item(id: &str, start_ts: i64) -> serde_json::Value {
    let start = chrono::DateTime::from_timestamp(start_ts, 0).unwrap();
    serde_json::json!({
        "id": id,
        "summary": id,
        "start": {"dateTime": start.to_rfc3339()},
        "end": {"dateTime": (start + chrono::Duration::minutes(30)).to_rfc3339()}
    })
}

fn events_body(now: i64) -> String {
    let start = chrono::DateTime::from_timestamp(now + 3_600, 0).unwrap();
    serde_json::json!({
        "items": [
            {
                "id": "evt-1",
                "summary": "Dentist",
                "status": "confirmed",
                "start": {"dateTime": start.to_rfc3339()},
                "end": {"dateTime": (start + chrono::Duration::minutes(30)).to_rfc3339()}
            }
        ]
    })
    .to_string()
}

#[test]
fn test_unauthorized_triggers_one_refresh_and_retry() {
    let mut fx = Fixture::new();
    let now = now_ts();
    fx.write_token("stale", now + 3_600);

    let rejected = fx
        .server
        .mock("GET", "/calendars/primary/events")
        .match_query(Matcher::Any)
        .match_header("authorization", "Bearer stale")
        .with_status(401)
        .expect(1)
        .create();
    let refresh = fx
        .server
        .mock("POST", "/token")
        .match_body(Matcher::UrlEncoded("refresh_token".into(), "refresh-1".into()))
        .with_status(200)
        .with_body(r#"{"access_token":"fresh","token_type":"Bearer","expires_in":3600}"#)
        .expect(1)
        .create();
    let accepted = fx
        .server
        .mock("GET", "/calendars/primary/events")
        .match_query(Matcher::Any)
        .match_header("authorization", "Bearer fresh")
        .with_status(200)
        .with_body(events_body(now))
        .expect(1)
        .create();

    let cache = LocalCache::open_in_memory().unwrap();
    let mut syncer = CalendarSyncer::new(fx.config(), &cache);
    let report = syncer.run_cycle(&cache, now);

    rejected.assert();
    refresh.assert();
    accepted.assert();
    assert_eq!(report.status, SyncStatus::Online);
    assert_eq!(cache.get_meta(meta::SYNC_SOURCE).unwrap(), "api");

    let event = cache.next_event_after(now).unwrap().unwrap();
    assert_eq!(event.id, "evt-1");
    assert_eq!(event.calendar_id, "primary");

    let saved = token_store::load(&fx.token_path()).unwrap();
    assert_eq!(saved.access_token, "fresh");
    assert_eq!(saved.refresh_token, "refresh-1");
    assert_eq!(saved.expiry_ts, now + 3600 - 30);
}

#[test]
fn test_second_unauthorized_aborts_cycle() {
    let mut fx = Fixture::new();
    let now = now_ts();
    fx.write_token("stale", now + 3_600);

    let events = fx
        .server
        .mock("GET", "/calendars/primary/events")
        .match_query(Matcher::Any)
        .with_status(401)
        .expect(2)
        .create();
    let refresh = fx
        .server
        .mock("POST", "/token")
        .with_status(200)
        .with_body(r#"{"access_token":"still-bad","expires_in":3600}"#)
        .expect(1)
        .create();

    let cache = LocalCache::open_in_memory().unwrap();
    let mut syncer = CalendarSyncer::new(fx.config(), &cache);
    let report = syncer.run_cycle(&cache, now);

    events.assert();
    refresh.assert();
    assert_eq!(report.error, Some(SyncError::Unauthorized));
    assert_eq!(
        cache.get_meta(meta::LAST_SYNC_ERROR).unwrap(),
        "api unauthorized"
    );
}

#[test]
fn test_expired_token_is_refreshed_before_fetch() {
    let mut fx = Fixture::new();
    let now = now_ts();
    fx.write_token("", 0);

    let refresh = fx
        .server
        .mock("POST", "/token")
        .with_status(200)
        .with_body(r#"{"access_token":"fresh","expires_in":120}"#)
        .expect(1)
        .create();
    let _events = fx
        .server
        .mock("GET", "/calendars/primary/events")
        .match_query(Matcher::Any)
        .match_header("authorization", "Bearer fresh")
        .with_status(200)
        .with_body(r#"{"items":[]}"#)
        .create();

    let cache = LocalCache::open_in_memory().unwrap();
    let mut syncer = CalendarSyncer::new(fx.config(), &cache);
    let report = syncer.run_cycle(&cache, now);

    refresh.assert();
    assert!(report.is_success());
    assert_eq!(
        token_store::load(&fx.token_path()).unwrap().expiry_ts,
        now + 90
    );
}

#[test]
fn test_missing_token_file_fails_cycle() {
    let fx = Fixture::new();
    let cache = LocalCache::open_in_memory().unwrap();
    let mut syncer = CalendarSyncer::new(fx.config(), &cache);

    let report = syncer.run_cycle(&cache, 1_000);
    assert_eq!(report.error, Some(SyncError::TokenLoad));
    assert_eq!(
        cache.get_meta(meta::LAST_SYNC_ERROR).unwrap(),
        "token load failed"
    );
}

#[test]
fn test_refresh_token_required() {
    let fx = Fixture::new();
    token_store::save(
        &fx.token_path(),
        &TokenInfo {
            access_token: "a".into(),
            ..TokenInfo::default()
        },
    )
    .unwrap();

    let cache = LocalCache::open_in_memory().unwrap();
    let mut syncer = CalendarSyncer::new(fx.config(), &cache);
    let report = syncer.run_cycle(&cache, 1_000);
    assert_eq!(report.error, Some(SyncError::RefreshTokenMissing));
}

#[test]
fn test_server_error_is_classified() {
    let mut fx = Fixture::new();
    fx.write_token("ok", now_ts() + 3_600);
    let _events = fx
        .server
        .mock("GET", "/calendars/primary/events")
        .match_query(Matcher::Any)
        .with_status(503)
        .create();

    let cache = LocalCache::open_in_memory().unwrap();
    let mut syncer = CalendarSyncer::new(fx.config(), &cache);
    syncer.run_cycle(&cache, now_ts());
    assert_eq!(cache.get_meta(meta::LAST_SYNC_ERROR).unwrap(), "api http 503");
}

#[test]
fn test_calendar_sweep_removes_omitted_events_only() {
    let mut fx = Fixture::new();
    let now = now_ts();
    fx.write_token("ok", now + 3_600);

    let cache = LocalCache::open_in_memory().unwrap();
    cache
        .upsert_event(&EventRecord {
            id: "other-cal".into(),
            calendar_id: "work".into(),
            title: "Elsewhere".into(),
            start_ts: now + 7_200,
            end_ts: now + 9_000,
            updated_ts: now - 600,
            status: "confirmed".into(),
            ..EventRecord::default()
        })
        .unwrap();

    let both = fx
        .server
        .mock("GET", "/calendars/primary/events")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body(
            serde_json::json!({
                "items": [timed_item("a", now + 3_600), timed_item("b", now + 5_400)]
            })
            .to_string(),
        )
        .create();
    let mut syncer = CalendarSyncer::new(fx.config(), &cache);
    let report = syncer.run_cycle(&cache, now);
    assert_eq!(report.upserted, 2);
    assert_eq!(report.removed, 0);
    both.remove();

    let _only_a = fx
        .server
        .mock("GET", "/calendars/primary/events")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body(serde_json::json!({"items": [timed_item("a", now + 3_600)]}).to_string())
        .create();
    let report = syncer.run_cycle(&cache, now + 120);

    assert!(report.is_success());
    assert_eq!(report.removed, 1);
    assert_eq!(cache.event_count().unwrap(), 2);
    let remaining: Vec<String> = cache
        .events_for_day(now + 3_600)
        .unwrap()
        .into_iter()
        .chain(cache.events_for_day(now + 7_200).unwrap())
        .map(|e| e.id)
        .collect();
    assert!(remaining.contains(&"a".to_string()));
    assert!(remaining.contains(&"other-cal".to_string()));
    assert!(!remaining.contains(&"b".to_string()));
}
