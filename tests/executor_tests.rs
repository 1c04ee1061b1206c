//! Integration tests for the authenticated request executor: preemptive and
//! reactive refresh, single-flight refresh, retry ceiling and forced logout.

mod support;

use std::sync::Arc;
use std::time::Duration;

use pretty_assertions::assert_eq;
use serde::Deserialize;
use serde_json::json;
use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use spotlink::auth::{CredentialRecord, MemoryTokenStore, TokenStore};
use spotlink::client::{ApiRequest, EmptyResponse};
use spotlink::error::ApiError;
use spotlink::session::{Session, SessionState};

use support::{config_for, record, session_with, token_response, KEY};

#[derive(Debug, Deserialize)]
struct Me {
    id: String,
}

async fn mount_me(server: &MockServer, bearer: &str) {
    Mock::given(method("GET"))
        .and(path("/v1/me"))
        .and(header("authorization", format!("Bearer {bearer}").as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": "user-1" })))
        .mount(server)
        .await;
}

async fn mount_refresh(server: &MockServer, access: &str, expected_calls: u64) {
    Mock::given(method("POST"))
        .and(path("/api/token"))
        .and(body_string_contains("grant_type=refresh_token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_response(access, None)))
        .expect(expected_calls)
        .mount(server)
        .await;
}

// ---------------------------------------------------------------------------
// Preemptive refresh threshold
// ---------------------------------------------------------------------------

#[tokio::test]
async fn token_expiring_in_twenty_seconds_is_refreshed_first() {
    let server = MockServer::start().await;
    mount_refresh(&server, "fresh", 1).await;
    mount_me(&server, "fresh").await;

    let (session, store) = session_with(&server, Some(record("stale", Some("refresh"), 20)));
    let me: Me = session.client().get("me").await.expect("request");

    assert_eq!(me.id, "user-1");
    let stored = store.load(KEY).unwrap().unwrap();
    assert_eq!(stored.access_token, "fresh");
    assert_eq!(stored.refresh_token.as_deref(), Some("refresh"));
}

#[tokio::test]
async fn token_expiring_in_two_minutes_is_used_as_is() {
    let server = MockServer::start().await;
    mount_refresh(&server, "unused", 0).await;
    mount_me(&server, "current").await;

    let (session, _store) = session_with(&server, Some(record("current", Some("refresh"), 120)));
    let me: Me = session.client().get("me").await.expect("request");

    assert_eq!(me.id, "user-1");
}

#[tokio::test]
async fn expired_token_is_refreshed_once_then_request_succeeds() {
    let server = MockServer::start().await;
    mount_refresh(&server, "fresh", 1).await;
    mount_me(&server, "fresh").await;

    let (session, _store) = session_with(&server, Some(record("expired", Some("refresh"), -60)));
    let me: Me = session.client().get("me").await.expect("request");

    assert_eq!(me.id, "user-1");
    assert!(session.is_logged_in());
}

// ---------------------------------------------------------------------------
// Single-flight refresh
// ---------------------------------------------------------------------------

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_stale_calls_share_one_refresh() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/token"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(token_response("fresh", Some("rotated")))
                .set_delay(Duration::from_millis(200)),
        )
        .expect(1)
        .mount(&server)
        .await;
    mount_me(&server, "fresh").await;
    Mock::given(method("GET"))
        .and(path("/v1/me/playlists"))
        .and(header("authorization", "Bearer fresh"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "items": [], "limit": 20, "next": null, "offset": 0, "total": 0
        })))
        .mount(&server)
        .await;

    let (session, store) = session_with(&server, Some(record("stale", Some("refresh"), 20)));
    let session = Arc::new(session);

    let a = {
        let session = session.clone();
        tokio::spawn(async move { session.current_profile().await })
    };
    let b = {
        let session = session.clone();
        tokio::spawn(async move { session.user_playlists().await })
    };

    assert_eq!(a.await.unwrap().expect("profile").id, "user-1");
    assert_eq!(b.await.unwrap().expect("playlists").total, 0);
    assert_eq!(
        store.load(KEY).unwrap().unwrap().refresh_token.as_deref(),
        Some("rotated")
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_rejected_calls_share_one_refresh() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/me"))
        .and(header("authorization", "Bearer revoked"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/token"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(token_response("fresh", None))
                .set_delay(Duration::from_millis(200)),
        )
        .expect(1)
        .mount(&server)
        .await;
    mount_me(&server, "fresh").await;

    let (session, _store) = session_with(&server, Some(record("revoked", Some("refresh"), 3600)));
    let session = Arc::new(session);

    let calls: Vec<_> = (0..2)
        .map(|_| {
            let session = session.clone();
            tokio::spawn(async move { session.current_profile().await })
        })
        .collect();

    for call in calls {
        assert_eq!(call.await.unwrap().expect("profile").id, "user-1");
    }
}

// ---------------------------------------------------------------------------
// Retry ceiling and failures
// ---------------------------------------------------------------------------

#[tokio::test]
async fn always_unauthorized_gives_up_after_two_refreshes() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/me"))
        .respond_with(ResponseTemplate::new(401))
        .expect(2)
        .mount(&server)
        .await;
    mount_refresh(&server, "still-rejected", 2).await;

    let (session, _store) = session_with(&server, Some(record("access", Some("refresh"), 3600)));
    let err = session.client().get::<Me>("me").await.unwrap_err();

    assert_eq!(err, ApiError::RetriesExhausted { attempts: 2 });
}

#[tokio::test]
async fn server_error_is_surfaced_without_retry() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/me"))
        .respond_with(ResponseTemplate::new(502).set_body_string("Bad Gateway"))
        .expect(1)
        .mount(&server)
        .await;
    mount_refresh(&server, "unused", 0).await;

    let (session, _store) = session_with(&server, Some(record("access", Some("refresh"), 3600)));
    let err = session.client().get::<Me>("me").await.unwrap_err();

    assert_eq!(err, ApiError::http(502, "Bad Gateway"));
}

#[tokio::test]
async fn missing_credentials_is_not_authenticated() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let (session, _store) = session_with(&server, None);
    let err = session.client().get::<Me>("me").await.unwrap_err();

    assert_eq!(err, ApiError::NotAuthenticated);
}

#[tokio::test]
async fn failed_preemptive_refresh_logs_out() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/token"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": "invalid_grant",
            "error_description": "Refresh token revoked"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let (session, store) = session_with(&server, Some(record("stale", Some("refresh"), 5)));
    let mut states = session.subscribe();
    assert_eq!(*states.borrow_and_update(), SessionState::LoggedIn);

    let err = session.client().get::<Me>("me").await.unwrap_err();

    match err {
        ApiError::RefreshFailed(msg) => assert!(msg.contains("Refresh token revoked"), "{msg}"),
        other => panic!("expected RefreshFailed, got {other:?}"),
    }
    assert!(store.load(KEY).unwrap().is_none());
    assert!(states.has_changed().unwrap());
    assert_eq!(*states.borrow_and_update(), SessionState::LoggedOut);
    assert!(!session.is_logged_in());
}

#[tokio::test]
async fn failed_reactive_refresh_is_authentication_denied() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/me"))
        .respond_with(ResponseTemplate::new(403))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/token"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({ "error": "invalid_grant" })))
        .mount(&server)
        .await;

    let (session, store) = session_with(&server, Some(record("access", Some("refresh"), 3600)));
    let err = session.client().get::<Me>("me").await.unwrap_err();

    assert!(matches!(err, ApiError::AuthenticationDenied(_)), "got {err:?}");
    assert!(store.load(KEY).unwrap().is_none());
    assert!(!session.is_logged_in());
}

#[tokio::test]
async fn stale_token_without_refresh_token_logs_out() {
    let server = MockServer::start().await;
    mount_refresh(&server, "unused", 0).await;

    let (session, store) = session_with(&server, Some(record("stale", None, 10)));
    let err = session.client().get::<Me>("me").await.unwrap_err();

    assert!(matches!(err, ApiError::RefreshFailed(_)), "got {err:?}");
    assert!(store.load(KEY).unwrap().is_none());
}

#[tokio::test]
async fn logout_during_refresh_discards_the_refreshed_record() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/token"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(token_response("fresh", Some("rotated")))
                .set_delay(Duration::from_millis(300)),
        )
        .expect(1)
        .mount(&server)
        .await;
    mount_me(&server, "fresh").await;

    let (session, store) = session_with(&server, Some(record("stale", Some("refresh"), 5)));
    let session = Arc::new(session);
    let in_flight = {
        let session = session.clone();
        tokio::spawn(async move { session.current_profile().await })
    };

    tokio::time::sleep(Duration::from_millis(100)).await;
    session.logout().unwrap();
    let result = in_flight.await.unwrap();

    assert!(result.is_err(), "got {result:?}");
    assert!(store.load(KEY).unwrap().is_none());
    assert!(!session.is_logged_in());
}

/// Store that loads normally but cannot persist anything new.
struct ReadOnlyStore(MemoryTokenStore);

impl TokenStore for ReadOnlyStore {
    fn load(&self, key: &str) -> Result<Option<CredentialRecord>, ApiError> {
        self.0.load(key)
    }

    fn save(&self, _key: &str, _record: &CredentialRecord) -> Result<(), ApiError> {
        Err(ApiError::Storage("read-only store".to_string()))
    }

    fn clear(&self, key: &str) -> Result<(), ApiError> {
        self.0.clear(key)
    }
}

#[tokio::test]
async fn unsaved_refresh_logs_out() {
    let server = MockServer::start().await;
    mount_refresh(&server, "fresh", 1).await;
    mount_me(&server, "fresh").await;

    let inner = MemoryTokenStore::new();
    inner.save(KEY, &record("stale", Some("refresh"), 5)).unwrap();
    let store = Arc::new(ReadOnlyStore(inner));
    let session = Session::with_store(config_for(&server), store.clone()).expect("session");

    let err = session.client().get::<Me>("me").await.unwrap_err();

    assert!(matches!(err, ApiError::RefreshFailed(ref msg) if msg.contains("read-only")), "got {err:?}");
    assert!(store.load(KEY).unwrap().is_none());
    assert!(!session.is_logged_in());
}

// ---------------------------------------------------------------------------
// Request shapes and bodies
// ---------------------------------------------------------------------------

#[tokio::test]
async fn absolute_url_on_another_host_is_refused() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let (session, _store) = session_with(&server, Some(record("access", Some("refresh"), 3600)));
    let err = session
        .client()
        .get::<Me>("https://elsewhere.example.com/v1/me")
        .await
        .unwrap_err();

    assert!(matches!(err, ApiError::InvalidRequest(_)), "got {err:?}");
    assert!(session.is_logged_in());
}

#[tokio::test]
async fn absolute_url_on_the_api_host_is_allowed() {
    let server = MockServer::start().await;
    mount_me(&server, "access").await;

    let (session, _store) = session_with(&server, Some(record("access", Some("refresh"), 3600)));
    let me: Me = session
        .client()
        .get(&format!("{}/v1/me", server.uri()))
        .await
        .expect("same-origin request");

    assert_eq!(me.id, "user-1");
}

#[tokio::test]
async fn no_content_decodes_into_empty_response() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/v1/me/player/play"))
        .and(header("authorization", "Bearer access"))
        .and(body_string_contains("spotify:track:abc"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let (session, _store) = session_with(&server, Some(record("access", Some("refresh"), 3600)));
    let request = ApiRequest::put("me/player/play", Some(json!({ "uris": ["spotify:track:abc"] })));
    let result: EmptyResponse = session.client().execute(&request).await.expect("play");

    assert_eq!(result, EmptyResponse);
}

#[tokio::test]
async fn no_content_for_a_resource_is_no_data() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/me"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&server)
        .await;

    let (session, _store) = session_with(&server, Some(record("access", Some("refresh"), 3600)));
    let err = session.client().get::<Me>("me").await.unwrap_err();

    assert_eq!(err, ApiError::NoData);
}

#[tokio::test]
async fn query_pairs_reach_the_server() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/me/top/tracks"))
        .and(wiremock::matchers::query_param("limit", "5"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": "top" })))
        .expect(1)
        .mount(&server)
        .await;

    let (session, _store) = session_with(&server, Some(record("access", Some("refresh"), 3600)));
    let request = ApiRequest::get("me/top/tracks").with_query("limit", 5);
    let me: Me = session.client().execute(&request).await.expect("top");

    assert_eq!(me.id, "top");
}

#[tokio::test]
async fn explicit_attempt_budget_is_respected() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let (session, _store) = session_with(&server, Some(record("access", Some("refresh"), 3600)));
    let err = session
        .client()
        .execute_with_attempts::<Me>(&ApiRequest::get("me"), 3, 2)
        .await
        .unwrap_err();

    assert_eq!(err, ApiError::RetriesExhausted { attempts: 2 });
}
