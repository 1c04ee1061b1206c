#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{Duration, Utc};
use serde_json::{json, Value};
use url::Url;
use wiremock::MockServer;

use spotlink::auth::{CredentialRecord, MemoryTokenStore, TokenStore, UserAgent, UserAgentResult};
use spotlink::config::SpotlinkConfig;
use spotlink::error::ApiError;
use spotlink::session::Session;

pub const CLIENT_ID: &str = "test-client";
pub const KEY: &str = "spotify";

/// Config with every endpoint pointed at `server`.
pub fn config_for(server: &MockServer) -> SpotlinkConfig {
    let mut config = SpotlinkConfig::default().with_client_id(CLIENT_ID);
    config.authorize_url = format!("{}/authorize", server.uri());
    config.token_url = format!("{}/api/token", server.uri());
    config.api_base_url = format!("{}/v1/", server.uri());
    config
}

pub fn record(access: &str, refresh: Option<&str>, expires_in_secs: i64) -> CredentialRecord {
    CredentialRecord {
        access_token: access.to_string(),
        refresh_token: refresh.map(ToString::to_string),
        expires_at: Some(Utc::now() + Duration::seconds(expires_in_secs)),
        token_type: Some("Bearer".to_string()),
        scope: None,
    }
}

pub fn token_response(access: &str, refresh: Option<&str>) -> Value {
    let mut body = json!({
        "access_token": access,
        "token_type": "Bearer",
        "expires_in": 3600,
        "scope": "user-read-private user-read-email"
    });
    if let Some(refresh) = refresh {
        body["refresh_token"] = json!(refresh);
    }
    body
}

/// Session backed by an in-memory store, optionally seeded.
pub fn session_with(
    server: &MockServer,
    seed: Option<CredentialRecord>,
) -> (Session, Arc<MemoryTokenStore>) {
    session_with_config(config_for(server), seed)
}

pub fn session_with_config(
    config: SpotlinkConfig,
    seed: Option<CredentialRecord>,
) -> (Session, Arc<MemoryTokenStore>) {
    let store = Arc::new(MemoryTokenStore::new());
    if let Some(record) = seed {
        store.save(KEY, &record).expect("seed store");
    }
    let session = Session::with_store(config, store.clone()).expect("session");
    (session, store)
}

/// User agent that answers with a canned redirect built from the
/// authorization URL it was shown.
pub struct ScriptedUserAgent {
    query: String,
    seen: Mutex<Option<Url>>,
}

impl ScriptedUserAgent {
    /// Redirect back with `query` (for example `code=abc` or `error=access_denied`).
    pub fn redirecting_with(query: &str) -> Self {
        Self {
            query: query.to_string(),
            seen: Mutex::new(None),
        }
    }

    pub fn seen_url(&self) -> Option<Url> {
        self.seen.lock().expect("seen lock").clone()
    }
}

#[async_trait]
impl UserAgent for ScriptedUserAgent {
    async fn present(
        &self,
        authorization_url: &Url,
        redirect_uri: &Url,
    ) -> Result<UserAgentResult, ApiError> {
        *self.seen.lock().expect("seen lock") = Some(authorization_url.clone());
        let mut redirect = redirect_uri.clone();
        redirect.set_query(Some(&self.query));
        Ok(UserAgentResult::Redirect(redirect))
    }
}

/// User agent whose consent screen never completes.
pub struct PendingUserAgent;

#[async_trait]
impl UserAgent for PendingUserAgent {
    async fn present(
        &self,
        _authorization_url: &Url,
        _redirect_uri: &Url,
    ) -> Result<UserAgentResult, ApiError> {
        std::future::pending().await
    }
}

/// User agent that reports the user dismissing the consent screen.
pub struct DismissingUserAgent;

#[async_trait]
impl UserAgent for DismissingUserAgent {
    async fn present(
        &self,
        _authorization_url: &Url,
        _redirect_uri: &Url,
    ) -> Result<UserAgentResult, ApiError> {
        Ok(UserAgentResult::Cancelled)
    }
}

/// Query parameter `name` of `url`.
pub fn query_param(url: &Url, name: &str) -> Option<String> {
    url.query_pairs()
        .find(|(k, _)| k == name)
        .map(|(_, v)| v.into_owned())
}

/// Form field `name` of a urlencoded request body.
pub fn form_field(body: &[u8], name: &str) -> Option<String> {
    url::form_urlencoded::parse(body)
        .find(|(k, _)| k == name)
        .map(|(_, v)| v.into_owned())
}
