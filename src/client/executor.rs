//! Authenticated request executor.
//!
//! Attaches the stored bearer token, refreshes it before it lapses or after
//! the server rejects it, and retries up to `max_attempts` times. Refreshes are
//! single-flight: one `tokio::sync::Mutex` guards check, refresh and save.
//! Logouts and logins bump a generation counter; a refresh that started under
//! an older generation is discarded instead of saved.

use std::sync::{Arc, Mutex as StdMutex, MutexGuard};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use tokio::sync::{watch, Mutex};
use tracing::{debug, info, warn};
use url::Url;

use super::request::ApiRequest;
use crate::auth::{CredentialRecord, TokenExchange, TokenStore, DEFAULT_CREDENTIAL_KEY};
use crate::config::SpotlinkConfig;
use crate::error::ApiError;
use crate::http::{bearer_headers, status_error};
use crate::session::SessionState;

/// Decode target for endpoints that answer `204 No Content` or a body the
/// caller does not need.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EmptyResponse;

impl<'de> Deserialize<'de> for EmptyResponse {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        serde::de::IgnoredAny::deserialize(deserializer)?;
        Ok(EmptyResponse)
    }
}

/// HTTP client bound to the session's credential record.
pub struct ApiClient {
    http: reqwest::Client,
    base_url: Url,
    store: Arc<dyn TokenStore>,
    credential_key: String,
    exchange: TokenExchange,
    refresh_lock: Mutex<()>,
    generation: StdMutex<u64>,
    refresh_margin: chrono::Duration,
    max_attempts: u32,
    state: watch::Sender<SessionState>,
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", &self.base_url.as_str())
            .field("credential_key", &self.credential_key)
            .field("refresh_margin", &self.refresh_margin)
            .field("max_attempts", &self.max_attempts)
            .field("state", &*self.state.borrow())
            .finish()
    }
}

impl ApiClient {
    pub fn new(
        config: &SpotlinkConfig,
        http: reqwest::Client,
        store: Arc<dyn TokenStore>,
    ) -> Result<Self, ApiError> {
        let exchange = TokenExchange::new(
            http.clone(),
            &config.token_url,
            &config.client_id,
            &config.redirect_uri,
        );
        let refresh_margin = chrono::Duration::from_std(config.refresh_margin)
            .map_err(|e| ApiError::InvalidRequest(format!("invalid refresh margin: {e}")))?;
        let initial = match store.load(DEFAULT_CREDENTIAL_KEY)? {
            Some(record) if !record.access_token.is_empty() => SessionState::LoggedIn,
            _ => SessionState::LoggedOut,
        };
        let (state, _) = watch::channel(initial);
        Ok(Self {
            http,
            base_url: config.api_base()?,
            store,
            credential_key: DEFAULT_CREDENTIAL_KEY.to_string(),
            exchange,
            refresh_lock: Mutex::new(()),
            generation: StdMutex::new(0),
            refresh_margin,
            max_attempts: config.max_attempts,
            state,
        })
    }

    pub fn exchange(&self) -> &TokenExchange {
        &self.exchange
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    pub fn state(&self) -> SessionState {
        *self.state.borrow()
    }

    pub fn is_logged_in(&self) -> bool {
        self.state() == SessionState::LoggedIn
    }

    /// The stored credential record, if any.
    pub fn credentials(&self) -> Result<Option<CredentialRecord>, ApiError> {
        Ok(self
            .store
            .load(&self.credential_key)?
            .filter(|record| !record.access_token.is_empty()))
    }

    /// Persist a freshly obtained record and mark the session logged in.
    pub fn store_credentials(&self, record: &CredentialRecord) -> Result<(), ApiError> {
        if record.access_token.is_empty() {
            return Err(ApiError::InvalidResponse(
                "refusing to store an empty access token".to_string(),
            ));
        }
        let mut generation = self.generation();
        *generation += 1;
        self.store.save(&self.credential_key, record)?;
        self.publish(SessionState::LoggedIn);
        Ok(())
    }

    /// Clear the stored record and mark the session logged out.
    ///
    /// A refresh still in flight is discarded when it completes.
    pub fn logout(&self) -> Result<(), ApiError> {
        let mut generation = self.generation();
        *generation += 1;
        let result = self.store.clear(&self.credential_key);
        self.publish(SessionState::LoggedOut);
        info!("logged out");
        result
    }

    fn generation(&self) -> MutexGuard<'_, u64> {
        self.generation
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn force_logout(&self, reason: &ApiError) {
        warn!(error = %reason, "credential refresh failed, logging out");
        if let Err(err) = self.store.clear(&self.credential_key) {
            warn!(error = %err, "failed to clear stored credentials");
        }
        self.publish(SessionState::LoggedOut);
    }

    fn publish(&self, state: SessionState) {
        self.state.send_if_modified(|current| {
            if *current == state {
                false
            } else {
                *current = state;
                true
            }
        });
    }

    /// Refresh the stored credentials now. Failure logs the session out.
    pub async fn refresh(&self) -> Result<CredentialRecord, ApiError> {
        let current = self.credentials()?.ok_or(ApiError::NotAuthenticated)?;
        self.refresh_if_current(&current.access_token).await
    }

    /// Refresh unless another caller already replaced `stale_access_token`.
    async fn refresh_if_current(
        &self,
        stale_access_token: &str,
    ) -> Result<CredentialRecord, ApiError> {
        let _guard = self.refresh_lock.lock().await;
        let started = *self.generation();

        let current = self.credentials()?.ok_or(ApiError::NotAuthenticated)?;
        if current.access_token != stale_access_token {
            debug!("credentials already refreshed by a concurrent caller");
            return Ok(current);
        }

        let Some(refresh_token) = current.refresh_token.as_deref() else {
            let err = ApiError::NotAuthenticated;
            self.force_logout(&err);
            return Err(err);
        };

        match self.exchange.refresh(refresh_token).await {
            Ok(record) => {
                let generation = self.generation();
                if *generation != started {
                    drop(generation);
                    debug!("session changed while refreshing, discarding new credentials");
                    return self.credentials()?.ok_or(ApiError::NotAuthenticated);
                }
                // The server may have rotated the refresh token; the old one is dead.
                if let Err(err) = self.store.save(&self.credential_key, &record) {
                    self.force_logout(&err);
                    return Err(err);
                }
                self.publish(SessionState::LoggedIn);
                drop(generation);
                info!(
                    expires_in = record.seconds_remaining().unwrap_or_default(),
                    "access token refreshed"
                );
                Ok(record)
            }
            Err(err) => {
                self.force_logout(&err);
                Err(err)
            }
        }
    }

    /// Execute `request` and decode the response into `T`.
    pub async fn execute<T: DeserializeOwned>(&self, request: &ApiRequest) -> Result<T, ApiError> {
        self.execute_with_attempts(request, 1, self.max_attempts)
            .await
    }

    /// Convenience for a `GET` of `path`.
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        self.execute(&ApiRequest::get(path)).await
    }

    /// Execute starting at `attempt`, giving up once `max_attempts` is exceeded.
    pub async fn execute_with_attempts<T: DeserializeOwned>(
        &self,
        request: &ApiRequest,
        attempt: u32,
        max_attempts: u32,
    ) -> Result<T, ApiError> {
        let url = request.resolve(&self.base_url)?;
        if url.origin() != self.base_url.origin() {
            return Err(ApiError::InvalidRequest(format!(
                "refusing to send credentials to '{url}', outside {}",
                self.base_url
            )));
        }
        let mut attempt = attempt;
        loop {
            if attempt > max_attempts {
                warn!(attempts = max_attempts, url = %url, "giving up after repeated auth failures");
                return Err(ApiError::RetriesExhausted {
                    attempts: max_attempts,
                });
            }

            let record = self.credentials()?.ok_or(ApiError::NotAuthenticated)?;

            if record.expires_within(self.refresh_margin) {
                debug!(attempt, "access token near expiry, refreshing before request");
                self.refresh_if_current(&record.access_token)
                    .await
                    .map_err(|e| ApiError::RefreshFailed(e.to_string()))?;
                attempt += 1;
                continue;
            }

            let mut builder = self
                .http
                .request(request.method.clone(), url.clone())
                .headers(bearer_headers(&record.access_token)?);
            if let Some(body) = &request.body {
                builder = builder.json(body);
            }
            let response = builder
                .send()
                .await
                .map_err(|e| ApiError::Network(e.to_string()))?;

            let status = response.status();
            if status == reqwest::StatusCode::UNAUTHORIZED
                || status == reqwest::StatusCode::FORBIDDEN
            {
                debug!(attempt, status = status.as_u16(), "access token rejected, refreshing");
                self.refresh_if_current(&record.access_token)
                    .await
                    .map_err(|e| ApiError::AuthenticationDenied(e.to_string()))?;
                attempt += 1;
                continue;
            }
            if !status.is_success() {
                return Err(status_error(response).await);
            }

            let body = response
                .bytes()
                .await
                .map_err(|e| ApiError::Network(e.to_string()))?;
            return decode_body(&body);
        }
    }
}

fn decode_body<T: DeserializeOwned>(body: &[u8]) -> Result<T, ApiError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return serde_json::from_slice(b"null").map_err(|_| ApiError::NoData);
    }
    Ok(serde_json::from_slice(body)?)
}
