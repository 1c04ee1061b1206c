//! Session facade: the surface presentation layers talk to.
//!
//! A [`Session`] owns the credential store, the authorization flow and the
//! authenticated client. Construct one and share it behind an `Arc`; there is
//! no global instance.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use strum::Display;
use tokio::sync::watch;
use tracing::{info, warn};

use crate::api::{fetch_first_page, fetch_next_page, PagedResult, Playlist, PlaylistTrack, UserProfile};
use crate::auth::{
    AuthorizationFlow, AuthorizationOutcome, FileTokenStore, TokenStore, UserAgent,
};
use crate::client::ApiClient;
use crate::config::SpotlinkConfig;
use crate::error::{ApiError, ErrorCategory};
use crate::http::build_client;

/// Whether a usable credential record is held.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "snake_case")]
pub enum SessionState {
    LoggedOut,
    LoggedIn,
}

/// Signed-in session against the Web API.
///
/// # Example
/// ```no_run
/// use spotlink::auth::LoopbackUserAgent;
/// use spotlink::config::SpotlinkConfig;
/// use spotlink::session::Session;
///
/// # async fn example() -> spotlink::error::Result<()> {
/// let session = Session::new(SpotlinkConfig::load()?)?;
/// if !session.is_logged_in() {
///     session.login(&LoopbackUserAgent::new()).await?;
/// }
/// let me = session.current_profile().await?;
/// println!("signed in as {}", me.display_name.unwrap_or(me.id));
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct Session {
    config: SpotlinkConfig,
    client: ApiClient,
    flow: AuthorizationFlow,
}

impl Session {
    /// Session persisting credentials under the configured token directory.
    pub fn new(config: SpotlinkConfig) -> Result<Self, ApiError> {
        let store = FileTokenStore::new(config.token_store_dir());
        Self::with_store(config, Arc::new(store))
    }

    pub fn with_store(
        config: SpotlinkConfig,
        store: Arc<dyn TokenStore>,
    ) -> Result<Self, ApiError> {
        config.validate()?;
        let http = build_client(config.request_timeout)?;
        let client = ApiClient::new(&config, http, store)?;
        let flow = AuthorizationFlow::new(&config, client.exchange().clone());
        Ok(Self {
            config,
            client,
            flow,
        })
    }

    pub fn config(&self) -> &SpotlinkConfig {
        &self.config
    }

    pub fn client(&self) -> &ApiClient {
        &self.client
    }

    pub fn flow(&self) -> &AuthorizationFlow {
        &self.flow
    }

    /// Bring the session up from persisted state.
    ///
    /// A valid record logs in; an expired one is refreshed. A refresh the
    /// server rejects logs out, while transport and storage failures are
    /// returned.
    pub async fn restore(&self) -> Result<SessionState, ApiError> {
        let Some(record) = self.client.credentials()? else {
            return Ok(SessionState::LoggedOut);
        };
        if record.is_expired() {
            info!("stored access token expired, refreshing");
            if let Err(err) = self.client.refresh().await {
                if matches!(
                    err.category(),
                    ErrorCategory::Transport | ErrorCategory::Storage
                ) {
                    return Err(err);
                }
                warn!(error = %err, "could not restore session");
                return Ok(SessionState::LoggedOut);
            }
        }
        Ok(self.client.state())
    }

    /// Run the interactive authorization flow and persist the result.
    pub async fn login(&self, user_agent: &dyn UserAgent) -> Result<AuthorizationOutcome, ApiError> {
        let outcome = self.flow.authorize(user_agent).await?;
        if let AuthorizationOutcome::Authorized(record) = &outcome {
            self.client.store_credentials(record)?;
            info!("login complete");
        }
        Ok(outcome)
    }

    /// Abandon an in-progress [`login`](Self::login).
    pub fn cancel_login(&self) {
        self.flow.cancel();
    }

    pub fn logout(&self) -> Result<(), ApiError> {
        self.client.logout()
    }

    pub fn is_logged_in(&self) -> bool {
        self.client.is_logged_in()
    }

    /// Receiver notified on every login/logout transition.
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.client.subscribe()
    }

    pub async fn current_profile(&self) -> Result<UserProfile, ApiError> {
        self.client.get("me").await
    }

    /// First page of `resource`, or the page at `locator` when continuing.
    pub async fn fetch_page<T: DeserializeOwned>(
        &self,
        resource: &str,
        locator: Option<&str>,
    ) -> Result<PagedResult<T>, ApiError> {
        match locator {
            Some(locator) => fetch_next_page(&self.client, Some(locator)).await,
            None => fetch_first_page(&self.client, resource).await,
        }
    }

    pub async fn user_playlists(&self) -> Result<PagedResult<Playlist>, ApiError> {
        self.fetch_page("me/playlists", None).await
    }

    pub async fn playlist_tracks(
        &self,
        playlist_id: &str,
    ) -> Result<PagedResult<PlaylistTrack>, ApiError> {
        self.fetch_page(&playlist_tracks_path(playlist_id)?, None)
            .await
    }
}

/// Relative path of a playlist's track listing.
pub fn playlist_tracks_path(playlist_id: &str) -> Result<String, ApiError> {
    let id = playlist_id.trim();
    if id.is_empty() || !id.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(ApiError::InvalidRequest(format!(
            "invalid playlist id '{playlist_id}'"
        )));
    }
    Ok(format!("playlists/{id}/tracks"))
}
