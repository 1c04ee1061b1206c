//! Token endpoint client: authorization-code exchange and refresh.
//!
//! The engine is a pure function of request to result. Writing the returned
//! [`CredentialRecord`] to a store is the caller's job.

use chrono::{Duration, Utc};
use serde::Deserialize;
use tracing::{debug, warn};

use super::token::CredentialRecord;
use crate::error::ApiError;
use crate::http::status_error;

/// Client for the OAuth token endpoint.
///
/// # Example
/// ```no_run
/// use spotlink::auth::TokenExchange;
///
/// # async fn example() -> spotlink::error::Result<()> {
/// let engine = TokenExchange::new(
///     reqwest::Client::new(),
///     "https://accounts.spotify.com/api/token",
///     "client-id",
///     "myapp://callback",
/// );
/// let record = engine.refresh("stored-refresh-token").await?;
/// println!("new token expires at {:?}", record.expires_at);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct TokenExchange {
    client: reqwest::Client,
    token_url: String,
    client_id: String,
    redirect_uri: String,
}

impl TokenExchange {
    pub fn new(
        client: reqwest::Client,
        token_url: impl Into<String>,
        client_id: impl Into<String>,
        redirect_uri: impl Into<String>,
    ) -> Self {
        Self {
            client,
            token_url: token_url.into(),
            client_id: client_id.into(),
            redirect_uri: redirect_uri.into(),
        }
    }

    pub fn token_url(&self) -> &str {
        &self.token_url
    }

    /// Exchange an authorization code plus its PKCE verifier for credentials.
    pub async fn exchange_code(
        &self,
        code: &str,
        verifier: &str,
    ) -> Result<CredentialRecord, ApiError> {
        if code.is_empty() || verifier.is_empty() {
            return Err(ApiError::InvalidRequest(
                "authorization code and verifier are required".to_string(),
            ));
        }
        debug!("exchanging authorization code for tokens");
        let payload = self
            .post_form(&[
                ("client_id", self.client_id.as_str()),
                ("grant_type", "authorization_code"),
                ("code", code),
                ("redirect_uri", self.redirect_uri.as_str()),
                ("code_verifier", verifier),
            ])
            .await?;
        Ok(payload.into_record(None))
    }

    /// Trade a refresh token for a new credential record.
    ///
    /// If the response omits `refresh_token`, the one sent is carried over.
    pub async fn refresh(&self, refresh_token: &str) -> Result<CredentialRecord, ApiError> {
        if refresh_token.is_empty() {
            return Err(ApiError::InvalidRequest(
                "refresh token is required".to_string(),
            ));
        }
        debug!("refreshing access token");
        let payload = self
            .post_form(&[
                ("client_id", self.client_id.as_str()),
                ("grant_type", "refresh_token"),
                ("refresh_token", refresh_token),
            ])
            .await?;
        Ok(payload.into_record(Some(refresh_token)))
    }

    async fn post_form(&self, form: &[(&str, &str)]) -> Result<TokenResponse, ApiError> {
        let resp = self
            .client
            .post(&self.token_url)
            .header("Content-Type", "application/x-www-form-urlencoded")
            .form(form)
            .send()
            .await
            .map_err(|e| ApiError::Network(e.to_string()))?;

        if !resp.status().is_success() {
            let err = status_error(resp).await;
            warn!(error = %err, "token endpoint rejected request");
            return Err(err);
        }

        let body = resp
            .bytes()
            .await
            .map_err(|e| ApiError::Network(e.to_string()))?;
        if body.iter().all(u8::is_ascii_whitespace) {
            return Err(ApiError::NoData);
        }
        let payload: TokenResponse = serde_json::from_slice(&body)?;
        if payload.access_token.is_empty() {
            return Err(ApiError::InvalidResponse(
                "token endpoint returned an empty access token".to_string(),
            ));
        }
        Ok(payload)
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    token_type: String,
    expires_in: i64,
    #[serde(default)]
    scope: Option<String>,
    #[serde(default)]
    refresh_token: Option<String>,
}

impl TokenResponse {
    fn into_record(self, previous_refresh_token: Option<&str>) -> CredentialRecord {
        let refresh_token = self
            .refresh_token
            .filter(|t| !t.is_empty())
            .or_else(|| previous_refresh_token.map(ToString::to_string));
        CredentialRecord {
            access_token: self.access_token,
            refresh_token,
            expires_at: Some(Utc::now() + Duration::seconds(self.expires_in)),
            token_type: Some(self.token_type),
            scope: self.scope,
        }
    }
}
