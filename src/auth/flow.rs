//! Authorization-code flow controller.
//!
//! Drives one consent attempt at a time through `Idle -> Authorizing ->
//! Exchanging -> Idle`. The PKCE verifier lives only inside the controller and
//! is consumed by exactly one exchange.

use std::sync::{Mutex, MutexGuard};

use strum::Display;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use url::Url;

use super::exchange::TokenExchange;
use super::pkce::{PkcePair, CHALLENGE_METHOD};
use super::token::CredentialRecord;
use super::user_agent::{UserAgent, UserAgentResult};
use crate::config::SpotlinkConfig;
use crate::error::ApiError;

/// Where the controller is in the current attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "snake_case")]
pub enum FlowPhase {
    Idle,
    Authorizing,
    Exchanging,
}

/// An initiated attempt: the URL to show the user.
#[derive(Debug, Clone)]
pub struct AuthorizationRequest {
    pub url: Url,
    cancellation: CancellationToken,
}

impl AuthorizationRequest {
    /// Fires when the attempt is cancelled.
    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancellation
    }
}

/// Terminal result of a callback or a full [`AuthorizationFlow::authorize`] run.
///
/// Denial and failures are reported as `Err`; cancellation is not an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthorizationOutcome {
    Authorized(CredentialRecord),
    Cancelled,
    /// A callback arrived with no attempt outstanding and was dropped.
    Ignored,
}

#[derive(Debug)]
struct FlowState {
    phase: FlowPhase,
    verifier: Option<String>,
    cancellation: Option<CancellationToken>,
}

impl FlowState {
    fn reset(&mut self) {
        self.phase = FlowPhase::Idle;
        self.verifier = None;
        self.cancellation = None;
    }
}

/// Authorization flow controller.
#[derive(Debug)]
pub struct AuthorizationFlow {
    exchange: TokenExchange,
    authorize_url: String,
    client_id: String,
    redirect_uri: String,
    scopes: Vec<String>,
    show_dialog: bool,
    state: Mutex<FlowState>,
}

impl AuthorizationFlow {
    pub fn new(config: &SpotlinkConfig, exchange: TokenExchange) -> Self {
        Self {
            exchange,
            authorize_url: config.authorize_url.clone(),
            client_id: config.client_id.clone(),
            redirect_uri: config.redirect_uri.clone(),
            scopes: config.scopes.clone(),
            show_dialog: config.show_dialog,
            state: Mutex::new(FlowState {
                phase: FlowPhase::Idle,
                verifier: None,
                cancellation: None,
            }),
        }
    }

    pub fn phase(&self) -> FlowPhase {
        self.state().phase
    }

    pub fn redirect_uri(&self) -> Result<Url, ApiError> {
        Ok(Url::parse(&self.redirect_uri)?)
    }

    /// Start an attempt: fresh PKCE pair, authorization URL, phase `Authorizing`.
    pub fn begin(&self) -> Result<AuthorizationRequest, ApiError> {
        let mut state = self.state();
        if state.phase != FlowPhase::Idle {
            return Err(ApiError::InvalidRequest(format!(
                "authorization already in progress ({})",
                state.phase
            )));
        }

        let pkce = PkcePair::generate()?;
        let url = self.authorization_url(pkce.challenge())?;
        let cancellation = CancellationToken::new();

        state.phase = FlowPhase::Authorizing;
        state.verifier = Some(pkce.into_verifier());
        state.cancellation = Some(cancellation.clone());
        debug!(phase = %state.phase, "authorization attempt started");

        Ok(AuthorizationRequest { url, cancellation })
    }

    fn authorization_url(&self, challenge: &str) -> Result<Url, ApiError> {
        let mut url = Url::parse(&self.authorize_url)
            .map_err(|e| ApiError::InvalidRequest(format!("invalid authorize URL: {e}")))?;
        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair("client_id", &self.client_id)
                .append_pair("response_type", "code")
                .append_pair("redirect_uri", &self.redirect_uri)
                .append_pair("scope", &self.scopes.join(" "))
                .append_pair("code_challenge", challenge)
                .append_pair("code_challenge_method", CHALLENGE_METHOD);
            if self.show_dialog {
                query.append_pair("show_dialog", "true");
            }
        }
        Ok(url)
    }

    /// Process the provider's redirect back to us.
    ///
    /// `code` is exchanged with the outstanding verifier; `error` ends the
    /// attempt with [`ApiError::AuthenticationDenied`]. A callback with no
    /// attempt in `Authorizing` is [`AuthorizationOutcome::Ignored`].
    pub async fn handle_redirect(&self, redirect: &Url) -> Result<AuthorizationOutcome, ApiError> {
        let mut code = None;
        let mut error = None;
        for (key, value) in redirect.query_pairs() {
            match key.as_ref() {
                "code" => code = Some(value.into_owned()),
                "error" => error = Some(value.into_owned()),
                _ => {}
            }
        }

        let verifier = {
            let mut state = self.state();
            if state.phase != FlowPhase::Authorizing {
                debug!(phase = %state.phase, "ignoring callback with no outstanding attempt");
                return Ok(AuthorizationOutcome::Ignored);
            }
            if let Some(reason) = error {
                state.reset();
                warn!(reason = %reason, "authorization denied");
                return Err(ApiError::AuthenticationDenied(reason));
            }
            if code.is_none() {
                state.reset();
                return Err(ApiError::InvalidResponse(
                    "callback carried neither code nor error".to_string(),
                ));
            }
            state.phase = FlowPhase::Exchanging;
            state.cancellation = None;
            state.verifier.take()
        };

        let (Some(code), Some(verifier)) = (code, verifier) else {
            self.state().reset();
            return Err(ApiError::InvalidRequest(
                "no PKCE verifier outstanding".to_string(),
            ));
        };
        self.run_exchange(&code, &verifier).await
    }

    /// Exchange `code` using the outstanding verifier, which is consumed either way.
    pub async fn exchange_code(&self, code: &str) -> Result<AuthorizationOutcome, ApiError> {
        let verifier = {
            let mut state = self.state();
            let Some(verifier) = state.verifier.take() else {
                return Err(ApiError::InvalidRequest(
                    "no PKCE verifier outstanding".to_string(),
                ));
            };
            state.phase = FlowPhase::Exchanging;
            state.cancellation = None;
            verifier
        };
        self.run_exchange(code, &verifier).await
    }

    async fn run_exchange(
        &self,
        code: &str,
        verifier: &str,
    ) -> Result<AuthorizationOutcome, ApiError> {
        let result = self.exchange.exchange_code(code, verifier).await;
        self.state().reset();
        match result {
            Ok(record) => {
                info!("authorization code exchanged");
                Ok(AuthorizationOutcome::Authorized(record))
            }
            Err(err) => {
                warn!(error = %err, "authorization code exchange failed");
                Err(err)
            }
        }
    }

    /// Abandon the outstanding attempt. Exchanges already in flight run to completion.
    pub fn cancel(&self) {
        let mut state = self.state();
        if state.phase != FlowPhase::Authorizing {
            return;
        }
        if let Some(token) = state.cancellation.take() {
            token.cancel();
        }
        state.reset();
        info!("authorization attempt cancelled");
    }

    /// Run a whole attempt through `user_agent`.
    pub async fn authorize(
        &self,
        user_agent: &dyn UserAgent,
    ) -> Result<AuthorizationOutcome, ApiError> {
        let request = self.begin()?;
        let redirect_uri = match self.redirect_uri() {
            Ok(uri) => uri,
            Err(err) => {
                self.cancel();
                return Err(err);
            }
        };
        let cancellation = request.cancellation().clone();

        let presented = tokio::select! {
            _ = cancellation.cancelled() => return Ok(AuthorizationOutcome::Cancelled),
            result = user_agent.present(&request.url, &redirect_uri) => result,
        };

        match presented {
            Ok(UserAgentResult::Redirect(url)) => self.handle_redirect(&url).await,
            Ok(UserAgentResult::Cancelled) => {
                self.cancel();
                Ok(AuthorizationOutcome::Cancelled)
            }
            Err(err) => {
                self.cancel();
                Err(err)
            }
        }
    }

    fn state(&self) -> MutexGuard<'_, FlowState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
