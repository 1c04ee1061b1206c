//! Presentation of the authorization URL to the user.

use std::sync::Arc;

use async_trait::async_trait;
use axum::extract::{Query, RawQuery};
use axum::response::Html;
use axum::routing::get;
use axum::Router;
use serde::Deserialize;
use tokio::net::TcpListener;
use tokio::sync::{oneshot, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use url::Url;

use crate::error::ApiError;

/// How an interactive consent step ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserAgentResult {
    /// The provider redirected back; the URL carries `code` or `error`.
    Redirect(Url),
    /// The user dismissed the consent screen.
    Cancelled,
}

/// Something able to show the consent screen and capture the redirect.
///
/// The wait has no timeout. Callers race it against
/// [`AuthorizationFlow::cancel`](super::AuthorizationFlow::cancel) instead.
#[async_trait]
pub trait UserAgent: Send + Sync {
    async fn present(
        &self,
        authorization_url: &Url,
        redirect_uri: &Url,
    ) -> Result<UserAgentResult, ApiError>;
}

/// Opens the system browser and listens on the loopback redirect URI.
#[derive(Debug, Clone)]
pub struct LoopbackUserAgent {
    open_browser: bool,
}

impl Default for LoopbackUserAgent {
    fn default() -> Self {
        Self::new()
    }
}

impl LoopbackUserAgent {
    pub fn new() -> Self {
        Self { open_browser: true }
    }

    /// Only log the authorization URL; the user opens it by hand.
    pub fn without_browser() -> Self {
        Self {
            open_browser: false,
        }
    }
}

#[async_trait]
impl UserAgent for LoopbackUserAgent {
    async fn present(
        &self,
        authorization_url: &Url,
        redirect_uri: &Url,
    ) -> Result<UserAgentResult, ApiError> {
        if redirect_uri.scheme() != "http" {
            return Err(ApiError::InvalidRequest(format!(
                "loopback listener needs an http redirect URI, got '{redirect_uri}'"
            )));
        }
        let host = match redirect_uri.host_str() {
            Some("localhost") | None => "127.0.0.1",
            Some(host) => host,
        };
        let port = redirect_uri.port_or_known_default().unwrap_or(80);
        let listener = TcpListener::bind((host, port))
            .await
            .map_err(|e| ApiError::InvalidRequest(format!("failed to bind {host}:{port}: {e}")))?;

        let (tx, rx) = oneshot::channel::<Url>();
        let tx = Arc::new(Mutex::new(Some(tx)));
        let app = callback_router(redirect_uri, tx);

        let shutdown = CancellationToken::new();
        // Stops the listener once a redirect arrives or this future is dropped.
        let _guard = shutdown.clone().drop_guard();
        let signal = shutdown;
        tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app)
                .with_graceful_shutdown(async move { signal.cancelled().await })
                .await
            {
                warn!("callback listener shut down with error: {e}");
            }
        });

        info!(callback = %redirect_uri, "waiting for authorization callback");
        if self.open_browser {
            if let Err(e) = open::that(authorization_url.as_str()) {
                warn!("could not open browser automatically: {e}");
                info!("open this URL to continue: {authorization_url}");
            }
        } else {
            info!("open this URL to continue: {authorization_url}");
        }

        let redirect = rx
            .await
            .map_err(|_| ApiError::InvalidResponse("callback listener closed".to_string()))?;
        Ok(UserAgentResult::Redirect(redirect))
    }
}

#[derive(Debug, Deserialize)]
struct CallbackParams {
    code: Option<String>,
    error: Option<String>,
}

fn callback_router(redirect_uri: &Url, tx: Arc<Mutex<Option<oneshot::Sender<Url>>>>) -> Router {
    let base = redirect_uri.clone();
    let path = match redirect_uri.path() {
        "" => "/".to_string(),
        p => p.to_string(),
    };
    Router::new().route(
        &path,
        get(
            move |Query(params): Query<CallbackParams>, RawQuery(raw): RawQuery| {
                let tx = tx.clone();
                let mut redirect = base.clone();
                async move {
                    redirect.set_query(raw.as_deref());
                    let page = callback_page(&params);
                    if params.code.is_some() || params.error.is_some() {
                        if let Some(sender) = tx.lock().await.take() {
                            let _ = sender.send(redirect);
                        }
                    }
                    Html(page)
                }
            },
        ),
    )
}

fn callback_page(params: &CallbackParams) -> String {
    let (title, message) = match (&params.code, &params.error) {
        (Some(_), _) => (
            "Authorization Successful",
            "You can close this window and return to the terminal.".to_string(),
        ),
        (None, Some(error)) => ("Authorization Failed", format!("Error: {error}")),
        (None, None) => (
            "Authorization Failed",
            "No authorization code received.".to_string(),
        ),
    };
    format!(
        r#"<!DOCTYPE html>
<html>
<head><title>{title}</title></head>
<body style="font-family: sans-serif; text-align: center; padding: 50px;">
    <h1>{title}</h1>
    <p>{message}</p>
</body>
</html>"#
    )
}
