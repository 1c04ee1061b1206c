//! Shared HTTP client construction and error-body helpers.

use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION};
use serde::Deserialize;

use crate::error::ApiError;

const USER_AGENT: &str = concat!("spotlink/", env!("CARGO_PKG_VERSION"));

/// Build the reqwest client used for both the token endpoint and the Web API.
pub fn build_client(timeout: Duration) -> Result<reqwest::Client, ApiError> {
    reqwest::Client::builder()
        .timeout(timeout)
        .user_agent(USER_AGENT)
        .pool_max_idle_per_host(10)
        .build()
        .map_err(|e| ApiError::InvalidRequest(format!("failed to build HTTP client: {e}")))
}

/// Build default headers for a Bearer-token API call.
pub fn bearer_headers(access_token: &str) -> Result<HeaderMap, ApiError> {
    let mut headers = HeaderMap::new();
    headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
    let value = HeaderValue::from_str(&format!("Bearer {access_token}")).map_err(|_| {
        ApiError::InvalidRequest("access token contains invalid header characters".to_string())
    })?;
    headers.insert(AUTHORIZATION, value);
    Ok(headers)
}

#[derive(Debug, Deserialize)]
struct StructuredErrorBody {
    error: StructuredError,
}

#[derive(Debug, Deserialize)]
struct StructuredError {
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FlatErrorBody {
    error: Option<String>,
    error_description: Option<String>,
}

/// Extract a human-readable detail from a non-2xx response body.
///
/// Tries the Web API shape `{"error": {"message": ..}}`, then the OAuth shape
/// `{"error_description": .., "error": ..}`, then the raw body text, and finally
/// falls back to `status N`.
pub fn extract_error_detail(status: u16, body: &[u8]) -> String {
    if let Ok(parsed) = serde_json::from_slice::<StructuredErrorBody>(body) {
        if let Some(message) = parsed.error.message.filter(|m| !m.is_empty()) {
            return message;
        }
    }
    if let Ok(parsed) = serde_json::from_slice::<FlatErrorBody>(body) {
        if let Some(detail) = parsed
            .error_description
            .filter(|d| !d.is_empty())
            .or(parsed.error.filter(|e| !e.is_empty()))
        {
            return detail;
        }
    }
    let text = String::from_utf8_lossy(body);
    let text = text.trim();
    if !text.is_empty() {
        return text.to_string();
    }
    format!("status {status}")
}

/// Map a completed non-2xx response to [`ApiError::HttpStatus`].
pub async fn status_error(response: reqwest::Response) -> ApiError {
    let status = response.status().as_u16();
    let body = response.bytes().await.unwrap_or_default();
    ApiError::http(status, extract_error_detail(status, &body))
}
