//! Error types for spotlink.

use thiserror::Error;

/// Every failure surfaced by the session, executor and flow controller.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("HTTP error (status {status}): {detail}")]
    HttpStatus { status: u16, detail: String },

    #[error("No data in response")]
    NoData,

    #[error("Decoding error: {0}")]
    Decode(String),

    #[error("Not logged in")]
    NotAuthenticated,

    #[error("Token refresh failed: {0}")]
    RefreshFailed(String),

    #[error("Authentication denied: {0}")]
    AuthenticationDenied(String),

    #[error("Retries exhausted after {attempts} attempts")]
    RetriesExhausted { attempts: u32 },

    #[error("Credential storage error: {0}")]
    Storage(String),
}

/// Broad error category for routing presentation-layer messaging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Request,
    Transport,
    Server,
    Authentication,
    Storage,
}

impl ApiError {
    /// Build an HTTP status error.
    pub fn http(status: u16, detail: impl Into<String>) -> Self {
        Self::HttpStatus {
            status,
            detail: detail.into(),
        }
    }

    /// Classify this error into a category.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::InvalidRequest(_) => ErrorCategory::Request,
            Self::Network(_) | Self::InvalidResponse(_) | Self::NoData | Self::Decode(_) => {
                ErrorCategory::Transport
            }
            Self::HttpStatus { status, .. } => match status {
                401 | 403 => ErrorCategory::Authentication,
                400..=499 => ErrorCategory::Request,
                _ => ErrorCategory::Server,
            },
            Self::NotAuthenticated
            | Self::RefreshFailed(_)
            | Self::AuthenticationDenied(_)
            | Self::RetriesExhausted { .. } => ErrorCategory::Authentication,
            Self::Storage(_) => ErrorCategory::Storage,
        }
    }

    /// Whether the user has to sign in again to recover.
    pub fn is_auth_error(&self) -> bool {
        self.category() == ErrorCategory::Authentication
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_decode() {
            Self::Decode(error.to_string())
        } else if error.is_builder() {
            Self::InvalidRequest(error.to_string())
        } else {
            Self::Network(error.to_string())
        }
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(error: serde_json::Error) -> Self {
        Self::Decode(error.to_string())
    }
}

impl From<url::ParseError> for ApiError {
    fn from(error: url::ParseError) -> Self {
        Self::InvalidRequest(error.to_string())
    }
}

impl From<std::io::Error> for ApiError {
    fn from(error: std::io::Error) -> Self {
        Self::Storage(error.to_string())
    }
}

impl From<toml::de::Error> for ApiError {
    fn from(error: toml::de::Error) -> Self {
        Self::Storage(error.to_string())
    }
}

impl From<toml::ser::Error> for ApiError {
    fn from(error: toml::ser::Error) -> Self {
        Self::Storage(error.to_string())
    }
}

/// Convenience alias.
pub type Result<T> = std::result::Result<T, ApiError>;
