use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Credential record held by a [`TokenStore`](super::TokenStore).
///
/// # Example
/// ```
/// use spotlink::auth::CredentialRecord;
/// use chrono::{Duration, Utc};
///
/// let record = CredentialRecord {
///     access_token: "access".to_string(),
///     refresh_token: Some("refresh".to_string()),
///     expires_at: Some(Utc::now() + Duration::hours(1)),
///     token_type: Some("Bearer".to_string()),
///     scope: None,
/// };
/// assert!(!record.expires_within(Duration::seconds(30)));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialRecord {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub token_type: Option<String>,
    #[serde(default)]
    pub scope: Option<String>,
}

impl CredentialRecord {
    /// True if the token expires within `margin` of now. Records without an
    /// expiry are treated as long-lived.
    pub fn expires_within(&self, margin: Duration) -> bool {
        self.expires_within_at(margin, Utc::now())
    }

    pub fn expires_within_at(&self, margin: Duration, now: DateTime<Utc>) -> bool {
        match self.expires_at {
            Some(expires_at) => expires_at - now <= margin,
            None => false,
        }
    }

    pub fn is_expired(&self) -> bool {
        self.expires_within(Duration::zero())
    }

    /// Seconds left before expiry, negative once expired.
    pub fn seconds_remaining(&self) -> Option<i64> {
        self.expires_at.map(|at| (at - Utc::now()).num_seconds())
    }
}
