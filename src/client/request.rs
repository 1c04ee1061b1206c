use bon::Builder;
use reqwest::Method;
use url::Url;

use crate::error::ApiError;

/// A Web API call, minus credentials.
///
/// `path` is either relative to the API base URL (`me/playlists`) or an
/// absolute URL such as a page's `next` locator.
///
/// # Example
/// ```
/// use spotlink::client::ApiRequest;
/// use reqwest::Method;
///
/// let request = ApiRequest::builder()
///     .method(Method::PUT)
///     .path("me/player/play")
///     .body(serde_json::json!({ "uris": ["spotify:track:4uLU6hMCjMI75M1A2tKUQC"] }))
///     .build();
/// assert_eq!(request.method, Method::PUT);
/// ```
#[derive(Debug, Clone, Builder)]
pub struct ApiRequest {
    #[builder(default = Method::GET)]
    pub method: Method,
    #[builder(into)]
    pub path: String,
    #[builder(default)]
    pub query: Vec<(String, String)>,
    pub body: Option<serde_json::Value>,
}

impl ApiRequest {
    pub fn get(path: impl Into<String>) -> Self {
        Self::builder().path(path).build()
    }

    pub fn post(path: impl Into<String>, body: serde_json::Value) -> Self {
        Self::builder()
            .method(Method::POST)
            .path(path)
            .body(body)
            .build()
    }

    pub fn put(path: impl Into<String>, body: Option<serde_json::Value>) -> Self {
        Self::builder()
            .method(Method::PUT)
            .path(path)
            .maybe_body(body)
            .build()
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::builder().method(Method::DELETE).path(path).build()
    }

    pub fn with_query(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.query.push((key.into(), value.to_string()));
        self
    }

    /// Absolute URL for this request against `base`.
    pub fn resolve(&self, base: &Url) -> Result<Url, ApiError> {
        if self.path.trim().is_empty() {
            return Err(ApiError::InvalidRequest("request path is empty".to_string()));
        }
        let mut url = if self.path.starts_with("http://") || self.path.starts_with("https://") {
            Url::parse(&self.path)?
        } else {
            base.join(self.path.trim_start_matches('/'))?
        };
        if !self.query.is_empty() {
            url.query_pairs_mut().extend_pairs(
                self.query
                    .iter()
                    .map(|(k, v)| (k.as_str(), v.as_str())),
            );
        }
        Ok(url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Url {
        Url::parse("https://api.spotify.com/v1/").unwrap()
    }

    #[test]
    fn relative_path_joins_under_base() {
        let url = ApiRequest::get("/me/playlists").resolve(&base()).unwrap();
        assert_eq!(url.as_str(), "https://api.spotify.com/v1/me/playlists");
    }

    #[test]
    fn absolute_locator_is_used_verbatim() {
        let next = "https://api.spotify.com/v1/me/playlists?offset=20&limit=20";
        let url = ApiRequest::get(next).resolve(&base()).unwrap();
        assert_eq!(url.as_str(), next);
    }

    #[test]
    fn query_pairs_are_appended() {
        let url = ApiRequest::get("me/playlists")
            .with_query("limit", 50)
            .resolve(&base())
            .unwrap();
        assert_eq!(url.query(), Some("limit=50"));
    }

    #[test]
    fn empty_path_is_invalid() {
        assert!(matches!(
            ApiRequest::get("  ").resolve(&base()),
            Err(ApiError::InvalidRequest(_))
        ));
    }

    #[test]
    fn builder_defaults_to_get_without_body() {
        let request = ApiRequest::builder().path("me").build();
        assert_eq!(request.method, Method::GET);
        assert!(request.body.is_none());
        assert!(request.query.is_empty());
    }
}
