//! Configuration system (layered: code > env > config file > defaults).

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::auth::store::default_token_dir;
use crate::error::ApiError;

pub const DEFAULT_AUTHORIZE_URL: &str = "https://accounts.spotify.com/authorize";
pub const DEFAULT_TOKEN_URL: &str = "https://accounts.spotify.com/api/token";
pub const DEFAULT_API_BASE_URL: &str = "https://api.spotify.com/v1/";
pub const DEFAULT_REDIRECT_URI: &str = "http://127.0.0.1:8888/callback";

/// Upper bound on the preemptive refresh margin.
pub const MAX_REFRESH_MARGIN: Duration = Duration::from_secs(30);

pub const DEFAULT_SCOPES: &[&str] = &[
    "user-read-private",
    "user-read-email",
    "playlist-read-private",
    "playlist-read-collaborative",
    "playlist-modify-public",
    "playlist-modify-private",
    "user-library-read",
    "user-top-read",
    "user-modify-playback-state",
];

/// Runtime configuration for a [`Session`](crate::session::Session).
///
/// Resolution order, lowest to highest:
/// 1. built-in defaults
/// 2. `~/.spotlink/config.toml`
/// 3. `SPOTLINK_*` environment variables (a `.env` file is honoured)
/// 4. values set in code on the returned struct
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpotlinkConfig {
    pub client_id: String,
    pub redirect_uri: String,
    pub scopes: Vec<String>,
    pub authorize_url: String,
    pub token_url: String,
    pub api_base_url: String,
    pub refresh_margin: Duration,
    pub max_attempts: u32,
    pub show_dialog: bool,
    pub request_timeout: Duration,
    pub token_dir: Option<PathBuf>,
}

impl Default for SpotlinkConfig {
    fn default() -> Self {
        Self {
            client_id: String::new(),
            redirect_uri: DEFAULT_REDIRECT_URI.to_string(),
            scopes: DEFAULT_SCOPES.iter().map(ToString::to_string).collect(),
            authorize_url: DEFAULT_AUTHORIZE_URL.to_string(),
            token_url: DEFAULT_TOKEN_URL.to_string(),
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            refresh_margin: MAX_REFRESH_MARGIN,
            max_attempts: 2,
            show_dialog: true,
            request_timeout: Duration::from_secs(30),
            token_dir: None,
        }
    }
}

/// On-disk shape of `config.toml`. Every key is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub client_id: Option<String>,
    pub redirect_uri: Option<String>,
    pub scopes: Option<Vec<String>>,
    pub authorize_url: Option<String>,
    pub token_url: Option<String>,
    pub api_base_url: Option<String>,
    pub refresh_margin_secs: Option<u64>,
    pub max_attempts: Option<u32>,
    pub show_dialog: Option<bool>,
    pub request_timeout_secs: Option<u64>,
    pub token_dir: Option<PathBuf>,
}

impl SpotlinkConfig {
    /// Defaults, then the default config file if present, then the environment.
    pub fn load() -> Result<Self, ApiError> {
        Self::load_from(&default_config_path())
    }

    /// Like [`load`](Self::load) but reading the config file at `path`.
    pub fn load_from(path: &Path) -> Result<Self, ApiError> {
        let _ = dotenvy::dotenv(); // load .env if present, ignore error
        let mut config = Self::default();
        if let Some(file) = FileConfig::read(path)? {
            config.apply_file(file);
        }
        config.apply_env_with(|name| std::env::var(name).ok())?;
        Ok(config)
    }

    /// Overlay values present in a parsed config file.
    pub fn apply_file(&mut self, file: FileConfig) {
        if let Some(v) = file.client_id {
            self.client_id = v;
        }
        if let Some(v) = file.redirect_uri {
            self.redirect_uri = v;
        }
        if let Some(v) = file.scopes {
            self.scopes = v;
        }
        if let Some(v) = file.authorize_url {
            self.authorize_url = v;
        }
        if let Some(v) = file.token_url {
            self.token_url = v;
        }
        if let Some(v) = file.api_base_url {
            self.api_base_url = v;
        }
        if let Some(v) = file.refresh_margin_secs {
            self.refresh_margin = Duration::from_secs(v);
        }
        if let Some(v) = file.max_attempts {
            self.max_attempts = v;
        }
        if let Some(v) = file.show_dialog {
            self.show_dialog = v;
        }
        if let Some(v) = file.request_timeout_secs {
            self.request_timeout = Duration::from_secs(v);
        }
        if let Some(v) = file.token_dir {
            self.token_dir = Some(v);
        }
    }

    /// Overlay `SPOTLINK_*` variables resolved through `lookup`.
    pub fn apply_env_with<F>(&mut self, lookup: F) -> Result<(), ApiError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        if let Some(v) = var("SPOTLINK_CLIENT_ID") {
            self.client_id = v;
        }
        if let Some(v) = var("SPOTLINK_REDIRECT_URI") {
            self.redirect_uri = v;
        }
        if let Some(v) = var("SPOTLINK_SCOPES") {
            self.scopes = v
                .split(|c: char| c == ',' || c.is_whitespace())
                .filter(|s| !s.is_empty())
                .map(ToString::to_string)
                .collect();
        }
        if let Some(v) = var("SPOTLINK_AUTHORIZE_URL") {
            self.authorize_url = v;
        }
        if let Some(v) = var("SPOTLINK_TOKEN_URL") {
            self.token_url = v;
        }
        if let Some(v) = var("SPOTLINK_API_BASE_URL") {
            self.api_base_url = v;
        }
        if let Some(v) = var("SPOTLINK_REFRESH_MARGIN_SECS") {
            self.refresh_margin = Duration::from_secs(parse_env("SPOTLINK_REFRESH_MARGIN_SECS", &v)?);
        }
        if let Some(v) = var("SPOTLINK_MAX_ATTEMPTS") {
            self.max_attempts = parse_env("SPOTLINK_MAX_ATTEMPTS", &v)?;
        }
        if let Some(v) = var("SPOTLINK_SHOW_DIALOG") {
            self.show_dialog = parse_env("SPOTLINK_SHOW_DIALOG", &v)?;
        }
        if let Some(v) = var("SPOTLINK_REQUEST_TIMEOUT_SECS") {
            self.request_timeout =
                Duration::from_secs(parse_env("SPOTLINK_REQUEST_TIMEOUT_SECS", &v)?);
        }
        if let Some(v) = var("SPOTLINK_TOKEN_DIR") {
            self.token_dir = Some(PathBuf::from(v));
        }
        Ok(())
    }

    pub fn with_client_id(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = client_id.into();
        self
    }

    pub fn with_token_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.token_dir = Some(dir.into());
        self
    }

    /// Directory holding the persisted credential record.
    pub fn token_store_dir(&self) -> PathBuf {
        self.token_dir.clone().unwrap_or_else(default_token_dir)
    }

    /// Parsed API base URL, normalized to end with `/` so relative paths join under it.
    pub fn api_base(&self) -> Result<Url, ApiError> {
        let mut raw = self.api_base_url.clone();
        if !raw.ends_with('/') {
            raw.push('/');
        }
        Ok(Url::parse(&raw)?)
    }

    /// Reject configurations the session cannot run with.
    pub fn validate(&self) -> Result<(), ApiError> {
        if self.client_id.trim().is_empty() {
            return Err(ApiError::InvalidRequest(
                "client_id is required (set SPOTLINK_CLIENT_ID or client_id in config.toml)"
                    .to_string(),
            ));
        }
        for (name, value) in [
            ("redirect_uri", &self.redirect_uri),
            ("authorize_url", &self.authorize_url),
            ("token_url", &self.token_url),
            ("api_base_url", &self.api_base_url),
        ] {
            Url::parse(value)
                .map_err(|e| ApiError::InvalidRequest(format!("invalid {name} '{value}': {e}")))?;
        }
        if self.max_attempts == 0 {
            return Err(ApiError::InvalidRequest(
                "max_attempts must be at least 1".to_string(),
            ));
        }
        if self.refresh_margin > MAX_REFRESH_MARGIN {
            return Err(ApiError::InvalidRequest(format!(
                "refresh_margin must not exceed {}s",
                MAX_REFRESH_MARGIN.as_secs()
            )));
        }
        Ok(())
    }
}

impl FileConfig {
    /// Read and parse `path`; a missing file is `Ok(None)`.
    pub fn read(path: &Path) -> Result<Option<Self>, ApiError> {
        let raw = match std::fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };
        Ok(Some(toml::from_str(&raw)?))
    }
}

/// Default config file path (`~/.spotlink/config.toml`).
pub fn default_config_path() -> PathBuf {
    default_token_dir().join("config.toml")
}

fn parse_env<T: std::str::FromStr>(name: &str, value: &str) -> Result<T, ApiError> {
    value
        .trim()
        .parse()
        .map_err(|_| ApiError::InvalidRequest(format!("invalid value for {name}: '{value}'")))
}
