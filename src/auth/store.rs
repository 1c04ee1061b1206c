use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::token::CredentialRecord;
use crate::error::ApiError;

/// Fixed identifier the session stores its credential record under.
pub const DEFAULT_CREDENTIAL_KEY: &str = "spotify";

const TOKEN_FILE_VERSION: u32 = 1;

/// Storage abstraction for the persisted credential record.
pub trait TokenStore: Send + Sync {
    fn load(&self, key: &str) -> Result<Option<CredentialRecord>, ApiError>;
    fn save(&self, key: &str, record: &CredentialRecord) -> Result<(), ApiError>;
    fn clear(&self, key: &str) -> Result<(), ApiError>;
}

/// File-backed token store writing one TOML file per key.
///
/// Files are written with `0600` permissions on Unix. The record itself is not
/// encrypted.
///
/// # Example
/// ```no_run
/// use spotlink::auth::{CredentialRecord, FileTokenStore, TokenStore};
///
/// let store = FileTokenStore::new_default();
/// let record = CredentialRecord {
///     access_token: "access".to_string(),
///     refresh_token: Some("refresh".to_string()),
///     expires_at: None,
///     token_type: None,
///     scope: None,
/// };
/// store.save("spotify", &record)?;
/// # Ok::<(), spotlink::error::ApiError>(())
/// ```
#[derive(Debug, Clone)]
pub struct FileTokenStore {
    base_dir: PathBuf,
}

impl FileTokenStore {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    pub fn new_default() -> Self {
        Self::new(default_token_dir())
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    fn token_path(&self, key: &str) -> PathBuf {
        self.base_dir
            .join(format!("{}.token.toml", normalize_label(key)))
    }

    fn ensure_parent(path: &Path) -> Result<(), ApiError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        Ok(())
    }
}

impl TokenStore for FileTokenStore {
    fn load(&self, key: &str) -> Result<Option<CredentialRecord>, ApiError> {
        let path = self.token_path(key);
        let raw = match fs::read_to_string(&path) {
            Ok(data) => data,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };
        let file: TokenFile = toml::from_str(&raw)?;
        if file.version != TOKEN_FILE_VERSION {
            return Err(ApiError::Storage(format!(
                "unsupported token file version {} at {}",
                file.version,
                path.display()
            )));
        }
        Ok(Some(file.credential))
    }

    fn save(&self, key: &str, record: &CredentialRecord) -> Result<(), ApiError> {
        let path = self.token_path(key);
        Self::ensure_parent(&path)?;
        let file = TokenFile {
            version: TOKEN_FILE_VERSION,
            key: key.to_string(),
            credential: record.clone(),
            saved_at: Utc::now(),
        };
        let serialized = toml::to_string(&file)?;
        let mut options = fs::OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }
        let mut handle = options.open(&path)?;
        // `mode` only applies on create; tighten a pre-existing file before writing.
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            handle.set_permissions(fs::Permissions::from_mode(0o600))?;
        }
        handle.write_all(serialized.as_bytes())?;
        tracing::debug!(path = %path.display(), "saved credential record");
        Ok(())
    }

    fn clear(&self, key: &str) -> Result<(), ApiError> {
        let path = self.token_path(key);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}

/// Process-local token store, for tests and short-lived sessions.
#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    records: Mutex<HashMap<String, CredentialRecord>>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn records(
        &self,
    ) -> Result<std::sync::MutexGuard<'_, HashMap<String, CredentialRecord>>, ApiError> {
        self.records
            .lock()
            .map_err(|_| ApiError::Storage("memory token store lock poisoned".to_string()))
    }
}

impl TokenStore for MemoryTokenStore {
    fn load(&self, key: &str) -> Result<Option<CredentialRecord>, ApiError> {
        Ok(self.records()?.get(key).cloned())
    }

    fn save(&self, key: &str, record: &CredentialRecord) -> Result<(), ApiError> {
        self.records()?.insert(key.to_string(), record.clone());
        Ok(())
    }

    fn clear(&self, key: &str) -> Result<(), ApiError> {
        self.records()?.remove(key);
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct TokenFile {
    version: u32,
    key: String,
    credential: CredentialRecord,
    saved_at: DateTime<Utc>,
}

/// Default directory for persisted state (`~/.spotlink`).
pub fn default_token_dir() -> PathBuf {
    directories::UserDirs::new()
        .map(|dirs| dirs.home_dir().join(".spotlink"))
        .unwrap_or_else(|| PathBuf::from(".spotlink"))
}

fn normalize_label(value: &str) -> String {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return DEFAULT_CREDENTIAL_KEY.to_string();
    }
    let out: String = trimmed
        .chars()
        .map(|ch| {
            let lower = ch.to_ascii_lowercase();
            if lower.is_ascii_alphanumeric() || lower == '-' {
                lower
            } else {
                '-'
            }
        })
        .collect();
    if out.trim_matches('-').is_empty() {
        DEFAULT_CREDENTIAL_KEY.to_string()
    } else {
        out
    }
}
