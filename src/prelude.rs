//! Convenience re-exports for common use.

pub use crate::api::{PagedResult, Paginator, Playlist, PlaylistTrack, Track, UserProfile};
pub use crate::auth::{
    AuthorizationOutcome, CredentialRecord, FileTokenStore, LoopbackUserAgent, MemoryTokenStore,
    TokenStore, UserAgent, UserAgentResult,
};
pub use crate::client::{ApiClient, ApiRequest, EmptyResponse};
pub use crate::config::SpotlinkConfig;
pub use crate::error::{ApiError, Result};
pub use crate::session::{Session, SessionState};
