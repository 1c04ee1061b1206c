//! OAuth authorization-code + PKCE flow and credential storage.

pub mod exchange;
pub mod flow;
pub mod pkce;
pub mod store;
pub mod token;
pub mod user_agent;

pub use exchange::TokenExchange;
pub use flow::{AuthorizationFlow, AuthorizationOutcome, AuthorizationRequest, FlowPhase};
pub use pkce::PkcePair;
pub use store::{FileTokenStore, MemoryTokenStore, TokenStore, DEFAULT_CREDENTIAL_KEY};
pub use token::CredentialRecord;
pub use user_agent::{LoopbackUserAgent, UserAgent, UserAgentResult};
