//! spotlink — OAuth2 (authorization code + PKCE) session and self-healing
//! client for a music-streaming Web API.
//!
//! Obtains user consent through a redirect-based flow, keeps the bearer
//! credential fresh, and runs paginated API calls that recover from expiry
//! transparently.
//!
//! # Quick Start
//!
//! ```no_run
//! use spotlink::prelude::*;
//!
//! # async fn example() -> spotlink::error::Result<()> {
//! let session = Session::new(SpotlinkConfig::load()?)?;
//! session.restore().await?;
//! if !session.is_logged_in() {
//!     session.login(&LoopbackUserAgent::new()).await?;
//! }
//! let playlists = session.user_playlists().await?;
//! for playlist in &playlists.items {
//!     println!("{}", playlist.name);
//! }
//! # Ok(())
//! # }
//! ```

pub mod api;
pub mod auth;
pub mod client;
pub mod config;
pub mod error;
pub mod http;
pub mod prelude;
pub mod session;

#[cfg(feature = "cli")]
pub mod cli;
