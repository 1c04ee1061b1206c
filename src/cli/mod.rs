//! CLI entry point for spotlink.

pub mod auth;
pub mod library;

use clap::{Parser, Subcommand};

/// spotlink command-line client
#[derive(Parser, Debug)]
#[command(name = "spotlink", version, about = "spotlink — music Web API session client")]
pub struct Cli {
    /// Read configuration from this file instead of ~/.spotlink/config.toml
    #[arg(long, global = true)]
    pub config: Option<std::path::PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Authentication management
    Auth(AuthArgs),
    /// Show the signed-in user's profile
    Me,
    /// List the signed-in user's playlists
    Playlists(ListArgs),
    /// List the tracks of a playlist
    Tracks(TracksArgs),
}

/// Arguments for the `auth` subcommand group.
#[derive(Parser, Debug)]
pub struct AuthArgs {
    #[command(subcommand)]
    pub command: AuthCommands,
}

/// Auth subcommands for login, status, and logout.
#[derive(Subcommand, Debug)]
pub enum AuthCommands {
    /// Sign in through the browser
    Login(LoginArgs),
    /// Show authentication status
    Status,
    /// Forget stored credentials
    Logout,
}

/// Arguments for `spotlink auth login`.
#[derive(Parser, Debug)]
pub struct LoginArgs {
    /// Print the authorization URL instead of opening a browser
    #[arg(long)]
    pub no_browser: bool,
}

/// Arguments shared by listing commands.
#[derive(Parser, Debug)]
pub struct ListArgs {
    /// Follow `next` links until the listing is exhausted
    #[arg(long)]
    pub all: bool,
}

/// Arguments for `spotlink tracks`.
#[derive(Parser, Debug)]
pub struct TracksArgs {
    /// Playlist id
    pub playlist_id: String,

    #[command(flatten)]
    pub list: ListArgs,
}

impl Cli {
    /// Parse CLI arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
