//! spotlink CLI binary entry point.

use clap::Parser;
use spotlink::cli::{AuthCommands, Cli, Commands};
use spotlink::config::{default_config_path, SpotlinkConfig};
use spotlink::session::Session;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("spotlink=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let config_path = cli.config.clone().unwrap_or_else(default_config_path);
    let config = SpotlinkConfig::load_from(&config_path)?;
    let session = Session::new(config)?;

    match cli.command {
        Commands::Auth(auth_args) => match auth_args.command {
            AuthCommands::Login(args) => {
                spotlink::cli::auth::handle_login(&session, args.no_browser).await
            }
            AuthCommands::Status => spotlink::cli::auth::handle_status(&session).await,
            AuthCommands::Logout => spotlink::cli::auth::handle_logout(&session).await,
        },
        Commands::Me => spotlink::cli::library::handle_me(&session).await,
        Commands::Playlists(args) => {
            spotlink::cli::library::handle_playlists(&session, args.all).await
        }
        Commands::Tracks(args) => {
            spotlink::cli::library::handle_tracks(&session, &args.playlist_id, args.list.all)
                .await
        }
    }
}
