//! CLI auth command handlers for login, status, and logout.

use crate::auth::{AuthorizationOutcome, LoopbackUserAgent};
use crate::session::{Session, SessionState};

/// Handle `spotlink auth login`.
pub async fn handle_login(
    session: &Session,
    no_browser: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    if session.restore().await? == SessionState::LoggedIn {
        println!("✅ Already logged in. Run `spotlink auth logout` first to switch accounts.");
        return Ok(());
    }

    let agent = if no_browser {
        LoopbackUserAgent::without_browser()
    } else {
        LoopbackUserAgent::new()
    };
    println!("🔗 Complete the sign-in in your browser...");
    println!("⏳ Waiting for authorization (Ctrl-C to cancel)...");

    let outcome = tokio::select! {
        outcome = session.login(&agent) => outcome?,
        _ = tokio::signal::ctrl_c() => {
            session.cancel_login();
            AuthorizationOutcome::Cancelled
        }
    };

    match outcome {
        AuthorizationOutcome::Authorized(_) => {
            let me = session.current_profile().await?;
            println!(
                "✅ Logged in as {}",
                me.display_name.as_deref().unwrap_or(&me.id)
            );
        }
        AuthorizationOutcome::Cancelled => println!("❌ Login cancelled"),
        AuthorizationOutcome::Ignored => println!("⚠️  Callback ignored, please try again"),
    }
    Ok(())
}

/// Handle `spotlink auth status`.
pub async fn handle_status(session: &Session) -> Result<(), Box<dyn std::error::Error>> {
    println!("🔐 Authentication Status\n");

    let state = session.restore().await?;
    match (state, session.client().credentials()?) {
        (SessionState::LoggedIn, Some(record)) => {
            let status = match record.expires_at {
                Some(expires) => format!("✅ Logged in (expires {})", expires.format("%Y-%m-%d %H:%M")),
                None => "✅ Logged in".to_string(),
            };
            println!("  Spotify: {status}");
            if let Some(scope) = record.scope {
                println!("  Scopes:  {scope}");
            }
        }
        _ => println!("  Spotify: ❌ Not logged in"),
    }

    println!("\n📌 Configuration:");
    let config = session.config();
    println!("  Client ID:  {}", config.client_id);
    println!("  Redirect:   {}", config.redirect_uri);
    println!("  Token dir:  {}", config.token_store_dir().display());
    Ok(())
}

/// Handle `spotlink auth logout`.
pub async fn handle_logout(session: &Session) -> Result<(), Box<dyn std::error::Error>> {
    session.logout()?;
    println!("✅ Logged out");
    Ok(())
}
