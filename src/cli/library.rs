//! CLI handlers for profile and library listings.

use crate::api::{PagedResult, Paginator, Playlist, PlaylistTrack};
use crate::session::{playlist_tracks_path, Session};

/// Handle `spotlink me`.
pub async fn handle_me(session: &Session) -> Result<(), Box<dyn std::error::Error>> {
    let me = session.current_profile().await?;
    println!("{}", me.display_name.as_deref().unwrap_or(&me.id));
    println!("  id:    {}", me.id);
    if let Some(email) = &me.email {
        println!("  email: {email}");
    }
    if let Some(url) = me.external_urls.get("spotify") {
        println!("  url:   {url}");
    }
    Ok(())
}

/// Handle `spotlink playlists [--all]`.
pub async fn handle_playlists(session: &Session, all: bool) -> Result<(), Box<dyn std::error::Error>> {
    let (playlists, total) = if all {
        let mut pager = Paginator::<Playlist>::new(session.client(), "me/playlists");
        pager.load_all().await?;
        let total = pager.total().unwrap_or_default();
        (pager.into_items(), total)
    } else {
        let PagedResult { items, total, .. } = session.user_playlists().await?;
        (items, total)
    };

    for playlist in &playlists {
        println!(
            "{}  {} ({} tracks, by {})",
            playlist.id,
            playlist.name,
            playlist.tracks.total,
            playlist
                .owner
                .display_name
                .as_deref()
                .unwrap_or(&playlist.owner.id)
        );
    }
    println!("\n{} of {} playlists", playlists.len(), total);
    Ok(())
}

/// Handle `spotlink tracks <playlist-id> [--all]`.
pub async fn handle_tracks(
    session: &Session,
    playlist_id: &str,
    all: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let (entries, total) = if all {
        let mut pager =
            Paginator::<PlaylistTrack>::new(session.client(), playlist_tracks_path(playlist_id)?);
        pager.load_all().await?;
        let total = pager.total().unwrap_or_default();
        (pager.into_items(), total)
    } else {
        let PagedResult { items, total, .. } = session.playlist_tracks(playlist_id).await?;
        (items, total)
    };

    let mut position = 0;
    for track in entries.iter().filter_map(|entry| entry.track.as_ref()) {
        position += 1;
        let seconds = track.duration_ms / 1000;
        println!(
            "{position:>4}. {} — {} [{}:{:02}]",
            track.name,
            track.artist_names(),
            seconds / 60,
            seconds % 60
        );
    }
    println!("\n{} of {} entries", entries.len(), total);
    Ok(())
}
