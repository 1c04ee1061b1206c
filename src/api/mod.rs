//! Resource models and paginated listing.

pub mod models;
pub mod pagination;

pub use models::{
    AlbumSimple, ArtistSimple, Image, Playlist, PlaylistOwner, PlaylistTrack, PlaylistTracksInfo,
    Track, UserProfile,
};
pub use pagination::{fetch_first_page, fetch_next_page, Page, PagedResult, Paginator};
