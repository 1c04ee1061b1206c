//! Cursor-style list endpoints.
//!
//! List endpoints answer with a page carrying an absolute `next` URL. That URL
//! is the only locator used to continue; callers never compute offsets.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::client::{ApiClient, ApiRequest};
use crate::error::ApiError;

/// Wire shape of a list page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
    #[serde(default)]
    pub href: Option<String>,
    pub items: Vec<T>,
    pub limit: u32,
    #[serde(default)]
    pub next: Option<String>,
    pub offset: u32,
    #[serde(default)]
    pub previous: Option<String>,
    pub total: u64,
}

/// One fetched page, in server order. `next == None` means exhausted.
#[derive(Debug, Clone, PartialEq)]
pub struct PagedResult<T> {
    pub items: Vec<T>,
    pub next: Option<String>,
    pub total: u64,
    pub limit: u32,
    pub offset: u32,
}

impl<T> PagedResult<T> {
    pub fn has_more(&self) -> bool {
        self.next.is_some()
    }
}

impl<T> From<Page<T>> for PagedResult<T> {
    fn from(page: Page<T>) -> Self {
        Self {
            items: page.items,
            next: page.next.filter(|n| !n.is_empty()),
            total: page.total,
            limit: page.limit,
            offset: page.offset,
        }
    }
}

/// Fetch the first page of `url` (relative to the API base, or absolute).
pub async fn fetch_first_page<T: DeserializeOwned>(
    client: &ApiClient,
    url: &str,
) -> Result<PagedResult<T>, ApiError> {
    let page: Page<T> = client.execute(&ApiRequest::get(url)).await?;
    Ok(page.into())
}

/// Fetch the page at a previous result's `next` locator.
pub async fn fetch_next_page<T: DeserializeOwned>(
    client: &ApiClient,
    locator: Option<&str>,
) -> Result<PagedResult<T>, ApiError> {
    let Some(locator) = locator.filter(|l| !l.is_empty()) else {
        return Err(ApiError::InvalidRequest(
            "no next page locator; the listing is exhausted".to_string(),
        ));
    };
    let page: Page<T> = client.execute(&ApiRequest::get(locator)).await?;
    Ok(page.into())
}

/// Accumulates a listing across pages.
///
/// # Example
/// ```no_run
/// use spotlink::api::{Paginator, Playlist};
/// use spotlink::session::Session;
///
/// # async fn example(session: &Session) -> spotlink::error::Result<()> {
/// let mut playlists = Paginator::<Playlist>::new(session.client(), "me/playlists");
/// playlists.load_first().await?;
/// while playlists.has_more() {
///     playlists.load_next().await?;
/// }
/// println!("{} of {:?}", playlists.items().len(), playlists.total());
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct Paginator<'a, T> {
    client: &'a ApiClient,
    resource: String,
    items: Vec<T>,
    next: Option<String>,
    total: Option<u64>,
    started: bool,
}

impl<'a, T: DeserializeOwned> Paginator<'a, T> {
    pub fn new(client: &'a ApiClient, resource: impl Into<String>) -> Self {
        Self {
            client,
            resource: resource.into(),
            items: Vec::new(),
            next: None,
            total: None,
            started: false,
        }
    }

    /// Drop anything loaded and fetch the first page.
    pub async fn load_first(&mut self) -> Result<&[T], ApiError> {
        self.items.clear();
        self.next = None;
        self.total = None;
        self.started = false;

        let page = fetch_first_page::<T>(self.client, &self.resource).await?;
        self.started = true;
        self.next = page.next;
        self.total = Some(page.total);
        self.items = page.items;
        Ok(&self.items)
    }

    /// Append the next page. Returns how many items were added; zero once exhausted.
    pub async fn load_next(&mut self) -> Result<usize, ApiError> {
        if !self.started {
            return Ok(self.load_first().await?.len());
        }
        if self.next.is_none() {
            return Ok(0);
        }
        let page = fetch_next_page::<T>(self.client, self.next.as_deref()).await?;
        let added = page.items.len();
        debug!(added, offset = page.offset, "loaded next page");
        self.next = page.next;
        self.total = Some(page.total);
        self.items.extend(page.items);
        Ok(added)
    }

    /// Walk from the first page to the end.
    pub async fn load_all(&mut self) -> Result<&[T], ApiError> {
        self.load_first().await?;
        while self.next.is_some() {
            self.load_next().await?;
        }
        Ok(&self.items)
    }

    pub fn items(&self) -> &[T] {
        &self.items
    }

    pub fn into_items(self) -> Vec<T> {
        self.items
    }

    /// Server-reported total, once a page has loaded.
    pub fn total(&self) -> Option<u64> {
        self.total
    }

    pub fn has_more(&self) -> bool {
        !self.started || self.next.is_some()
    }
}
