//! Cursor-style paging over the news feeds.
//!
//! One pager instance per feed. The cursor is a 1-based page number plus a
//! `has_more` latch; the pager accumulates articles in server order and
//! never re-sorts. Two rules keep rapid triggers (scroll events, repeated
//! key presses) from misbehaving:
//!
//! - at most one load is in flight — [`NewsFeedPager::begin_load`] refuses a
//!   second ticket until the first is completed or aborted;
//! - an empty or undersized page latches `has_more` to false for good; a
//!   later trigger is a no-op rather than a resurrection attempt.
//!
//! Switching feeds is modeled by [`NewsFeedPager::reset`], which bumps a
//! generation counter. A response carrying a stale ticket is dropped on
//! arrival, so a fetch that was in flight across the switch cannot leak
//! into the fresh listing.
use crate::api::client::{ApiClient, ApiError};
use crate::api::types::{Article, NewsPage};
use crate::api::{news, subscriptions};

/// Which feed the pager walks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Feed {
    /// The general feed, readable without a session.
    All,
    /// The caller's subscribed-sources feed.
    Subscribed,
}

/// Permission to perform one load. Carries the page to request and the
/// generation it belongs to; handing it back via `complete`/`abort` is what
/// releases the in-flight guard.
#[derive(Debug)]
pub struct LoadTicket {
    page: u32,
    generation: u64,
}

impl LoadTicket {
    pub fn page(&self) -> u32 {
        self.page
    }
}

/// Outcome of a [`NewsFeedPager::load_next`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    /// A page was fetched and folded in.
    Loaded { appended: usize },
    /// Nothing was fetched: the feed is exhausted or a load is already in
    /// flight. No network call was made.
    Skipped,
}

// ============================================================================
// NewsFeedPager
// ============================================================================

/// Incremental fetcher for one feed.
#[derive(Debug)]
pub struct NewsFeedPager {
    feed: Feed,
    page_size: u32,
    sort: String,
    page: u32,
    has_more: bool,
    in_flight: bool,
    generation: u64,
    items: Vec<Article>,
}

impl NewsFeedPager {
    pub fn new(feed: Feed, page_size: u32, sort: impl Into<String>) -> Self {
        Self {
            feed,
            page_size,
            sort: sort.into(),
            page: 1,
            has_more: true,
            in_flight: false,
            generation: 0,
            items: Vec::new(),
        }
    }

    pub fn feed(&self) -> Feed {
        self.feed
    }

    /// Articles accumulated so far, in server order.
    pub fn items(&self) -> &[Article] {
        &self.items
    }

    /// Whether another page may exist. Once false it stays false until
    /// [`NewsFeedPager::reset`].
    pub fn has_more(&self) -> bool {
        self.has_more
    }

    /// Ask for permission to load the next page.
    ///
    /// Returns `None` when the feed is exhausted or a load is already in
    /// flight — the caller must not issue a request in that case. The
    /// returned ticket must be handed back through [`complete`] or
    /// [`abort`].
    ///
    /// [`complete`]: NewsFeedPager::complete
    /// [`abort`]: NewsFeedPager::abort
    pub fn begin_load(&mut self) -> Option<LoadTicket> {
        if !self.has_more {
            tracing::trace!(feed = ?self.feed, "Feed exhausted, skipping load");
            return None;
        }
        if self.in_flight {
            tracing::trace!(feed = ?self.feed, "Load already in flight, skipping");
            return None;
        }
        self.in_flight = true;
        Some(LoadTicket {
            page: self.page,
            generation: self.generation,
        })
    }

    /// Fold a fetched page into the accumulated list.
    ///
    /// A ticket from before the last [`reset`](NewsFeedPager::reset) is
    /// stale; its page is dropped and the pager is left untouched. Page 1
    /// replaces the accumulated list, later pages append. An empty or
    /// undersized page latches `has_more` to false.
    ///
    /// Returns how many articles were appended.
    pub fn complete(&mut self, ticket: LoadTicket, page: NewsPage) -> usize {
        if ticket.generation != self.generation {
            tracing::debug!(
                feed = ?self.feed,
                page = ticket.page,
                "Dropping stale page from a previous feed generation"
            );
            return 0;
        }
        self.in_flight = false;

        if ticket.page == 1 {
            self.items.clear();
        }

        let appended = page.news_list.len();
        if appended == 0 || (appended as u32) < self.page_size {
            // One-way transition: an undersized page means the feed end
            self.has_more = false;
        }
        self.items.extend(page.news_list);
        self.page = ticket.page + 1;

        tracing::debug!(
            feed = ?self.feed,
            page = ticket.page,
            appended = appended,
            total = self.items.len(),
            has_more = self.has_more,
            "Folded in feed page"
        );
        appended
    }

    /// Release the in-flight guard after a failed fetch. `has_more` is left
    /// as-is so the caller may retry.
    pub fn abort(&mut self, ticket: LoadTicket) {
        if ticket.generation == self.generation {
            self.in_flight = false;
        }
    }

    /// Back to page 1 with a cleared list, invalidating any in-flight load.
    pub fn reset(&mut self) {
        self.page = 1;
        self.has_more = true;
        self.in_flight = false;
        self.generation += 1;
        self.items.clear();
    }

    /// Fetch and fold in the next page, honoring the guard rules above.
    pub async fn load_next(&mut self, client: &ApiClient) -> Result<LoadOutcome, ApiError> {
        let Some(ticket) = self.begin_load() else {
            return Ok(LoadOutcome::Skipped);
        };

        let fetched = match self.feed {
            Feed::All => news::fetch_page(client, ticket.page(), self.page_size, &self.sort).await,
            Feed::Subscribed => {
                subscriptions::fetch_subscribed_page(client, ticket.page(), self.page_size).await
            }
        };

        match fetched {
            Ok(page) => {
                let appended = self.complete(ticket, page);
                Ok(LoadOutcome::Loaded { appended })
            }
            Err(e) => {
                self.abort(ticket);
                Err(e)
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
