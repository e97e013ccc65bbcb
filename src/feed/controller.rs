use std::time::Duration;

use tokio::time::sleep;
use tracing::{error, warn};
use uuid::Uuid;

use crate::client::Client;
use crate::error::AppError;
use crate::feed::{actions, FeedPost, FeedType};
use crate::posts;

/// First page is small for a fast first paint; subsequent pages are larger.
pub const INITIAL_PAGE_SIZE: usize = 5;
pub const NEXT_PAGE_SIZE: usize = 10;

const RETRY_DELAYS: [Duration; 2] = [Duration::from_secs(1), Duration::from_secs(2)];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedPhase {
    Idle,
    Loading,
    Loaded,
    LoadingMore,
}

/// Owns one feed instance's view state: the loaded pages, the pagination
/// cursor, and the loading phase.
///
/// Fetch failures are retried with backoff and then degrade to an empty
/// "no more posts" result instead of blocking the view. A failing following
/// feed falls back to the public feed. Page N+1 is never requested before
/// page N resolves: the `&mut self` methods serialize the sequence, and
/// dropping an in-flight future cancels it without applying partial state.
pub struct FeedController {
    feed: FeedType,
    /// Feed actually being served; differs from `feed` after a fallback.
    serving: FeedType,
    phase: FeedPhase,
    posts: Vec<FeedPost>,
    next_page: usize,
    has_more: bool,
    fell_back: bool,
}

impl FeedController {
    pub fn new(feed: FeedType) -> Self {
        Self {
            feed,
            serving: feed,
            phase: FeedPhase::Idle,
            posts: Vec::new(),
            next_page: 0,
            has_more: true,
            fell_back: false,
        }
    }

    pub fn posts(&self) -> &[FeedPost] {
        &self.posts
    }

    pub fn phase(&self) -> FeedPhase {
        self.phase
    }

    pub fn feed_type(&self) -> FeedType {
        self.feed
    }

    pub fn has_more(&self) -> bool {
        self.has_more
    }

    /// Whether the last refresh served the public feed in place of a failing
    /// following feed. Surfacing this is the presentation layer's call.
    pub fn fell_back(&self) -> bool {
        self.fell_back
    }

    /// Switch feed type, resetting the cursor. Call `refresh` afterwards.
    pub fn switch(&mut self, feed: FeedType) {
        if feed == self.feed {
            return;
        }
        self.feed = feed;
        self.serving = feed;
        self.phase = FeedPhase::Idle;
        self.posts.clear();
        self.next_page = 0;
        self.has_more = true;
        self.fell_back = false;
    }

    /// Load page zero, replacing any loaded content.
    pub async fn refresh(&mut self, client: &Client) {
        self.phase = FeedPhase::Loading;
        self.posts.clear();
        self.next_page = 0;
        self.has_more = true;
        self.fell_back = false;
        self.serving = self.feed;

        let (offset, limit) = page_window(0);
        let result = match self.feed {
            FeedType::Public => fetch_with_retry(client, FeedType::Public, offset, limit).await,
            FeedType::Following => {
                match fetch_with_retry(client, FeedType::Following, offset, limit).await {
                    Ok(page) => Ok(page),
                    Err(e) => {
                        warn!(error = %e, "following feed failed, falling back to public");
                        self.fell_back = true;
                        self.serving = FeedType::Public;
                        fetch_with_retry(client, FeedType::Public, offset, limit).await
                    }
                }
            }
        };

        match result {
            Ok(page) => {
                self.has_more = page.len() == limit;
                self.posts = page;
                self.next_page = 1;
            }
            Err(e) => {
                // Degrade to an empty feed rather than surfacing a raw error.
                error!(error = %e, "feed refresh failed after retries");
                self.has_more = false;
            }
        }
        self.phase = FeedPhase::Loaded;
    }

    /// Fetch the next page. A no-op while loading or once a page came back
    /// short of the requested size.
    pub async fn load_more(&mut self, client: &Client) {
        if self.phase != FeedPhase::Loaded || !self.has_more {
            return;
        }
        self.phase = FeedPhase::LoadingMore;

        let (offset, limit) = page_window(self.next_page);
        match fetch_with_retry(client, self.serving, offset, limit).await {
            Ok(page) => {
                self.has_more = page.len() == limit;
                self.posts.extend(page);
                self.next_page += 1;
            }
            Err(e) => {
                warn!(error = %e, "load-more failed after retries");
                self.has_more = false;
            }
        }
        self.phase = FeedPhase::Loaded;
    }

    /// Optimistically remove a post, then run the owner-scoped delete. On
    /// failure the post is reinstated at its prior position instead of
    /// leaving the view out of sync with the server.
    pub async fn delete_post(&mut self, client: &Client, post_id: Uuid) -> Result<(), AppError> {
        let Some(index) = self.posts.iter().position(|p| p.id == post_id) else {
            return posts::actions::delete_post(client, post_id).await;
        };
        let removed = self.posts.remove(index);
        match posts::actions::delete_post(client, post_id).await {
            Ok(()) => Ok(()),
            Err(e) => {
                let index = index.min(self.posts.len());
                self.posts.insert(index, removed);
                Err(e)
            }
        }
    }
}

/// Offset window for a page number: monotonic and non-overlapping across the
/// two page sizes.
fn page_window(page: usize) -> (usize, usize) {
    if page == 0 {
        (0, INITIAL_PAGE_SIZE)
    } else {
        (INITIAL_PAGE_SIZE + (page - 1) * NEXT_PAGE_SIZE, NEXT_PAGE_SIZE)
    }
}

async fn fetch_with_retry(
    client: &Client,
    feed: FeedType,
    offset: usize,
    limit: usize,
) -> Result<Vec<FeedPost>, AppError> {
    let mut attempt = 0;
    loop {
        let result = match feed {
            FeedType::Public => actions::public_feed(client, limit, offset).await,
            FeedType::Following => actions::following_feed(client, limit, offset).await,
        };
        match result {
            Ok(page) => return Ok(page),
            Err(e) if e.is_transient() && attempt < RETRY_DELAYS.len() => {
                warn!(attempt, error = %e, "feed fetch failed, retrying");
                sleep(RETRY_DELAYS[attempt]).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_windows_are_monotonic_and_contiguous() {
        assert_eq!(page_window(0), (0, INITIAL_PAGE_SIZE));
        assert_eq!(page_window(1), (INITIAL_PAGE_SIZE, NEXT_PAGE_SIZE));
        assert_eq!(
            page_window(2),
            (INITIAL_PAGE_SIZE + NEXT_PAGE_SIZE, NEXT_PAGE_SIZE)
        );

        let mut expected_offset = 0;
        for page in 0..5 {
            let (offset, limit) = page_window(page);
            assert_eq!(offset, expected_offset);
            expected_offset = offset + limit;
        }
    }

    #[test]
    fn new_controller_is_idle() {
        let controller = FeedController::new(FeedType::Public);
        assert_eq!(controller.phase(), FeedPhase::Idle);
        assert!(controller.posts().is_empty());
        assert!(controller.has_more());
        assert!(!controller.fell_back());
    }
}
