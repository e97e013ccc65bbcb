use serde_json::json;

use crate::client::query::{from_rows, SelectRequest};
use crate::client::Client;
use crate::error::AppError;
use crate::feed::FeedPost;
use crate::follows;
use crate::profiles::actions::PROFILE_COLUMNS;

/// One denormalized page: posts newest first with author, likers, comment
/// ids, and reposters embedded. Ties on `created_at` break on `id` so
/// pagination stays deterministic.
fn feed_page(offset: usize, limit: usize) -> SelectRequest {
    SelectRequest::new("posts")
        .columns(&["id", "user_id", "image_url", "caption", "created_at"])
        .embed("profiles", PROFILE_COLUMNS)
        .embed("likes", &["user_id"])
        .embed("comments", &["id"])
        .embed("reposts", &["user_id"])
        .order_desc("created_at")
        .order_desc("id")
        .range(offset, limit)
}

/// Global feed. An empty store yields an empty page, not an error.
pub async fn public_feed(
    client: &Client,
    limit: usize,
    offset: usize,
) -> Result<Vec<FeedPost>, AppError> {
    let rows = client.backend().select(feed_page(offset, limit)).await?;
    Ok(from_rows(rows)?)
}

/// Posts from followed users plus the caller's own, same shape and ordering
/// as the public feed.
pub async fn following_feed(
    client: &Client,
    limit: usize,
    offset: usize,
) -> Result<Vec<FeedPost>, AppError> {
    let session = client.require_session().await?;

    let mut author_ids = follows::actions::following_ids(client).await?;
    // Users see their own posts in their following feed.
    author_ids.push(session.user_id);

    let ids = author_ids.into_iter().map(|id| json!(id)).collect();
    let rows = client
        .backend()
        .select(feed_page(offset, limit).in_values("user_id", ids))
        .await?;
    Ok(from_rows(rows)?)
}
