use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

pub mod actions;

pub const MAX_IMAGE_BYTES: usize = 5 * 1024 * 1024;
pub const MAX_VIDEO_BYTES: usize = 10 * 1024 * 1024;

/// A post row as stored by the service. `user_id` is the immutable owner;
/// only the owner can delete it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Post {
    pub id: Uuid,
    pub user_id: Uuid,
    pub image_url: String,
    #[serde(default)]
    pub caption: Option<String>,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

/// A like row; the service enforces at most one per (post, user).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Like {
    pub id: Uuid,
    pub post_id: Uuid,
    pub user_id: Uuid,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

/// A repost row. Structurally a like, semantically a share.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Repost {
    pub id: Uuid,
    pub original_post_id: Uuid,
    pub user_id: Uuid,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

/// Payload for creating a post.
#[derive(Debug, Default, Deserialize, Validate)]
pub struct NewPost {
    #[validate(length(max = 500, message = "Caption must be at most 500 characters"))]
    pub caption: Option<String>,
}
