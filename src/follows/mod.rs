use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub mod actions;

/// Directed follow edge: `follower_id` subscribes to `following_id`'s posts.
/// Self-follow is rejected before the mutation; duplicate edges are rejected
/// by the service and treated as a no-op success.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Follow {
    pub follower_id: Uuid,
    pub following_id: Uuid,
    pub created_at: chrono::DateTime<chrono::Utc>,
}
