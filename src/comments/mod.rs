use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::profiles::Profile;

pub mod actions;

/// A comment with its author profile embedded for display.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Comment {
    pub id: Uuid,
    pub post_id: Uuid,
    pub user_id: Uuid,
    pub text: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
    #[serde(rename = "profiles", default)]
    pub author: Option<Profile>,
}

/// Payload for creating a comment.
#[derive(Debug, Deserialize, Validate)]
pub struct NewComment {
    #[validate(length(
        min = 1,
        max = 500,
        message = "Comment must be between 1 and 500 characters"
    ))]
    pub text: String,
}
