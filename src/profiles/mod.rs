use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

pub mod actions;

/// Identity-scoped profile record; the id equals the auth subject id.
/// Created on first sign-in confirmation if absent, mutated by its owner
/// only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Profile {
    pub id: Uuid,
    pub username: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
    #[serde(default)]
    pub bio: Option<String>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

/// Owner-scoped profile edit; unset fields keep their stored value.
#[derive(Debug, Default, Deserialize, Validate)]
pub struct UpdateProfile {
    #[validate(length(
        min = 3,
        max = 30,
        message = "Username must be between 3 and 30 characters"
    ))]
    pub username: Option<String>,
    pub avatar_url: Option<String>,
    #[validate(length(max = 160, message = "Bio must be at most 160 characters"))]
    pub bio: Option<String>,
}

/// Read-only aggregate view consumed by profile pages.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserStats {
    pub id: Uuid,
    pub username: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
    #[serde(default)]
    pub bio: Option<String>,
    pub posts_count: i64,
    pub followers_count: i64,
    pub following_count: i64,
}
