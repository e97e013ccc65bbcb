use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::profiles::Profile;

pub mod actions;
pub mod controller;
pub mod toggle;

pub use controller::{FeedController, FeedPhase};
pub use toggle::{PendingToggle, ToggleState};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedType {
    Public,
    Following,
}

/// A denormalized feed entry: the post plus everything one card needs
/// (author profile, liking user ids, comment ids, reposting user ids) from a
/// single round trip.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedPost {
    pub id: Uuid,
    pub user_id: Uuid,
    pub image_url: String,
    #[serde(default)]
    pub caption: Option<String>,
    pub created_at: chrono::DateTime<chrono::Utc>,
    #[serde(rename = "profiles", default)]
    pub author: Option<Profile>,
    #[serde(default)]
    pub likes: Vec<UserRef>,
    #[serde(default)]
    pub comments: Vec<IdRef>,
    #[serde(default)]
    pub reposts: Vec<UserRef>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserRef {
    pub user_id: Uuid,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdRef {
    pub id: Uuid,
}

impl FeedPost {
    pub fn likes_count(&self) -> usize {
        self.likes.len()
    }

    pub fn comments_count(&self) -> usize {
        self.comments.len()
    }

    pub fn reposts_count(&self) -> usize {
        self.reposts.len()
    }

    /// Membership test used to derive the initial liked state for a viewer.
    pub fn liked_by(&self, user_id: Uuid) -> bool {
        self.likes.iter().any(|l| l.user_id == user_id)
    }

    pub fn reposted_by(&self, user_id: Uuid) -> bool {
        self.reposts.iter().any(|r| r.user_id == user_id)
    }
}
