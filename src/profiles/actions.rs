use chrono::Utc;
use serde_json::json;
use uuid::Uuid;
use validator::Validate;

use crate::client::backend::BackendError;
use crate::client::query::{from_row, InsertRequest, SelectRequest};
use crate::client::Client;
use crate::error::AppError;
use crate::profiles::{Profile, UpdateProfile, UserStats};

pub const PROFILE_COLUMNS: &[&str] = &["id", "username", "avatar_url", "bio", "updated_at"];

fn profile_by_id(id: Uuid) -> SelectRequest {
    SelectRequest::new("profiles")
        .columns(PROFILE_COLUMNS)
        .eq("id", json!(id))
}

/// Upsert-on-login: make sure the signed-in identity has a profile row,
/// creating one with a username derived from the email if absent. A
/// concurrent creation (second tab, second device) is tolerated by
/// re-reading on conflict.
pub async fn ensure_profile(client: &Client) -> Result<Profile, AppError> {
    let session = client.require_session().await?;

    match client.backend().select_one(profile_by_id(session.user_id)).await {
        Ok(row) => Ok(from_row(row)?),
        Err(BackendError::NotFound) => {
            let row = json!({
                "id": session.user_id,
                "username": session.default_username(),
                "avatar_url": null,
                "updated_at": Utc::now(),
            });
            match client.backend().insert(InsertRequest::new("profiles", row)).await {
                Ok(rows) => {
                    tracing::info!(user_id = %session.user_id, "created profile on sign-in");
                    first_profile(rows)
                }
                Err(BackendError::Conflict) => {
                    let row = client
                        .backend()
                        .select_one(profile_by_id(session.user_id))
                        .await?;
                    Ok(from_row(row)?)
                }
                Err(e) => Err(e.into()),
            }
        }
        Err(e) => Err(e.into()),
    }
}

pub async fn get_profile(client: &Client, user_id: Uuid) -> Result<Option<Profile>, AppError> {
    match client.backend().select_one(profile_by_id(user_id)).await {
        Ok(row) => Ok(Some(from_row(row)?)),
        Err(BackendError::NotFound) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Update the caller's own profile. The row id comes from the session, so a
/// caller can never address another user's profile.
pub async fn update_profile(client: &Client, changes: UpdateProfile) -> Result<Profile, AppError> {
    let session = client.require_session().await?;
    changes
        .validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    let mut row = serde_json::Map::new();
    row.insert("id".to_string(), json!(session.user_id));
    if let Some(username) = changes.username {
        row.insert("username".to_string(), json!(username));
    }
    if let Some(avatar_url) = changes.avatar_url {
        row.insert("avatar_url".to_string(), json!(avatar_url));
    }
    if let Some(bio) = changes.bio {
        row.insert("bio".to_string(), json!(bio));
    }
    row.insert("updated_at".to_string(), json!(Utc::now()));

    let rows = client
        .backend()
        .insert(InsertRequest::new("profiles", row.into()).upsert())
        .await?;
    first_profile(rows)
}

/// Aggregate post/follower/following counts for a profile page.
pub async fn user_stats(client: &Client, user_id: Uuid) -> Result<Option<UserStats>, AppError> {
    let req = SelectRequest::new("user_stats").eq("id", json!(user_id));
    match client.backend().select_one(req).await {
        Ok(row) => Ok(Some(from_row(row)?)),
        Err(BackendError::NotFound) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

fn first_profile(rows: Vec<serde_json::Value>) -> Result<Profile, AppError> {
    let row = rows
        .into_iter()
        .next()
        .ok_or_else(|| BackendError::Protocol("insert returned no rows".to_string()))?;
    Ok(from_row(row)?)
}
