use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use crate::client::backend::BackendError;
use crate::client::query::{from_rows, DeleteRequest, InsertRequest, SelectRequest};
use crate::client::Client;
use crate::error::AppError;
use crate::profiles::actions::PROFILE_COLUMNS;
use crate::profiles::Profile;

#[derive(Deserialize)]
struct FollowingRow {
    following_id: Uuid,
}

/// Follow a user. Following yourself is rejected before any mutation, and an
/// already-existing edge is a no-op success, so follow is idempotent.
pub async fn follow(client: &Client, target_id: Uuid) -> Result<(), AppError> {
    let session = client.require_session().await?;
    if session.user_id == target_id {
        return Err(AppError::InvalidOperation(
            "You cannot follow yourself".to_string(),
        ));
    }

    let row = json!({
        "follower_id": session.user_id,
        "following_id": target_id,
    });
    match client.backend().insert(InsertRequest::new("follows", row)).await {
        Ok(_) => {
            tracing::debug!(follower = %session.user_id, following = %target_id, "follow edge created");
            Ok(())
        }
        Err(BackendError::Conflict) => Ok(()),
        Err(e) => Err(e.into()),
    }
}

/// Remove the caller's follow edge to `target_id`; absent edges are a no-op.
pub async fn unfollow(client: &Client, target_id: Uuid) -> Result<(), AppError> {
    let session = client.require_session().await?;
    client
        .backend()
        .delete(
            DeleteRequest::new("follows")
                .eq("follower_id", json!(session.user_id))
                .eq("following_id", json!(target_id)),
        )
        .await?;
    Ok(())
}

/// Whether the caller follows `target_id`. No session and no edge both read
/// as `false`.
pub async fn is_following(client: &Client, target_id: Uuid) -> Result<bool, AppError> {
    let Some(session) = client.session().await else {
        return Ok(false);
    };

    let req = SelectRequest::new("follows")
        .columns(&["follower_id"])
        .eq("follower_id", json!(session.user_id))
        .eq("following_id", json!(target_id));
    match client.backend().select_one(req).await {
        Ok(_) => Ok(true),
        Err(BackendError::NotFound) => Ok(false),
        Err(e) => Err(e.into()),
    }
}

/// Ids the caller follows; step one of following-feed assembly.
pub async fn following_ids(client: &Client) -> Result<Vec<Uuid>, AppError> {
    let session = client.require_session().await?;
    let rows = client
        .backend()
        .select(
            SelectRequest::new("follows")
                .columns(&["following_id"])
                .eq("follower_id", json!(session.user_id)),
        )
        .await?;
    let rows: Vec<FollowingRow> = from_rows(rows)?;
    Ok(rows.into_iter().map(|r| r.following_id).collect())
}

/// Profiles the caller does not follow yet, for the suggestions rail.
pub async fn suggested_users(client: &Client, limit: usize) -> Result<Vec<Profile>, AppError> {
    let session = client.require_session().await?;
    let following = following_ids(client).await?;

    let rows = client
        .backend()
        .select(
            SelectRequest::new("profiles")
                .columns(PROFILE_COLUMNS)
                .order_desc("updated_at"),
        )
        .await?;
    let profiles: Vec<Profile> = from_rows(rows)?;
    Ok(profiles
        .into_iter()
        .filter(|p| p.id != session.user_id && !following.contains(&p.id))
        .take(limit)
        .collect())
}
