use serde_json::json;
use uuid::Uuid;

use crate::client::backend::BackendError;
use crate::client::query::{from_row, from_rows, DeleteRequest, InsertRequest, SelectRequest};
use crate::client::Client;
use crate::comments::{Comment, NewComment};
use crate::error::AppError;
use crate::profiles::actions::PROFILE_COLUMNS;
use validator::Validate;

const COMMENT_COLUMNS: &[&str] = &["id", "post_id", "user_id", "text", "created_at"];

/// Add a comment and return it with the author profile embedded, ready for
/// display without a follow-up profile lookup.
pub async fn add_comment(client: &Client, post_id: Uuid, text: &str) -> Result<Comment, AppError> {
    let session = client.require_session().await?;
    let payload = NewComment {
        text: text.to_string(),
    };
    payload
        .validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    let row = json!({
        "user_id": session.user_id,
        "post_id": post_id,
        "text": payload.text,
    });
    let created = client
        .backend()
        .insert(InsertRequest::new("comments", row))
        .await?;
    let created: Comment = created
        .into_iter()
        .next()
        .map(from_row)
        .transpose()?
        .ok_or_else(|| BackendError::Protocol("insert returned no rows".to_string()))?;

    // Re-read with the author embedded.
    let row = client
        .backend()
        .select_one(
            SelectRequest::new("comments")
                .columns(COMMENT_COLUMNS)
                .embed("profiles", PROFILE_COLUMNS)
                .eq("id", json!(created.id)),
        )
        .await?;
    Ok(from_row(row)?)
}

/// Comments on a post, oldest first, each with its author embedded.
pub async fn post_comments(client: &Client, post_id: Uuid) -> Result<Vec<Comment>, AppError> {
    let rows = client
        .backend()
        .select(
            SelectRequest::new("comments")
                .columns(COMMENT_COLUMNS)
                .embed("profiles", PROFILE_COLUMNS)
                .eq("post_id", json!(post_id))
                .order_asc("created_at")
                .order_asc("id"),
        )
        .await?;
    Ok(from_rows(rows)?)
}

/// Delete a comment the caller owns. The delete is scoped by
/// (id AND user_id == caller), so zero rows affected means the comment
/// exists but belongs to someone else, or never existed.
pub async fn delete_comment(client: &Client, comment_id: Uuid) -> Result<(), AppError> {
    let session = client.require_session().await?;
    let deleted = client
        .backend()
        .delete(
            DeleteRequest::new("comments")
                .eq("id", json!(comment_id))
                .eq("user_id", json!(session.user_id)),
        )
        .await?;
    if deleted == 0 {
        return Err(AppError::PermissionDenied(
            "Comment not found or not yours to delete".to_string(),
        ));
    }
    Ok(())
}
