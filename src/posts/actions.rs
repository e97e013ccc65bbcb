use serde_json::json;
use uuid::Uuid;
use validator::Validate;

use crate::client::backend::BackendError;
use crate::client::query::{from_row, DeleteRequest, InsertRequest, SelectRequest};
use crate::client::Client;
use crate::error::{AppError, StorageFailure};
use crate::posts::{NewPost, Post, MAX_IMAGE_BYTES, MAX_VIDEO_BYTES};

/// Upload media to the storage bucket, resolve its public URL, and insert
/// the post row. Storage failures come back categorized so the upload form
/// can show an actionable message.
pub async fn create_post(
    client: &Client,
    media: Vec<u8>,
    content_type: &str,
    caption: Option<String>,
) -> Result<Post, AppError> {
    let session = client.require_session().await?;

    let payload = NewPost { caption };
    payload
        .validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    let max_bytes = if content_type.starts_with("image/") {
        MAX_IMAGE_BYTES
    } else if content_type.starts_with("video/") {
        MAX_VIDEO_BYTES
    } else {
        return Err(AppError::Validation(
            "Please select an image or video file".to_string(),
        ));
    };
    if media.len() > max_bytes {
        return Err(AppError::Validation(format!(
            "Media size must be less than {}MB",
            max_bytes / (1024 * 1024)
        )));
    }

    let bucket = client.settings().storage_bucket.clone();
    let key = format!("{}/{}.{}", session.user_id, Uuid::new_v4(), extension(content_type));

    client
        .backend()
        .upload(&bucket, &key, media, content_type)
        .await
        .map_err(storage_failure)?;
    let image_url = client.backend().public_url(&bucket, &key);

    let row = json!({
        "user_id": session.user_id,
        "image_url": image_url,
        "caption": payload.caption,
    });
    let rows = client.backend().insert(InsertRequest::new("posts", row)).await?;
    let post: Post = rows
        .into_iter()
        .next()
        .map(from_row)
        .transpose()?
        .ok_or_else(|| BackendError::Protocol("insert returned no rows".to_string()))?;
    tracing::info!(post_id = %post.id, user_id = %session.user_id, "post created");
    Ok(post)
}

/// Delete a post the caller owns. The ownership filter travels with the
/// delete itself, so the mutation cannot touch another user's post no matter
/// what the UI asked for.
pub async fn delete_post(client: &Client, post_id: Uuid) -> Result<(), AppError> {
    let session = client.require_session().await?;
    let deleted = client
        .backend()
        .delete(
            DeleteRequest::new("posts")
                .eq("id", json!(post_id))
                .eq("user_id", json!(session.user_id)),
        )
        .await?;
    if deleted == 0 {
        return Err(AppError::PermissionDenied(
            "Post not found or not yours to delete".to_string(),
        ));
    }
    tracing::info!(%post_id, "post deleted");
    Ok(())
}

/// Like a post. A duplicate like is rejected by the service's uniqueness
/// constraint and swallowed here; liking twice leaves exactly one row.
pub async fn like(client: &Client, post_id: Uuid) -> Result<(), AppError> {
    let session = client.require_session().await?;
    let row = json!({ "user_id": session.user_id, "post_id": post_id });
    match client.backend().insert(InsertRequest::new("likes", row)).await {
        Ok(_) | Err(BackendError::Conflict) => Ok(()),
        Err(e) => Err(e.into()),
    }
}

pub async fn unlike(client: &Client, post_id: Uuid) -> Result<(), AppError> {
    let session = client.require_session().await?;
    client
        .backend()
        .delete(
            DeleteRequest::new("likes")
                .eq("user_id", json!(session.user_id))
                .eq("post_id", json!(post_id)),
        )
        .await?;
    Ok(())
}

pub async fn repost(client: &Client, post_id: Uuid) -> Result<(), AppError> {
    let session = client.require_session().await?;
    let row = json!({ "user_id": session.user_id, "original_post_id": post_id });
    match client.backend().insert(InsertRequest::new("reposts", row)).await {
        Ok(_) | Err(BackendError::Conflict) => Ok(()),
        Err(e) => Err(e.into()),
    }
}

pub async fn unrepost(client: &Client, post_id: Uuid) -> Result<(), AppError> {
    let session = client.require_session().await?;
    client
        .backend()
        .delete(
            DeleteRequest::new("reposts")
                .eq("user_id", json!(session.user_id))
                .eq("original_post_id", json!(post_id)),
        )
        .await?;
    Ok(())
}

/// Whether the caller has reposted `post_id`; unauthenticated reads as
/// `false`, same as the follow check.
pub async fn is_reposted(client: &Client, post_id: Uuid) -> Result<bool, AppError> {
    let Some(session) = client.session().await else {
        return Ok(false);
    };
    let req = SelectRequest::new("reposts")
        .columns(&["id"])
        .eq("user_id", json!(session.user_id))
        .eq("original_post_id", json!(post_id));
    match client.backend().select_one(req).await {
        Ok(_) => Ok(true),
        Err(BackendError::NotFound) => Ok(false),
        Err(e) => Err(e.into()),
    }
}

fn storage_failure(e: BackendError) -> AppError {
    match e {
        BackendError::BucketMissing(bucket) => {
            AppError::Storage(StorageFailure::BucketMissing(bucket))
        }
        BackendError::StorageDenied => AppError::Storage(StorageFailure::PermissionDenied),
        BackendError::AuthExpired => AppError::Storage(StorageFailure::AuthExpired),
        other => AppError::Storage(StorageFailure::Other(other.to_string())),
    }
}

fn extension(content_type: &str) -> &'static str {
    match content_type {
        "image/jpeg" => "jpg",
        "image/png" => "png",
        "image/gif" => "gif",
        "image/webp" => "webp",
        "video/mp4" => "mp4",
        "video/webm" => "webm",
        _ => "bin",
    }
}
