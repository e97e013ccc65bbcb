use thiserror::Error;

use crate::client::backend::BackendError;

/// Crate-wide error taxonomy.
///
/// `NotAuthenticated` and `Validation` are user-visible and surface
/// immediately. `Backend` covers the transient fetch class the feed
/// controller retries before degrading to an empty result. Uniqueness
/// conflicts on idempotent toggles never reach callers; they are mapped to
/// success at the query-module boundary.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("you must be signed in to do that")]
    NotAuthenticated,

    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    InvalidOperation(String),

    #[error("{0}")]
    PermissionDenied(String),

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("{}", .0.user_message())]
    Storage(StorageFailure),

    #[error(transparent)]
    Backend(#[from] BackendError),
}

impl AppError {
    /// Whether a bounded retry is worthwhile.
    pub fn is_transient(&self) -> bool {
        matches!(self, AppError::Backend(e) if e.is_transient())
    }
}

/// Categorized upload failures, each with a message suitable for the upload
/// form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageFailure {
    BucketMissing(String),
    PermissionDenied,
    AuthExpired,
    Other(String),
}

impl StorageFailure {
    pub fn user_message(&self) -> String {
        match self {
            StorageFailure::BucketMissing(bucket) => format!(
                "Storage bucket \"{bucket}\" not found. Create it in the storage dashboard and make it public."
            ),
            StorageFailure::PermissionDenied => {
                "Storage permission denied. The bucket must be configured as public.".to_string()
            }
            StorageFailure::AuthExpired => {
                "Your session expired. Please sign out and sign back in, then try again.".to_string()
            }
            StorageFailure::Other(msg) => format!("Upload failed: {msg}"),
        }
    }
}
