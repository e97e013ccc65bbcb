use serde_json::Value;
use thiserror::Error;
use tokio::sync::broadcast;

use crate::auth::AuthEvent;
use crate::auth::Session;
use crate::client::query::{DeleteRequest, InsertRequest, SelectRequest};

/// Failures reported by a provider, pre-classified so callers never match on
/// message text. `Conflict` in particular carries the idempotency contract:
/// toggle mutations map it to success instead of surfacing it.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("row rejected by a uniqueness constraint")]
    Conflict,

    #[error("row not found")]
    NotFound,

    #[error("storage bucket {0:?} not found")]
    BucketMissing(String),

    #[error("storage write denied")]
    StorageDenied,

    #[error("session expired or token rejected")]
    AuthExpired,

    #[error("transport failure: {0}")]
    Transport(String),

    #[error("unexpected service response: {0}")]
    Protocol(String),
}

impl BackendError {
    /// Network and malformed-response failures are worth a bounded retry;
    /// the rest are definitive.
    pub fn is_transient(&self) -> bool {
        matches!(self, BackendError::Transport(_) | BackendError::Protocol(_))
    }
}

/// The capability contract this layer consumes from the hosted service:
/// authenticated CRUD against named collections, session observation, and
/// blob storage with public-URL issuance.
///
/// Providers are dependency-injected through [`crate::Client`]; there is
/// exactly one handle per process. Auth-state changes fan out on a single
/// broadcast stream; subscribers unsubscribe by dropping their receiver.
#[async_trait::async_trait]
pub trait Backend: Send + Sync {
    async fn select(&self, req: SelectRequest) -> Result<Vec<Value>, BackendError>;

    /// Single-row read; absent rows are `NotFound`, not an empty set.
    async fn select_one(&self, req: SelectRequest) -> Result<Value, BackendError> {
        let rows = self.select(req.range(0, 1)).await?;
        rows.into_iter().next().ok_or(BackendError::NotFound)
    }

    /// Returns the created (or merged, for upserts) rows.
    async fn insert(&self, req: InsertRequest) -> Result<Vec<Value>, BackendError>;

    /// Returns the number of rows actually deleted. Zero is a normal result:
    /// ownership-scoped deletes report it when the filter matched nothing.
    async fn delete(&self, req: DeleteRequest) -> Result<u64, BackendError>;

    /// Current identity, if any.
    async fn session(&self) -> Option<Session>;

    fn auth_events(&self) -> broadcast::Receiver<AuthEvent>;

    async fn upload(
        &self,
        bucket: &str,
        key: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<(), BackendError>;

    /// Stable public URL for an uploaded object.
    fn public_url(&self, bucket: &str, key: &str) -> String;
}
