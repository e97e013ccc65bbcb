use std::sync::Arc;

use tokio::sync::broadcast;

use crate::auth::{AuthEvent, Session};
use crate::config::Settings;
use crate::error::AppError;

pub mod backend;
pub mod memory;
pub mod query;
pub mod rest;

use backend::Backend;

/// The process-wide service handle: one provider plus its settings,
/// constructed once at startup and passed to every query module.
///
/// Cheap to clone; clones share the same provider, so no component can end
/// up talking to the service with different credentials.
#[derive(Clone)]
pub struct Client {
    backend: Arc<dyn Backend>,
    settings: Settings,
}

impl Client {
    pub fn new(settings: Settings, backend: Arc<dyn Backend>) -> Self {
        Self { backend, settings }
    }

    /// Hosted-service client from the environment. Fails fast with a single
    /// `Configuration` diagnostic when credentials are absent.
    pub fn from_env() -> Result<Self, AppError> {
        let settings = Settings::from_env()?;
        let backend = Arc::new(rest::RestBackend::new(&settings));
        Ok(Self::new(settings, backend))
    }

    pub fn backend(&self) -> &dyn Backend {
        self.backend.as_ref()
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub async fn session(&self) -> Option<Session> {
        self.backend.session().await
    }

    /// The acting identity for a mutation: always the current session,
    /// never caller input.
    pub async fn require_session(&self) -> Result<Session, AppError> {
        self.session().await.ok_or(AppError::NotAuthenticated)
    }

    pub fn auth_events(&self) -> broadcast::Receiver<AuthEvent> {
        self.backend.auth_events()
    }
}
