//! Data-access and feed-reconciliation layer for a photo-sharing app whose
//! persistence, identity, and object storage live in a hosted backend
//! service.
//!
//! The service is reached through the [`client::backend::Backend`] trait:
//! [`client::rest::RestBackend`] talks to the hosted REST API, while
//! [`client::memory::MemoryBackend`] backs tests and local development. A
//! single [`Client`] handle is constructed at startup and threaded through
//! the domain modules (`posts`, `comments`, `follows`, `profiles`) and the
//! feed layer (`feed::actions` assembly, [`feed::FeedController`]
//! pagination, `feed::toggle` optimistic state).

pub mod auth;
pub mod client;
pub mod comments;
pub mod config;
pub mod error;
pub mod feed;
pub mod follows;
pub mod posts;
pub mod profiles;

pub use auth::{AuthEvent, Session};
pub use client::Client;
pub use config::Settings;
pub use error::{AppError, StorageFailure};
pub use feed::{FeedController, FeedPhase, FeedPost, FeedType, ToggleState};
