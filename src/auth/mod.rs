use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::warn;
use uuid::Uuid;

use crate::client::Client;
use crate::profiles;

/// The current identity as issued by the hosted auth service. Tokens stay
/// inside the provider; this layer only ever sees the subject id and email.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub user_id: Uuid,
    pub email: Option<String>,
}

impl Session {
    /// Default username for a fresh profile: the email local part, matching
    /// what the registration flow pre-fills.
    pub fn default_username(&self) -> String {
        self.email
            .as_deref()
            .and_then(|e| e.split('@').next())
            .filter(|s| !s.is_empty())
            .unwrap_or("user")
            .to_string()
    }
}

/// Auth-state change delivered on the process-wide broadcast stream.
#[derive(Debug, Clone)]
pub enum AuthEvent {
    SignedIn(Session),
    SignedOut,
}

/// Mirrors the sign-in confirmation hook of the web app: whenever an
/// identity signs in, make sure it has a profile row (upsert-on-login).
///
/// Runs until the auth stream closes; abort the handle to stop earlier.
/// Dropping the receiver is the only teardown the subscription needs.
pub fn spawn_profile_sync(client: Arc<Client>) -> JoinHandle<()> {
    let mut events = client.auth_events();
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(AuthEvent::SignedIn(session)) => {
                    if let Err(e) = profiles::actions::ensure_profile(&client).await {
                        warn!(user_id = %session.user_id, error = %e, "profile sync failed");
                    }
                }
                Ok(AuthEvent::SignedOut) => {}
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    warn!(missed, "auth event stream lagged");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session(email: Option<&str>) -> Session {
        Session {
            user_id: Uuid::new_v4(),
            email: email.map(str::to_string),
        }
    }

    #[test]
    fn default_username_is_email_local_part() {
        assert_eq!(session(Some("ada@example.com")).default_username(), "ada");
    }

    #[test]
    fn default_username_falls_back_without_email() {
        assert_eq!(session(None).default_username(), "user");
        assert_eq!(session(Some("@example.com")).default_username(), "user");
    }
}
