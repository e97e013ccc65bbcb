use uuid::Uuid;

use crate::client::Client;
use crate::error::AppError;
use crate::follows;
use crate::posts;

/// Optimistic boolean-plus-count state behind a like/repost/follow control.
///
/// `begin` applies the flip and count adjustment immediately and hands back
/// a receipt; the mutation's outcome decides between `commit` and `revert`,
/// so the view never stays permanently out of sync with the server. While a
/// mutation is in flight `begin` returns `None`, which serializes rapid
/// repeated toggles on the same entity, so duplicate-insert races never reach
/// the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ToggleState {
    active: bool,
    count: i64,
    in_flight: bool,
}

/// Receipt for one optimistic flip; feed it back to `revert` on failure.
#[derive(Debug, Clone, Copy)]
pub struct PendingToggle {
    prior_active: bool,
    prior_count: i64,
}

impl ToggleState {
    pub fn new(active: bool, count: i64) -> Self {
        Self {
            active,
            count,
            in_flight: false,
        }
    }

    /// Initial state from an embedded relation: the count is the member list
    /// length, the boolean is membership of the viewer.
    pub fn from_membership(member_ids: &[Uuid], viewer: Option<Uuid>) -> Self {
        let active = viewer.is_some_and(|id| member_ids.contains(&id));
        Self::new(active, member_ids.len() as i64)
    }

    pub fn active(&self) -> bool {
        self.active
    }

    pub fn count(&self) -> i64 {
        self.count
    }

    pub fn in_flight(&self) -> bool {
        self.in_flight
    }

    /// Flip optimistically. Returns `None` while a mutation is in flight.
    pub fn begin(&mut self) -> Option<PendingToggle> {
        if self.in_flight {
            return None;
        }
        let receipt = PendingToggle {
            prior_active: self.active,
            prior_count: self.count,
        };
        self.active = !self.active;
        self.count += if self.active { 1 } else { -1 };
        self.in_flight = true;
        Some(receipt)
    }

    pub fn commit(&mut self) {
        self.in_flight = false;
    }

    /// Compensating action: restore the pre-toggle state after a failed
    /// mutation.
    pub fn revert(&mut self, receipt: PendingToggle) {
        self.active = receipt.prior_active;
        self.count = receipt.prior_count;
        self.in_flight = false;
    }
}

/// Drive a like toggle end to end: optimistic flip, mutation, reconcile.
/// An unauthenticated viewer gets `NotAuthenticated` before any state
/// changes, so the UI can route to the login flow instead.
pub async fn toggle_like(
    state: &mut ToggleState,
    client: &Client,
    post_id: Uuid,
) -> Result<(), AppError> {
    if client.session().await.is_none() {
        return Err(AppError::NotAuthenticated);
    }
    let Some(receipt) = state.begin() else {
        return Ok(());
    };
    // After the flip, `active` is the desired end state.
    let result = if state.active() {
        posts::actions::like(client, post_id).await
    } else {
        posts::actions::unlike(client, post_id).await
    };
    reconcile(state, receipt, result)
}

pub async fn toggle_repost(
    state: &mut ToggleState,
    client: &Client,
    post_id: Uuid,
) -> Result<(), AppError> {
    if client.session().await.is_none() {
        return Err(AppError::NotAuthenticated);
    }
    let Some(receipt) = state.begin() else {
        return Ok(());
    };
    let result = if state.active() {
        posts::actions::repost(client, post_id).await
    } else {
        posts::actions::unrepost(client, post_id).await
    };
    reconcile(state, receipt, result)
}

/// Follow toggle for a post author; the count tracks their follower total.
pub async fn toggle_follow(
    state: &mut ToggleState,
    client: &Client,
    author_id: Uuid,
) -> Result<(), AppError> {
    if client.session().await.is_none() {
        return Err(AppError::NotAuthenticated);
    }
    let Some(receipt) = state.begin() else {
        return Ok(());
    };
    let result = if state.active() {
        follows::actions::follow(client, author_id).await
    } else {
        follows::actions::unfollow(client, author_id).await
    };
    reconcile(state, receipt, result)
}

fn reconcile(
    state: &mut ToggleState,
    receipt: PendingToggle,
    result: Result<(), AppError>,
) -> Result<(), AppError> {
    match result {
        Ok(()) => {
            state.commit();
            Ok(())
        }
        Err(e) => {
            state.revert(receipt);
            Err(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn membership_derives_initial_state() {
        let viewer = Uuid::new_v4();
        let other = Uuid::new_v4();
        let state = ToggleState::from_membership(&[viewer, other], Some(viewer));
        assert!(state.active());
        assert_eq!(state.count(), 2);

        let state = ToggleState::from_membership(&[other], Some(viewer));
        assert!(!state.active());
        assert_eq!(state.count(), 1);

        let state = ToggleState::from_membership(&[other], None);
        assert!(!state.active());
    }

    #[test]
    fn begin_flips_and_adjusts_count() {
        let mut state = ToggleState::new(false, 3);
        let receipt = state.begin().unwrap();
        assert!(state.active());
        assert_eq!(state.count(), 4);

        state.revert(receipt);
        assert!(!state.active());
        assert_eq!(state.count(), 3);
        assert!(!state.in_flight());
    }

    #[test]
    fn in_flight_toggle_is_serialized() {
        let mut state = ToggleState::new(false, 0);
        let _receipt = state.begin().unwrap();
        assert!(state.begin().is_none());

        state.commit();
        assert!(state.begin().is_some());
    }

    #[test]
    fn commit_then_toggle_back_restores_count() {
        let mut state = ToggleState::new(false, 5);
        state.begin().unwrap();
        state.commit();
        state.begin().unwrap();
        state.commit();
        assert!(!state.active());
        assert_eq!(state.count(), 5);
    }
}
