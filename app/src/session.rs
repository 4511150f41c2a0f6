//! Signed-in user.

use crate::model::UserId;
use placebook_core::SyncError;
use std::sync::{Arc, PoisonError, RwLock};

/// Credentials of the signed-in user
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AuthUser {
    /// The user's id
    pub user_id: UserId,
    /// Backend token, when the backend requires one
    pub token: Option<String>,
}

/// Shared handle on the current user
///
/// Clones see the same user. Nobody is signed in until [`Session::login`].
#[derive(Clone, Debug, Default)]
pub struct Session {
    user: Arc<RwLock<Option<AuthUser>>>,
}

impl Session {
    /// Session with nobody signed in
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sign `user_id` in, replacing whoever was signed in
    pub fn login(&self, user_id: UserId, token: Option<String>) {
        tracing::info!(user = %user_id, "User signed in");
        *self.user.write().unwrap_or_else(PoisonError::into_inner) =
            Some(AuthUser { user_id, token });
    }

    /// Sign out
    pub fn logout(&self) {
        self.user.write().unwrap_or_else(PoisonError::into_inner).take();
    }

    /// The signed-in user, if any
    #[must_use]
    pub fn user(&self) -> Option<AuthUser> {
        self.user.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// The signed-in user's id, if any
    #[must_use]
    pub fn user_id(&self) -> Option<UserId> {
        self.user().map(|user| user.user_id)
    }

    /// The backend token, if any
    #[must_use]
    pub fn token(&self) -> Option<String> {
        self.user().and_then(|user| user.token)
    }

    /// The signed-in user's id
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Unauthenticated`] when nobody is signed in.
    pub fn require_user(&self) -> Result<UserId, SyncError> {
        self.user_id().ok_or(SyncError::Unauthenticated)
    }
}
