//! Identity and authentication state types.
//!
//! Sessions and users are issued by the identity provider. This crate only
//! models the read-only view that the session manager keeps of them.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use stellara_core::{AppError, AppResult};
use uuid::Uuid;

/// Stable identifier of an authenticated user, used as the role lookup key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserId(Uuid);

impl UserId {
    /// Creates a user identifier from an existing UUID value.
    #[must_use]
    pub fn from_uuid(value: Uuid) -> Self {
        Self(value)
    }

    /// Returns the underlying UUID value.
    #[must_use]
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl FromStr for UserId {
    type Err = AppError;

    fn from_str(value: &str) -> AppResult<Self> {
        Uuid::parse_str(value.trim())
            .map(Self)
            .map_err(|error| AppError::Validation(format!("invalid user id '{value}': {error}")))
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(formatter, "{}", self.0)
    }
}

/// Identity record attached to a provider session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    id: UserId,
    email: Option<String>,
}

impl User {
    /// Creates a user record.
    #[must_use]
    pub fn new(id: UserId, email: Option<String>) -> Self {
        Self { id, email }
    }

    /// Returns the stable user identifier.
    #[must_use]
    pub fn id(&self) -> UserId {
        self.id
    }

    /// Returns the email, if the provider returned one.
    #[must_use]
    pub fn email(&self) -> Option<&str> {
        self.email.as_deref()
    }
}

/// Provider-issued credential representing an authenticated identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    access_token: String,
    expires_at: Option<DateTime<Utc>>,
    user: User,
}

impl Session {
    /// Creates a session for the given user.
    #[must_use]
    pub fn new(
        access_token: impl Into<String>,
        expires_at: Option<DateTime<Utc>>,
        user: User,
    ) -> Self {
        Self {
            access_token: access_token.into(),
            expires_at,
            user,
        }
    }

    /// Returns the opaque access token.
    #[must_use]
    pub fn access_token(&self) -> &str {
        self.access_token.as_str()
    }

    /// Returns the expiry instant, if the provider reported one.
    #[must_use]
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.expires_at
    }

    /// Returns the user that owns this session.
    #[must_use]
    pub fn user(&self) -> &User {
        &self.user
    }
}

/// Kind of session change reported by the identity provider push channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthChangeKind {
    /// Session restored when the provider listener was attached.
    InitialSession,
    /// A user signed in.
    SignedIn,
    /// The user signed out or the session was invalidated.
    SignedOut,
    /// The access token was refreshed for the same user.
    TokenRefreshed,
    /// User attributes changed.
    UserUpdated,
}

impl AuthChangeKind {
    /// Returns stable storage value.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::InitialSession => "initial_session",
            Self::SignedIn => "signed_in",
            Self::SignedOut => "signed_out",
            Self::TokenRefreshed => "token_refreshed",
            Self::UserUpdated => "user_updated",
        }
    }
}

/// One callback delivered by the identity provider push channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthChangeEvent {
    /// What happened.
    pub kind: AuthChangeKind,
    /// Session after the change, if any.
    pub session: Option<Session>,
}

impl AuthChangeEvent {
    /// Creates an auth change event.
    #[must_use]
    pub fn new(kind: AuthChangeKind, session: Option<Session>) -> Self {
        Self { kind, session }
    }
}

/// Externally observable authentication state.
///
/// `is_admin` is derived from a role lookup and is false whenever `user` is
/// absent. `loading` is true only until the first session resolution lands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthState {
    /// Current user, if signed in.
    pub user: Option<User>,
    /// Current session, if signed in.
    pub session: Option<Session>,
    /// Whether the initial session resolution is still pending.
    pub loading: bool,
    /// Whether the current user holds the privileged role.
    pub is_admin: bool,
}

impl AuthState {
    /// State before any session source has resolved.
    #[must_use]
    pub fn initial() -> Self {
        Self {
            user: None,
            session: None,
            loading: true,
            is_admin: false,
        }
    }

    /// Resolved state with no signed-in user.
    #[must_use]
    pub fn signed_out() -> Self {
        Self {
            user: None,
            session: None,
            loading: false,
            is_admin: false,
        }
    }

    /// Returns the current user identifier, if any.
    #[must_use]
    pub fn user_id(&self) -> Option<UserId> {
        self.user.as_ref().map(User::id)
    }
}

impl Default for AuthState {
    fn default() -> Self {
        Self::initial()
    }
}

#[cfg(test)]
mod tests {
    use super::{AuthState, UserId};

    #[test]
    fn user_id_rejects_malformed_value() {
        let result = "not-a-uuid".parse::<UserId>();
        assert!(result.is_err());
    }

    #[test]
    fn initial_state_is_loading_and_unprivileged() {
        let state = AuthState::default();
        assert!(state.loading);
        assert!(!state.is_admin);
        assert!(state.user_id().is_none());
    }
}
