use std::sync::Arc;

use async_trait::async_trait;
use stellara_core::AppResult;
use stellara_domain::{AuthChangeEvent, Session, UserId};

/// Callback invoked by the identity provider on every session change.
pub type AuthChangeListener = Arc<dyn Fn(AuthChangeEvent) + Send + Sync>;

/// Registration handle for an identity provider listener.
///
/// Unsubscribes when [`AuthChangeSubscription::unsubscribe`] is called or the
/// handle is dropped.
pub struct AuthChangeSubscription {
    unsubscribe: Option<Box<dyn FnOnce() + Send + Sync>>,
}

impl AuthChangeSubscription {
    /// Creates a handle that runs `unsubscribe` exactly once.
    #[must_use]
    pub fn new(unsubscribe: impl FnOnce() + Send + Sync + 'static) -> Self {
        Self {
            unsubscribe: Some(Box::new(unsubscribe)),
        }
    }

    /// Stops the provider from invoking the listener.
    pub fn unsubscribe(mut self) {
        self.run_unsubscribe();
    }

    fn run_unsubscribe(&mut self) {
        if let Some(unsubscribe) = self.unsubscribe.take() {
            unsubscribe();
        }
    }
}

impl Drop for AuthChangeSubscription {
    fn drop(&mut self) {
        self.run_unsubscribe();
    }
}

impl std::fmt::Debug for AuthChangeSubscription {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("AuthChangeSubscription")
            .field("active", &self.unsubscribe.is_some())
            .finish()
    }
}

/// Port for the external identity provider.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Registers a push listener for session changes.
    ///
    /// Must not suspend. The provider invokes the listener once per change and
    /// finishes one invocation before starting the next.
    fn on_auth_state_change(&self, listener: AuthChangeListener) -> AuthChangeSubscription;

    /// Fetches the session that currently exists, if any.
    async fn current_session(&self) -> AppResult<Option<Session>>;

    /// Asks the provider to invalidate the current session.
    async fn sign_out(&self) -> AppResult<()>;
}

/// Port for the privileged role lookup.
#[async_trait]
pub trait RoleLookupService: Send + Sync {
    /// Returns whether the user holds the privileged role.
    async fn is_admin(&self, user_id: UserId) -> AppResult<bool>;

    /// Returns whether the session's user holds the privileged role.
    ///
    /// Adapters that authorize the lookup with the caller's own credentials
    /// override this to use the session access token.
    async fn is_admin_for_session(&self, session: &Session) -> AppResult<bool> {
        self.is_admin(session.user().id()).await
    }
}
