use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use stellara_application::{AuthChangeListener, AuthChangeSubscription, IdentityProvider};
use stellara_core::AppResult;
use stellara_domain::{AuthChangeEvent, AuthChangeKind, Session};
use tracing::debug;

#[derive(Default)]
struct IdentityState {
    session: Mutex<Option<Session>>,
    listeners: Mutex<Vec<(u64, AuthChangeListener)>>,
    next_listener_id: AtomicU64,
}

/// Process-local identity provider.
///
/// Listeners are invoked synchronously, one event at a time. A new listener
/// immediately receives an [`AuthChangeKind::InitialSession`] event.
#[derive(Clone, Default)]
pub struct InMemoryIdentityProvider {
    state: Arc<IdentityState>,
}

impl InMemoryIdentityProvider {
    /// Creates a provider with no session.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a provider that already holds a session.
    #[must_use]
    pub fn with_session(session: Session) -> Self {
        let provider = Self::default();
        *lock(&provider.state.session) = Some(session);
        provider
    }

    /// Stores a new session and notifies listeners of the sign-in.
    pub fn sign_in(&self, session: Session) {
        *lock(&self.state.session) = Some(session.clone());
        self.emit(AuthChangeKind::SignedIn, Some(session));
    }

    /// Replaces the session token for the current user.
    pub fn refresh_session(&self, session: Session) {
        *lock(&self.state.session) = Some(session.clone());
        self.emit(AuthChangeKind::TokenRefreshed, Some(session));
    }

    /// Returns the number of registered listeners.
    #[must_use]
    pub fn listener_count(&self) -> usize {
        lock(&self.state.listeners).len()
    }

    fn emit(&self, kind: AuthChangeKind, session: Option<Session>) {
        let listeners: Vec<AuthChangeListener> = lock(&self.state.listeners)
            .iter()
            .map(|(_, listener)| listener.clone())
            .collect();
        debug!(
            kind = kind.as_str(),
            listeners = listeners.len(),
            "emitting auth change"
        );

        for listener in listeners {
            listener(AuthChangeEvent::new(kind, session.clone()));
        }
    }
}

#[async_trait]
impl IdentityProvider for InMemoryIdentityProvider {
    fn on_auth_state_change(&self, listener: AuthChangeListener) -> AuthChangeSubscription {
        let id = self.state.next_listener_id.fetch_add(1, Ordering::Relaxed);
        lock(&self.state.listeners).push((id, listener.clone()));

        let session = lock(&self.state.session).clone();
        listener(AuthChangeEvent::new(AuthChangeKind::InitialSession, session));

        let state = Arc::downgrade(&self.state);
        AuthChangeSubscription::new(move || {
            if let Some(state) = state.upgrade() {
                lock(&state.listeners).retain(|(listener_id, _)| *listener_id != id);
            }
        })
    }

    async fn current_session(&self) -> AppResult<Option<Session>> {
        Ok(lock(&self.state.session).clone())
    }

    async fn sign_out(&self) -> AppResult<()> {
        let previous = lock(&self.state.session).take();
        if previous.is_some() {
            self.emit(AuthChangeKind::SignedOut, None);
        }
        Ok(())
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use stellara_application::IdentityProvider;
    use stellara_domain::{AuthChangeEvent, AuthChangeKind, Session, User, UserId};

    use super::InMemoryIdentityProvider;

    fn session() -> Session {
        Session::new(
            "token",
            None,
            User::new(UserId::from_uuid(uuid::Uuid::from_u128(3)), None),
        )
    }

    fn recorder() -> (Arc<Mutex<Vec<AuthChangeEvent>>>, stellara_application::AuthChangeListener) {
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = events.clone();
        let listener: stellara_application::AuthChangeListener = Arc::new(move |event| {
            if let Ok(mut events) = sink.lock() {
                events.push(event);
            }
        });
        (events, listener)
    }

    fn kinds(events: &Mutex<Vec<AuthChangeEvent>>) -> Vec<AuthChangeKind> {
        events
            .lock()
            .map(|events| events.iter().map(|event| event.kind).collect())
            .unwrap_or_default()
    }

    #[tokio::test]
    async fn listener_receives_initial_session_then_changes() {
        let provider = InMemoryIdentityProvider::with_session(session());
        let (events, listener) = recorder();

        let _subscription = provider.on_auth_state_change(listener);
        provider.refresh_session(session());
        let signed_out = provider.sign_out().await;

        assert!(signed_out.is_ok());
        assert_eq!(
            kinds(&events),
            vec![
                AuthChangeKind::InitialSession,
                AuthChangeKind::TokenRefreshed,
                AuthChangeKind::SignedOut,
            ]
        );
        let current = provider.current_session().await;
        assert_eq!(current, Ok(None));
    }

    #[tokio::test]
    async fn unsubscribed_listener_is_not_invoked() {
        let provider = InMemoryIdentityProvider::new();
        let (events, listener) = recorder();

        let subscription = provider.on_auth_state_change(listener);
        subscription.unsubscribe();
        provider.sign_in(session());

        assert_eq!(provider.listener_count(), 0);
        assert_eq!(kinds(&events), vec![AuthChangeKind::InitialSession]);
    }
}
