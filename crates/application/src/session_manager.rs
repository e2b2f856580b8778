//! Process-wide authentication state.
//!
//! Two sources write the same [`AuthState`]: the identity provider push
//! channel and a one-shot current-session fetch issued at start. Either may
//! land first and the last writer wins for `user`, `session` and `loading`.
//! Each write spawns a role resolution that only merges `is_admin`, and only
//! while the identity write that requested it is still the current one.
//!
//! Listeners are driven from a single delivery loop. Whichever thread finds
//! the loop idle drains it, always reading the newest state, so a listener
//! never receives a snapshot older than one it has already seen.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, TryLockError, Weak};

use stellara_core::AppResult;
use stellara_domain::{AuthChangeEvent, AuthState, Session, User, UserId};
use tokio::sync::watch;
use tracing::{debug, warn};

use crate::{AuthChangeSubscription, IdentityProvider, RoleLookupService};

/// Listener notified with every [`AuthState`] snapshot.
pub type AuthStateListener = Arc<dyn Fn(&AuthState) + Send + Sync>;

struct RegisteredListener {
    id: u64,
    callback: AuthStateListener,
    delivered_version: AtomicU64,
}

/// Owner of the process-wide [`AuthState`].
///
/// Cheap to clone. The push channel is detached on [`SessionManager::shutdown`],
/// when the last [`AuthStateSubscription`] is disposed, or when the last clone
/// is dropped.
#[derive(Clone)]
pub struct SessionManager {
    inner: Arc<SessionManagerInner>,
}

struct SessionManagerInner {
    identity_provider: Arc<dyn IdentityProvider>,
    role_lookup: Arc<dyn RoleLookupService>,
    state: watch::Sender<AuthState>,
    state_version: AtomicU64,
    identity_epoch: AtomicU64,
    listeners: Mutex<Vec<Arc<RegisteredListener>>>,
    next_listener_id: AtomicU64,
    delivery: Mutex<()>,
    delivery_pending: AtomicBool,
    provider_subscription: Mutex<Option<AuthChangeSubscription>>,
    shut_down: AtomicBool,
}

impl SessionManager {
    /// Attaches to the identity provider and starts the initial session fetch.
    ///
    /// Must be called from within a Tokio runtime.
    #[must_use]
    pub fn start(
        identity_provider: Arc<dyn IdentityProvider>,
        role_lookup: Arc<dyn RoleLookupService>,
    ) -> Self {
        let (state, _) = watch::channel(AuthState::initial());
        let inner = Arc::new(SessionManagerInner {
            identity_provider,
            role_lookup,
            state,
            state_version: AtomicU64::new(1),
            identity_epoch: AtomicU64::new(0),
            listeners: Mutex::new(Vec::new()),
            next_listener_id: AtomicU64::new(0),
            delivery: Mutex::new(()),
            delivery_pending: AtomicBool::new(false),
            provider_subscription: Mutex::new(None),
            shut_down: AtomicBool::new(false),
        });

        let push_target = Arc::downgrade(&inner);
        let subscription = inner
            .identity_provider
            .on_auth_state_change(Arc::new(move |event: AuthChangeEvent| {
                if let Some(inner) = push_target.upgrade() {
                    debug!(kind = event.kind.as_str(), "identity provider pushed session change");
                    inner.apply_identity(event.session, "push");
                }
            }));
        *lock(&inner.provider_subscription) = Some(subscription);

        let fetch_target = Arc::downgrade(&inner);
        let identity_provider = inner.identity_provider.clone();
        tokio::spawn(async move {
            let result = identity_provider.current_session().await;
            let Some(inner) = fetch_target.upgrade() else {
                return;
            };

            match result {
                Ok(session) => inner.apply_identity(session, "fetch"),
                Err(error) => {
                    warn!(error = %error, "initial session fetch failed");
                    inner.mark_resolved();
                }
            }
        });

        Self { inner }
    }

    /// Returns the current state snapshot.
    #[must_use]
    pub fn snapshot(&self) -> AuthState {
        self.inner.state.borrow().clone()
    }

    /// Returns a channel receiver that observes every state change.
    #[must_use]
    pub fn watch(&self) -> watch::Receiver<AuthState> {
        self.inner.state.subscribe()
    }

    /// Registers a listener.
    ///
    /// The listener is called with the current state before this returns,
    /// unless another thread is mid-delivery, in which case that thread hands
    /// it over. It is then called after every update until the returned handle
    /// is disposed or dropped. Disposing the last handle detaches the push
    /// channel the same way [`SessionManager::shutdown`] does.
    pub fn subscribe<F>(&self, listener: F) -> AuthStateSubscription
    where
        F: Fn(&AuthState) + Send + Sync + 'static,
    {
        let id = self.inner.next_listener_id.fetch_add(1, Ordering::Relaxed);
        lock(&self.inner.listeners).push(Arc::new(RegisteredListener {
            id,
            callback: Arc::new(listener),
            delivered_version: AtomicU64::new(0),
        }));

        self.inner.deliver();

        AuthStateSubscription {
            id,
            inner: Arc::downgrade(&self.inner),
        }
    }

    /// Signs out through the identity provider and clears local state.
    ///
    /// Local state is reset whether or not the provider call succeeded. The
    /// provider result is returned to the caller unchanged.
    pub async fn sign_out(&self) -> AppResult<()> {
        let result = self.inner.identity_provider.sign_out().await;
        if let Err(error) = &result {
            warn!(error = %error, "identity provider sign-out failed, clearing local session");
        }

        self.inner.reset();
        result
    }

    /// Detaches the push channel and drops any role resolution still in flight.
    pub fn shutdown(&self) {
        self.inner.detach();
    }
}

impl SessionManagerInner {
    fn detach(&self) {
        self.shut_down.store(true, Ordering::SeqCst);
        let subscription = lock(&self.provider_subscription).take();
        if let Some(subscription) = subscription {
            subscription.unsubscribe();
        }
    }

    fn apply_identity(self: &Arc<Self>, session: Option<Session>, source: &'static str) {
        if self.shut_down.load(Ordering::SeqCst) {
            return;
        }

        let user = session.as_ref().map(|session| session.user().clone());
        let user_id = user.as_ref().map(User::id);
        let stored_session = session.clone();
        let mut epoch = 0;
        self.state.send_modify(|state| {
            epoch = self.identity_epoch.fetch_add(1, Ordering::SeqCst) + 1;
            self.state_version.fetch_add(1, Ordering::SeqCst);
            if state.user_id() != user_id {
                state.is_admin = false;
            }
            state.user = user;
            state.session = stored_session;
            state.loading = false;
        });
        debug!(
            source,
            user_id = ?user_id,
            epoch,
            "applied session update"
        );

        self.deliver();
        self.spawn_role_resolution(session, epoch);
    }

    fn mark_resolved(&self) {
        if self.shut_down.load(Ordering::SeqCst) {
            return;
        }

        let changed = self.state.send_if_modified(|state| {
            let was_loading = state.loading;
            state.loading = false;
            if was_loading {
                self.state_version.fetch_add(1, Ordering::SeqCst);
            }
            was_loading
        });
        if changed {
            self.deliver();
        }
    }

    fn reset(&self) {
        self.state.send_modify(|state| {
            self.identity_epoch.fetch_add(1, Ordering::SeqCst);
            self.state_version.fetch_add(1, Ordering::SeqCst);
            *state = AuthState::signed_out();
        });
        self.deliver();
    }

    fn spawn_role_resolution(self: &Arc<Self>, session: Option<Session>, epoch: u64) {
        let Some(session) = session else {
            self.merge_role(None, epoch, false);
            return;
        };

        let user_id = session.user().id();
        let target = Arc::downgrade(self);
        let role_lookup = self.role_lookup.clone();
        tokio::spawn(async move {
            let is_admin = match role_lookup.is_admin_for_session(&session).await {
                Ok(is_admin) => is_admin,
                Err(error) => {
                    warn!(
                        user_id = %user_id,
                        error = %error,
                        "role lookup failed, treating user as not privileged"
                    );
                    false
                }
            };

            match Weak::upgrade(&target) {
                Some(inner) => inner.merge_role(Some(user_id), epoch, is_admin),
                None => debug!(user_id = %user_id, "session manager gone, dropping role result"),
            }
        });
    }

    fn merge_role(&self, user_id: Option<UserId>, epoch: u64, is_admin: bool) {
        if self.shut_down.load(Ordering::SeqCst) {
            return;
        }

        let mut stale = false;
        let changed = self.state.send_if_modified(|state| {
            if self.identity_epoch.load(Ordering::SeqCst) != epoch || state.user_id() != user_id {
                stale = true;
                return false;
            }

            let is_admin = is_admin && state.user.is_some();
            if state.is_admin == is_admin {
                return false;
            }
            state.is_admin = is_admin;
            self.state_version.fetch_add(1, Ordering::SeqCst);
            true
        });

        if stale {
            debug!(user_id = ?user_id, epoch, "dropping stale role resolution");
        }
        if changed {
            self.deliver();
        }
    }

    fn versioned_snapshot(&self) -> (AuthState, u64) {
        let state = self.state.borrow();
        (state.clone(), self.state_version.load(Ordering::SeqCst))
    }

    fn deliver(&self) {
        self.delivery_pending.store(true, Ordering::SeqCst);
        loop {
            let guard = match self.delivery.try_lock() {
                Ok(guard) => guard,
                Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner(),
                Err(TryLockError::WouldBlock) => return,
            };

            while self.delivery_pending.swap(false, Ordering::SeqCst) {
                let (snapshot, version) = self.versioned_snapshot();
                let listeners: Vec<Arc<RegisteredListener>> = lock(&self.listeners).clone();
                for listener in listeners {
                    if listener.delivered_version.load(Ordering::SeqCst) >= version {
                        continue;
                    }
                    listener.delivered_version.store(version, Ordering::SeqCst);
                    (listener.callback)(&snapshot);
                }
            }

            drop(guard);
            // A writer that lost the race for the lock after the drain ended.
            if !self.delivery_pending.load(Ordering::SeqCst) {
                return;
            }
        }
    }
}

/// Registration handle returned by [`SessionManager::subscribe`].
#[must_use = "dropping the subscription deregisters the listener"]
pub struct AuthStateSubscription {
    id: u64,
    inner: Weak<SessionManagerInner>,
}

impl AuthStateSubscription {
    /// Deregisters the listener.
    ///
    /// Disposing the last registered listener also detaches the push channel.
    pub fn dispose(self) {}
}

impl Drop for AuthStateSubscription {
    fn drop(&mut self) {
        let Some(inner) = self.inner.upgrade() else {
            return;
        };

        let remaining = {
            let mut listeners = lock(&inner.listeners);
            listeners.retain(|listener| listener.id != self.id);
            listeners.len()
        };
        if remaining == 0 {
            debug!("last auth state listener disposed, detaching push channel");
            inner.detach();
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
