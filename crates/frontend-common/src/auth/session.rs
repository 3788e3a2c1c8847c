//! Session manager: the single owner of authentication state
//!
//! Credentials live in memory behind a lock that is never held across an
//! await point. Durable storage is written while that lock is held so that a
//! logout can never be overtaken by a late write of the session it cleared.

use super::state::{SessionSnapshot, SessionState, SessionStatus};
use crate::services::AuthService;
use crate::store::{StorageKey, TokenStore, TokenStoreExt};
use campus_core::{AuthError, AuthResult, User};
use chrono::Utc;
use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tokio::sync::watch;
use tracing::{debug, info, instrument, warn};

type SharedRefresh = Shared<BoxFuture<'static, AuthResult<()>>>;

/// Slot holding the refresh request that concurrent callers join
#[derive(Default)]
struct RefreshSlot {
    next_id: u64,
    current: Option<(u64, SharedRefresh)>,
}

struct Inner {
    service: Arc<dyn AuthService>,
    store: Arc<dyn TokenStore>,
    state: RwLock<SessionState>,
    changes: watch::Sender<SessionSnapshot>,
    refresh: Mutex<RefreshSlot>,
    // Set after the first storage failure; the session is memory-only from then on
    storage_degraded: AtomicBool,
}

/// Handle to the authentication session
///
/// Cloning is cheap and every clone observes the same session. Construct one
/// per application and hand it to the components that need it.
#[derive(Clone)]
pub struct SessionManager {
    inner: Arc<Inner>,
}

impl SessionManager {
    pub fn new(service: Arc<dyn AuthService>, store: Arc<dyn TokenStore>) -> Self {
        let (changes, _) = watch::channel(SessionSnapshot::default());
        Self {
            inner: Arc::new(Inner {
                service,
                store,
                state: RwLock::new(SessionState::default()),
                changes,
                refresh: Mutex::new(RefreshSlot::default()),
                storage_degraded: AtomicBool::new(false),
            }),
        }
    }

    /// Load the persisted session; no network call is made
    ///
    /// The session counts as authenticated only when an access token was
    /// stored. Its validity is discovered by the first API call or refresh.
    pub fn restore(&self) {
        let store = &self.inner.store;
        let access_token = store.load(StorageKey::AccessToken);
        let refresh_token = store.load(StorageKey::RefreshToken);
        let user: Option<User> = store.load_json(StorageKey::User);

        {
            let mut state = self.inner.write_state();
            state.epoch += 1;
            state.status = if access_token.is_some() {
                SessionStatus::Authenticated
            } else {
                SessionStatus::Unauthenticated
            };
            state.access_token = access_token;
            state.refresh_token = refresh_token;
            state.user = user;
            state.last_refreshed_at = None;
            self.inner.commit(&state);

            info!(
                authenticated = state.is_authenticated(),
                has_refresh_token = state.refresh_token.is_some(),
                user = state.user.as_ref().map(|u| u.username.as_str()),
                "Restored session"
            );
        }
        // Outside the state lock: the refresh slot is always locked first
        self.inner.abandon_refresh();
    }

    /// Authenticate with username and password
    ///
    /// Errors are returned to the caller for display; the previous session
    /// state is left untouched.
    #[instrument(skip(self, password))]
    pub async fn login(&self, username: &str, password: &str) -> AuthResult<Option<User>> {
        let grant = match self.inner.service.login(username, password).await {
            Ok(grant) => grant,
            Err(e) => {
                warn!(error = %e, "Login failed");
                self.inner.settle();
                return Err(e);
            }
        };

        let user = {
            let mut state = self.inner.write_state();
            state.epoch += 1;
            state.status = SessionStatus::Authenticated;
            state.access_token = Some(grant.tokens.access_token);
            state.refresh_token = Some(grant.tokens.refresh_token);
            state.user = grant.user;
            state.last_refreshed_at = None;
            self.inner.persist(&state);
            self.inner.commit(&state);

            info!(
                epoch = state.epoch,
                role = state.user.as_ref().map(|u| u.role.as_str()),
                "Logged in"
            );
            state.user.clone()
        };
        // Outside the state lock: the refresh slot is always locked first
        self.inner.abandon_refresh();
        Ok(user)
    }

    /// End the session
    ///
    /// Memory and durable storage are cleared first and unconditionally; the
    /// server-side invalidation that follows is best effort and its failure is
    /// only logged. Calling this repeatedly is harmless.
    pub async fn logout(&self) {
        let refresh_token = {
            let mut state = self.inner.write_state();
            let had_session = !state.is_cleared();
            let refresh_token = state.refresh_token.take();
            if had_session {
                state.clear();
                self.inner.commit(&state);
            }
            self.inner.clear_store();
            refresh_token
        };
        self.inner.abandon_refresh();
        info!("Logged out");

        if let Some(token) = refresh_token {
            if let Err(e) = self.inner.service.logout(&token).await {
                warn!(error = %e, "Server-side logout failed; local session already cleared");
            }
        }
    }

    /// Exchange the refresh token for a new access token
    ///
    /// Concurrent callers share a single request and all receive its
    /// outcome. An invalid refresh token clears the session; transient
    /// failures leave it untouched. If the session is logged out or replaced
    /// while the request is in flight, its result is discarded and
    /// [`AuthError::SessionChanged`] is returned.
    pub async fn refresh_session(&self) -> AuthResult<()> {
        let refresh = {
            let mut slot = self.inner.lock_refresh();
            if let Some((_, in_flight)) = &slot.current {
                debug!("Joining in-flight refresh");
                in_flight.clone()
            } else {
                let (epoch, token) = {
                    let state = self.inner.read_state();
                    (state.epoch, state.refresh_token.clone())
                };
                let Some(token) = token else {
                    return Err(AuthError::NotAuthenticated);
                };

                slot.next_id += 1;
                let id = slot.next_id;
                let refresh = Self::run_refresh(self.inner.clone(), id, epoch, token)
                    .boxed()
                    .shared();
                slot.current = Some((id, refresh.clone()));
                refresh
            }
        };

        refresh.await
    }

    async fn run_refresh(inner: Arc<Inner>, id: u64, epoch: u64, token: String) -> AuthResult<()> {
        {
            let mut state = inner.write_state();
            if state.epoch == epoch && state.status == SessionStatus::Authenticated {
                state.status = SessionStatus::Refreshing;
                inner.commit(&state);
            }
        }

        let result = inner.service.refresh(&token).await;
        let outcome = inner.apply_refresh(epoch, result);
        inner.release_refresh(id);
        outcome
    }

    /// Current access token, if any
    pub fn access_token(&self) -> Option<String> {
        self.inner.read_state().access_token.clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.inner.read_state().is_authenticated()
    }

    pub fn has_refresh_token(&self) -> bool {
        self.inner.read_state().refresh_token.is_some()
    }

    pub fn current_user(&self) -> Option<User> {
        self.inner.read_state().user.clone()
    }

    pub fn status(&self) -> SessionStatus {
        self.inner.read_state().status
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.inner.changes.borrow().clone()
    }

    /// Whether the session is still written to durable storage
    pub fn is_persistent(&self) -> bool {
        !self.inner.storage_degraded.load(Ordering::SeqCst)
    }

    /// Receive every committed change of the session
    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.inner.changes.subscribe()
    }

    /// Wait until startup restoration has settled the session
    pub async fn wait_until_settled(&self) -> SessionSnapshot {
        let mut changes = self.subscribe();
        // The sender lives in `self`, so the channel cannot close here
        match changes.wait_for(SessionSnapshot::is_settled).await {
            Ok(snapshot) => snapshot.clone(),
            Err(_) => self.snapshot(),
        }
    }
}

impl Inner {
    fn read_state(&self) -> RwLockReadGuard<'_, SessionState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_state(&self) -> RwLockWriteGuard<'_, SessionState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_refresh(&self) -> std::sync::MutexGuard<'_, RefreshSlot> {
        self.refresh.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Publish the state; called with the write lock held to keep ordering
    fn commit(&self, state: &SessionState) {
        self.changes.send_replace(state.snapshot());
    }

    /// Leave the pending state once the first login attempt has finished
    fn settle(&self) {
        let mut state = self.write_state();
        if state.status == SessionStatus::Pending {
            state.status = SessionStatus::Unauthenticated;
            self.commit(&state);
        }
    }

    fn apply_refresh(
        &self,
        epoch: u64,
        result: AuthResult<crate::services::RefreshGrant>,
    ) -> AuthResult<()> {
        let mut state = self.write_state();

        if state.epoch != epoch {
            debug!(
                started_in = epoch,
                current = state.epoch,
                "Discarding refresh result for a session that no longer exists"
            );
            return Err(AuthError::SessionChanged);
        }

        match result {
            Ok(grant) => {
                state.access_token = Some(grant.access_token);
                if let Some(refresh_token) = grant.refresh_token {
                    state.refresh_token = Some(refresh_token);
                }
                if let Some(user) = grant.user {
                    state.user = Some(user);
                }
                state.status = SessionStatus::Authenticated;
                state.last_refreshed_at = Some(Utc::now());
                self.persist(&state);
                self.commit(&state);
                debug!(epoch, "Session refreshed");
                Ok(())
            }
            Err(e) if e.ends_session() => {
                info!(error = %e, "Refresh token rejected, ending session");
                state.clear();
                self.clear_store();
                self.commit(&state);
                Err(e)
            }
            Err(e) => {
                state.status = if state.is_authenticated() {
                    SessionStatus::Authenticated
                } else {
                    SessionStatus::Unauthenticated
                };
                self.commit(&state);
                Err(e)
            }
        }
    }

    /// Forget the in-flight refresh so the next caller starts a fresh one
    fn abandon_refresh(&self) {
        self.lock_refresh().current = None;
    }

    fn release_refresh(&self, id: u64) {
        let mut slot = self.lock_refresh();
        if slot.current.as_ref().is_some_and(|(current, _)| *current == id) {
            slot.current = None;
        }
    }

    /// Write the session to durable storage, degrading to memory-only on failure
    fn persist(&self, state: &SessionState) {
        if self.storage_degraded.load(Ordering::SeqCst) {
            return;
        }

        if let Err(e) = self.write_store(state) {
            let error = AuthError::storage_unavailable(e.to_string());
            warn!(%error, "Session will not survive a restart");
            self.storage_degraded.store(true, Ordering::SeqCst);
            // Do not leave half a session behind
            self.clear_store();
        }
    }

    fn write_store(&self, state: &SessionState) -> Result<(), crate::store::StoreError> {
        let store = &self.store;
        match &state.access_token {
            Some(token) => store.save(StorageKey::AccessToken, token)?,
            None => store.clear(StorageKey::AccessToken)?,
        }
        match &state.refresh_token {
            Some(token) => store.save(StorageKey::RefreshToken, token)?,
            None => store.clear(StorageKey::RefreshToken)?,
        }
        match &state.user {
            Some(user) => store.save_json(StorageKey::User, user)?,
            None => store.clear(StorageKey::User)?,
        }
        Ok(())
    }

    fn clear_store(&self) {
        if let Err(e) = self.store.clear_all() {
            warn!(error = %e, "Failed to clear stored session");
        }
    }
}
