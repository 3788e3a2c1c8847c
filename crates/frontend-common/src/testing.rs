//! Scripted authentication service for session tests

use crate::services::{AuthService, RefreshGrant, TokenGrant};
use async_trait::async_trait;
use campus_core::{AuthError, AuthResult, Role, TokenPair, User};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::Notify;

/// How the next refresh calls are answered
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RefreshBehavior {
    /// Issue `A<n>` for the n-th call, keeping the refresh token
    Succeed,
    /// Issue `A<n>` and rotate the refresh token to `R<n>`
    Rotate,
    Reject,
    Unavailable,
}

/// In-process [`AuthService`] that counts calls and can hold refreshes open
pub(crate) struct ScriptedAuthService {
    behavior: Mutex<RefreshBehavior>,
    gate: Arc<Notify>,
    hold_refresh: AtomicBool,
    logout_delay_ms: AtomicU64,
    pub(crate) login_calls: AtomicUsize,
    pub(crate) refresh_calls: AtomicUsize,
    pub(crate) logout_calls: AtomicUsize,
    /// Refresh tokens whose logout call ran to completion
    pub(crate) logged_out_tokens: Mutex<Vec<String>>,
}

impl ScriptedAuthService {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self {
            behavior: Mutex::new(RefreshBehavior::Succeed),
            gate: Arc::new(Notify::new()),
            hold_refresh: AtomicBool::new(false),
            logout_delay_ms: AtomicU64::new(0),
            login_calls: AtomicUsize::new(0),
            refresh_calls: AtomicUsize::new(0),
            logout_calls: AtomicUsize::new(0),
            logged_out_tokens: Mutex::new(Vec::new()),
        })
    }

    pub(crate) fn set_refresh(&self, behavior: RefreshBehavior) {
        *self.behavior.lock().unwrap_or_else(PoisonError::into_inner) = behavior;
    }

    /// Make refreshes wait for [`Self::release`] before answering
    pub(crate) fn hold_refreshes(&self) {
        self.hold_refresh.store(true, Ordering::SeqCst);
    }

    /// Make remote logouts take `delay` before they complete
    pub(crate) fn slow_logouts(&self, delay: Duration) {
        let millis = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
        self.logout_delay_ms.store(millis, Ordering::SeqCst);
    }

    pub(crate) fn release(&self) {
        self.gate.notify_one();
    }

    pub(crate) fn refreshes(&self) -> usize {
        self.refresh_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn logouts(&self) -> usize {
        self.logout_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn delivered_logouts(&self) -> usize {
        self.logged_out_tokens
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

pub(crate) fn user(username: &str, role: Role) -> User {
    User {
        id: format!("{username}-id"),
        username: username.to_string(),
        email: format!("{username}@example.edu"),
        display_name: None,
        role,
    }
}

#[async_trait]
impl AuthService for ScriptedAuthService {
    async fn login(&self, username: &str, password: &str) -> AuthResult<TokenGrant> {
        self.login_calls.fetch_add(1, Ordering::SeqCst);
        if password != "secret" {
            return Err(AuthError::invalid_credentials("No active account found"));
        }

        let role = match username {
            "admin" => Role::Admin,
            "prof" => Role::Instructor,
            _ => Role::Student,
        };
        Ok(TokenGrant {
            tokens: TokenPair {
                access_token: "A0".to_string(),
                refresh_token: "R0".to_string(),
            },
            user: Some(user(username, role)),
        })
    }

    async fn refresh(&self, _refresh_token: &str) -> AuthResult<RefreshGrant> {
        let n = self.refresh_calls.fetch_add(1, Ordering::SeqCst) + 1;
        if self.hold_refresh.load(Ordering::SeqCst) {
            self.gate.notified().await;
        }

        let behavior = *self.behavior.lock().unwrap_or_else(PoisonError::into_inner);
        match behavior {
            RefreshBehavior::Succeed => Ok(RefreshGrant {
                access_token: format!("A{n}"),
                refresh_token: None,
                user: None,
            }),
            RefreshBehavior::Rotate => Ok(RefreshGrant {
                access_token: format!("A{n}"),
                refresh_token: Some(format!("R{n}")),
                user: None,
            }),
            RefreshBehavior::Reject => {
                Err(AuthError::invalid_refresh_token("Token is blacklisted"))
            }
            RefreshBehavior::Unavailable => {
                Err(AuthError::service_unavailable("connection refused"))
            }
        }
    }

    async fn logout(&self, refresh_token: &str) -> AuthResult<()> {
        self.logout_calls.fetch_add(1, Ordering::SeqCst);
        let delay = self.logout_delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }

        self.logged_out_tokens
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(refresh_token.to_string());
        Ok(())
    }
}
