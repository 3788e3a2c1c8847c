//! Observable session state

use campus_core::User;
use chrono::{DateTime, Utc};

/// Lifecycle state of the session
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SessionStatus {
    /// Startup; persisted state has not been restored yet
    #[default]
    Pending,
    Unauthenticated,
    Authenticated,
    /// A refresh is in flight; the current access token stays usable
    Refreshing,
}

impl SessionStatus {
    /// Whether restoration has completed
    pub const fn is_settled(self) -> bool {
        !matches!(self, Self::Pending)
    }
}

/// Last committed view of the session, minus the credentials
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub status: SessionStatus,
    /// Incremented whenever a session is established or cleared
    pub epoch: u64,
    pub authenticated: bool,
    pub user: Option<User>,
    pub last_refreshed_at: Option<DateTime<Utc>>,
}

impl SessionSnapshot {
    pub const fn is_settled(&self) -> bool {
        self.status.is_settled()
    }
}

/// Credentials and profile owned by the session manager
#[derive(Default)]
pub(crate) struct SessionState {
    pub(crate) status: SessionStatus,
    pub(crate) epoch: u64,
    pub(crate) user: Option<User>,
    pub(crate) access_token: Option<String>,
    pub(crate) refresh_token: Option<String>,
    pub(crate) last_refreshed_at: Option<DateTime<Utc>>,
}

impl SessionState {
    pub(crate) const fn is_authenticated(&self) -> bool {
        self.access_token.is_some()
    }

    /// Forget credentials and profile, starting a new epoch
    pub(crate) fn clear(&mut self) {
        self.user = None;
        self.access_token = None;
        self.refresh_token = None;
        self.last_refreshed_at = None;
        self.status = SessionStatus::Unauthenticated;
        self.epoch += 1;
    }

    /// Whether there is anything left for a logout to clear
    pub(crate) const fn is_cleared(&self) -> bool {
        matches!(self.status, SessionStatus::Unauthenticated)
            && self.access_token.is_none()
            && self.refresh_token.is_none()
            && self.user.is_none()
    }

    pub(crate) fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            status: self.status,
            epoch: self.epoch,
            authenticated: self.is_authenticated(),
            user: self.user.clone(),
            last_refreshed_at: self.last_refreshed_at,
        }
    }
}
