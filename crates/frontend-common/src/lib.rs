//! Client-side authentication for Campus
//!
//! The [`SessionManager`] owns the session; the token store, refresh
//! scheduler, route guard and request interceptor are built around it.

pub mod auth;
pub mod auth_guard;
pub mod client;
pub mod client_wrapper;
pub mod config;
pub mod context;
pub mod services;
pub mod store;

#[cfg(test)]
pub(crate) mod testing;

pub use auth::{
    RefreshScheduler, RefreshSchedulerHandle, SessionManager, SessionSnapshot, SessionStatus,
};
pub use auth_guard::{RouteDecision, RouteGuard};
pub use client::BearerAuthInterceptor;
pub use client_wrapper::AuthenticatedApi;
pub use config::{AuthConfig, CampusConfig, SessionConfig};
pub use context::AppContext;
pub use store::{FileTokenStore, MemoryTokenStore, StorageKey, TokenStore};
