//! Composition root handing the session to its consumers

use crate::auth::{RefreshScheduler, RefreshSchedulerHandle, SessionManager};
use crate::auth_guard::RouteGuard;
use crate::client_wrapper::AuthenticatedApi;
use crate::config::CampusConfig;
use crate::services::HttpAuthService;
use crate::store::TokenStore;
use campus_http::client::{ClientError, TypedClientBuilder};
use std::sync::Arc;

/// Everything pages and data hooks are allowed to depend on
///
/// Built once at startup and passed down explicitly; dropping the context
/// tears down the interceptor registration with it.
#[derive(Clone)]
pub struct AppContext {
    pub session: SessionManager,
    pub api: AuthenticatedApi,
    pub guard: RouteGuard,
    config: CampusConfig,
}

impl AppContext {
    /// Wire the HTTP clients, the session and the guard from configuration
    pub fn new(config: CampusConfig, store: Arc<dyn TokenStore>) -> Result<Self, ClientError> {
        let builder = || {
            TypedClientBuilder::new()
                .base_url(&config.api.base_url)
                .timeout(config.api.timeout())
        };

        let service = HttpAuthService::new(builder().build_public()?);
        let session = SessionManager::new(Arc::new(service), store);
        let api = AuthenticatedApi::new(builder().build_api()?, session.clone());
        let guard = RouteGuard::new(config.routing.clone());

        Ok(Self {
            session,
            api,
            guard,
            config,
        })
    }

    /// Start proactive refresh for this context's session
    pub fn spawn_scheduler(&self) -> RefreshSchedulerHandle {
        RefreshScheduler::spawn(self.session.clone(), self.config.session.clone())
    }

    pub const fn config(&self) -> &CampusConfig {
        &self.config
    }
}
