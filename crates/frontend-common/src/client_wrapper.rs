//! API client bound to the session that reacts to expired access tokens

use crate::auth::SessionManager;
use crate::client::BearerAuthInterceptor;
use campus_http::client::{ApiClient, ClientError, InterceptorRegistration};
use std::sync::Arc;
use tracing::{debug, warn};

/// Wrapper around [`ApiClient`] that handles auth errors
///
/// The bearer interceptor is registered once when the wrapper is created and
/// deregistered when the last clone is dropped.
#[derive(Clone)]
pub struct AuthenticatedApi {
    inner: ApiClient,
    session: SessionManager,
    _registration: Arc<InterceptorRegistration>,
}

impl AuthenticatedApi {
    /// Create a new wrapped client
    pub fn new(client: ApiClient, session: SessionManager) -> Self {
        let registration = BearerAuthInterceptor::install(&session, &client);
        Self {
            inner: client,
            session,
            _registration: Arc::new(registration),
        }
    }

    /// Send a request; a 401 triggers one session refresh and one retry
    pub async fn send(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<reqwest::Response, ClientError> {
        let retry = request.try_clone();

        match self.inner.send(request).await {
            Err(error) if error.is_auth_expired() => {
                let Some(retry) = retry else {
                    return Err(error);
                };
                if !self.session.has_refresh_token() {
                    return Err(error);
                }

                match self.session.refresh_session().await {
                    Ok(()) => {
                        debug!("Access token renewed, retrying request");
                        self.inner.send(retry).await
                    }
                    Err(refresh_error) => {
                        warn!(error = %refresh_error, "Could not renew access token");
                        Err(error)
                    }
                }
            }
            other => other,
        }
    }

    /// Execute a request and decode the JSON body
    pub async fn execute<T: serde::de::DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<T, ClientError> {
        Ok(self.send(request).await?.json().await?)
    }

    /// Create a request builder
    pub fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        self.inner.request(method, path)
    }

    /// GET a path and return the JSON body
    pub async fn get_json(&self, path: &str) -> Result<serde_json::Value, ClientError> {
        self.execute(self.request(reqwest::Method::GET, path)).await
    }

    pub const fn session(&self) -> &SessionManager {
        &self.session
    }

    /// Get a reference to the inner client (use sparingly - prefer wrapped methods)
    pub const fn inner(&self) -> &ApiClient {
        &self.inner
    }
}
