//! Bearer token injection for outgoing API requests

use crate::auth::SessionManager;
use campus_http::client::{ApiClient, InterceptorRegistration, RequestInterceptor};
use reqwest::header::{AUTHORIZATION, HeaderValue};
use std::sync::Arc;
use tracing::warn;

/// Attaches `Authorization: Bearer <token>` while the session holds a token
pub struct BearerAuthInterceptor {
    session: SessionManager,
}

impl BearerAuthInterceptor {
    pub const fn new(session: SessionManager) -> Self {
        Self { session }
    }

    /// Register on `client`; the header stops once the registration is dropped
    pub fn install(session: &SessionManager, client: &ApiClient) -> InterceptorRegistration {
        client.register_interceptor(Arc::new(Self::new(session.clone())))
    }
}

impl RequestInterceptor for BearerAuthInterceptor {
    fn name(&self) -> &'static str {
        "bearer-auth"
    }

    fn intercept(&self, request: &mut reqwest::Request) {
        let Some(token) = self.session.access_token() else {
            return;
        };

        match HeaderValue::from_str(&format!("Bearer {token}")) {
            Ok(mut value) => {
                value.set_sensitive(true);
                request.headers_mut().insert(AUTHORIZATION, value);
            }
            Err(e) => warn!(error = %e, "Access token is not a valid header value"),
        }
    }
}
