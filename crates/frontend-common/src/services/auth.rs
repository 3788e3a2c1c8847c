//! Authentication API service

use async_trait::async_trait;
use campus_core::{AuthError, AuthResult, TokenPair, User};
use campus_http::client::{ClientError, PublicClient};
use campus_http::types::LoginRequest;
use tracing::{debug, instrument};

/// Result of a successful login
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenGrant {
    pub tokens: TokenPair,
    pub user: Option<User>,
}

/// Result of a successful refresh; a missing refresh token means no rotation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshGrant {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub user: Option<User>,
}

/// Stateless transport for the remote authentication endpoints
///
/// Implementations never retry; retry policy belongs to the session manager.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AuthService: Send + Sync {
    /// Exchange credentials for a token pair
    async fn login(&self, username: &str, password: &str) -> AuthResult<TokenGrant>;

    /// Exchange a refresh token for a new access token
    async fn refresh(&self, refresh_token: &str) -> AuthResult<RefreshGrant>;

    /// Best-effort server-side invalidation of a refresh token
    async fn logout(&self, refresh_token: &str) -> AuthResult<()>;
}

/// [`AuthService`] over the REST API
#[derive(Clone)]
pub struct HttpAuthService {
    client: PublicClient,
}

impl HttpAuthService {
    pub const fn new(client: PublicClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl AuthService for HttpAuthService {
    #[instrument(skip(self, password))]
    async fn login(&self, username: &str, password: &str) -> AuthResult<TokenGrant> {
        let request = LoginRequest {
            username: username.to_string(),
            password: password.to_string(),
        };

        let response = self.client.login(&request).await.map_err(|e| {
            debug!(error = %e, "Login request failed");
            if e.is_rejection() {
                AuthError::invalid_credentials(e.to_string())
            } else {
                unavailable(&e)
            }
        })?;

        Ok(TokenGrant {
            tokens: TokenPair {
                access_token: response.access,
                refresh_token: response.refresh,
            },
            user: response.user,
        })
    }

    #[instrument(skip_all)]
    async fn refresh(&self, refresh_token: &str) -> AuthResult<RefreshGrant> {
        let response = self.client.refresh(refresh_token).await.map_err(|e| {
            debug!(error = %e, "Refresh request failed");
            if e.is_rejection() {
                AuthError::invalid_refresh_token(e.to_string())
            } else {
                unavailable(&e)
            }
        })?;

        Ok(RefreshGrant {
            access_token: response.access,
            refresh_token: response.refresh,
            user: response.user,
        })
    }

    #[instrument(skip_all)]
    async fn logout(&self, refresh_token: &str) -> AuthResult<()> {
        self.client
            .logout(refresh_token)
            .await
            .map_err(|e| unavailable(&e))
    }
}

fn unavailable(error: &ClientError) -> AuthError {
    AuthError::service_unavailable(error.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use campus_core::Role;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn service(server: &MockServer) -> HttpAuthService {
        HttpAuthService::new(PublicClient::new(server.uri()).unwrap())
    }

    #[tokio::test]
    async fn test_login_maps_response() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/login"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access": "A1",
                "refresh": "R1",
                "user": {
                    "id": 3,
                    "username": "prof",
                    "email": "prof@example.edu",
                    "role": "instructor"
                }
            })))
            .mount(&server)
            .await;

        let grant = service(&server).await.login("prof", "pw").await.unwrap();
        assert_eq!(grant.tokens.access_token, "A1");
        assert_eq!(grant.tokens.refresh_token, "R1");
        assert_eq!(grant.user.unwrap().role, Role::Instructor);
    }

    #[tokio::test]
    async fn test_login_401_is_invalid_credentials() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/login"))
            .respond_with(ResponseTemplate::new(401).set_body_string("bad credentials"))
            .mount(&server)
            .await;

        let err = service(&server).await.login("x", "y").await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidCredentials { .. }));
    }

    #[tokio::test]
    async fn test_login_5xx_is_service_unavailable() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/login"))
            .respond_with(ResponseTemplate::new(502))
            .mount(&server)
            .await;

        let err = service(&server).await.login("x", "y").await.unwrap_err();
        assert!(matches!(err, AuthError::ServiceUnavailable { .. }));
    }

    #[tokio::test]
    async fn test_network_failure_is_service_unavailable() {
        // Nothing listens on the discard port
        let client = PublicClient::new("http://127.0.0.1:9").unwrap();
        let err = HttpAuthService::new(client)
            .login("x", "y")
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::ServiceUnavailable { .. }));
    }

    #[tokio::test]
    async fn test_refresh_rejection_is_invalid_refresh_token() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/refresh"))
            .respond_with(
                ResponseTemplate::new(401).set_body_json(json!({"detail": "Token is blacklisted"})),
            )
            .mount(&server)
            .await;

        let err = service(&server).await.refresh("R1").await.unwrap_err();
        assert!(err.ends_session());
    }

    #[tokio::test]
    async fn test_refresh_with_rotation_and_profile() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/refresh"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access": "A2",
                "refresh": "R2",
                "user": {
                    "id": "u1",
                    "username": "admin",
                    "email": "admin@example.edu",
                    "role": "admin"
                }
            })))
            .mount(&server)
            .await;

        let grant = service(&server).await.refresh("R1").await.unwrap();
        assert_eq!(grant.access_token, "A2");
        assert_eq!(grant.refresh_token.as_deref(), Some("R2"));
        assert_eq!(grant.user.unwrap().role, Role::Admin);
    }
}
