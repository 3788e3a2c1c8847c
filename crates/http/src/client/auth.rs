//! Authentication endpoints

use super::{ClientError, PublicClient};
use crate::types::{LoginRequest, LoginResponse, RefreshRequest, RefreshResponse};
use reqwest::Method;

pub const LOGIN_PATH: &str = "/auth/login";
pub const REFRESH_PATH: &str = "/auth/refresh";
pub const LOGOUT_PATH: &str = "/auth/logout";

impl PublicClient {
    /// Exchange username and password for a token pair
    pub async fn login(&self, request: &LoginRequest) -> Result<LoginResponse, ClientError> {
        let req = self.request(Method::POST, LOGIN_PATH).json(request);
        self.execute(req).await
    }

    /// Exchange a refresh token for a new access token
    pub async fn refresh(&self, refresh_token: &str) -> Result<RefreshResponse, ClientError> {
        let req = self
            .request(Method::POST, REFRESH_PATH)
            .json(&RefreshRequest {
                refresh: refresh_token.to_string(),
            });
        self.execute(req).await
    }

    /// Invalidate a refresh token server side
    pub async fn logout(&self, refresh_token: &str) -> Result<(), ClientError> {
        let req = self
            .request(Method::POST, LOGOUT_PATH)
            .json(&RefreshRequest {
                refresh: refresh_token.to_string(),
            });
        self.execute_empty(req).await
    }
}
