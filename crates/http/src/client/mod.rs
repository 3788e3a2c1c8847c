//! Campus HTTP client

pub mod auth;
pub mod error;
pub mod interceptor;
pub mod typed;

pub use error::ClientError;
pub use interceptor::{InterceptorChain, InterceptorRegistration, RequestInterceptor};
pub use typed::{PublicClient, TypedClientBuilder};

use reqwest::{Client, Response};
use std::sync::Arc;
use tracing::debug;

const USER_AGENT: &str = concat!("campus-client/", env!("CARGO_PKG_VERSION"));

/// Client for the REST API; every request passes through the interceptor chain
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    interceptors: InterceptorChain,
}

impl ApiClient {
    /// Create a new client with default configuration
    pub fn new(base_url: impl Into<String>) -> Result<Self, ClientError> {
        TypedClientBuilder::new().base_url(base_url).build_api()
    }

    pub(crate) fn from_parts(client: Client, base_url: String) -> Self {
        Self {
            client,
            base_url,
            interceptors: InterceptorChain::new(),
        }
    }

    /// Get the base URL
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Register an interceptor for this client and all of its clones
    pub fn register_interceptor(
        &self,
        interceptor: Arc<dyn RequestInterceptor>,
    ) -> InterceptorRegistration {
        self.interceptors.register(interceptor)
    }

    pub fn interceptors(&self) -> &InterceptorChain {
        &self.interceptors
    }

    /// Create a request builder; interceptors run when it is sent
    pub fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        let url = format!("{}{}", self.base_url, path);
        self.client.request(method, url)
    }

    /// Send a request and map error statuses
    pub async fn send(&self, request: reqwest::RequestBuilder) -> Result<Response, ClientError> {
        let mut request = request.build()?;
        self.interceptors.apply(&mut request);
        debug!(method = %request.method(), url = %request.url(), "Sending API request");

        let response = self.client.execute(request).await?;
        check_status(response).await
    }

    /// Execute a request and decode the JSON body
    pub async fn execute<T: serde::de::DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<T, ClientError> {
        Ok(self.send(request).await?.json().await?)
    }
}

/// Turn non-success responses into [`ClientError`]
pub(crate) async fn check_status(response: Response) -> Result<Response, ClientError> {
    let status = response.status();

    if status.is_success() {
        Ok(response)
    } else {
        let message = response.text().await.unwrap_or_else(|_| status.to_string());
        Err(ClientError::from_status(status, message))
    }
}
