//! reqwest-backed [`ApiClient`] implementation.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::client::{ApiClient, Method};
use crate::error::ApiError;

/// Source of the credential attached to outgoing requests.
///
/// Typically backed by the identity SDK's token refresh. Returning `None`
/// sends the request unauthenticated.
#[async_trait]
pub trait CredentialSource: Send + Sync {
    /// Returns the current bearer token, if any.
    async fn bearer_token(&self) -> Option<String>;
}

/// [`ApiClient`] over a reqwest client with a fixed base URL.
///
/// The credential source is queried once per request, so token refresh in
/// the identity SDK is picked up transparently.
#[derive(Clone)]
pub struct HttpApiClient {
    http: reqwest::Client,
    base_url: String,
    credentials: Option<Arc<dyn CredentialSource>>,
}

/// Builder for [`HttpApiClient`].
pub struct HttpApiClientBuilder {
    base_url: String,
    credentials: Option<Arc<dyn CredentialSource>>,
    timeout: Option<Duration>,
}

impl HttpApiClient {
    /// Starts building a client for the given base URL.
    pub fn builder(base_url: impl Into<String>) -> HttpApiClientBuilder {
        HttpApiClientBuilder {
            base_url: base_url.into(),
            credentials: None,
            timeout: None,
        }
    }
}

impl HttpApiClientBuilder {
    /// Attaches a credential source queried once per request.
    pub fn credentials(mut self, source: Arc<dyn CredentialSource>) -> Self {
        self.credentials = Some(source);
        self
    }

    /// Sets a per-request timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Builds the client.
    pub fn build(self) -> Result<HttpApiClient, ApiError> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = self.timeout {
            builder = builder.timeout(timeout);
        }
        let http = builder
            .build()
            .map_err(|err| ApiError::Transport(Box::new(err)))?;
        Ok(HttpApiClient {
            http,
            base_url: self.base_url.trim_end_matches('/').to_string(),
            credentials: self.credentials,
        })
    }
}

#[async_trait]
impl ApiClient for HttpApiClient {
    async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> Result<Value, ApiError> {
        let url = format!("{}{}", self.base_url, path);
        let mut request = match method {
            Method::Get => self.http.get(&url),
            Method::Post => self.http.post(&url),
            Method::Patch => self.http.patch(&url),
        };
        if let Some(source) = &self.credentials {
            if let Some(token) = source.bearer_token().await {
                request = request.bearer_auth(token);
            }
        }
        if let Some(body) = &body {
            request = request.json(body);
        }

        let response = request
            .send()
            .await
            .map_err(|err| ApiError::Transport(Box::new(err)))?;
        let status = response.status();
        if !status.is_success() {
            return Err(ApiError::Status(status.as_u16()));
        }

        let text = response
            .text()
            .await
            .map_err(|err| ApiError::Transport(Box::new(err)))?;
        if text.is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&text).map_err(|err| ApiError::Transport(Box::new(err)))
    }
}

impl fmt::Debug for HttpApiClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpApiClient")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}
