use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;
use reqwest::{Method, RequestBuilder};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use tracing::{debug, error};
use url::Url;

use crate::cache::CacheValue;
use crate::error::BackendError;

/// Connection settings for the backend.
#[derive(Debug, Clone)]
pub struct BackendConfig {
    /// Base URL, e.g. `https://api.tienda.ec/api`.
    pub base_url: Url,
    /// Per-request timeout.
    pub timeout: Duration,
}

impl BackendConfig {
    #[must_use]
    pub const fn new(base_url: Url, timeout: Duration) -> Self {
        Self { base_url, timeout }
    }
}

/// Client for the commerce backend REST API.
///
/// Cheap to clone; all clones share one connection pool and one catalog
/// cache.
#[derive(Clone)]
pub struct BackendClient {
    pub(crate) inner: Arc<BackendClientInner>,
}

pub(crate) struct BackendClientInner {
    http: reqwest::Client,
    base_url: String,
    pub(crate) cache: Cache<String, CacheValue>,
}

impl BackendClient {
    /// Create a new backend client.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: &BackendConfig) -> Result<Self, BackendError> {
        let cache = Cache::builder()
            .max_capacity(1000)
            .time_to_live(Duration::from_secs(300)) // 5 minutes
            .build();

        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(concat!("tienda/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            inner: Arc::new(BackendClientInner {
                http,
                base_url: config.base_url.as_str().trim_end_matches('/').to_string(),
                cache,
            }),
        })
    }

    /// Absolute URL for a backend path such as `/products/7`.
    pub(crate) fn url(&self, path: &str) -> Result<Url, BackendError> {
        Ok(Url::parse(&format!("{}{path}", self.inner.base_url))?)
    }

    /// Start a request, attaching the bearer token when given.
    pub(crate) fn request(
        &self,
        method: Method,
        url: Url,
        token: Option<&SecretString>,
    ) -> RequestBuilder {
        let builder = self
            .inner
            .http
            .request(method, url)
            .header("Accept", "application/json");
        match token {
            Some(token) => builder.bearer_auth(token.expose_secret()),
            None => builder,
        }
    }

    /// Send a request and decode a JSON body.
    pub(crate) async fn send<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
    ) -> Result<T, BackendError> {
        let body = self.send_raw(request).await?;
        serde_json::from_str(&body).map_err(|e| {
            error!(
                error = %e,
                body = %body.chars().take(500).collect::<String>(),
                "Failed to parse backend response"
            );
            BackendError::Parse(e)
        })
    }

    /// Send a request whose response body is ignored.
    pub(crate) async fn send_empty(&self, request: RequestBuilder) -> Result<(), BackendError> {
        self.send_raw(request).await.map(|_| ())
    }

    async fn send_raw(&self, request: RequestBuilder) -> Result<String, BackendError> {
        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            debug!(status = %status, "Backend returned non-success status");
            if status.is_server_error() {
                error!(
                    status = %status,
                    body = %body.chars().take(500).collect::<String>(),
                    "Backend server error"
                );
            }
            return Err(BackendError::from_response(status, &body));
        }

        Ok(body)
    }

    /// Drop every cached catalog entry.
    ///
    /// Called after admin writes so the storefront never serves a deleted
    /// product for the rest of the TTL.
    pub fn invalidate_catalog(&self) {
        self.inner.cache.invalidate_all();
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
pub(crate) mod tests {
    use super::*;

    pub fn client(base: &str) -> BackendClient {
        BackendClient::new(&BackendConfig::new(
            Url::parse(base).unwrap(),
            Duration::from_secs(1),
        ))
        .unwrap()
    }

    #[test]
    fn test_url_joins_without_double_slash() {
        let c = client("http://localhost:8080/api/");
        assert_eq!(
            c.url("/products/7").unwrap().as_str(),
            "http://localhost:8080/api/products/7"
        );

        let c = client("http://localhost:8080");
        assert_eq!(
            c.url("/auth/me").unwrap().as_str(),
            "http://localhost:8080/auth/me"
        );
    }

    #[test]
    fn test_request_sets_bearer() {
        let c = client("http://localhost:8080");
        let token = SecretString::from("tok-123");
        let req = c
            .request(Method::GET, c.url("/auth/me").unwrap(), Some(&token))
            .build()
            .unwrap();
        assert_eq!(
            req.headers().get("authorization").unwrap(),
            "Bearer tok-123"
        );

        let req = c
            .request(Method::GET, c.url("/products").unwrap(), None)
            .build()
            .unwrap();
        assert!(req.headers().get("authorization").is_none());
    }
}
