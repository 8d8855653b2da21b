//! HTTP implementation of [`RequestGateway`] over reqwest.
//!
//! Resolves endpoints against a configured base URL, attaches a bearer token
//! when one is set, maps non-2xx answers to [`GatewayError`] and backs off on
//! rate limiting. Everything above this layer only sees JSON values.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use futures::future::BoxFuture;
use reqwest::Client;
use serde_json::Value;
use tracing::{debug, warn};

use super::{GatewayError, Method, RequestGateway};

// ============================================================================
// Constants
// ============================================================================

/// HTTP request timeout in seconds.
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Maximum number of retries for rate-limited (429) requests.
const MAX_RATE_LIMIT_RETRIES: u32 = 3;

/// Initial backoff delay in milliseconds for rate limiting.
const INITIAL_BACKOFF_MS: u64 = 1000;

/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct HttpGateway {
    client: Client,
    base_url: String,
    token: Option<Arc<str>>,
}

impl HttpGateway {
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: None,
        })
    }

    /// Set the bearer token for authenticated requests
    pub fn set_token(&mut self, token: impl Into<Arc<str>>) {
        self.token = Some(token.into());
    }

    /// New gateway with the given token, sharing the connection pool.
    pub fn with_token(&self, token: impl Into<Arc<str>>) -> Self {
        Self {
            client: self.client.clone(),
            base_url: self.base_url.clone(),
            token: Some(token.into()),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, endpoint: &str) -> String {
        if endpoint.starts_with("http://") || endpoint.starts_with("https://") {
            endpoint.to_string()
        } else if endpoint.starts_with('/') {
            format!("{}{}", self.base_url, endpoint)
        } else {
            format!("{}/{}", self.base_url, endpoint)
        }
    }

    /// Returns Ok(Some(payload)) for success, Ok(None) for rate limit (should retry),
    /// or Err for other errors.
    async fn read_response(response: reqwest::Response) -> Result<Option<Value>, GatewayError> {
        let status = response.status();
        if status.as_u16() == 429 {
            return Ok(None);
        }

        let body = response.text().await?;
        if !status.is_success() {
            return Err(GatewayError::from_status(status, &body));
        }

        if body.trim().is_empty() {
            return Ok(Some(Value::Null));
        }
        serde_json::from_str(&body)
            .map(Some)
            .map_err(|e| GatewayError::InvalidResponse(format!("Malformed JSON: {}", e)))
    }

    async fn execute(
        &self,
        endpoint: &str,
        method: Method,
        body: Option<&Value>,
    ) -> Result<Value, GatewayError> {
        let url = self.url(endpoint);
        let mut retries = 0;
        let mut backoff_ms = INITIAL_BACKOFF_MS;

        loop {
            let mut request = self.client.request(method.into(), &url);
            if let Some(ref token) = self.token {
                request = request.bearer_auth(token);
            }
            if let Some(body) = body {
                request = request.json(body);
            }

            debug!(%method, url = %url, "Sending request");
            let response = request.send().await?;

            match Self::read_response(response).await? {
                Some(payload) => return Ok(payload),
                None => {
                    retries += 1;
                    if retries > MAX_RATE_LIMIT_RETRIES {
                        return Err(GatewayError::RateLimited);
                    }
                    warn!(url = %url, retry = retries, backoff_ms = backoff_ms, "Rate limited, backing off");
                    tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
                    backoff_ms *= 2;
                }
            }
        }
    }
}

impl RequestGateway for HttpGateway {
    fn send<'a>(
        &'a self,
        endpoint: &'a str,
        method: Method,
        body: Option<&'a Value>,
    ) -> BoxFuture<'a, Result<Value, GatewayError>> {
        Box::pin(self.execute(endpoint, method, body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_joins_relative_endpoints() {
        let gateway = HttpGateway::new("https://api.example.edu/v1/").unwrap();
        assert_eq!(gateway.base_url(), "https://api.example.edu/v1");
        assert_eq!(gateway.url("/accounts"), "https://api.example.edu/v1/accounts");
        assert_eq!(gateway.url("events/7"), "https://api.example.edu/v1/events/7");
    }

    #[test]
    fn test_url_passes_absolute_endpoints_through() {
        let gateway = HttpGateway::new("https://api.example.edu").unwrap();
        assert_eq!(
            gateway.url("https://other.example.edu/filters"),
            "https://other.example.edu/filters"
        );
    }

    #[test]
    fn test_with_token_keeps_base_url() {
        let gateway = HttpGateway::new("https://api.example.edu").unwrap();
        let authed = gateway.with_token("secret");
        assert_eq!(authed.base_url(), gateway.base_url());
        assert_eq!(authed.token.as_deref(), Some("secret"));
        assert!(gateway.token.is_none());
    }
}
