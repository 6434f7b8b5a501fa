//! HTTP client utilities.

use reqwest::{Client, StatusCode};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

use super::retry::{with_retry, RetryConfig};
use crate::config::HttpConfig;
use crate::sources::SourceError;

/// Shared HTTP client that fetches JSON documents with retries.
///
/// Responses are classified as follows:
///
/// - connection failures, timeouts, 429 and 5xx are transient and retried
/// - any other non-200 status yields an empty JSON object
/// - a 200 whose body is not JSON yields an empty JSON object
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Arc<Client>,
    retry: RetryConfig,
}

impl HttpClient {
    /// Create a new HTTP client with default settings
    pub fn new() -> Result<Self, SourceError> {
        Self::from_config(&HttpConfig::default())
    }

    /// Create a client from the `[http]` configuration section
    pub fn from_config(config: &HttpConfig) -> Result<Self, SourceError> {
        Self::build(
            &config.user_agent,
            Duration::from_secs(config.timeout_secs),
            config.retry_config(),
        )
    }

    fn build(user_agent: &str, timeout: Duration, retry: RetryConfig) -> Result<Self, SourceError> {
        let client = Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .connect_timeout(timeout.min(Duration::from_secs(10)))
            .pool_idle_timeout(Duration::from_secs(90))
            .build()
            .map_err(|e| SourceError::Other(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client: Arc::new(client),
            retry,
        })
    }

    /// Replace the retry policy
    pub fn with_retry_config(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// GET a JSON document, retrying transient failures.
    ///
    /// Returns the last transient error once the retry budget is spent.
    pub async fn get_json(&self, url: &str) -> Result<Value, SourceError> {
        with_retry(self.retry, || self.get_json_once(url)).await
    }

    async fn get_json_once(&self, url: &str) -> Result<Value, SourceError> {
        let response = self.client.get(url).send().await?;
        let status = response.status();

        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(SourceError::RateLimit);
        }
        if status.is_server_error() {
            return Err(SourceError::Server(status.as_u16()));
        }
        if status != StatusCode::OK {
            tracing::debug!(%url, %status, "Non-200 response treated as empty");
            return Ok(empty_object());
        }

        // A body cut off mid-read is a network failure and retried
        let bytes = response.bytes().await?;

        match serde_json::from_slice::<Value>(&bytes) {
            Ok(body) => Ok(body),
            Err(e) => {
                tracing::debug!(%url, error = %e, "Undecodable body treated as empty");
                Ok(empty_object())
            }
        }
    }
}

/// The `{}` document returned for responses that carry no usable data
pub fn empty_object() -> Value {
    Value::Object(serde_json::Map::new())
}
