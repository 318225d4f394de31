//! HTTP transport used to post deliveries.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::RwLock;

use crate::config::WebhookConfig;

/// Response received from a subscriber endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportResponse {
    /// HTTP status code.
    pub status: u16,
    /// Response body as text.
    pub body: String,
}

impl TransportResponse {
    /// Checks if the status is in `[200, 300)`.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Failure to complete a request at all.
///
/// Non-2xx responses are not transport errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// The request timed out.
    #[error("request timed out")]
    Timeout,
    /// The connection could not be established.
    #[error("connection failed: {0}")]
    Connect(String),
    /// Any other request failure.
    #[error("request failed: {0}")]
    Other(String),
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            TransportError::Timeout
        } else if err.is_connect() {
            TransportError::Connect(err.to_string())
        } else {
            TransportError::Other(err.to_string())
        }
    }
}

/// Trait for delivery transports.
#[async_trait]
pub trait WebhookTransport: Send + Sync {
    /// Posts a body to a URL with the given headers.
    async fn post(
        &self,
        url: &str,
        headers: &BTreeMap<String, String>,
        body: String,
    ) -> Result<TransportResponse, TransportError>;

    /// Releases pooled resources. The transport stays usable.
    async fn close(&self) {}
}

/// Transport backed by a shared, lazily-built `reqwest` client.
pub struct ReqwestTransport {
    client: RwLock<Option<reqwest::Client>>,
    timeout: Duration,
    user_agent: String,
    max_body_bytes: usize,
}

impl ReqwestTransport {
    /// Creates a transport with the given request timeout.
    pub fn new(timeout: Duration) -> Self {
        Self {
            client: RwLock::new(None),
            timeout,
            user_agent: WebhookConfig::default().user_agent,
            max_body_bytes: body_bytes_for(WebhookConfig::default().response_body_limit),
        }
    }

    /// Creates a transport from engine configuration.
    pub fn from_config(config: &WebhookConfig) -> Self {
        Self::new(config.timeout())
            .with_user_agent(config.user_agent.clone())
            .with_body_limit(body_bytes_for(config.response_body_limit))
    }

    /// Sets how many response body bytes are read before the rest is
    /// discarded.
    pub fn with_body_limit(mut self, max_body_bytes: usize) -> Self {
        self.max_body_bytes = max_body_bytes;
        self
    }

    /// Sets the User-Agent header value.
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Checks if the underlying client has been built.
    pub async fn is_open(&self) -> bool {
        self.client.read().await.is_some()
    }

    async fn client(&self) -> Result<reqwest::Client, TransportError> {
        if let Some(client) = self.client.read().await.as_ref() {
            return Ok(client.clone());
        }

        let mut guard = self.client.write().await;
        if let Some(client) = guard.as_ref() {
            return Ok(client.clone());
        }

        let client = reqwest::Client::builder()
            .timeout(self.timeout)
            .user_agent(self.user_agent.clone())
            .build()?;
        tracing::debug!(timeout_secs = self.timeout.as_secs(), "Created webhook HTTP client");

        *guard = Some(client.clone());
        Ok(client)
    }
}

impl Default for ReqwestTransport {
    fn default() -> Self {
        Self::from_config(&WebhookConfig::default())
    }
}

#[async_trait]
impl WebhookTransport for ReqwestTransport {
    async fn post(
        &self,
        url: &str,
        headers: &BTreeMap<String, String>,
        body: String,
    ) -> Result<TransportResponse, TransportError> {
        let client = self.client().await?;

        let mut request = client.post(url);
        for (key, value) in headers {
            request = request.header(key.as_str(), value.as_str());
        }

        let mut response = request.body(body).send().await?;
        let status = response.status().as_u16();

        let mut buf = Vec::new();
        while let Some(chunk) = response.chunk().await? {
            let room = self.max_body_bytes - buf.len();
            if chunk.len() >= room {
                buf.extend_from_slice(&chunk[..room]);
                break;
            }
            buf.extend_from_slice(&chunk);
        }

        Ok(TransportResponse {
            status,
            body: String::from_utf8_lossy(&buf).into_owned(),
        })
    }

    async fn close(&self) {
        if self.client.write().await.take().is_some() {
            tracing::debug!("Released webhook HTTP client");
        }
    }
}

/// UTF-8 needs at most four bytes per character.
fn body_bytes_for(char_limit: usize) -> usize {
    char_limit.saturating_mul(4)
}
