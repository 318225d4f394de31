//! Webhook client for receiving webhooks.

use vault_webhooks::{EventEnvelope, SIGNATURE_HEADER, WebhookError, WebhookReceiver, WebhookResult};

/// Client for receiving and verifying webhooks.
pub struct WebhookClient {
    receiver: WebhookReceiver,
}

impl WebhookClient {
    /// Creates a new webhook client.
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            receiver: WebhookReceiver::new(secret),
        }
    }

    /// Verifies and parses a webhook.
    pub fn verify(&self, signature: &str, payload: &[u8]) -> WebhookResult<EventEnvelope> {
        self.receiver.verify(signature, payload)
    }

    /// Verifies a webhook signature only.
    pub fn verify_signature(&self, signature: &str, payload: &[u8]) -> WebhookResult<()> {
        self.receiver.verify_signature(signature, payload)
    }

    /// Returns the inner receiver.
    pub fn receiver(&self) -> &WebhookReceiver {
        &self.receiver
    }
}

/// Builder for webhook clients.
pub struct WebhookClientBuilder {
    secret: Option<String>,
}

impl WebhookClientBuilder {
    /// Creates a new builder.
    pub fn new() -> Self {
        Self { secret: None }
    }

    /// Sets the subscription secret.
    pub fn secret(mut self, secret: impl Into<String>) -> Self {
        self.secret = Some(secret.into());
        self
    }

    /// Builds the client.
    pub fn build(self) -> WebhookResult<WebhookClient> {
        match self.secret {
            Some(secret) if !secret.is_empty() => Ok(WebhookClient::new(secret)),
            _ => Err(WebhookError::ConfigError("webhook secret is required".to_string())),
        }
    }
}

impl Default for WebhookClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Helper trait for extracting webhook data from HTTP requests.
pub trait WebhookExtractor {
    /// Looks up a header value by name, case-insensitively.
    fn header(&self, name: &str) -> Option<&str>;

    /// Extracts the raw body bytes.
    fn body(&self) -> &[u8];

    /// Extracts the signature header value.
    fn signature(&self) -> Option<&str> {
        self.header(SIGNATURE_HEADER)
    }
}

/// Convenience function for verifying webhooks from extractors.
pub fn verify_webhook<E: WebhookExtractor>(client: &WebhookClient, extractor: &E) -> WebhookResult<EventEnvelope> {
    let signature = extractor.signature().ok_or(WebhookError::InvalidSignature)?;
    client.verify(signature, extractor.body())
}
