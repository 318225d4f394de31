//! Webhook error types.

use thiserror::Error;
use uuid::Uuid;

/// Result type for webhook operations.
pub type WebhookResult<T> = Result<T, WebhookError>;

/// Error type for webhook operations.
#[derive(Debug, Error)]
pub enum WebhookError {
    /// Subscription not found.
    #[error("Webhook not found: {0}")]
    NotFound(Uuid),

    /// Invalid signature.
    #[error("Invalid signature")]
    InvalidSignature,

    /// Invalid payload.
    #[error("Invalid payload: {0}")]
    InvalidPayload(String),

    /// Subscription failed validation.
    #[error("Invalid subscription: {0}")]
    InvalidSubscription(String),

    /// Storage error.
    #[error("Storage error: {0}")]
    StorageError(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<serde_json::Error> for WebhookError {
    fn from(err: serde_json::Error) -> Self {
        WebhookError::InvalidPayload(err.to_string())
    }
}

impl From<tokio::task::JoinError> for WebhookError {
    fn from(err: tokio::task::JoinError) -> Self {
        WebhookError::Internal(format!("delivery task failed: {}", err))
    }
}

impl WebhookError {
    /// Returns true if this error means the subscription does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, WebhookError::NotFound(_))
    }
}
