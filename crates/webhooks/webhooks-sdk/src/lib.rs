//! # Vault Webhooks SDK
//!
//! SDK for services that receive Vault webhooks.
//!
//! This crate provides:
//! - Signature verification against the raw request body
//! - An extractor trait to adapt any HTTP framework's request type
//! - Event handlers dispatched by event name
//!
//! ## Example
//!
//! ```rust,ignore
//! use vault_webhooks_sdk::{HandlerRegistry, WebhookClient};
//!
//! let client = WebhookClient::new(std::env::var("WEBHOOK_SECRET")?);
//! let handlers = HandlerRegistry::new().on("user.created", Arc::new(OnUserCreated));
//!
//! // `request` implements `WebhookExtractor`
//! handlers.receive(&client, &request).await?;
//! ```

mod client;
mod traits;

pub use client::{WebhookClient, WebhookClientBuilder, WebhookExtractor, verify_webhook};
pub use traits::{HandlerRegistry, WebhookHandler};

// Re-export core webhook types for convenience
pub use vault_webhooks::{
    DELIVERY_HEADER, EVENT_HEADER, EventEnvelope, SIGNATURE_HEADER, WebhookError, WebhookEvent, WebhookReceiver,
    WebhookResult, WebhookSigner,
};
