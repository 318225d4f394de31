//! # Vault Webhooks
//!
//! Outbound webhook delivery for Vault:
//! - Subscription registry with per-subscription signing secrets
//! - Event matching across organization and global subscriptions
//! - HMAC-SHA256 signed delivery with a fixed retry schedule
//! - Endpoint health tracking with automatic disabling
//! - Delivery ledger with history queries and retention cleanup
//!
//! ## Example
//!
//! ```rust,ignore
//! use vault_webhooks::{NewSubscription, WebhookSystem};
//!
//! let system = WebhookSystem::new();
//!
//! let subscription = system
//!     .create(NewSubscription::new("https://example.com/webhook", ["user.created"]))
//!     .await?;
//!
//! let records = system
//!     .trigger("user.created", None, serde_json::json!({"user_id": "123"}), true)
//!     .await?;
//!
//! system.shutdown().await;
//! ```

mod config;
mod delivery;
mod envelope;
mod error;
mod event;
mod health;
mod ledger;
mod matcher;
mod receiver;
mod registry;
mod retry;
mod secret;
mod signature;
mod storage;
mod subscription;
mod system;
mod transport;

pub use config::WebhookConfig;
pub use delivery::{
    DELIVERY_HEADER, DeliveryExecutor, DeliveryRecord, DeliveryState, EVENT_HEADER, PreparedPayload,
    SIGNATURE_HEADER,
};
pub use envelope::{EventEnvelope, canonical_json};
pub use error::{WebhookError, WebhookResult};
pub use event::{UnknownEvent, WILDCARD_EVENT, WebhookEvent};
pub use health::{DEFAULT_FAILURE_THRESHOLD, HealthTracker};
pub use ledger::DeliveryLedger;
pub use matcher::EventMatcher;
pub use receiver::WebhookReceiver;
pub use registry::SubscriptionRegistry;
pub use retry::{FixedSchedule, NoRetry, RetryStrategy};
pub use secret::SecretGenerator;
pub use signature::{SIGNATURE_PREFIX, SignatureError, WebhookSigner};
pub use storage::{DeliveryQuery, InMemoryWebhookStorage, SubscriptionQuery, WebhookStorage};
pub use subscription::{
    MAX_DESCRIPTION_LEN, NewSubscription, REDACTED_SECRET, SubscriptionUpdate, WebhookSubscription,
};
pub use system::{WebhookSystem, WebhookSystemBuilder};
pub use transport::{ReqwestTransport, TransportError, TransportResponse, WebhookTransport};
