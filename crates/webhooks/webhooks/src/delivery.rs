//! Webhook delivery records and executor.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::time::Instant;
use uuid::Uuid;

use crate::config::WebhookConfig;
use crate::envelope::{EventEnvelope, canonical_json};
use crate::error::WebhookResult;
use crate::health::HealthTracker;
use crate::ledger::DeliveryLedger;
use crate::retry::RetryStrategy;
use crate::signature::WebhookSigner;
use crate::subscription::WebhookSubscription;
use crate::transport::{TransportError, TransportResponse, WebhookTransport};

/// Header carrying the payload signature.
pub const SIGNATURE_HEADER: &str = "X-Webhook-Signature";
/// Header carrying the event name.
pub const EVENT_HEADER: &str = "X-Webhook-Event";
/// Header carrying the delivery id.
pub const DELIVERY_HEADER: &str = "X-Webhook-Delivery";

/// State of one subscription's attempt chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeliveryState {
    /// Not yet attempted.
    Pending,
    /// Request in flight.
    Attempting,
    /// Delivered with a 2xx response.
    Success,
    /// Transport failure, waiting to retry.
    Retry,
    /// Rejected, or retries exhausted.
    Failed,
}

impl DeliveryState {
    /// Checks if the chain has ended.
    pub fn is_terminal(&self) -> bool {
        matches!(self, DeliveryState::Success | DeliveryState::Failed)
    }

    /// Checks if moving to `next` is a legal transition.
    pub fn can_transition_to(&self, next: DeliveryState) -> bool {
        use DeliveryState::*;
        matches!(
            (self, next),
            (Pending, Attempting)
                | (Attempting, Success)
                | (Attempting, Retry)
                | (Attempting, Failed)
                | (Retry, Attempting)
        )
    }
}

/// Audit record of one terminal delivery outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeliveryRecord {
    /// Record ID.
    pub id: Uuid,
    /// Subscription that was notified.
    pub webhook_id: Uuid,
    /// Event name.
    pub event: String,
    /// URL the request was sent to.
    pub request_url: String,
    /// Headers as sent.
    pub request_headers: BTreeMap<String, String>,
    /// Envelope as sent.
    pub request_body: Value,
    /// HTTP status code, if a response was received.
    pub response_status: Option<u16>,
    /// Response body, truncated.
    pub response_body: Option<String>,
    /// Round-trip time, if a response was received.
    pub response_time_ms: Option<u64>,
    /// Whether the delivery succeeded.
    pub success: bool,
    /// Failure description, truncated.
    pub error_message: Option<String>,
    /// Attempt that produced this record.
    pub attempt_number: u32,
    /// When the record was written.
    pub created_at: DateTime<Utc>,
}

impl DeliveryRecord {
    /// Returns the request body exactly as it was signed.
    pub fn request_body_json(&self) -> WebhookResult<String> {
        canonical_json(&self.request_body)
    }

    /// Returns the signature header that was sent, if any.
    pub fn signature(&self) -> Option<&str> {
        self.request_headers.get(SIGNATURE_HEADER).map(String::as_str)
    }
}

/// Envelope serialized once and shared by every delivery of a trigger.
#[derive(Debug, Clone)]
pub struct PreparedPayload {
    /// The envelope.
    pub envelope: EventEnvelope,
    /// Canonical JSON body.
    pub body: String,
    /// Parsed body, stored on delivery records.
    pub value: Value,
}

impl PreparedPayload {
    /// Serializes an envelope for delivery.
    pub fn new(envelope: EventEnvelope) -> WebhookResult<Self> {
        let value = serde_json::to_value(&envelope)?;
        let body = canonical_json(&value)?;
        Ok(Self {
            envelope,
            body,
            value,
        })
    }
}

/// Executes attempt chains against subscriber endpoints.
pub struct DeliveryExecutor {
    transport: Arc<dyn WebhookTransport>,
    retry_strategy: Arc<dyn RetryStrategy>,
    health: HealthTracker,
    ledger: DeliveryLedger,
    response_body_limit: usize,
    error_message_limit: usize,
}

impl DeliveryExecutor {
    /// Creates a new delivery executor.
    pub fn new(
        transport: Arc<dyn WebhookTransport>,
        retry_strategy: Arc<dyn RetryStrategy>,
        health: HealthTracker,
        ledger: DeliveryLedger,
        config: &WebhookConfig,
    ) -> Self {
        Self {
            transport,
            retry_strategy,
            health,
            ledger,
            response_body_limit: config.response_body_limit,
            error_message_limit: config.error_message_limit,
        }
    }

    /// Delivers a payload to one subscription, retrying transport failures.
    ///
    /// Only the terminal attempt is written to the ledger. A non-2xx
    /// response ends the chain immediately.
    ///
    /// Headers are built once from `subscription`, so every attempt of a
    /// chain goes to the same URL with the same signature, even if the
    /// subscription is updated or its secret regenerated during backoff.
    pub async fn deliver(
        &self,
        subscription: &WebhookSubscription,
        payload: &PreparedPayload,
    ) -> WebhookResult<DeliveryRecord> {
        let headers = build_headers(subscription, payload);
        let mut chain = AttemptChain::new(subscription.id, payload.envelope.id);

        let record = loop {
            chain.transition(DeliveryState::Attempting);
            let started = Instant::now();
            let result = self
                .transport
                .post(&subscription.url, &headers, payload.body.clone())
                .await;
            let elapsed_ms = started.elapsed().as_millis() as u64;

            match result {
                Ok(response) if response.is_success() => {
                    chain.transition(DeliveryState::Success);
                    self.health.mark_success(subscription.id).await?;
                    tracing::info!(
                        webhook_id = %subscription.id,
                        delivery_id = %payload.envelope.id,
                        event = %payload.envelope.event,
                        status = response.status,
                        attempt = chain.attempt,
                        "Webhook delivered"
                    );
                    break self.response_record(subscription, payload, &headers, &chain, response, elapsed_ms);
                }
                Ok(response) => {
                    chain.transition(DeliveryState::Failed);
                    self.health.mark_failure(subscription.id).await?;
                    tracing::warn!(
                        webhook_id = %subscription.id,
                        delivery_id = %payload.envelope.id,
                        status = response.status,
                        attempt = chain.attempt,
                        "Webhook rejected by endpoint"
                    );
                    break self.response_record(subscription, payload, &headers, &chain, response, elapsed_ms);
                }
                Err(err) => {
                    self.health.mark_failure(subscription.id).await?;

                    if let Some(delay) = self.retry_strategy.next_delay(chain.attempt) {
                        chain.transition(DeliveryState::Retry);
                        tracing::warn!(
                            webhook_id = %subscription.id,
                            delivery_id = %payload.envelope.id,
                            attempt = chain.attempt,
                            retry_in_ms = delay.as_millis() as u64,
                            error = %err,
                            "Webhook delivery failed, retrying"
                        );
                        tokio::time::sleep(delay).await;
                        chain.attempt += 1;
                        continue;
                    }

                    chain.transition(DeliveryState::Failed);
                    tracing::warn!(
                        webhook_id = %subscription.id,
                        delivery_id = %payload.envelope.id,
                        attempt = chain.attempt,
                        error = %err,
                        "Webhook delivery failed, giving up"
                    );
                    break self.error_record(subscription, payload, &headers, &chain, &err);
                }
            }
        };

        self.ledger.record(&record).await?;
        Ok(record)
    }

    fn response_record(
        &self,
        subscription: &WebhookSubscription,
        payload: &PreparedPayload,
        headers: &BTreeMap<String, String>,
        chain: &AttemptChain,
        response: TransportResponse,
        elapsed_ms: u64,
    ) -> DeliveryRecord {
        let success = response.is_success();
        DeliveryRecord {
            response_status: Some(response.status),
            response_body: (!response.body.is_empty())
                .then(|| truncate(&response.body, self.response_body_limit)),
            response_time_ms: Some(elapsed_ms),
            success,
            error_message: (!success).then(|| format!("HTTP {}", response.status)),
            ..base_record(subscription, payload, headers, chain)
        }
    }

    fn error_record(
        &self,
        subscription: &WebhookSubscription,
        payload: &PreparedPayload,
        headers: &BTreeMap<String, String>,
        chain: &AttemptChain,
        err: &TransportError,
    ) -> DeliveryRecord {
        DeliveryRecord {
            error_message: Some(truncate(&err.to_string(), self.error_message_limit)),
            ..base_record(subscription, payload, headers, chain)
        }
    }
}

/// Progress of one attempt chain.
struct AttemptChain {
    webhook_id: Uuid,
    delivery_id: Uuid,
    state: DeliveryState,
    attempt: u32,
}

impl AttemptChain {
    fn new(webhook_id: Uuid, delivery_id: Uuid) -> Self {
        Self {
            webhook_id,
            delivery_id,
            state: DeliveryState::Pending,
            attempt: 1,
        }
    }

    fn transition(&mut self, next: DeliveryState) {
        debug_assert!(
            self.state.can_transition_to(next),
            "illegal delivery transition {:?} -> {:?}",
            self.state,
            next
        );
        tracing::trace!(
            webhook_id = %self.webhook_id,
            delivery_id = %self.delivery_id,
            attempt = self.attempt,
            from = ?self.state,
            to = ?next,
            "Delivery state change"
        );
        self.state = next;
    }
}

fn build_headers(subscription: &WebhookSubscription, payload: &PreparedPayload) -> BTreeMap<String, String> {
    let signature = WebhookSigner::new(subscription.secret.as_str()).sign_header(payload.body.as_bytes());

    BTreeMap::from([
        ("Content-Type".to_string(), "application/json".to_string()),
        (SIGNATURE_HEADER.to_string(), signature),
        (EVENT_HEADER.to_string(), payload.envelope.event.clone()),
        (DELIVERY_HEADER.to_string(), payload.envelope.id.to_string()),
    ])
}

fn base_record(
    subscription: &WebhookSubscription,
    payload: &PreparedPayload,
    headers: &BTreeMap<String, String>,
    chain: &AttemptChain,
) -> DeliveryRecord {
    DeliveryRecord {
        id: Uuid::new_v4(),
        webhook_id: subscription.id,
        event: payload.envelope.event.clone(),
        request_url: subscription.url.clone(),
        request_headers: headers.clone(),
        request_body: payload.value.clone(),
        response_status: None,
        response_body: None,
        response_time_ms: None,
        success: false,
        error_message: None,
        attempt_number: chain.attempt,
        created_at: Utc::now(),
    }
}

/// Truncates to at most `limit` characters.
fn truncate(text: &str, limit: usize) -> String {
    match text.char_indices().nth(limit) {
        Some((idx, _)) => text[..idx].to_string(),
        None => text.to_string(),
    }
}
