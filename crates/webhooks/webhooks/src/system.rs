//! Webhook system - main entry point.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::Value;
use tokio::sync::{Mutex, watch};
use tokio::task::{JoinError, JoinSet};
use uuid::Uuid;

use crate::config::WebhookConfig;
use crate::delivery::{DeliveryExecutor, DeliveryRecord, PreparedPayload};
use crate::envelope::EventEnvelope;
use crate::error::WebhookResult;
use crate::health::HealthTracker;
use crate::ledger::DeliveryLedger;
use crate::matcher::EventMatcher;
use crate::registry::SubscriptionRegistry;
use crate::retry::{FixedSchedule, RetryStrategy};
use crate::secret::SecretGenerator;
use crate::storage::{InMemoryWebhookStorage, WebhookStorage};
use crate::subscription::{NewSubscription, SubscriptionUpdate, WebhookSubscription};
use crate::transport::{ReqwestTransport, WebhookTransport};

/// The main webhook system.
///
/// Owns the subscription registry, the delivery executor and the set of
/// background deliveries started by asynchronous triggers. Call
/// [`WebhookSystem::shutdown`] before exiting so background deliveries are
/// not dropped.
pub struct WebhookSystem {
    config: WebhookConfig,
    registry: SubscriptionRegistry,
    matcher: EventMatcher,
    health: HealthTracker,
    ledger: DeliveryLedger,
    executor: Arc<DeliveryExecutor>,
    transport: Arc<dyn WebhookTransport>,
    background: Mutex<JoinSet<()>>,
    in_flight: Arc<watch::Sender<usize>>,
}

impl WebhookSystem {
    /// Creates a webhook system with in-memory storage, the HTTP transport
    /// and the default retry schedule.
    pub fn new() -> Self {
        let config = WebhookConfig::default();
        let storage: Arc<dyn WebhookStorage> = Arc::new(InMemoryWebhookStorage::new());
        let transport: Arc<dyn WebhookTransport> = Arc::new(ReqwestTransport::from_config(&config));
        let retry: Arc<dyn RetryStrategy> = Arc::new(FixedSchedule::from_config(&config));
        Self::assemble(config, storage, transport, retry)
    }

    /// Starts building a webhook system.
    pub fn builder() -> WebhookSystemBuilder {
        WebhookSystemBuilder::new()
    }

    fn assemble(
        config: WebhookConfig,
        storage: Arc<dyn WebhookStorage>,
        transport: Arc<dyn WebhookTransport>,
        retry: Arc<dyn RetryStrategy>,
    ) -> Self {
        let registry = SubscriptionRegistry::new(storage.clone(), SecretGenerator::from_config(&config));
        let matcher = EventMatcher::new(storage.clone());
        let health = HealthTracker::with_threshold(storage.clone(), config.failure_threshold);
        let ledger = DeliveryLedger::new(storage);
        let executor = Arc::new(DeliveryExecutor::new(
            transport.clone(),
            retry,
            health.clone(),
            ledger.clone(),
            &config,
        ));

        Self {
            config,
            registry,
            matcher,
            health,
            ledger,
            executor,
            transport,
            background: Mutex::new(JoinSet::new()),
            in_flight: Arc::new(watch::Sender::new(0)),
        }
    }

    // ==================== Trigger ====================

    /// Notifies every subscription matching an event.
    ///
    /// With `sync` set, waits for every attempt chain (backoff included) and
    /// returns one record per matched subscription, in match order. Without
    /// it, each chain runs as a background task and an empty list is
    /// returned at once.
    pub async fn trigger(
        &self,
        event: impl Into<String>,
        organization_id: Option<Uuid>,
        data: Value,
        sync: bool,
    ) -> WebhookResult<Vec<DeliveryRecord>> {
        let envelope = EventEnvelope::from_value(event, organization_id, data)?;
        let subscriptions = self
            .matcher
            .find_matching(&envelope.event, organization_id)
            .await?;

        if subscriptions.is_empty() {
            tracing::debug!(event = %envelope.event, "No webhooks subscribed to event");
            return Ok(Vec::new());
        }

        tracing::debug!(
            event = %envelope.event,
            delivery_id = %envelope.id,
            subscribers = subscriptions.len(),
            sync,
            "Triggering webhooks"
        );
        let payload = Arc::new(PreparedPayload::new(envelope)?);

        if sync {
            self.deliver_all(subscriptions, payload).await
        } else {
            self.spawn_all(subscriptions, payload).await;
            Ok(Vec::new())
        }
    }

    async fn deliver_all(
        &self,
        subscriptions: Vec<WebhookSubscription>,
        payload: Arc<PreparedPayload>,
    ) -> WebhookResult<Vec<DeliveryRecord>> {
        let mut chains = JoinSet::new();
        let count = subscriptions.len();

        for (index, subscription) in subscriptions.into_iter().enumerate() {
            let executor = self.executor.clone();
            let payload = payload.clone();
            chains.spawn(async move { (index, executor.deliver(&subscription, &payload).await) });
        }

        // Join every chain before reporting a failure; dropping the set
        // would abort deliveries still in progress.
        let mut results = Vec::with_capacity(count);
        let mut first_error = None;
        while let Some(joined) = chains.join_next().await {
            match joined {
                Ok(result) => results.push(result),
                Err(err) => {
                    tracing::error!(
                        delivery_id = %payload.envelope.id,
                        error = %err,
                        "Webhook delivery task failed"
                    );
                    if first_error.is_none() {
                        first_error = Some(err);
                    }
                }
            }
        }
        if let Some(err) = first_error {
            return Err(err.into());
        }
        results.sort_by_key(|(index, _)| *index);

        results.into_iter().map(|(_, record)| record).collect()
    }

    async fn spawn_all(&self, subscriptions: Vec<WebhookSubscription>, payload: Arc<PreparedPayload>) {
        let mut background = self.background.lock().await;
        reap_finished(&mut background);

        for subscription in subscriptions {
            let executor = self.executor.clone();
            let payload = payload.clone();
            let guard = InFlight::enter(self.in_flight.clone());
            background.spawn(async move {
                let _guard = guard;
                if let Err(err) = executor.deliver(&subscription, &payload).await {
                    tracing::error!(
                        webhook_id = %subscription.id,
                        delivery_id = %payload.envelope.id,
                        error = %err,
                        "Background webhook delivery failed"
                    );
                }
            });
        }
    }

    // ==================== Lifecycle ====================

    /// Returns the number of background deliveries still running.
    pub async fn pending_deliveries(&self) -> usize {
        *self.in_flight.borrow()
    }

    /// Waits for every background delivery to finish, including ones
    /// started while waiting.
    pub async fn drain(&self) {
        let mut idle = self.in_flight.subscribe();
        let pending = *idle.borrow_and_update();
        if pending > 0 {
            tracing::info!(pending, "Draining background webhook deliveries");
        }

        // The sender lives in `self`, so this only returns once idle
        let _ = idle.wait_for(|count| *count == 0).await;

        let mut background = self.background.lock().await;
        reap_finished(&mut background);
    }

    /// Releases the shared HTTP client. It is rebuilt on the next delivery.
    pub async fn close(&self) {
        self.transport.close().await;
    }

    /// Drains background deliveries, then releases the HTTP client.
    pub async fn shutdown(&self) {
        self.drain().await;
        self.close().await;
    }

    // ==================== Subscriptions ====================

    /// Registers a subscription. The result carries the new secret.
    pub async fn create(&self, request: NewSubscription) -> WebhookResult<WebhookSubscription> {
        self.registry.create(request).await
    }

    /// Gets a subscription by ID. The secret is redacted.
    pub async fn get(&self, id: Uuid) -> WebhookResult<Option<WebhookSubscription>> {
        self.registry.get(id).await
    }

    /// Lists subscriptions of an organization, or global ones for `None`.
    /// Secrets are redacted.
    pub async fn list(
        &self,
        organization_id: Option<Uuid>,
        active_only: bool,
        limit: usize,
        offset: usize,
    ) -> WebhookResult<Vec<WebhookSubscription>> {
        self.registry.list(organization_id, active_only, limit, offset).await
    }

    /// Updates a subscription. The secret is redacted in the result.
    pub async fn update(&self, id: Uuid, update: SubscriptionUpdate) -> WebhookResult<WebhookSubscription> {
        self.registry.update(id, update).await
    }

    /// Deletes a subscription.
    pub async fn delete(&self, id: Uuid) -> WebhookResult<()> {
        self.registry.delete(id).await
    }

    /// Issues a new secret for a subscription.
    pub async fn regenerate_secret(&self, id: Uuid) -> WebhookResult<WebhookSubscription> {
        self.registry.regenerate_secret(id).await
    }

    // ==================== Deliveries ====================

    /// Returns delivery history for a subscription, newest first.
    pub async fn get_deliveries(
        &self,
        webhook_id: Uuid,
        success: Option<bool>,
        limit: usize,
        offset: usize,
    ) -> WebhookResult<Vec<DeliveryRecord>> {
        self.ledger.get_deliveries(webhook_id, success, limit, offset).await
    }

    /// Deletes delivery records older than a cutoff.
    pub async fn cleanup_old_deliveries(
        &self,
        before: DateTime<Utc>,
        webhook_id: Option<Uuid>,
    ) -> WebhookResult<usize> {
        self.ledger.cleanup_old_deliveries(before, webhook_id).await
    }

    // ==================== Components ====================

    /// Gets the subscription registry.
    pub fn registry(&self) -> &SubscriptionRegistry {
        &self.registry
    }

    /// Gets the event matcher.
    pub fn matcher(&self) -> &EventMatcher {
        &self.matcher
    }

    /// Gets the health tracker.
    pub fn health(&self) -> &HealthTracker {
        &self.health
    }

    /// Gets the delivery ledger.
    pub fn ledger(&self) -> &DeliveryLedger {
        &self.ledger
    }

    /// Gets the configuration.
    pub fn config(&self) -> &WebhookConfig {
        &self.config
    }
}

impl Default for WebhookSystem {
    fn default() -> Self {
        Self::new()
    }
}

fn reap_finished(background: &mut JoinSet<()>) {
    while let Some(result) = background.try_join_next() {
        log_join_error(result);
    }
}

/// Counts a background delivery from spawn until its task ends, including
/// by panic or abort.
struct InFlight(Arc<watch::Sender<usize>>);

impl InFlight {
    fn enter(counter: Arc<watch::Sender<usize>>) -> Self {
        counter.send_modify(|count| *count += 1);
        Self(counter)
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        self.0.send_modify(|count| *count = count.saturating_sub(1));
    }
}

fn log_join_error(result: Result<(), JoinError>) {
    if let Err(err) = result {
        tracing::error!(error = %err, "Background webhook delivery panicked");
    }
}

/// Builder for [`WebhookSystem`].
pub struct WebhookSystemBuilder {
    config: WebhookConfig,
    storage: Option<Arc<dyn WebhookStorage>>,
    transport: Option<Arc<dyn WebhookTransport>>,
    retry_strategy: Option<Arc<dyn RetryStrategy>>,
}

impl WebhookSystemBuilder {
    /// Creates a builder with default configuration.
    pub fn new() -> Self {
        Self {
            config: WebhookConfig::default(),
            storage: None,
            transport: None,
            retry_strategy: None,
        }
    }

    /// Sets the configuration.
    pub fn config(mut self, config: WebhookConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the storage backend. Defaults to in-memory storage.
    pub fn storage(mut self, storage: Arc<dyn WebhookStorage>) -> Self {
        self.storage = Some(storage);
        self
    }

    /// Sets the delivery transport. Defaults to the HTTP transport.
    pub fn transport(mut self, transport: Arc<dyn WebhookTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Sets the retry strategy. Defaults to the configured fixed schedule.
    pub fn retry_strategy(mut self, retry_strategy: Arc<dyn RetryStrategy>) -> Self {
        self.retry_strategy = Some(retry_strategy);
        self
    }

    /// Builds the webhook system.
    pub fn build(self) -> WebhookResult<WebhookSystem> {
        self.config.validate()?;

        let config = self.config;
        let storage = self
            .storage
            .unwrap_or_else(|| Arc::new(InMemoryWebhookStorage::new()));
        let transport = self
            .transport
            .unwrap_or_else(|| Arc::new(ReqwestTransport::from_config(&config)));
        let retry_strategy = self
            .retry_strategy
            .unwrap_or_else(|| Arc::new(FixedSchedule::from_config(&config)));

        Ok(WebhookSystem::assemble(config, storage, transport, retry_strategy))
    }
}

impl Default for WebhookSystemBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_webhook_system() {
        let system = WebhookSystem::new();

        let subscription = system
            .create(NewSubscription::new("https://example.com/webhook", ["user.created"]))
            .await
            .unwrap();
        assert!(subscription.secret.starts_with("whsec_"));

        let listed = system.list(None, true, 50, 0).await.unwrap();
        assert_eq!(listed.len(), 1);
    }

    #[tokio::test]
    async fn test_trigger_without_subscribers() {
        let system = WebhookSystem::new();

        let records = system
            .trigger("user.created", None, serde_json::json!({}), true)
            .await
            .unwrap();
        assert!(records.is_empty());
        assert_eq!(system.pending_deliveries().await, 0);
    }

    #[tokio::test]
    async fn test_trigger_rejects_non_object_data() {
        let system = WebhookSystem::new();
        let result = system
            .trigger("user.created", None, serde_json::json!([1, 2, 3]), true)
            .await;
        assert!(result.is_err());
    }

    #[test]
    fn test_builder_validates_config() {
        let result = WebhookSystem::builder()
            .config(WebhookConfig::new().max_attempts(0))
            .build();
        assert!(result.is_err());
    }
}
