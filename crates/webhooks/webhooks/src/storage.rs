//! Webhook storage trait for persistence.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::delivery::DeliveryRecord;
use crate::error::WebhookResult;
use crate::subscription::{SubscriptionUpdate, WebhookSubscription};

/// Filter for listing subscriptions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionQuery {
    /// Organization to list. `None` lists global subscriptions.
    pub organization_id: Option<Uuid>,
    /// Only return active subscriptions.
    pub active_only: bool,
    /// Maximum results.
    pub limit: usize,
    /// Results to skip.
    pub offset: usize,
}

/// Filter for listing delivery records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryQuery {
    /// Owning subscription.
    pub webhook_id: Uuid,
    /// Only return records with this outcome.
    pub success: Option<bool>,
    /// Maximum results.
    pub limit: usize,
    /// Results to skip.
    pub offset: usize,
}

/// Trait for webhook storage backends.
///
/// Mutating subscription operations must be atomic per subscription:
/// concurrent deliveries to the same subscription call
/// [`WebhookStorage::record_failure`] in parallel, and no increment may be lost.
#[async_trait]
pub trait WebhookStorage: Send + Sync {
    // ==================== Subscription Operations ====================

    /// Saves a new subscription.
    async fn insert_subscription(&self, subscription: &WebhookSubscription) -> WebhookResult<()>;

    /// Gets a subscription by ID.
    async fn get_subscription(&self, id: Uuid) -> WebhookResult<Option<WebhookSubscription>>;

    /// Lists subscriptions, newest first.
    async fn list_subscriptions(
        &self,
        query: &SubscriptionQuery,
    ) -> WebhookResult<Vec<WebhookSubscription>>;

    /// Applies an update. Returns None if the subscription does not exist.
    async fn update_subscription(
        &self,
        id: Uuid,
        update: &SubscriptionUpdate,
        now: DateTime<Utc>,
    ) -> WebhookResult<Option<WebhookSubscription>>;

    /// Replaces the secret. Returns None if the subscription does not exist.
    async fn rotate_secret(
        &self,
        id: Uuid,
        secret: String,
        now: DateTime<Utc>,
    ) -> WebhookResult<Option<WebhookSubscription>>;

    /// Deletes a subscription. Returns whether it existed.
    async fn delete_subscription(&self, id: Uuid) -> WebhookResult<bool>;

    /// Returns active subscriptions of an organization (when given) followed
    /// by active global subscriptions.
    async fn find_active_subscriptions(
        &self,
        organization_id: Option<Uuid>,
    ) -> WebhookResult<Vec<WebhookSubscription>>;

    // ==================== Health Operations ====================

    /// Records a successful delivery and clears the failure counter.
    async fn record_success(
        &self,
        id: Uuid,
        at: DateTime<Utc>,
    ) -> WebhookResult<Option<WebhookSubscription>>;

    /// Records a failed delivery, disabling the subscription once the
    /// counter reaches `threshold`.
    async fn record_failure(
        &self,
        id: Uuid,
        at: DateTime<Utc>,
        threshold: u32,
    ) -> WebhookResult<Option<WebhookSubscription>>;

    // ==================== Delivery Log Operations ====================

    /// Saves a delivery record.
    async fn save_delivery(&self, delivery: &DeliveryRecord) -> WebhookResult<()>;

    /// Lists delivery records, newest first.
    async fn list_deliveries(&self, query: &DeliveryQuery) -> WebhookResult<Vec<DeliveryRecord>>;

    /// Counts delivery records created before a cutoff.
    async fn count_deliveries_before(
        &self,
        before: DateTime<Utc>,
        webhook_id: Option<Uuid>,
    ) -> WebhookResult<usize>;

    /// Deletes delivery records created before a cutoff.
    async fn delete_deliveries_before(
        &self,
        before: DateTime<Utc>,
        webhook_id: Option<Uuid>,
    ) -> WebhookResult<usize>;
}

/// In-memory webhook storage.
///
/// Each subscription mutation happens under a single write lock, which makes
/// health updates atomic.
pub struct InMemoryWebhookStorage {
    subscriptions: RwLock<HashMap<Uuid, WebhookSubscription>>,
    deliveries: RwLock<Vec<DeliveryRecord>>,
}

impl InMemoryWebhookStorage {
    /// Creates a new in-memory storage.
    pub fn new() -> Self {
        Self {
            subscriptions: RwLock::new(HashMap::new()),
            deliveries: RwLock::new(Vec::new()),
        }
    }

    /// Returns the number of stored delivery records.
    pub async fn delivery_count(&self) -> usize {
        self.deliveries.read().await.len()
    }
}

impl Default for InMemoryWebhookStorage {
    fn default() -> Self {
        Self::new()
    }
}

fn matches_cutoff(record: &DeliveryRecord, before: DateTime<Utc>, webhook_id: Option<Uuid>) -> bool {
    record.created_at < before && webhook_id.is_none_or(|id| record.webhook_id == id)
}

#[async_trait]
impl WebhookStorage for InMemoryWebhookStorage {
    async fn insert_subscription(&self, subscription: &WebhookSubscription) -> WebhookResult<()> {
        let mut subscriptions = self.subscriptions.write().await;
        subscriptions.insert(subscription.id, subscription.clone());
        Ok(())
    }

    async fn get_subscription(&self, id: Uuid) -> WebhookResult<Option<WebhookSubscription>> {
        let subscriptions = self.subscriptions.read().await;
        Ok(subscriptions.get(&id).cloned())
    }

    async fn list_subscriptions(
        &self,
        query: &SubscriptionQuery,
    ) -> WebhookResult<Vec<WebhookSubscription>> {
        let subscriptions = self.subscriptions.read().await;
        let mut matching: Vec<WebhookSubscription> = subscriptions
            .values()
            .filter(|s| s.organization_id == query.organization_id)
            .filter(|s| !query.active_only || s.is_active)
            .cloned()
            .collect();

        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(matching
            .into_iter()
            .skip(query.offset)
            .take(query.limit)
            .collect())
    }

    async fn update_subscription(
        &self,
        id: Uuid,
        update: &SubscriptionUpdate,
        now: DateTime<Utc>,
    ) -> WebhookResult<Option<WebhookSubscription>> {
        let mut subscriptions = self.subscriptions.write().await;
        Ok(subscriptions.get_mut(&id).map(|subscription| {
            update.apply(subscription, now);
            subscription.clone()
        }))
    }

    async fn rotate_secret(
        &self,
        id: Uuid,
        secret: String,
        now: DateTime<Utc>,
    ) -> WebhookResult<Option<WebhookSubscription>> {
        let mut subscriptions = self.subscriptions.write().await;
        Ok(subscriptions.get_mut(&id).map(|subscription| {
            subscription.secret = secret;
            subscription.updated_at = now;
            subscription.clone()
        }))
    }

    async fn delete_subscription(&self, id: Uuid) -> WebhookResult<bool> {
        let mut subscriptions = self.subscriptions.write().await;
        Ok(subscriptions.remove(&id).is_some())
    }

    async fn find_active_subscriptions(
        &self,
        organization_id: Option<Uuid>,
    ) -> WebhookResult<Vec<WebhookSubscription>> {
        let subscriptions = self.subscriptions.read().await;

        let mut scoped: Vec<WebhookSubscription> = match organization_id {
            Some(org) => subscriptions
                .values()
                .filter(|s| s.is_active && s.organization_id == Some(org))
                .cloned()
                .collect(),
            None => Vec::new(),
        };
        let mut global: Vec<WebhookSubscription> = subscriptions
            .values()
            .filter(|s| s.is_active && s.is_global())
            .cloned()
            .collect();

        scoped.sort_by_key(|s| s.created_at);
        global.sort_by_key(|s| s.created_at);
        scoped.extend(global);
        Ok(scoped)
    }

    async fn record_success(
        &self,
        id: Uuid,
        at: DateTime<Utc>,
    ) -> WebhookResult<Option<WebhookSubscription>> {
        let mut subscriptions = self.subscriptions.write().await;
        Ok(subscriptions.get_mut(&id).map(|subscription| {
            subscription.last_triggered_at = Some(at);
            subscription.last_success_at = Some(at);
            subscription.failure_count = 0;
            subscription.clone()
        }))
    }

    async fn record_failure(
        &self,
        id: Uuid,
        at: DateTime<Utc>,
        threshold: u32,
    ) -> WebhookResult<Option<WebhookSubscription>> {
        let mut subscriptions = self.subscriptions.write().await;
        Ok(subscriptions.get_mut(&id).map(|subscription| {
            subscription.last_triggered_at = Some(at);
            subscription.last_failure_at = Some(at);
            subscription.failure_count = subscription.failure_count.saturating_add(1);
            if subscription.failure_count >= threshold {
                subscription.is_active = false;
            }
            subscription.clone()
        }))
    }

    async fn save_delivery(&self, delivery: &DeliveryRecord) -> WebhookResult<()> {
        let mut deliveries = self.deliveries.write().await;
        deliveries.push(delivery.clone());
        Ok(())
    }

    async fn list_deliveries(&self, query: &DeliveryQuery) -> WebhookResult<Vec<DeliveryRecord>> {
        let deliveries = self.deliveries.read().await;
        let mut matching: Vec<DeliveryRecord> = deliveries
            .iter()
            .rev()
            .filter(|d| d.webhook_id == query.webhook_id)
            .filter(|d| query.success.is_none_or(|success| d.success == success))
            .cloned()
            .collect();

        // Stable, so records with equal timestamps stay newest-inserted first
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(matching
            .into_iter()
            .skip(query.offset)
            .take(query.limit)
            .collect())
    }

    async fn count_deliveries_before(
        &self,
        before: DateTime<Utc>,
        webhook_id: Option<Uuid>,
    ) -> WebhookResult<usize> {
        let deliveries = self.deliveries.read().await;
        Ok(deliveries
            .iter()
            .filter(|d| matches_cutoff(d, before, webhook_id))
            .count())
    }

    async fn delete_deliveries_before(
        &self,
        before: DateTime<Utc>,
        webhook_id: Option<Uuid>,
    ) -> WebhookResult<usize> {
        let mut deliveries = self.deliveries.write().await;
        let before_len = deliveries.len();
        deliveries.retain(|d| !matches_cutoff(d, before, webhook_id));
        Ok(before_len - deliveries.len())
    }
}
