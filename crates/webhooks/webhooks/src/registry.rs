//! Subscription registry: CRUD and secret lifecycle.

use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use crate::error::{WebhookError, WebhookResult};
use crate::secret::SecretGenerator;
use crate::storage::{SubscriptionQuery, WebhookStorage};
use crate::subscription::{NewSubscription, SubscriptionUpdate, WebhookSubscription};

/// Manages webhook subscriptions.
#[derive(Clone)]
pub struct SubscriptionRegistry {
    storage: Arc<dyn WebhookStorage>,
    secrets: SecretGenerator,
}

impl SubscriptionRegistry {
    /// Creates a registry over a storage backend.
    pub fn new(storage: Arc<dyn WebhookStorage>, secrets: SecretGenerator) -> Self {
        Self { storage, secrets }
    }

    /// Registers a subscription.
    ///
    /// The returned subscription carries the generated secret. It is the only
    /// time the secret is handed out, apart from [`Self::regenerate_secret`].
    pub async fn create(&self, request: NewSubscription) -> WebhookResult<WebhookSubscription> {
        request.validate()?;

        let subscription = WebhookSubscription::from_request(request, self.secrets.generate());
        self.storage.insert_subscription(&subscription).await?;

        tracing::info!(
            webhook_id = %subscription.id,
            organization_id = ?subscription.organization_id,
            url = %subscription.url,
            events = subscription.events.len(),
            "Created webhook"
        );
        Ok(subscription)
    }

    /// Gets a subscription by ID. The secret is redacted.
    pub async fn get(&self, id: Uuid) -> WebhookResult<Option<WebhookSubscription>> {
        let subscription = self.storage.get_subscription(id).await?;
        Ok(subscription.map(|s| s.redacted()))
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
        let subscriptions = self
            .storage
            .list_subscriptions(&SubscriptionQuery {
                organization_id,
                active_only,
                limit,
                offset,
            })
            .await?;
        Ok(subscriptions.iter().map(WebhookSubscription::redacted).collect())
    }

    /// Updates a subscription.
    ///
    /// Setting `is_active` to true also resets the failure counter. The
    /// returned subscription has its secret redacted.
    pub async fn update(&self, id: Uuid, update: SubscriptionUpdate) -> WebhookResult<WebhookSubscription> {
        update.validate()?;

        let subscription = self
            .storage
            .update_subscription(id, &update, Utc::now())
            .await?
            .ok_or(WebhookError::NotFound(id))?;

        tracing::info!(
            webhook_id = %id,
            is_active = subscription.is_active,
            "Updated webhook"
        );
        Ok(subscription.redacted())
    }

    /// Deletes a subscription.
    pub async fn delete(&self, id: Uuid) -> WebhookResult<()> {
        if !self.storage.delete_subscription(id).await? {
            return Err(WebhookError::NotFound(id));
        }

        tracing::info!(webhook_id = %id, "Deleted webhook");
        Ok(())
    }

    /// Issues a new secret.
    ///
    /// There is no grace window: signatures made with the old secret stop
    /// verifying immediately.
    pub async fn regenerate_secret(&self, id: Uuid) -> WebhookResult<WebhookSubscription> {
        let subscription = self
            .storage
            .rotate_secret(id, self.secrets.generate(), Utc::now())
            .await?
            .ok_or(WebhookError::NotFound(id))?;

        tracing::info!(webhook_id = %id, "Regenerated webhook secret");
        Ok(subscription)
    }
}
