//! Subscription health tracking and auto-disable.
//!
//! Every delivery outcome is reported here. A success clears the failure
//! counter; each failure increments it, and reaching the threshold disables
//! the subscription until it is reactivated through an update.

use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use crate::error::WebhookResult;
use crate::storage::WebhookStorage;

/// Failures after which a subscription is disabled.
pub const DEFAULT_FAILURE_THRESHOLD: u32 = 10;

/// Tracks delivery health per subscription.
#[derive(Clone)]
pub struct HealthTracker {
    storage: Arc<dyn WebhookStorage>,
    failure_threshold: u32,
}

impl HealthTracker {
    /// Creates a tracker with the default threshold.
    pub fn new(storage: Arc<dyn WebhookStorage>) -> Self {
        Self::with_threshold(storage, DEFAULT_FAILURE_THRESHOLD)
    }

    /// Creates a tracker with a custom threshold.
    pub fn with_threshold(storage: Arc<dyn WebhookStorage>, failure_threshold: u32) -> Self {
        Self {
            storage,
            failure_threshold,
        }
    }

    /// Returns the auto-disable threshold.
    pub fn failure_threshold(&self) -> u32 {
        self.failure_threshold
    }

    /// Records a successful delivery.
    pub async fn mark_success(&self, webhook_id: Uuid) -> WebhookResult<()> {
        if self
            .storage
            .record_success(webhook_id, Utc::now())
            .await?
            .is_none()
        {
            tracing::debug!(%webhook_id, "Success reported for unknown webhook");
        }
        Ok(())
    }

    /// Records a failed delivery, disabling the subscription at the threshold.
    pub async fn mark_failure(&self, webhook_id: Uuid) -> WebhookResult<()> {
        let Some(subscription) = self
            .storage
            .record_failure(webhook_id, Utc::now(), self.failure_threshold)
            .await?
        else {
            tracing::debug!(%webhook_id, "Failure reported for unknown webhook");
            return Ok(());
        };

        if subscription.failure_count == self.failure_threshold {
            tracing::warn!(
                %webhook_id,
                url = %subscription.url,
                failure_count = subscription.failure_count,
                "Webhook disabled after consecutive failures"
            );
        }
        Ok(())
    }
}
