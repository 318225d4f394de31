//! Delivery ledger: the audit trail of terminal delivery outcomes.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::delivery::DeliveryRecord;
use crate::error::WebhookResult;
use crate::storage::{DeliveryQuery, WebhookStorage};

/// Append-only log of delivery records.
#[derive(Clone)]
pub struct DeliveryLedger {
    storage: Arc<dyn WebhookStorage>,
}

impl DeliveryLedger {
    /// Creates a ledger over a storage backend.
    pub fn new(storage: Arc<dyn WebhookStorage>) -> Self {
        Self { storage }
    }

    /// Appends a record.
    pub async fn record(&self, delivery: &DeliveryRecord) -> WebhookResult<()> {
        self.storage.save_delivery(delivery).await
    }

    /// Returns delivery history for a subscription, newest first.
    pub async fn get_deliveries(
        &self,
        webhook_id: Uuid,
        success: Option<bool>,
        limit: usize,
        offset: usize,
    ) -> WebhookResult<Vec<DeliveryRecord>> {
        self.storage
            .list_deliveries(&DeliveryQuery {
                webhook_id,
                success,
                limit,
                offset,
            })
            .await
    }

    /// Deletes records created before `before`, optionally for one
    /// subscription only. Returns the number deleted.
    pub async fn cleanup_old_deliveries(
        &self,
        before: DateTime<Utc>,
        webhook_id: Option<Uuid>,
    ) -> WebhookResult<usize> {
        let count = self.storage.count_deliveries_before(before, webhook_id).await?;
        if count == 0 {
            return Ok(0);
        }

        let deleted = self.storage.delete_deliveries_before(before, webhook_id).await?;
        tracing::info!(deleted, %before, webhook_id = ?webhook_id, "Cleaned up old webhook deliveries");
        Ok(deleted)
    }
}
