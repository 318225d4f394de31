//! Event-to-subscription matching.

use std::sync::Arc;

use uuid::Uuid;

use crate::error::WebhookResult;
use crate::storage::WebhookStorage;
use crate::subscription::WebhookSubscription;

/// Selects the subscriptions that should receive an event.
#[derive(Clone)]
pub struct EventMatcher {
    storage: Arc<dyn WebhookStorage>,
}

impl EventMatcher {
    /// Creates a matcher over a storage backend.
    pub fn new(storage: Arc<dyn WebhookStorage>) -> Self {
        Self { storage }
    }

    /// Finds active subscriptions for an event.
    ///
    /// Candidates are the organization's own subscriptions (when an
    /// organization is given) plus every global subscription. A candidate
    /// matches if its event set holds the event name or `"*"`.
    pub async fn find_matching(
        &self,
        event: &str,
        organization_id: Option<Uuid>,
    ) -> WebhookResult<Vec<WebhookSubscription>> {
        let candidates = self.storage.find_active_subscriptions(organization_id).await?;
        let total = candidates.len();

        let matching: Vec<WebhookSubscription> = candidates
            .into_iter()
            .filter(|s| s.subscribes_to(event))
            .collect();

        tracing::debug!(
            event,
            organization_id = ?organization_id,
            candidates = total,
            matched = matching.len(),
            "Matched webhooks for event"
        );
        Ok(matching)
    }
}
