//! Traits for handling verified webhooks.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use vault_webhooks::{EventEnvelope, WILDCARD_EVENT, WebhookResult};

use crate::client::{WebhookClient, WebhookExtractor, verify_webhook};

/// Handles verified webhook envelopes.
#[async_trait]
pub trait WebhookHandler: Send + Sync {
    /// Handles one envelope.
    async fn handle(&self, envelope: &EventEnvelope) -> WebhookResult<()>;
}

/// Dispatches verified envelopes to handlers by event name.
#[derive(Default, Clone)]
pub struct HandlerRegistry {
    handlers: HashMap<String, Vec<Arc<dyn WebhookHandler>>>,
}

impl HandlerRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a handler for an event name. `"*"` receives every event.
    pub fn on(mut self, event: impl Into<String>, handler: Arc<dyn WebhookHandler>) -> Self {
        self.handlers.entry(event.into()).or_default().push(handler);
        self
    }

    /// Returns the number of handlers that would receive an event.
    pub fn handler_count(&self, event: &str) -> usize {
        self.matching(event).count()
    }

    fn matching<'a>(&'a self, event: &'a str) -> impl Iterator<Item = &'a Arc<dyn WebhookHandler>> + 'a {
        let exact = self.handlers.get(event).into_iter().flatten();
        let wildcard = (event != WILDCARD_EVENT)
            .then(|| self.handlers.get(WILDCARD_EVENT))
            .flatten()
            .into_iter()
            .flatten();
        exact.chain(wildcard)
    }

    /// Runs every matching handler in registration order, exact-name
    /// handlers first. Stops at the first error.
    pub async fn dispatch(&self, envelope: &EventEnvelope) -> WebhookResult<usize> {
        let mut handled = 0;
        for handler in self.matching(&envelope.event) {
            handler.handle(envelope).await?;
            handled += 1;
        }

        if handled == 0 {
            tracing::debug!(event = %envelope.event, delivery_id = %envelope.id, "No handler for webhook event");
        }
        Ok(handled)
    }

    /// Verifies a request and dispatches its envelope.
    pub async fn receive<E: WebhookExtractor>(&self, client: &WebhookClient, request: &E) -> WebhookResult<usize> {
        let envelope = verify_webhook(client, request)?;
        self.dispatch(&envelope).await
    }
}
