//! Endpoint health tests.
//!
//! Tests cover:
//! - Auto-disable at the failure threshold
//! - Counter reset on success and on reactivation
//! - Counter consistency under concurrent failures

mod common;

use std::sync::Arc;

use common::*;
use serde_json::json;
use vault_webhooks::*;

struct Fixture {
    storage: Arc<InMemoryWebhookStorage>,
    registry: SubscriptionRegistry,
}

impl Fixture {
    fn new() -> Self {
        let storage = Arc::new(InMemoryWebhookStorage::new());
        let registry = SubscriptionRegistry::new(storage.clone(), SecretGenerator::default());
        Self { storage, registry }
    }

    fn health(&self, threshold: u32) -> HealthTracker {
        HealthTracker::with_threshold(self.storage.clone(), threshold)
    }

    fn matcher(&self) -> EventMatcher {
        EventMatcher::new(self.storage.clone())
    }
}

mod threshold_tests {
    use super::*;

    #[tokio::test]
    async fn test_ten_failures_disable_subscription() {
        let fixture = Fixture::new();
        let health = fixture.health(DEFAULT_FAILURE_THRESHOLD);
        let subscription = fixture
            .registry
            .create(subscribe("https://example.com/hook", &["*"]))
            .await
            .unwrap();

        for _ in 0..9 {
            health.mark_failure(subscription.id).await.unwrap();
        }
        let stored = fixture.registry.get(subscription.id).await.unwrap().unwrap();
        assert!(stored.is_active);
        assert_eq!(stored.failure_count, 9);

        health.mark_failure(subscription.id).await.unwrap();
        let stored = fixture.registry.get(subscription.id).await.unwrap().unwrap();
        assert!(!stored.is_active);
        assert_eq!(stored.failure_count, 10);
        assert!(stored.last_failure_at.is_some());

        let matched = fixture.matcher().find_matching("user.created", None).await.unwrap();
        assert!(matched.is_empty());
    }

    #[tokio::test]
    async fn test_success_resets_counter() {
        let fixture = Fixture::new();
        let health = fixture.health(DEFAULT_FAILURE_THRESHOLD);
        let subscription = fixture
            .registry
            .create(subscribe("https://example.com/hook", &["*"]))
            .await
            .unwrap();

        for _ in 0..5 {
            health.mark_failure(subscription.id).await.unwrap();
        }
        health.mark_success(subscription.id).await.unwrap();

        let stored = fixture.registry.get(subscription.id).await.unwrap().unwrap();
        assert_eq!(stored.failure_count, 0);
        assert!(stored.is_active);
        assert!(stored.last_success_at.is_some());
    }

    #[tokio::test]
    async fn test_reactivation_resets_counter() {
        let fixture = Fixture::new();
        let health = fixture.health(2);
        let subscription = fixture
            .registry
            .create(subscribe("https://example.com/hook", &["*"]))
            .await
            .unwrap();

        health.mark_failure(subscription.id).await.unwrap();
        health.mark_failure(subscription.id).await.unwrap();
        assert!(!fixture.registry.get(subscription.id).await.unwrap().unwrap().is_active);

        let reactivated = fixture
            .registry
            .update(subscription.id, SubscriptionUpdate::new().active(true))
            .await
            .unwrap();
        assert!(reactivated.is_active);
        assert_eq!(reactivated.failure_count, 0);
        assert_eq!(fixture.matcher().find_matching("user.created", None).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_rejections_disable_through_deliveries() {
        let transport = Arc::new(ScriptedTransport::always(status(500)));
        let system = system_with_config(transport.clone(), WebhookConfig::new().failure_threshold(3));
        let subscription = system
            .create(subscribe("https://example.com/hook", &["user.updated"]))
            .await
            .unwrap();

        for _ in 0..3 {
            let records = system
                .trigger("user.updated", None, json!({}), true)
                .await
                .unwrap();
            assert_eq!(records.len(), 1);
        }

        let stored = system.get(subscription.id).await.unwrap().unwrap();
        assert!(!stored.is_active);

        let records = system
            .trigger("user.updated", None, json!({}), true)
            .await
            .unwrap();
        assert!(records.is_empty());
        assert_eq!(transport.call_count(), 3);
    }
}

mod concurrency_tests {
    use super::*;

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_failures_are_not_lost() {
        let fixture = Fixture::new();
        let health = fixture.health(1000);
        let subscription = fixture
            .registry
            .create(subscribe("https://example.com/hook", &["*"]))
            .await
            .unwrap();

        let mut tasks = tokio::task::JoinSet::new();
        for _ in 0..200 {
            let health = health.clone();
            let id = subscription.id;
            tasks.spawn(async move { health.mark_failure(id).await });
        }
        while let Some(result) = tasks.join_next().await {
            result.unwrap().unwrap();
        }

        let stored = fixture.registry.get(subscription.id).await.unwrap().unwrap();
        assert_eq!(stored.failure_count, 200);
        assert!(stored.is_active);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_failures_disable_exactly_at_threshold() {
        let fixture = Fixture::new();
        let health = fixture.health(DEFAULT_FAILURE_THRESHOLD);
        let subscription = fixture
            .registry
            .create(subscribe("https://example.com/hook", &["*"]))
            .await
            .unwrap();

        let mut tasks = tokio::task::JoinSet::new();
        for _ in 0..DEFAULT_FAILURE_THRESHOLD {
            let health = health.clone();
            let id = subscription.id;
            tasks.spawn(async move { health.mark_failure(id).await });
        }
        while let Some(result) = tasks.join_next().await {
            result.unwrap().unwrap();
        }

        let stored = fixture.registry.get(subscription.id).await.unwrap().unwrap();
        assert_eq!(stored.failure_count, DEFAULT_FAILURE_THRESHOLD);
        assert!(!stored.is_active);
    }
}
