//! Event matching tests.
//!
//! Tests cover:
//! - Exact event names and the `"*"` wildcard
//! - Organization-scoped versus global subscriptions
//! - Inactive subscriptions

mod common;

use std::sync::Arc;

use common::*;
use serde_json::json;
use uuid::Uuid;
use vault_webhooks::*;

fn system() -> WebhookSystem {
    system_with(Arc::new(ScriptedTransport::always(status(200))))
}

mod event_tests {
    use super::*;

    #[tokio::test]
    async fn test_exact_and_wildcard_match() {
        let system = system();
        let exact = system
            .create(subscribe("https://a.example.com", &["user.created"]))
            .await
            .unwrap();
        let wildcard = system
            .create(subscribe("https://b.example.com", &["*"]))
            .await
            .unwrap();
        let disjoint = system
            .create(subscribe("https://c.example.com", &["org.deleted", "role.created"]))
            .await
            .unwrap();

        let matched = system.matcher().find_matching("user.created", None).await.unwrap();
        let ids: Vec<Uuid> = matched.iter().map(|s| s.id).collect();

        assert!(ids.contains(&exact.id));
        assert!(ids.contains(&wildcard.id));
        assert!(!ids.contains(&disjoint.id));
    }

    #[tokio::test]
    async fn test_unmatched_event_creates_no_record() {
        let system = system();
        let subscription = system
            .create(subscribe("https://a.example.com", &["user.created"]))
            .await
            .unwrap();

        let matched = system.matcher().find_matching("user.deleted", None).await.unwrap();
        assert!(matched.is_empty());

        let records = system
            .trigger("user.deleted", None, json!({}), true)
            .await
            .unwrap();
        assert!(records.is_empty());

        let history = system.get_deliveries(subscription.id, None, 50, 0).await.unwrap();
        assert!(history.is_empty());
    }

    #[tokio::test]
    async fn test_prefix_pattern_is_literal() {
        let system = system();
        system
            .create(subscribe("https://a.example.com", &["user.*"]))
            .await
            .unwrap();

        assert!(system.matcher().find_matching("user.created", None).await.unwrap().is_empty());
        assert_eq!(system.matcher().find_matching("user.*", None).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_catalogue_events_trigger() {
        let system = system();
        system
            .create(subscribe("https://a.example.com", &[WebhookEvent::ApiKeyRevoked.as_str()]))
            .await
            .unwrap();

        let records = system
            .trigger(WebhookEvent::ApiKeyRevoked, None, json!({"key_id": "k1"}), true)
            .await
            .unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].event, "api_key.revoked");
    }
}

mod scope_tests {
    use super::*;

    #[tokio::test]
    async fn test_global_matches_every_organization() {
        let system = system();
        let global = system
            .create(subscribe("https://global.example.com", &["*"]))
            .await
            .unwrap();

        for org in [None, Some(Uuid::new_v4()), Some(Uuid::new_v4())] {
            let matched = system.matcher().find_matching("org.created", org).await.unwrap();
            assert_eq!(matched.len(), 1);
            assert_eq!(matched[0].id, global.id);
        }
    }

    #[tokio::test]
    async fn test_org_scoped_only_matches_own_organization() {
        let system = system();
        let org_a = Uuid::new_v4();
        let org_b = Uuid::new_v4();
        let scoped = system
            .create(subscribe("https://a.example.com", &["member.added"]).organization(org_a))
            .await
            .unwrap();

        let own = system.matcher().find_matching("member.added", Some(org_a)).await.unwrap();
        assert_eq!(own.len(), 1);
        assert_eq!(own[0].id, scoped.id);

        assert!(system.matcher().find_matching("member.added", Some(org_b)).await.unwrap().is_empty());
        assert!(system.matcher().find_matching("member.added", None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_scoped_subscriptions_come_before_global() {
        let system = system();
        let org = Uuid::new_v4();
        let global = system
            .create(subscribe("https://global.example.com", &["*"]))
            .await
            .unwrap();
        let scoped = system
            .create(subscribe("https://org.example.com", &["*"]).organization(org))
            .await
            .unwrap();

        let records = system
            .trigger("role.updated", Some(org), json!({}), true)
            .await
            .unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].webhook_id, scoped.id);
        assert_eq!(records[1].webhook_id, global.id);

        let envelope: EventEnvelope = serde_json::from_value(records[0].request_body.clone()).unwrap();
        assert_eq!(envelope.organization_id, Some(org));
    }

    #[tokio::test]
    async fn test_inactive_subscription_excluded() {
        let system = system();
        let subscription = system
            .create(subscribe("https://a.example.com", &["*"]))
            .await
            .unwrap();

        system
            .update(subscription.id, SubscriptionUpdate::new().active(false))
            .await
            .unwrap();
        assert!(system.matcher().find_matching("user.created", None).await.unwrap().is_empty());

        system
            .update(subscription.id, SubscriptionUpdate::new().active(true))
            .await
            .unwrap();
        assert_eq!(system.matcher().find_matching("user.created", None).await.unwrap().len(), 1);
    }
}
